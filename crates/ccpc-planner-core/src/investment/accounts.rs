use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::returns::InvestmentReturns;
use crate::time_value::safe_div;
use crate::types::{round_cents, Money, Rate};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The corporation's notional tax pools and its investment portfolio.
///
/// Every pool is non-negative. `corporate_investments` may dip below zero
/// inside a year when salary is pre-financed against current earnings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotionalAccounts {
    #[serde(default)]
    pub cda: Money,
    #[serde(default)]
    pub erdtoh: Money,
    #[serde(default)]
    pub nrdtoh: Money,
    #[serde(default)]
    pub grip: Money,
    #[serde(default)]
    pub corporate_investments: Money,
    #[serde(default)]
    pub corporate_acb: Money,
}

impl NotionalAccounts {
    pub fn total_rdtoh(&self) -> Money {
        self.erdtoh + self.nrdtoh
    }

    /// Cash out of the portfolio. Cost base is reduced pro rata to the share
    /// of the portfolio sold and never exceeds what is left.
    pub fn withdraw(&self, amount: Money) -> NotionalAccounts {
        if amount <= Decimal::ZERO {
            return self.clone();
        }
        let sold_share = safe_div(amount, self.corporate_investments, Decimal::ONE)
            .min(Decimal::ONE)
            .max(Decimal::ZERO);
        let remaining = self.corporate_investments - amount;
        let acb = round_cents(self.corporate_acb * (Decimal::ONE - sold_share))
            .min(remaining.max(Decimal::ZERO))
            .max(Decimal::ZERO);
        NotionalAccounts {
            corporate_investments: remaining,
            corporate_acb: acb,
            ..self.clone()
        }
    }

    /// Cash into the portfolio at cost (retained after-tax business income).
    pub fn deposit(&self, amount: Money) -> NotionalAccounts {
        if amount <= Decimal::ZERO {
            return self.clone();
        }
        NotionalAccounts {
            corporate_investments: self.corporate_investments + amount,
            corporate_acb: self.corporate_acb + amount,
            ..self.clone()
        }
    }
}

/// New accounts plus the passive tax split for the year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub accounts: NotionalAccounts,
    /// (foreign income + taxable gain) * passive rate
    pub total_passive_tax: Money,
    /// Portion added to nRDTOH.
    pub refundable_tax: Money,
    pub non_refundable_tax: Money,
    /// Part IV tax on Canadian dividends, added to eRDTOH.
    pub part_iv_tax: Money,
    pub after_tax_return: Money,
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Fold one year of investment returns into the accounts.
///
/// The input is never modified; the caller commits the returned state.
pub fn update_accounts_from_returns(
    accounts: &NotionalAccounts,
    returns: &InvestmentReturns,
    passive_rate: Rate,
) -> AccountUpdate {
    let total_passive_tax = round_cents(returns.taxable_investment_income() * passive_rate);
    let refundable_tax = returns.nrdtoh_increase;
    let non_refundable_tax = (total_passive_tax - refundable_tax).max(Decimal::ZERO);
    let after_tax_return = returns.total_return - non_refundable_tax;

    let corporate_investments = accounts.corporate_investments + after_tax_return;
    let corporate_acb = (accounts.corporate_acb + after_tax_return
        - returns.unrealized_capital_gain)
        .max(Decimal::ZERO);

    AccountUpdate {
        accounts: NotionalAccounts {
            cda: accounts.cda + returns.cda_increase,
            erdtoh: accounts.erdtoh + returns.erdtoh_increase,
            nrdtoh: accounts.nrdtoh + returns.nrdtoh_increase,
            grip: accounts.grip + returns.grip_increase,
            corporate_investments,
            corporate_acb,
        },
        total_passive_tax,
        refundable_tax,
        non_refundable_tax,
        part_iv_tax: returns.erdtoh_increase,
        after_tax_return,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investment::returns::{decompose_returns, AssetAllocation, ReturnAssumption};
    use crate::tax_data::get_tax_year_data;
    use crate::types::Province;
    use rust_decimal_macros::dec;

    const PASSIVE_RATE: Rate = dec!(0.5017);

    fn start() -> NotionalAccounts {
        NotionalAccounts {
            cda: dec!(10_000),
            erdtoh: dec!(5_000),
            nrdtoh: dec!(3_000),
            grip: dec!(20_000),
            corporate_investments: dec!(1_000_000),
            corporate_acb: dec!(800_000),
        }
    }

    fn returns(balance: Money) -> InvestmentReturns {
        let rates = get_tax_year_data(2026, dec!(0.02), Province::Ontario)
            .unwrap()
            .corporate;
        decompose_returns(
            balance,
            &AssetAllocation::default(),
            &ReturnAssumption::Blended { rate: dec!(0.06) },
            &rates,
        )
    }

    #[test]
    fn test_passive_tax_split_is_exact() {
        let r = returns(dec!(1_000_000));
        let u = update_accounts_from_returns(&start(), &r, PASSIVE_RATE);
        assert_eq!(
            u.non_refundable_tax + u.refundable_tax,
            round_cents(r.taxable_investment_income() * PASSIVE_RATE)
        );
        // 27,625 * 50.17% = 13,859.46
        assert_eq!(u.total_passive_tax, dec!(13_859.46));
        assert_eq!(u.non_refundable_tax, dec!(13_859.46) - dec!(6_785.09));
    }

    #[test]
    fn test_pools_accumulate() {
        let r = returns(dec!(1_000_000));
        let u = update_accounts_from_returns(&start(), &r, PASSIVE_RATE);
        assert_eq!(u.accounts.cda, dec!(11_375));
        assert_eq!(u.accounts.erdtoh, dec!(5_000) + dec!(2_874.75));
        assert_eq!(u.accounts.nrdtoh, dec!(3_000) + dec!(6_785.09));
        assert_eq!(u.accounts.grip, dec!(27_500));
    }

    #[test]
    fn test_balance_and_acb_growth() {
        let r = returns(dec!(1_000_000));
        let s = start();
        let u = update_accounts_from_returns(&s, &r, PASSIVE_RATE);
        assert_eq!(
            u.accounts.corporate_investments,
            s.corporate_investments + r.total_return - u.non_refundable_tax
        );
        // Only the realized / taxed part of growth raises cost base
        assert_eq!(
            u.accounts.corporate_acb,
            s.corporate_acb + u.after_tax_return - r.unrealized_capital_gain
        );
        assert!(u.accounts.corporate_acb <= u.accounts.corporate_investments);
    }

    #[test]
    fn test_input_not_mutated() {
        let s = start();
        let before = s.clone();
        let _ = update_accounts_from_returns(&s, &returns(dec!(1_000_000)), PASSIVE_RATE);
        assert_eq!(s, before);
    }

    #[test]
    fn test_zero_returns_leave_accounts_unchanged() {
        let s = start();
        let u = update_accounts_from_returns(&s, &InvestmentReturns::default(), PASSIVE_RATE);
        assert_eq!(u.accounts, s);
        assert_eq!(u.total_passive_tax, Decimal::ZERO);
    }

    #[test]
    fn test_withdraw_reduces_acb_pro_rata() {
        let s = start();
        let w = s.withdraw(dec!(250_000));
        assert_eq!(w.corporate_investments, dec!(750_000));
        assert_eq!(w.corporate_acb, dec!(600_000));
        assert_eq!(w.cda, s.cda);
    }

    #[test]
    fn test_withdraw_past_zero_pre_finances() {
        let s = NotionalAccounts {
            corporate_investments: dec!(10_000),
            corporate_acb: dec!(10_000),
            ..Default::default()
        };
        let w = s.withdraw(dec!(15_000));
        assert_eq!(w.corporate_investments, dec!(-5_000));
        assert_eq!(w.corporate_acb, Decimal::ZERO);
    }

    #[test]
    fn test_deposit_at_cost() {
        let d = start().deposit(dec!(50_000));
        assert_eq!(d.corporate_investments, dec!(1_050_000));
        assert_eq!(d.corporate_acb, dec!(850_000));
    }
}
