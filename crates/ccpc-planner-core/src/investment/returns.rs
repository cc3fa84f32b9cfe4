use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::tax_data::CorporateRates;
use crate::types::{round_cents, Money, Rate};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Portfolio weights in percent (0-100). Must sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub canadian_equity: Decimal,
    pub us_equity: Decimal,
    pub international_equity: Decimal,
    pub fixed_income: Decimal,
}

impl Default for AssetAllocation {
    fn default() -> Self {
        Self {
            canadian_equity: dec!(25),
            us_equity: dec!(25),
            international_equity: dec!(25),
            fixed_income: dec!(25),
        }
    }
}

impl AssetAllocation {
    pub fn total(&self) -> Decimal {
        self.canadian_equity + self.us_equity + self.international_equity + self.fixed_income
    }

    pub fn is_valid(&self) -> bool {
        self.total() == dec!(100)
            && [
                self.canadian_equity,
                self.us_equity,
                self.international_equity,
                self.fixed_income,
            ]
            .iter()
            .all(|w| *w >= Decimal::ZERO)
    }
}

/// Expected annual return: one rate for the whole portfolio or one per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReturnAssumption {
    Blended {
        rate: Rate,
    },
    PerClass {
        canadian_equity: Rate,
        us_equity: Rate,
        international_equity: Rate,
        fixed_income: Rate,
    },
}

impl Default for ReturnAssumption {
    fn default() -> Self {
        ReturnAssumption::Blended { rate: dec!(0.05) }
    }
}

impl ReturnAssumption {
    /// Allocation-weighted portfolio return.
    pub fn portfolio_rate(&self, allocation: &AssetAllocation) -> Rate {
        match self {
            ReturnAssumption::Blended { rate } => *rate,
            ReturnAssumption::PerClass { .. } => {
                let r = self.class_rates();
                (allocation.canadian_equity * r[0]
                    + allocation.us_equity * r[1]
                    + allocation.international_equity * r[2]
                    + allocation.fixed_income * r[3])
                    / dec!(100)
            }
        }
    }

    fn class_rates(&self) -> [Rate; 4] {
        match *self {
            ReturnAssumption::Blended { rate } => [rate; 4],
            ReturnAssumption::PerClass {
                canadian_equity,
                us_equity,
                international_equity,
                fixed_income,
            } => [canadian_equity, us_equity, international_equity, fixed_income],
        }
    }
}

/// Empirical income characteristics of one asset class.
#[derive(Debug, Clone, Copy)]
struct ClassYield {
    canadian_dividend_yield: Rate,
    foreign_dividend_yield: Rate,
    /// Whole class return is paid as interest.
    pays_interest: bool,
    /// Turnover-driven realized gain, as a fraction of the balance.
    realized_gain_rate: Rate,
}

const CANADIAN_EQUITY: ClassYield = ClassYield {
    canadian_dividend_yield: dec!(0.03),
    foreign_dividend_yield: dec!(0),
    pays_interest: false,
    realized_gain_rate: dec!(0.003),
};

const US_EQUITY: ClassYield = ClassYield {
    canadian_dividend_yield: dec!(0),
    foreign_dividend_yield: dec!(0.015),
    pays_interest: false,
    realized_gain_rate: dec!(0.004),
};

const INTERNATIONAL_EQUITY: ClassYield = ClassYield {
    canadian_dividend_yield: dec!(0),
    foreign_dividend_yield: dec!(0.03),
    pays_interest: false,
    realized_gain_rate: dec!(0.004),
};

const FIXED_INCOME: ClassYield = ClassYield {
    canadian_dividend_yield: dec!(0),
    foreign_dividend_yield: dec!(0),
    pays_interest: true,
    realized_gain_rate: dec!(0),
};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One year of portfolio return, split by tax character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestmentReturns {
    pub total_return: Money,
    pub canadian_dividends: Money,
    /// Foreign dividends plus interest.
    pub foreign_income: Money,
    pub foreign_dividends: Money,
    pub interest_income: Money,
    pub realized_capital_gain: Money,
    pub unrealized_capital_gain: Money,
    pub taxable_capital_gain: Money,
    pub cda_increase: Money,
    pub nrdtoh_increase: Money,
    pub erdtoh_increase: Money,
    pub grip_increase: Money,
}

impl InvestmentReturns {
    /// Income taxed at the passive rate: foreign income plus taxable gains.
    pub fn taxable_investment_income(&self) -> Money {
        self.foreign_income + self.taxable_capital_gain
    }
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Decompose one year of expected return on `balance`.
///
/// Income yields and realized gains come from per-class empirical rates on
/// the allocation-weighted balance; realized gains are turnover-based and do
/// not depend on the assumed return. Whatever return is left after income
/// and realized gains is unrealized appreciation (never negative).
pub fn decompose_returns(
    balance: Money,
    allocation: &AssetAllocation,
    assumption: &ReturnAssumption,
    rates: &CorporateRates,
) -> InvestmentReturns {
    if balance <= Decimal::ZERO {
        return InvestmentReturns::default();
    }

    let weights = [
        allocation.canadian_equity,
        allocation.us_equity,
        allocation.international_equity,
        allocation.fixed_income,
    ];
    let classes = [CANADIAN_EQUITY, US_EQUITY, INTERNATIONAL_EQUITY, FIXED_INCOME];
    let class_rates = assumption.class_rates();

    let mut total_return = Decimal::ZERO;
    let mut canadian_dividends = Decimal::ZERO;
    let mut foreign_dividends = Decimal::ZERO;
    let mut interest_income = Decimal::ZERO;
    let mut realized = Decimal::ZERO;

    for ((&weight, class), &rate) in weights.iter().zip(classes.iter()).zip(class_rates.iter()) {
        let class_balance = balance * weight.max(Decimal::ZERO) / dec!(100);
        total_return += class_balance * rate;
        canadian_dividends += class_balance * class.canadian_dividend_yield;
        foreign_dividends += class_balance * class.foreign_dividend_yield;
        if class.pays_interest {
            interest_income += (class_balance * rate).max(Decimal::ZERO);
        }
        realized += class_balance * class.realized_gain_rate;
    }

    let canadian_dividends = round_cents(canadian_dividends);
    let foreign_dividends = round_cents(foreign_dividends);
    let interest_income = round_cents(interest_income);
    let foreign_income = foreign_dividends + interest_income;
    let realized_capital_gain = round_cents(realized);
    let total_return = round_cents(total_return);

    let unrealized_capital_gain = (total_return
        - canadian_dividends
        - foreign_income
        - realized_capital_gain)
        .max(Decimal::ZERO);

    let taxable_capital_gain = round_cents(realized_capital_gain * rates.capital_gains_inclusion);
    let cda_increase = realized_capital_gain - taxable_capital_gain;
    let erdtoh_increase = round_cents(canadian_dividends * rates.part_iv_rate);
    let nrdtoh_increase = round_cents(
        (foreign_income + taxable_capital_gain) * rates.refundable_investment_rate
            - foreign_dividends * rates.foreign_withholding_rate,
    )
    .max(Decimal::ZERO);

    InvestmentReturns {
        total_return,
        canadian_dividends,
        foreign_income,
        foreign_dividends,
        interest_income,
        realized_capital_gain,
        unrealized_capital_gain,
        taxable_capital_gain,
        cda_increase,
        nrdtoh_increase,
        erdtoh_increase,
        grip_increase: canadian_dividends,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax_data::get_tax_year_data;
    use crate::types::Province;

    fn rates() -> CorporateRates {
        get_tax_year_data(2026, dec!(0.02), Province::Ontario)
            .unwrap()
            .corporate
    }

    fn decompose(balance: Money, assumption: ReturnAssumption) -> InvestmentReturns {
        decompose_returns(balance, &AssetAllocation::default(), &assumption, &rates())
    }

    #[test]
    fn test_balanced_portfolio_decomposition() {
        let r = decompose(dec!(1_000_000), ReturnAssumption::Blended { rate: dec!(0.06) });
        assert_eq!(r.total_return, dec!(60_000));
        assert_eq!(r.canadian_dividends, dec!(7_500));
        // US 3,750 + international 7,500
        assert_eq!(r.foreign_dividends, dec!(11_250));
        assert_eq!(r.interest_income, dec!(15_000));
        assert_eq!(r.foreign_income, dec!(26_250));
        // 250k * 0.3% + 2 * 250k * 0.4%
        assert_eq!(r.realized_capital_gain, dec!(2_750));
        assert_eq!(r.unrealized_capital_gain, dec!(23_500));
        assert_eq!(r.cda_increase, dec!(1_375));
        assert_eq!(r.erdtoh_increase, dec!(2_874.75));
        // 27,625 * 30.67% - 15% * 11,250
        assert_eq!(r.nrdtoh_increase, dec!(6_785.09));
        assert_eq!(r.grip_increase, r.canadian_dividends);
    }

    #[test]
    fn test_zero_balance_all_zero() {
        let r = decompose(Decimal::ZERO, ReturnAssumption::default());
        assert_eq!(r, InvestmentReturns::default());
        let r = decompose(dec!(-100), ReturnAssumption::default());
        assert_eq!(r, InvestmentReturns::default());
    }

    #[test]
    fn test_realized_gain_independent_of_return() {
        let low = decompose(dec!(500_000), ReturnAssumption::Blended { rate: dec!(0.02) });
        let high = decompose(dec!(500_000), ReturnAssumption::Blended { rate: dec!(0.09) });
        assert_eq!(low.realized_capital_gain, high.realized_capital_gain);
        assert!(high.unrealized_capital_gain > low.unrealized_capital_gain);
    }

    #[test]
    fn test_unrealized_floored_at_zero() {
        let r = decompose(dec!(500_000), ReturnAssumption::Blended { rate: dec!(0.01) });
        assert_eq!(r.unrealized_capital_gain, Decimal::ZERO);
    }

    #[test]
    fn test_per_class_returns() {
        let assumption = ReturnAssumption::PerClass {
            canadian_equity: dec!(0.07),
            us_equity: dec!(0.08),
            international_equity: dec!(0.06),
            fixed_income: dec!(0.03),
        };
        let allocation = AssetAllocation::default();
        assert_eq!(assumption.portfolio_rate(&allocation), dec!(0.06));
        let r = decompose(dec!(400_000), assumption);
        assert_eq!(r.total_return, dec!(24_000));
        // fixed income 100k * 3%
        assert_eq!(r.interest_income, dec!(3_000));
    }

    #[test]
    fn test_all_fixed_income_has_no_gains_or_dividends() {
        let allocation = AssetAllocation {
            canadian_equity: Decimal::ZERO,
            us_equity: Decimal::ZERO,
            international_equity: Decimal::ZERO,
            fixed_income: dec!(100),
        };
        let r = decompose_returns(
            dec!(200_000),
            &allocation,
            &ReturnAssumption::Blended { rate: dec!(0.04) },
            &rates(),
        );
        assert_eq!(r.interest_income, dec!(8_000));
        assert_eq!(r.realized_capital_gain, Decimal::ZERO);
        assert_eq!(r.cda_increase, Decimal::ZERO);
        assert_eq!(r.erdtoh_increase, Decimal::ZERO);
        // 8,000 * 30.67%
        assert_eq!(r.nrdtoh_increase, dec!(2_453.60));
    }

    #[test]
    fn test_allocation_validity() {
        assert!(AssetAllocation::default().is_valid());
        let bad = AssetAllocation {
            fixed_income: dec!(30),
            ..Default::default()
        };
        assert!(!bad.is_valid());
    }
}
