//! Dividend depletion waterfall.
//!
//! Draws the dividends needed for a target after-tax amount from an ordered
//! list of funding sources:
//! - capital dividends out of the CDA
//! - eligible dividends refunding eRDTOH (limited by GRIP)
//! - non-eligible dividends refunding nRDTOH
//! - non-eligible dividends refunding leftover eRDTOH
//! - eligible dividends out of remaining GRIP, no refund
//! - optionally, non-eligible dividends out of retained earnings
//!
//! Each step is capped by the remaining need, the source's capacity and the
//! corporate cash not yet committed by earlier steps.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PlannerError;
use crate::investment::accounts::NotionalAccounts;
use crate::time_value::{gross_up_for_rate, safe_div};
use crate::types::{round_cents, with_metadata, ComputationOutput, Money, Rate};
use crate::PlannerResult;

/// Remaining need below half a cent counts as met.
const NEED_TOLERANCE: Money = dec!(0.005);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendClass {
    Capital,
    Eligible,
    NonEligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingSourceKind {
    CapitalDividendAccount,
    EligibleWithRefund,
    NonEligibleWithRefund,
    NonEligibleErdtohCascade,
    EligibleFromGrip,
    RetainedEarnings,
}

/// Priority order without retained earnings.
pub const NOTIONAL_ORDER: [FundingSourceKind; 5] = [
    FundingSourceKind::CapitalDividendAccount,
    FundingSourceKind::EligibleWithRefund,
    FundingSourceKind::NonEligibleWithRefund,
    FundingSourceKind::NonEligibleErdtohCascade,
    FundingSourceKind::EligibleFromGrip,
];

/// Tax rates the waterfall prices dividends with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallRates {
    pub rdtoh_refund_rate: Rate,
    /// Effective personal tax rate on eligible dividends.
    pub eligible_tax_rate: Rate,
    /// Effective personal tax rate on non-eligible dividends.
    pub non_eligible_tax_rate: Rate,
}

/// One capped transfer in the pipeline, priced against current balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingSource {
    pub kind: FundingSourceKind,
    pub class: DividendClass,
    /// Largest gross dividend the source supports.
    pub capacity: Money,
    pub refund_rate: Rate,
    pub effective_tax_rate: Rate,
}

impl FundingSource {
    pub fn for_kind(
        kind: FundingSourceKind,
        accounts: &NotionalAccounts,
        rates: &WaterfallRates,
    ) -> FundingSource {
        let r = rates.rdtoh_refund_rate;
        let refund_capacity = |pool: Money| safe_div(pool.max(Decimal::ZERO), r, Decimal::ZERO);
        let (class, capacity, refund_rate, effective_tax_rate) = match kind {
            FundingSourceKind::CapitalDividendAccount => {
                (DividendClass::Capital, accounts.cda, Decimal::ZERO, Decimal::ZERO)
            }
            FundingSourceKind::EligibleWithRefund => (
                DividendClass::Eligible,
                refund_capacity(accounts.erdtoh).min(accounts.grip),
                r,
                rates.eligible_tax_rate,
            ),
            FundingSourceKind::NonEligibleWithRefund => (
                DividendClass::NonEligible,
                refund_capacity(accounts.nrdtoh),
                r,
                rates.non_eligible_tax_rate,
            ),
            FundingSourceKind::NonEligibleErdtohCascade => (
                DividendClass::NonEligible,
                refund_capacity(accounts.erdtoh),
                r,
                rates.non_eligible_tax_rate,
            ),
            FundingSourceKind::EligibleFromGrip => (
                DividendClass::Eligible,
                accounts.grip,
                Decimal::ZERO,
                rates.eligible_tax_rate,
            ),
            FundingSourceKind::RetainedEarnings => (
                DividendClass::NonEligible,
                Decimal::MAX,
                Decimal::ZERO,
                rates.non_eligible_tax_rate,
            ),
        };
        FundingSource {
            kind,
            class,
            capacity: capacity.max(Decimal::ZERO),
            refund_rate,
            effective_tax_rate,
        }
    }

    /// Net cash cost to the corporation per dollar of gross dividend.
    pub fn cost_per_dollar(&self) -> Decimal {
        Decimal::ONE - self.refund_rate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendDraw {
    pub kind: FundingSourceKind,
    pub class: DividendClass,
    pub gross_dividend: Money,
    pub after_tax: Money,
    pub refund: Money,
    pub corporate_cost: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DividendFunding {
    pub capital_dividends: Money,
    pub eligible_dividends: Money,
    pub non_eligible_dividends: Money,
    /// Taxable dividends: eligible + non-eligible.
    pub regular_dividends: Money,
    /// All dividends paid, capital included.
    pub gross_dividends: Money,
    /// After-tax amount at the rates the waterfall was priced with.
    pub after_tax_income: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterfallResult {
    pub funding: DividendFunding,
    pub accounts: NotionalAccounts,
    pub rdtoh_refund: Money,
    pub erdtoh_refund: Money,
    pub nrdtoh_refund: Money,
    /// Net cash paid out of corporate investments.
    pub corporate_cash_used: Money,
    pub draws: Vec<DividendDraw>,
    /// After-tax need left unfunded.
    pub shortfall: Money,
}

/// Input for a standalone waterfall run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallInput {
    pub required_after_tax: Money,
    pub accounts: NotionalAccounts,
    pub rates: WaterfallRates,
    #[serde(default)]
    pub allow_retained_earnings: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Take a draw out of the pools that back it. Never pushes a pool below zero.
fn deplete(accounts: &mut NotionalAccounts, draw: &DividendDraw) {
    let take = |pool: Money, amount: Money| (pool - amount).max(Decimal::ZERO);
    match draw.kind {
        FundingSourceKind::CapitalDividendAccount => {
            accounts.cda = take(accounts.cda, draw.gross_dividend);
        }
        FundingSourceKind::EligibleWithRefund => {
            accounts.erdtoh = take(accounts.erdtoh, draw.refund);
            accounts.grip = take(accounts.grip, draw.gross_dividend);
        }
        FundingSourceKind::NonEligibleWithRefund => {
            accounts.nrdtoh = take(accounts.nrdtoh, draw.refund);
        }
        FundingSourceKind::NonEligibleErdtohCascade => {
            accounts.erdtoh = take(accounts.erdtoh, draw.refund);
        }
        FundingSourceKind::EligibleFromGrip => {
            accounts.grip = take(accounts.grip, draw.gross_dividend);
        }
        FundingSourceKind::RetainedEarnings => {}
    }
}

fn pool_for_refund(kind: FundingSourceKind, accounts: &NotionalAccounts) -> Money {
    match kind {
        FundingSourceKind::EligibleWithRefund | FundingSourceKind::NonEligibleErdtohCascade => {
            accounts.erdtoh
        }
        FundingSourceKind::NonEligibleWithRefund => accounts.nrdtoh,
        _ => Decimal::ZERO,
    }
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Run the pipeline over an explicit source order.
pub fn deplete_with_order(
    required_after_tax: Money,
    accounts: &NotionalAccounts,
    rates: &WaterfallRates,
    order: &[FundingSourceKind],
) -> WaterfallResult {
    let mut state = accounts.clone();
    let mut remaining = required_after_tax.max(Decimal::ZERO);
    let starting_cash = accounts.corporate_investments.max(Decimal::ZERO);
    let mut committed = Decimal::ZERO;
    let mut draws: Vec<DividendDraw> = Vec::new();

    for &kind in order {
        if remaining <= NEED_TOLERANCE {
            break;
        }
        let source = FundingSource::for_kind(kind, &state, rates);
        if source.capacity <= Decimal::ZERO || source.effective_tax_rate >= Decimal::ONE {
            continue;
        }

        let needed = gross_up_for_rate(remaining, source.effective_tax_rate);
        let cost = source.cost_per_dollar();
        let available_cash = (starting_cash - committed).max(Decimal::ZERO);
        let cash_limit = if cost > Decimal::ZERO {
            available_cash / cost
        } else {
            Decimal::MAX
        };

        let gross = round_cents(needed.min(source.capacity).min(cash_limit));
        // Rounding up to a cent must not break the capacity or cash limits.
        let gross = if gross > source.capacity.min(cash_limit) {
            gross - dec!(0.01)
        } else {
            gross
        };
        if gross <= Decimal::ZERO {
            continue;
        }

        let refund = round_cents(gross * source.refund_rate).min(pool_for_refund(kind, &state));
        let refund = if source.refund_rate.is_zero() {
            Decimal::ZERO
        } else {
            refund
        };
        let corporate_cost = (gross - refund).max(Decimal::ZERO);
        let after_tax = round_cents(gross * (Decimal::ONE - source.effective_tax_rate));

        let draw = DividendDraw {
            kind,
            class: source.class,
            gross_dividend: gross,
            after_tax,
            refund,
            corporate_cost,
        };
        deplete(&mut state, &draw);
        committed += corporate_cost;
        remaining -= after_tax;
        draws.push(draw);
    }

    let state = state.withdraw(committed);
    let mut funding = DividendFunding::default();
    let (mut erdtoh_refund, mut nrdtoh_refund) = (Decimal::ZERO, Decimal::ZERO);
    for d in &draws {
        match d.class {
            DividendClass::Capital => funding.capital_dividends += d.gross_dividend,
            DividendClass::Eligible => funding.eligible_dividends += d.gross_dividend,
            DividendClass::NonEligible => funding.non_eligible_dividends += d.gross_dividend,
        }
        funding.after_tax_income += d.after_tax;
        match d.kind {
            FundingSourceKind::NonEligibleWithRefund => nrdtoh_refund += d.refund,
            _ => erdtoh_refund += d.refund,
        }
    }
    funding.regular_dividends = funding.eligible_dividends + funding.non_eligible_dividends;
    funding.gross_dividends = funding.capital_dividends + funding.regular_dividends;

    WaterfallResult {
        funding,
        accounts: state,
        rdtoh_refund: erdtoh_refund + nrdtoh_refund,
        erdtoh_refund,
        nrdtoh_refund,
        corporate_cash_used: committed,
        draws,
        shortfall: round_cents(remaining).max(Decimal::ZERO),
    }
}

/// Fund `required_after_tax` from the notional accounts in priority order,
/// optionally falling back to retained earnings once they are exhausted.
pub fn deplete_accounts_with_rates(
    required_after_tax: Money,
    accounts: &NotionalAccounts,
    rates: &WaterfallRates,
    allow_retained_earnings: bool,
) -> WaterfallResult {
    let mut order = NOTIONAL_ORDER.to_vec();
    if allow_retained_earnings {
        order.push(FundingSourceKind::RetainedEarnings);
    }
    deplete_with_order(required_after_tax, accounts, rates, &order)
}

/// Standalone waterfall run wrapped in the standard output envelope.
pub fn calculate_dividend_waterfall(
    input: &WaterfallInput,
) -> PlannerResult<ComputationOutput<WaterfallResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    for (field, rate) in [
        ("rates.rdtoh_refund_rate", input.rates.rdtoh_refund_rate),
        ("rates.eligible_tax_rate", input.rates.eligible_tax_rate),
        ("rates.non_eligible_tax_rate", input.rates.non_eligible_tax_rate),
    ] {
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            return Err(PlannerError::InvalidInput {
                field: field.into(),
                reason: "must be in [0, 1)".into(),
            });
        }
    }
    let a = &input.accounts;
    if [a.cda, a.erdtoh, a.nrdtoh, a.grip].iter().any(|v| *v < Decimal::ZERO) {
        return Err(PlannerError::InvalidInput {
            field: "accounts".into(),
            reason: "notional account balances must be >= 0".into(),
        });
    }

    let result = deplete_accounts_with_rates(
        input.required_after_tax,
        &input.accounts,
        &input.rates,
        input.allow_retained_earnings,
    );
    if result.shortfall > Decimal::ZERO {
        warnings.push(format!(
            "Accounts and cash could not fund {} of the after-tax requirement",
            result.shortfall
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Dividend depletion waterfall: CDA, eRDTOH/GRIP, nRDTOH, eRDTOH cascade, GRIP, retained earnings",
        &serde_json::json!({
            "required_after_tax": input.required_after_tax.to_string(),
            "allow_retained_earnings": input.allow_retained_earnings,
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> WaterfallRates {
        WaterfallRates {
            rdtoh_refund_rate: dec!(0.3833),
            eligible_tax_rate: dec!(0.25),
            non_eligible_tax_rate: dec!(0.30),
        }
    }

    fn accounts() -> NotionalAccounts {
        NotionalAccounts {
            cda: dec!(10_000),
            erdtoh: dec!(20_000),
            nrdtoh: Decimal::ZERO,
            grip: dec!(100_000),
            corporate_investments: dec!(1_000_000),
            corporate_acb: dec!(1_000_000),
        }
    }

    #[test]
    fn test_capital_dividends_first() {
        let a = NotionalAccounts {
            cda: dec!(50_000),
            ..accounts()
        };
        let r = deplete_accounts_with_rates(dec!(30_000), &a, &rates(), false);
        assert_eq!(r.funding.capital_dividends, dec!(30_000));
        assert_eq!(r.funding.regular_dividends, Decimal::ZERO);
        assert_eq!(r.accounts.cda, dec!(20_000));
        assert_eq!(r.accounts.corporate_investments, dec!(970_000));
        assert_eq!(r.draws.len(), 1);
        assert_eq!(r.shortfall, Decimal::ZERO);
    }

    #[test]
    fn test_eligible_refund_limited_by_erdtoh_then_grip() {
        let r = deplete_accounts_with_rates(dec!(50_000), &accounts(), &rates(), false);
        assert_eq!(r.funding.capital_dividends, dec!(10_000));
        assert_eq!(r.draws[0].kind, FundingSourceKind::CapitalDividendAccount);
        assert_eq!(r.draws[1].kind, FundingSourceKind::EligibleWithRefund);
        // 20,000 / 38.33% = 52,178.45
        assert_eq!(r.draws[1].gross_dividend, dec!(52_178.45));
        assert_eq!(r.erdtoh_refund, dec!(20_000));
        assert_eq!(r.accounts.erdtoh, Decimal::ZERO);
        assert_eq!(r.draws[2].kind, FundingSourceKind::EligibleFromGrip);
        assert_eq!(r.shortfall, Decimal::ZERO);
        assert!((r.funding.after_tax_income - dec!(50_000)).abs() <= dec!(0.01));
    }

    #[test]
    fn test_refund_never_exceeds_pool() {
        let a = NotionalAccounts {
            nrdtoh: dec!(7_500),
            ..accounts()
        };
        let r = deplete_accounts_with_rates(dec!(500_000), &a, &rates(), true);
        assert!(r.erdtoh_refund <= a.erdtoh);
        assert!(r.nrdtoh_refund <= a.nrdtoh);
        assert!(r.accounts.erdtoh >= Decimal::ZERO);
        assert!(r.accounts.nrdtoh >= Decimal::ZERO);
    }

    #[test]
    fn test_cash_limit_keeps_investments_non_negative() {
        let a = NotionalAccounts {
            cda: Decimal::ZERO,
            erdtoh: Decimal::ZERO,
            nrdtoh: dec!(100_000),
            grip: Decimal::ZERO,
            corporate_investments: dec!(20_000),
            corporate_acb: dec!(20_000),
        };
        let r = deplete_accounts_with_rates(dec!(100_000), &a, &rates(), true);
        assert!(r.accounts.corporate_investments >= Decimal::ZERO);
        assert!(r.corporate_cash_used <= dec!(20_000));
        assert!(r.shortfall > Decimal::ZERO);
    }

    #[test]
    fn test_erdtoh_cascade_on_non_eligible() {
        let a = NotionalAccounts {
            cda: Decimal::ZERO,
            erdtoh: dec!(10_000),
            nrdtoh: Decimal::ZERO,
            grip: Decimal::ZERO,
            ..accounts()
        };
        let r = deplete_accounts_with_rates(dec!(10_000), &a, &rates(), false);
        assert_eq!(r.draws.len(), 1);
        assert_eq!(r.draws[0].kind, FundingSourceKind::NonEligibleErdtohCascade);
        assert_eq!(r.funding.eligible_dividends, Decimal::ZERO);
        assert!(r.erdtoh_refund > Decimal::ZERO);
    }

    #[test]
    fn test_retained_earnings_only_when_enabled() {
        let a = NotionalAccounts {
            cda: Decimal::ZERO,
            erdtoh: Decimal::ZERO,
            grip: Decimal::ZERO,
            ..accounts()
        };
        let off = deplete_accounts_with_rates(dec!(35_000), &a, &rates(), false);
        assert_eq!(off.funding.gross_dividends, Decimal::ZERO);
        assert_eq!(off.shortfall, dec!(35_000));

        let on = deplete_accounts_with_rates(dec!(35_000), &a, &rates(), true);
        // 35,000 / (1 - 30%)
        assert_eq!(on.funding.non_eligible_dividends, dec!(50_000));
        assert_eq!(on.rdtoh_refund, Decimal::ZERO);
        assert_eq!(on.shortfall, Decimal::ZERO);
    }

    #[test]
    fn test_zero_requirement_draws_nothing() {
        let r = deplete_accounts_with_rates(Decimal::ZERO, &accounts(), &rates(), true);
        assert!(r.draws.is_empty());
        assert_eq!(r.accounts, accounts());
    }

    #[test]
    fn test_full_tax_rate_source_skipped() {
        let mut rt = rates();
        rt.eligible_tax_rate = Decimal::ONE;
        let a = NotionalAccounts {
            cda: Decimal::ZERO,
            ..accounts()
        };
        let r = deplete_accounts_with_rates(dec!(10_000), &a, &rt, false);
        assert!(r
            .draws
            .iter()
            .all(|d| d.class != DividendClass::Eligible));
    }

    #[test]
    fn test_zero_refund_rate_guarded() {
        let mut rt = rates();
        rt.rdtoh_refund_rate = Decimal::ZERO;
        let r = deplete_accounts_with_rates(dec!(40_000), &accounts(), &rt, false);
        assert_eq!(r.rdtoh_refund, Decimal::ZERO);
        // CDA then GRIP without refund
        assert_eq!(r.draws[1].kind, FundingSourceKind::EligibleFromGrip);
    }

    #[test]
    fn test_custom_order_respected() {
        let order = [
            FundingSourceKind::EligibleFromGrip,
            FundingSourceKind::CapitalDividendAccount,
        ];
        let r = deplete_with_order(dec!(15_000), &accounts(), &rates(), &order);
        assert_eq!(r.draws[0].kind, FundingSourceKind::EligibleFromGrip);
        assert_eq!(r.funding.capital_dividends, Decimal::ZERO);
    }

    #[test]
    fn test_entry_point_rejects_bad_rate() {
        let input = WaterfallInput {
            required_after_tax: dec!(10_000),
            accounts: accounts(),
            rates: WaterfallRates {
                eligible_tax_rate: dec!(1.2),
                ..rates()
            },
            allow_retained_earnings: false,
        };
        assert!(calculate_dividend_waterfall(&input).is_err());
    }
}
