//! Passive-income grind on the small business deduction.
//!
//! The business limit shrinks by $5 for every $1 of adjusted aggregate
//! investment income (AAII) above $50,000, reaching zero at $150,000.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::tax_data::CorporateRates;
use crate::types::{round_cents, Money, Rate};

/// AAII below this amount does not reduce the business limit.
pub const AAII_THRESHOLD: Money = dec!(50_000);
/// Business-limit reduction per dollar of AAII over the threshold.
pub const GRIND_MULTIPLIER: Decimal = dec!(5);
/// Federal business limit.
pub const BUSINESS_LIMIT: Money = dec!(500_000);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrindAnalysis {
    pub aaii: Money,
    pub business_limit: Money,
    pub reduced_limit: Money,
    /// business_limit - reduced_limit
    pub sbd_reduction: Money,
    pub active_income: Money,
    /// Active income charged the rate differential: min(active, sbd_reduction).
    pub income_losing_sbd: Money,
    pub rate_differential: Rate,
    pub additional_tax: Money,
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// AAII: interest and foreign income plus the taxable portion of realized
/// capital gains. Canadian portfolio dividends are excluded (Part IV).
pub fn calculate_aaii(
    interest_and_foreign_income: Money,
    realized_capital_gain: Money,
    inclusion_rate: Rate,
) -> Money {
    (interest_and_foreign_income.max(Decimal::ZERO)
        + realized_capital_gain.max(Decimal::ZERO) * inclusion_rate)
        .max(Decimal::ZERO)
}

/// Reduced SBD limit against the federal $500,000 business limit.
pub fn calculate_reduced_sbd_limit(aaii: Money) -> Money {
    reduced_limit_for(aaii, BUSINESS_LIMIT)
}

/// Reduced SBD limit against an arbitrary business limit, floored at zero.
pub fn reduced_limit_for(aaii: Money, business_limit: Money) -> Money {
    let excess = (aaii - AAII_THRESHOLD).max(Decimal::ZERO);
    (business_limit - excess * GRIND_MULTIPLIER).max(Decimal::ZERO)
}

/// Extra corporate tax attributed to the grind on this year's active income:
/// `min(active, sbd_reduction) * (general - small)`.
pub fn analyze_passive_grind(
    active_income: Money,
    aaii: Money,
    rates: &CorporateRates,
) -> GrindAnalysis {
    let active = active_income.max(Decimal::ZERO);
    let reduced_limit = reduced_limit_for(aaii, rates.business_limit);
    let sbd_reduction = rates.business_limit - reduced_limit;
    let income_losing_sbd = active.min(sbd_reduction);
    let rate_differential = (rates.general_rate - rates.small_business_rate).max(Decimal::ZERO);

    GrindAnalysis {
        aaii,
        business_limit: rates.business_limit,
        reduced_limit,
        sbd_reduction,
        active_income: active,
        income_losing_sbd,
        rate_differential,
        additional_tax: round_cents(income_losing_sbd * rate_differential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax_data::get_tax_year_data;
    use crate::types::Province;

    fn ontario_rates() -> CorporateRates {
        get_tax_year_data(2026, dec!(0.02), Province::Ontario)
            .unwrap()
            .corporate
    }

    #[test]
    fn test_reduced_limit_grind_points() {
        assert_eq!(calculate_reduced_sbd_limit(dec!(50_000)), dec!(500_000));
        assert_eq!(calculate_reduced_sbd_limit(dec!(75_000)), dec!(375_000));
        assert_eq!(calculate_reduced_sbd_limit(dec!(150_000)), Decimal::ZERO);
    }

    #[test]
    fn test_reduced_limit_floors_at_zero() {
        assert_eq!(calculate_reduced_sbd_limit(dec!(1_000_000)), Decimal::ZERO);
        assert_eq!(calculate_reduced_sbd_limit(Decimal::ZERO), dec!(500_000));
    }

    #[test]
    fn test_reduced_limit_monotone() {
        let mut prev = calculate_reduced_sbd_limit(Decimal::ZERO);
        for step in 1..40 {
            let next = calculate_reduced_sbd_limit(Decimal::from(step * 5_000));
            assert!(next <= prev);
            prev = next;
        }
    }

    #[test]
    fn test_aaii_includes_half_of_gains() {
        assert_eq!(calculate_aaii(dec!(30_000), dec!(40_000), dec!(0.5)), dec!(50_000));
        assert_eq!(calculate_aaii(dec!(-5), dec!(-5), dec!(0.5)), Decimal::ZERO);
    }

    #[test]
    fn test_grind_full_active_income() {
        let rates = ontario_rates();
        // AAII 75k -> limit 375k; 125k of 600k active loses the SBD
        let g = analyze_passive_grind(dec!(600_000), dec!(75_000), &rates);
        assert_eq!(g.sbd_reduction, dec!(125_000));
        assert_eq!(g.income_losing_sbd, dec!(125_000));
        // 125,000 * (26.5% - 12.2%)
        assert_eq!(g.additional_tax, dec!(17_875));
    }

    #[test]
    fn test_grind_charged_on_active_income_below_reduced_limit() {
        let rates = ontario_rates();
        // 200k active is under the 375k reduced limit but still bears the
        // differential on the full 125k reduction
        let g = analyze_passive_grind(dec!(200_000), dec!(75_000), &rates);
        assert_eq!(g.sbd_reduction, dec!(125_000));
        assert_eq!(g.income_losing_sbd, dec!(125_000));
        assert_eq!(g.additional_tax, dec!(17_875));
    }

    #[test]
    fn test_grind_capped_by_active_income() {
        let rates = ontario_rates();
        let g = analyze_passive_grind(dec!(40_000), dec!(150_000), &rates);
        assert_eq!(g.sbd_reduction, dec!(500_000));
        assert_eq!(g.income_losing_sbd, dec!(40_000));
        // 40,000 * 14.3%
        assert_eq!(g.additional_tax, dec!(5_720));
    }

    #[test]
    fn test_no_grind_below_threshold() {
        let rates = ontario_rates();
        let g = analyze_passive_grind(dec!(400_000), dec!(40_000), &rates);
        assert_eq!(g.reduced_limit, dec!(500_000));
        assert_eq!(g.additional_tax, Decimal::ZERO);
    }
}
