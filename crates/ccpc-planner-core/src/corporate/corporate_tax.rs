use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::passive_grind::{analyze_passive_grind, GrindAnalysis};
use crate::error::PlannerError;
use crate::tax_data::{get_tax_year_data, CorporateRates};
use crate::time_value::safe_div;
use crate::types::{round_cents, with_metadata, ComputationOutput, Money, Province, Rate};
use crate::PlannerResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorporateTaxInput {
    pub year: i32,
    pub province: Province,
    #[serde(default)]
    pub inflation_rate: Rate,
    /// Active business income after salary and other deductions.
    pub active_income: Money,
    /// Adjusted aggregate investment income driving the SBD grind.
    #[serde(default)]
    pub aaii: Money,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorporateTaxResult {
    pub active_income: Money,
    pub small_business_income: Money,
    pub general_income: Money,
    pub small_business_tax: Money,
    pub general_tax: Money,
    /// Tax on active business income (small business + general).
    pub total_tax: Money,
    /// Passive-income grind on the business limit and its attributed cost.
    pub grind: GrindAnalysis,
    /// GRIP created by general-rate income this year.
    pub grip_addition: Money,
    pub effective_rate: Rate,
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Split active income between the (reduced) small business limit and the
/// general rate. Losses attract no tax.
pub fn calculate_corporate_tax(
    active_income: Money,
    aaii: Money,
    rates: &CorporateRates,
) -> CorporateTaxResult {
    let active = active_income.max(Decimal::ZERO);
    let grind = analyze_passive_grind(active, aaii, rates);

    let small_business_income = active.min(grind.reduced_limit);
    let general_income = active - small_business_income;
    let small_business_tax = round_cents(small_business_income * rates.small_business_rate);
    let general_tax = round_cents(general_income * rates.general_rate);
    let total_tax = small_business_tax + general_tax;

    CorporateTaxResult {
        active_income: active,
        small_business_income,
        general_income,
        small_business_tax,
        general_tax,
        total_tax,
        grind,
        grip_addition: round_cents(general_income * rates.grip_rate),
        effective_rate: safe_div(total_tax, active, Decimal::ZERO),
    }
}

/// Corporate tax on active income for a year/province, wrapped in the
/// standard output envelope.
pub fn calculate_corporate_income_tax(
    input: &CorporateTaxInput,
) -> PlannerResult<ComputationOutput<CorporateTaxResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.aaii < Decimal::ZERO {
        return Err(PlannerError::InvalidInput {
            field: "aaii".into(),
            reason: "must be >= 0".into(),
        });
    }
    if input.active_income < Decimal::ZERO {
        warnings.push("Active income is a loss; no corporate tax applies".into());
    }

    let data = get_tax_year_data(input.year, input.inflation_rate, input.province)?;
    let result = calculate_corporate_tax(input.active_income, input.aaii, &data.corporate);
    if result.grind.additional_tax > Decimal::ZERO {
        warnings.push(format!(
            "Passive income grind costs {} in additional tax",
            result.grind.additional_tax
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "CCPC active income tax: reduced SBD limit at small business rate, remainder at general rate",
        &serde_json::json!({
            "small_business_rate": data.corporate.small_business_rate.to_string(),
            "general_rate": data.corporate.general_rate.to_string(),
            "business_limit": data.corporate.business_limit.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rates() -> CorporateRates {
        get_tax_year_data(2026, dec!(0.02), Province::Ontario)
            .unwrap()
            .corporate
    }

    fn default_input() -> CorporateTaxInput {
        CorporateTaxInput {
            year: 2026,
            province: Province::Ontario,
            inflation_rate: dec!(0.02),
            active_income: dec!(300_000),
            aaii: Decimal::ZERO,
        }
    }

    #[test]
    fn test_all_income_at_small_business_rate() {
        let r = calculate_corporate_tax(dec!(300_000), Decimal::ZERO, &rates());
        assert_eq!(r.small_business_income, dec!(300_000));
        assert_eq!(r.general_income, Decimal::ZERO);
        // 300,000 * 12.2%
        assert_eq!(r.total_tax, dec!(36_600));
        assert_eq!(r.grip_addition, Decimal::ZERO);
    }

    #[test]
    fn test_income_above_limit_taxed_at_general_rate() {
        let r = calculate_corporate_tax(dec!(600_000), Decimal::ZERO, &rates());
        assert_eq!(r.general_income, dec!(100_000));
        // 500,000 * 12.2% + 100,000 * 26.5%
        assert_eq!(r.total_tax, dec!(61_000) + dec!(26_500));
        assert_eq!(r.grip_addition, dec!(72_000));
    }

    #[test]
    fn test_grind_moves_income_to_general_rate() {
        let r = calculate_corporate_tax(dec!(500_000), dec!(100_000), &rates());
        // limit 250,000
        assert_eq!(r.small_business_income, dec!(250_000));
        assert_eq!(r.general_income, dec!(250_000));
        let no_grind = calculate_corporate_tax(dec!(500_000), Decimal::ZERO, &rates());
        assert_eq!(r.total_tax - no_grind.total_tax, r.grind.additional_tax);
    }

    #[test]
    fn test_loss_attracts_no_tax() {
        let r = calculate_corporate_tax(dec!(-20_000), dec!(80_000), &rates());
        assert_eq!(r.total_tax, Decimal::ZERO);
        assert_eq!(r.effective_rate, Decimal::ZERO);
    }

    #[test]
    fn test_entry_point_warns_on_grind() {
        let input = CorporateTaxInput {
            aaii: dec!(90_000),
            active_income: dec!(450_000),
            ..default_input()
        };
        let out = calculate_corporate_income_tax(&input).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("grind")));
    }

    #[test]
    fn test_entry_point_rejects_negative_aaii() {
        let input = CorporateTaxInput {
            aaii: dec!(-1),
            ..default_input()
        };
        assert!(calculate_corporate_income_tax(&input).is_err());
    }
}
