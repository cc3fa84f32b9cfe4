use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PlannerError;
use crate::projection::solver::{fixed_point, SolverOutcome};
use crate::tax_data::{get_tax_year_data, RetirementParameters};
use crate::types::{round_cents, with_metadata, ComputationOutput, Money, Rate};
use crate::PlannerResult;

pub const OAS_STANDARD_AGE: u32 = 65;
pub const OAS_LATEST_AGE: u32 = 70;
/// Age from which the 10% increase applies.
pub const OAS_SUPPLEMENT_AGE: u32 = 75;

const DEFERRAL_BONUS_PER_MONTH: Rate = dec!(0.006);
const AGE_75_SUPPLEMENT: Rate = dec!(0.10);
const CLAWBACK_RATE: Rate = dec!(0.15);
const CLAWBACK_TOLERANCE: Money = dec!(0.01);
const CLAWBACK_MAX_ITERATIONS: u32 = 50;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OasResult {
    pub age: u32,
    pub start_age: u32,
    pub deferral_factor: Decimal,
    pub gross_annual: Money,
    pub clawback: Money,
    pub net_annual: Money,
    pub clawback_threshold: Money,
    pub iterations: u32,
    pub converged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OasInput {
    pub year: i32,
    #[serde(default)]
    pub inflation_rate: Rate,
    pub age: u32,
    #[serde(default = "default_start_age")]
    pub oas_start_age: u32,
    /// Other net income for the year (salary, dividends grossed-up, CPP, RRIF).
    #[serde(default)]
    pub other_income: Money,
}

fn default_start_age() -> u32 {
    OAS_STANDARD_AGE
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Deferral bonus: 0.6% per month past 65, at most 36% at 70.
pub fn oas_deferral_factor(start_age: u32) -> Decimal {
    let age = start_age.clamp(OAS_STANDARD_AGE, OAS_LATEST_AGE);
    Decimal::ONE + DEFERRAL_BONUS_PER_MONTH * Decimal::from((age - OAS_STANDARD_AGE) * 12)
}

/// Gross annual OAS at `age` for a pension started at `start_age`. Zero
/// before the pension starts.
pub fn gross_oas(age: u32, start_age: u32, params: &RetirementParameters) -> Money {
    let start = start_age.clamp(OAS_STANDARD_AGE, OAS_LATEST_AGE);
    if age < start {
        return Decimal::ZERO;
    }
    let mut annual = params.oas_max_monthly * dec!(12) * oas_deferral_factor(start);
    if age >= OAS_SUPPLEMENT_AGE {
        annual *= Decimal::ONE + AGE_75_SUPPLEMENT;
    }
    round_cents(annual)
}

/// Self-consistent recovery tax: 15% of income above the threshold, where
/// income counts OAS net of the recovery itself. Capped at gross OAS.
pub fn solve_oas_clawback(gross: Money, other_income: Money, threshold: Money) -> SolverOutcome {
    if gross <= Decimal::ZERO {
        return SolverOutcome {
            value: Decimal::ZERO,
            iterations: 0,
            converged: true,
            last_delta: Decimal::ZERO,
        };
    }
    fixed_point(
        Decimal::ZERO,
        CLAWBACK_TOLERANCE,
        CLAWBACK_MAX_ITERATIONS,
        |clawback| {
            let income = other_income + gross - clawback;
            ((income - threshold).max(Decimal::ZERO) * CLAWBACK_RATE).min(gross)
        },
    )
}

/// OAS for one year: gross, clawback and net.
pub fn project_oas(
    age: u32,
    start_age: u32,
    other_income: Money,
    params: &RetirementParameters,
) -> OasResult {
    let gross = gross_oas(age, start_age, params);
    let outcome = solve_oas_clawback(gross, other_income, params.oas_clawback_threshold);
    let clawback = round_cents(outcome.value);
    OasResult {
        age,
        start_age,
        deferral_factor: oas_deferral_factor(start_age),
        gross_annual: gross,
        clawback,
        net_annual: gross - clawback,
        clawback_threshold: params.oas_clawback_threshold,
        iterations: outcome.iterations,
        converged: outcome.converged,
    }
}

/// Standalone OAS estimate, wrapped in the standard output envelope.
pub fn calculate_oas(input: &OasInput) -> PlannerResult<ComputationOutput<OasResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.other_income < Decimal::ZERO {
        return Err(PlannerError::InvalidInput {
            field: "other_income".into(),
            reason: "must be >= 0".into(),
        });
    }

    let data = get_tax_year_data(input.year, input.inflation_rate, Default::default())?;
    let result = project_oas(
        input.age,
        input.oas_start_age,
        input.other_income,
        &data.retirement,
    );
    if result.gross_annual > Decimal::ZERO && result.net_annual.is_zero() {
        warnings.push("OAS fully clawed back".into());
    }
    if !result.converged {
        warnings.push(format!(
            "OAS clawback did not converge after {} iterations",
            result.iterations
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "OAS: indexed maximum, 0.6%/month deferral, +10% from 75, self-consistent 15% recovery tax",
        &serde_json::json!({
            "oas_max_monthly": data.retirement.oas_max_monthly.to_string(),
            "clawback_threshold": data.retirement.oas_clawback_threshold.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Province;

    fn params() -> RetirementParameters {
        get_tax_year_data(2026, dec!(0.02), Province::Ontario)
            .unwrap()
            .retirement
    }

    #[test]
    fn test_deferral_factor() {
        assert_eq!(oas_deferral_factor(65), Decimal::ONE);
        assert_eq!(oas_deferral_factor(70), dec!(1.36));
        assert_eq!(oas_deferral_factor(72), dec!(1.36));
        assert_eq!(oas_deferral_factor(60), Decimal::ONE);
    }

    #[test]
    fn test_gross_oas_ages() {
        let p = params();
        assert_eq!(gross_oas(64, 65, &p), Decimal::ZERO);
        // 742.31 * 12
        assert_eq!(gross_oas(65, 65, &p), dec!(8_907.72));
        assert_eq!(gross_oas(75, 65, &p), round_cents(dec!(8_907.72) * dec!(1.1)));
        assert_eq!(gross_oas(68, 70, &p), Decimal::ZERO);
        assert_eq!(gross_oas(70, 70, &p), round_cents(dec!(8_907.72) * dec!(1.36)));
    }

    #[test]
    fn test_no_clawback_below_threshold() {
        let r = project_oas(66, 65, dec!(50_000), &params());
        assert_eq!(r.clawback, Decimal::ZERO);
        assert_eq!(r.net_annual, r.gross_annual);
    }

    #[test]
    fn test_clawback_self_consistent() {
        let p = params();
        let r = project_oas(66, 65, dec!(110_000), &p);
        assert!(r.converged);
        // c = 0.15 * (other + gross - c - T)  =>  c = 0.15 * (other + gross - T) / 1.15
        let closed = dec!(0.15) * (dec!(110_000) + r.gross_annual - p.oas_clawback_threshold)
            / dec!(1.15);
        assert!((r.clawback - closed).abs() <= dec!(0.02), "{} vs {}", r.clawback, closed);
    }

    #[test]
    fn test_clawback_capped_at_gross() {
        let r = project_oas(66, 65, dec!(400_000), &params());
        assert_eq!(r.clawback, r.gross_annual);
        assert_eq!(r.net_annual, Decimal::ZERO);
    }

    #[test]
    fn test_entry_point_warns_full_clawback() {
        let input = OasInput {
            year: 2026,
            inflation_rate: dec!(0.02),
            age: 67,
            oas_start_age: 65,
            other_income: dec!(300_000),
        };
        let out = calculate_oas(&input).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("fully clawed back")));
    }
}
