use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PlannerError;
use crate::tax_data::{get_tax_year_data, RetirementParameters};
use crate::time_value::{annuity_due_factor, discount_factor};
use crate::types::{round_cents, with_metadata, ComputationOutput, Money, Rate};
use crate::PlannerResult;

/// Defined-benefit accrual per year of service.
const ACCRUAL_RATE: Rate = dec!(0.02);
const PA_MULTIPLIER: Decimal = dec!(9);
const PA_OFFSET: Money = dec!(600);
const RRSP_EARNED_INCOME_RATE: Rate = dec!(0.18);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Actuarial assumptions for the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IppAssumptions {
    /// Valuation interest rate (prescribed 7.5% for IPPs).
    pub discount_rate: Rate,
    /// Years the pension is assumed to be paid from retirement.
    pub payout_years: u32,
    pub retirement_age: u32,
}

impl Default for IppAssumptions {
    fn default() -> Self {
        Self {
            discount_rate: dec!(0.075),
            payout_years: 20,
            retirement_age: 65,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IppInput {
    pub year: i32,
    #[serde(default)]
    pub inflation_rate: Rate,
    pub age: u32,
    pub salary: Money,
    #[serde(default)]
    pub assumptions: IppAssumptions,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IppContribution {
    /// Annual pension earned by this year of service.
    pub benefit_accrual: Money,
    pub db_limit: Money,
    /// Present value of the accrual: the year's deductible contribution.
    pub current_service_cost: Money,
    pub pension_adjustment: Money,
    /// min(18% of salary, RRSP limit)
    pub rrsp_room_without_ipp: Money,
    /// RRSP room left after the pension adjustment.
    pub rrsp_room_with_ipp: Money,
    /// Extra tax-deferred saving the IPP allows over an RRSP alone.
    pub ipp_advantage: Money,
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Pension adjustment for a defined-benefit accrual.
pub fn pension_adjustment(benefit_accrual: Money) -> Money {
    (PA_MULTIPLIER * benefit_accrual - PA_OFFSET).max(Decimal::ZERO)
}

/// RRSP room earned on `salary`.
pub fn rrsp_room_earned(salary: Money, rrsp_limit: Money) -> Money {
    round_cents((salary.max(Decimal::ZERO) * RRSP_EARNED_INCOME_RATE).min(rrsp_limit))
}

/// One year of IPP funding.
///
/// The accrual is 2% of salary capped at the defined-benefit limit; its cost
/// is the value of that pension as an annuity-due over `payout_years`,
/// discounted back from retirement. Cost rises as retirement approaches.
/// No accrual at or after retirement age.
pub fn calculate_ipp_contribution(
    salary: Money,
    age: u32,
    assumptions: &IppAssumptions,
    limits: &RetirementParameters,
) -> IppContribution {
    let rrsp_room_without_ipp = rrsp_room_earned(salary, limits.rrsp_limit);
    if salary <= Decimal::ZERO || age >= assumptions.retirement_age {
        return IppContribution {
            db_limit: limits.db_pension_limit,
            rrsp_room_without_ipp,
            rrsp_room_with_ipp: rrsp_room_without_ipp,
            ..Default::default()
        };
    }

    let benefit_accrual = round_cents((salary * ACCRUAL_RATE).min(limits.db_pension_limit));
    let years_to_retirement = assumptions.retirement_age - age;
    let current_service_cost = round_cents(
        benefit_accrual
            * annuity_due_factor(assumptions.discount_rate, assumptions.payout_years)
            * discount_factor(assumptions.discount_rate, years_to_retirement),
    );
    let pension_adjustment = pension_adjustment(benefit_accrual);
    let rrsp_room_with_ipp = (rrsp_room_without_ipp - pension_adjustment).max(Decimal::ZERO);

    IppContribution {
        benefit_accrual,
        db_limit: limits.db_pension_limit,
        current_service_cost,
        pension_adjustment,
        rrsp_room_without_ipp,
        rrsp_room_with_ipp,
        ipp_advantage: current_service_cost + rrsp_room_with_ipp - rrsp_room_without_ipp,
    }
}

/// Standalone IPP calculation, wrapped in the standard output envelope.
pub fn calculate_ipp(input: &IppInput) -> PlannerResult<ComputationOutput<IppContribution>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.salary < Decimal::ZERO {
        return Err(PlannerError::InvalidInput {
            field: "salary".into(),
            reason: "must be >= 0".into(),
        });
    }
    if input.assumptions.discount_rate <= dec!(-1) {
        return Err(PlannerError::InvalidInput {
            field: "assumptions.discount_rate".into(),
            reason: "must be greater than -100%".into(),
        });
    }

    let data = get_tax_year_data(input.year, input.inflation_rate, Default::default())?;
    let result = calculate_ipp_contribution(
        input.salary,
        input.age,
        &input.assumptions,
        &data.retirement,
    );
    if result.ipp_advantage < Decimal::ZERO {
        warnings.push("IPP contribution is smaller than the RRSP room it displaces".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "IPP current-service cost: 2% accrual capped at DB limit, annuity-due value discounted to today; PA = 9 x accrual - 600",
        &serde_json::json!({
            "db_limit": data.retirement.db_pension_limit.to_string(),
            "discount_rate": input.assumptions.discount_rate.to_string(),
            "payout_years": input.assumptions.payout_years,
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

    fn limits() -> RetirementParameters {
        get_tax_year_data(2026, dec!(0.02), Province::Ontario)
            .unwrap()
            .retirement
    }

    #[test]
    fn test_accrual_capped_at_db_limit() {
        let l = limits();
        let c = calculate_ipp_contribution(dec!(250_000), 50, &IppAssumptions::default(), &l);
        // 33,810 / 9
        assert_eq!(c.db_limit, dec!(3_756.67));
        assert_eq!(c.benefit_accrual, dec!(3_756.67));
        // 9 * 3,756.67 - 600
        assert_eq!(c.pension_adjustment, dec!(33_210.03));
        assert_eq!(c.rrsp_room_without_ipp, dec!(33_810));
        assert_eq!(c.rrsp_room_with_ipp, dec!(599.97));
    }

    #[test]
    fn test_accrual_below_cap() {
        let c = calculate_ipp_contribution(
            dec!(100_000),
            50,
            &IppAssumptions::default(),
            &limits(),
        );
        assert_eq!(c.benefit_accrual, dec!(2_000));
        assert_eq!(c.pension_adjustment, dec!(17_400));
        // 18% of 100,000 = 18,000 room
        assert_eq!(c.rrsp_room_with_ipp, dec!(600));
    }

    #[test]
    fn test_cost_rises_toward_retirement() {
        let l = limits();
        let a = IppAssumptions::default();
        let at_40 = calculate_ipp_contribution(dec!(200_000), 40, &a, &l);
        let at_60 = calculate_ipp_contribution(dec!(200_000), 60, &a, &l);
        let at_64 = calculate_ipp_contribution(dec!(200_000), 64, &a, &l);
        assert!(at_60.current_service_cost > at_40.current_service_cost);
        assert!(at_64.current_service_cost > at_60.current_service_cost);
        assert!(at_64.ipp_advantage > at_40.ipp_advantage);
    }

    #[test]
    fn test_no_accrual_after_retirement() {
        let c = calculate_ipp_contribution(
            dec!(200_000),
            65,
            &IppAssumptions::default(),
            &limits(),
        );
        assert_eq!(c.current_service_cost, Decimal::ZERO);
        assert_eq!(c.pension_adjustment, Decimal::ZERO);
        assert_eq!(c.rrsp_room_with_ipp, c.rrsp_room_without_ipp);
    }

    #[test]
    fn test_small_accrual_no_pa() {
        assert_eq!(pension_adjustment(dec!(50)), Decimal::ZERO);
        assert_eq!(pension_adjustment(dec!(100)), dec!(300));
    }

    #[test]
    fn test_entry_point() {
        let input = IppInput {
            year: 2026,
            inflation_rate: dec!(0.02),
            age: 55,
            salary: dec!(180_000),
            assumptions: IppAssumptions::default(),
        };
        let out = calculate_ipp(&input).unwrap();
        assert!(out.result.current_service_cost > Decimal::ZERO);
    }
}
