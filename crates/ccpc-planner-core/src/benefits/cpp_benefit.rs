use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PlannerError;
use crate::tax_data::{get_tax_year_data, PayrollParameters};
use crate::time_value::safe_div;
use crate::types::{round_cents, with_metadata, ComputationOutput, Money, Rate};
use crate::PlannerResult;

pub const STANDARD_START_AGE: u32 = 65;
pub const EARLIEST_START_AGE: u32 = 60;
pub const LATEST_START_AGE: u32 = 70;

/// Share of contributory months dropped, in percent.
const GENERAL_DROPOUT_PERCENT: u32 = 17;
const BASE_REPLACEMENT: Rate = dec!(0.25);
const ENHANCED_REPLACEMENT: Rate = dec!(0.0833);
const CPP2_REPLACEMENT: Rate = dec!(0.3333);
/// Months of contributions for a full enhanced / CPP2 benefit.
const FULL_ENHANCED_MONTHS: u32 = 480;
const EARLY_REDUCTION_PER_MONTH: Rate = dec!(0.006);
const LATE_INCREASE_PER_MONTH: Rate = dec!(0.007);
const CPP2_FIRST_YEAR: i32 = 2024;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One calendar year of employment earnings with that year's ceilings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsRecord {
    pub year: i32,
    pub age: u32,
    pub salary: Money,
    pub ympe: Money,
    pub yampe: Money,
    pub basic_exemption: Money,
}

impl EarningsRecord {
    /// Pensionable earnings as a share of the year's maximum (0..=1).
    fn base_ratio(&self) -> Decimal {
        let max = self.ympe - self.basic_exemption;
        let capped = (self.salary.min(self.ympe) - self.basic_exemption).max(Decimal::ZERO);
        safe_div(capped, max, Decimal::ZERO).min(Decimal::ONE)
    }

    /// Earnings between YMPE and YAMPE as a share of that band (0..=1).
    fn cpp2_ratio(&self) -> Decimal {
        if self.year < CPP2_FIRST_YEAR {
            return Decimal::ZERO;
        }
        let band = self.yampe - self.ympe;
        let above = (self.salary.min(self.yampe) - self.ympe).max(Decimal::ZERO);
        safe_div(above, band, Decimal::ZERO).min(Decimal::ONE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CppBenefitProjection {
    pub contributory_months: u32,
    pub dropped_months: u32,
    /// Average monthly pensionable earnings after dropout, in benefit-year
    /// dollars.
    pub ampe: Money,
    pub base_annual: Money,
    pub enhanced_annual: Money,
    pub cpp2_annual: Money,
    /// Annual benefit at 65, before any early/late adjustment.
    pub unadjusted_annual: Money,
    pub adjustment_factor: Decimal,
    pub annual_benefit: Money,
    pub monthly_benefit: Money,
}

/// Input for a standalone CPP benefit estimate assuming a level salary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CppBenefitInput {
    pub year: i32,
    #[serde(default)]
    pub inflation_rate: Rate,
    pub current_age: u32,
    pub salary_start_age: u32,
    pub cpp_start_age: u32,
    /// Salary earned each year from `salary_start_age`, in today's dollars.
    pub annual_salary: Money,
    /// Age contributions stop; defaults to `cpp_start_age`.
    #[serde(default)]
    pub retirement_age: Option<u32>,
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Share of the enhanced (first additional) replacement earned in `year`.
pub fn enhancement_phase_in(year: i32) -> Decimal {
    match year {
        y if y < 2019 => Decimal::ZERO,
        2019 => dec!(0.15),
        2020 => dec!(0.30),
        2021 => dec!(0.50),
        2022 => dec!(0.75),
        _ => Decimal::ONE,
    }
}

/// Early/late adjustment relative to a start at 65. Start ages are clamped
/// to 60..=70, so the factor ranges from 0.64 to 1.42.
pub fn cpp_adjustment_factor(start_age: u32) -> Decimal {
    let age = start_age.clamp(EARLIEST_START_AGE, LATEST_START_AGE);
    if age < STANDARD_START_AGE {
        let months = Decimal::from((STANDARD_START_AGE - age) * 12);
        Decimal::ONE - EARLY_REDUCTION_PER_MONTH * months
    } else {
        let months = Decimal::from((age - STANDARD_START_AGE) * 12);
        Decimal::ONE + LATE_INCREASE_PER_MONTH * months
    }
}

/// Project the annual CPP retirement pension from an earnings history.
///
/// Each year's pensionable earnings are capped at that year's YMPE less the
/// basic exemption and restated in benefit-year dollars (`benefit`). The
/// lowest 17% of contributory months are dropped before averaging. Enhanced
/// and CPP2 components accrue per year of contributions and are pro-rated
/// over 480 months.
pub fn project_cpp_benefit(
    history: &[EarningsRecord],
    cpp_start_age: u32,
    benefit: &PayrollParameters,
) -> CppBenefitProjection {
    if history.is_empty() {
        return CppBenefitProjection {
            adjustment_factor: cpp_adjustment_factor(cpp_start_age),
            ..Default::default()
        };
    }

    let max_base = (benefit.ympe - benefit.basic_exemption).max(Decimal::ZERO);
    let cpp2_band = (benefit.yampe - benefit.ympe).max(Decimal::ZERO);

    // Every year contributes 12 equal months.
    let mut monthly: Vec<Money> = Vec::with_capacity(history.len() * 12);
    for record in history {
        let month = record.base_ratio() * max_base / dec!(12);
        monthly.extend(std::iter::repeat(month).take(12));
    }
    monthly.sort();

    let contributory_months = monthly.len() as u32;
    let dropped_months = contributory_months * GENERAL_DROPOUT_PERCENT / 100;
    let kept = &monthly[dropped_months as usize..];
    let ampe = safe_div(
        kept.iter().copied().sum::<Decimal>(),
        Decimal::from(kept.len() as u64),
        Decimal::ZERO,
    );
    let base_annual = ampe * BASE_REPLACEMENT * dec!(12);

    let years = Decimal::from(history.len() as u64);
    let prorate = safe_div(
        Decimal::from(contributory_months.min(FULL_ENHANCED_MONTHS)),
        Decimal::from(FULL_ENHANCED_MONTHS),
        Decimal::ZERO,
    );
    let enhanced_avg = history
        .iter()
        .map(|r| enhancement_phase_in(r.year) * r.base_ratio())
        .sum::<Decimal>()
        / years;
    let cpp2_avg = history.iter().map(|r| r.cpp2_ratio()).sum::<Decimal>() / years;
    let enhanced_annual = ENHANCED_REPLACEMENT * enhanced_avg * max_base * prorate;
    let cpp2_annual = CPP2_REPLACEMENT * cpp2_avg * cpp2_band * prorate;

    let unadjusted_annual = round_cents(base_annual + enhanced_annual + cpp2_annual);
    let adjustment_factor = cpp_adjustment_factor(cpp_start_age);
    let annual_benefit = round_cents(unadjusted_annual * adjustment_factor);

    CppBenefitProjection {
        contributory_months,
        dropped_months,
        ampe: round_cents(ampe),
        base_annual: round_cents(base_annual),
        enhanced_annual: round_cents(enhanced_annual),
        cpp2_annual: round_cents(cpp2_annual),
        unadjusted_annual,
        adjustment_factor,
        annual_benefit,
        monthly_benefit: round_cents(annual_benefit / dec!(12)),
    }
}

/// Level-salary history from `salary_start_age` up to (not including)
/// `end_age`, with calendar years counted back from `current_year` at
/// `current_age`. Ceilings are the current year's; only ratios matter.
pub fn level_salary_history(
    salary: Money,
    salary_start_age: u32,
    end_age: u32,
    current_age: u32,
    current_year: i32,
    params: &PayrollParameters,
) -> Vec<EarningsRecord> {
    (salary_start_age..end_age)
        .map(|age| EarningsRecord {
            year: current_year + age as i32 - current_age as i32,
            age,
            salary,
            ympe: params.ympe,
            yampe: params.yampe,
            basic_exemption: params.basic_exemption,
        })
        .collect()
}

/// Standalone CPP estimate, wrapped in the standard output envelope.
pub fn calculate_cpp_benefit(
    input: &CppBenefitInput,
) -> PlannerResult<ComputationOutput<CppBenefitProjection>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.salary_start_age > input.cpp_start_age {
        return Err(PlannerError::InvalidInput {
            field: "salary_start_age".into(),
            reason: "must not exceed cpp_start_age".into(),
        });
    }
    if !(EARLIEST_START_AGE..=LATEST_START_AGE).contains(&input.cpp_start_age) {
        warnings.push(format!(
            "CPP start age {} clamped to {}..={}",
            input.cpp_start_age, EARLIEST_START_AGE, LATEST_START_AGE
        ));
    }

    let data = get_tax_year_data(input.year, input.inflation_rate, Default::default())?;
    let end_age = input
        .retirement_age
        .unwrap_or(input.cpp_start_age)
        .min(input.cpp_start_age);
    let mut history = level_salary_history(
        input.annual_salary,
        input.salary_start_age,
        end_age,
        input.current_age,
        input.year,
        &data.payroll,
    );
    // Years between retirement and the pension start are zero-earning months.
    for age in end_age..input.cpp_start_age {
        history.push(EarningsRecord {
            year: input.year + age as i32 - input.current_age as i32,
            age,
            salary: Decimal::ZERO,
            ympe: data.payroll.ympe,
            yampe: data.payroll.yampe,
            basic_exemption: data.payroll.basic_exemption,
        });
    }

    let result = project_cpp_benefit(&history, input.cpp_start_age, &data.payroll);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "CPP retirement pension: 17% general dropout, base 25% of AMPE, enhanced and CPP2 pro-rated over 480 months, 0.6%/0.7% per month adjustment",
        &serde_json::json!({
            "benefit_ympe": data.payroll.ympe.to_string(),
            "cpp_start_age": input.cpp_start_age,
        }),
        warnings,
        elapsed,
        result,
    ))
}
