use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PlannerError;
use crate::tax_data::{get_tax_year_data, PayrollParameters};
use crate::time_value::safe_div;
use crate::types::{round_cents, with_metadata, ComputationOutput, Money, Province, Rate};
use crate::PlannerResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Employee and employer payroll contributions on one year's salary.
/// Outside Quebec `cpp`/`cpp2` are CPP and CPP2; in Quebec they hold QPP and
/// QPP2 and `qpip` is non-zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayrollContributions {
    pub salary: Money,
    pub cpp: Money,
    pub cpp2: Money,
    pub ei: Money,
    pub qpip: Money,
    pub employer_cpp: Money,
    pub employer_cpp2: Money,
    pub employer_ei: Money,
    pub employer_qpip: Money,
}

impl PayrollContributions {
    pub fn employee_total(&self) -> Money {
        self.cpp + self.cpp2 + self.ei + self.qpip
    }

    pub fn employer_total(&self) -> Money {
        self.employer_cpp + self.employer_cpp2 + self.employer_ei + self.employer_qpip
    }

    /// Base CPP/QPP contributions (eligible for the non-refundable credit).
    pub fn base_pension(&self, params: &PayrollParameters) -> Money {
        self.cpp - self.enhanced_pension(params)
    }

    /// Enhanced CPP/QPP contributions (deductible from income).
    pub fn enhanced_pension(&self, params: &PayrollParameters) -> Money {
        let share = safe_div(
            params.pension_rate - params.pension_base_rate,
            params.pension_rate,
            Decimal::ZERO,
        );
        round_cents(self.cpp * share)
    }
}

/// Input for a standalone payroll calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollInput {
    pub year: i32,
    pub province: Province,
    pub salary: Money,
    #[serde(default)]
    pub inflation_rate: Rate,
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// CPP (or QPP) employee contribution:
/// `(min(salary, YMPE) - basic exemption) * rate`, zero at or below the
/// exemption.
pub fn calculate_cpp(salary: Money, params: &PayrollParameters) -> Money {
    if salary <= params.basic_exemption {
        return Decimal::ZERO;
    }
    let pensionable = salary.min(params.ympe) - params.basic_exemption;
    round_cents(pensionable.max(Decimal::ZERO) * params.pension_rate)
}

/// CPP2 (or QPP2) on earnings between the YMPE and the YAMPE.
pub fn calculate_cpp2(salary: Money, params: &PayrollParameters) -> Money {
    if salary <= params.ympe {
        return Decimal::ZERO;
    }
    let band = salary.min(params.yampe) - params.ympe;
    round_cents(band.max(Decimal::ZERO) * params.pension2_rate)
}

/// EI employee premium.
pub fn calculate_ei(salary: Money, params: &PayrollParameters) -> Money {
    if salary <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_cents(salary.min(params.ei_max_insurable) * params.ei_rate)
}

/// QPIP employee premium (zero outside Quebec).
pub fn calculate_qpip(salary: Money, params: &PayrollParameters) -> Money {
    if salary <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_cents(salary.min(params.qpip_max_insurable) * params.qpip_rate)
}

/// Every employee and employer contribution on `salary`.
pub fn calculate_payroll(salary: Money, params: &PayrollParameters) -> PayrollContributions {
    let salary = salary.max(Decimal::ZERO);
    let cpp = calculate_cpp(salary, params);
    let cpp2 = calculate_cpp2(salary, params);
    let ei = calculate_ei(salary, params);
    let qpip = calculate_qpip(salary, params);
    let employer_qpip =
        round_cents(salary.min(params.qpip_max_insurable) * params.qpip_employer_rate);

    PayrollContributions {
        salary,
        cpp,
        cpp2,
        ei,
        qpip,
        employer_cpp: cpp,
        employer_cpp2: cpp2,
        employer_ei: round_cents(ei * params.ei_employer_multiplier),
        employer_qpip,
    }
}

/// Payroll contributions for a salary in a given year and province, wrapped
/// in the standard output envelope.
pub fn calculate_payroll_taxes(
    input: &PayrollInput,
) -> PlannerResult<ComputationOutput<PayrollContributions>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.salary < Decimal::ZERO {
        return Err(PlannerError::InvalidInput {
            field: "salary".into(),
            reason: "salary must be >= 0".into(),
        });
    }

    let data = get_tax_year_data(input.year, input.inflation_rate, input.province)?;
    if data.projected {
        warnings.push(format!(
            "{} payroll parameters projected from published values",
            input.year
        ));
    }
    let result = calculate_payroll(input.salary, &data.payroll);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        if input.province.is_quebec() {
            "Payroll contributions (QPP, QPP2, EI Quebec rate, QPIP)"
        } else {
            "Payroll contributions (CPP, CPP2, EI)"
        },
        &serde_json::json!({
            "year": input.year,
            "province": input.province.code(),
            "ympe": data.payroll.ympe.to_string(),
            "yampe": data.payroll.yampe.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax_data::get_tax_year_data;
    use rust_decimal_macros::dec;

    fn ontario_2026() -> PayrollParameters {
        get_tax_year_data(2026, dec!(0.02), Province::Ontario)
            .unwrap()
            .payroll
    }

    fn quebec_2026() -> PayrollParameters {
        get_tax_year_data(2026, dec!(0.02), Province::Quebec)
            .unwrap()
            .payroll
    }

    #[test]
    fn test_cpp_zero_at_or_below_exemption() {
        let p = ontario_2026();
        assert_eq!(calculate_cpp(Decimal::ZERO, &p), Decimal::ZERO);
        assert_eq!(calculate_cpp(dec!(3_500), &p), Decimal::ZERO);
        assert_eq!(calculate_cpp(dec!(2_000), &p), Decimal::ZERO);
    }

    #[test]
    fn test_cpp_capped_at_ympe() {
        let p = ontario_2026();
        // (74,600 - 3,500) * 5.95%
        let max = dec!(4230.45);
        assert_eq!(calculate_cpp(dec!(74_600), &p), max);
        assert_eq!(calculate_cpp(dec!(100_000), &p), max);
        assert_eq!(calculate_cpp(dec!(1_000_000), &p), max);
    }

    #[test]
    fn test_cpp_below_ympe() {
        let p = ontario_2026();
        // (50,000 - 3,500) * 5.95% = 2,766.75
        assert_eq!(calculate_cpp(dec!(50_000), &p), dec!(2766.75));
    }

    #[test]
    fn test_cpp2_band() {
        let p = ontario_2026();
        assert_eq!(calculate_cpp2(dec!(74_600), &p), Decimal::ZERO);
        // (80,000 - 74,600) * 4% = 216
        assert_eq!(calculate_cpp2(dec!(80_000), &p), dec!(216));
        // capped: (85,000 - 74,600) * 4% = 416
        assert_eq!(calculate_cpp2(dec!(100_000), &p), dec!(416));
    }

    #[test]
    fn test_ei_capped_at_max_insurable() {
        let p = ontario_2026();
        // 68,900 * 1.63% = 1,123.07
        assert_eq!(calculate_ei(dec!(100_000), &p), dec!(1123.07));
        assert_eq!(calculate_ei(dec!(10_000), &p), dec!(163));
    }

    #[test]
    fn test_employer_cost_multiplier() {
        let p = ontario_2026();
        let c = calculate_payroll(dec!(100_000), &p);
        assert_eq!(c.employer_cpp, c.cpp);
        assert_eq!(c.employer_cpp2, c.cpp2);
        // 1,123.07 * 1.4 = 1,572.298 -> 1,572.30
        assert_eq!(c.employer_ei, dec!(1572.30));
        assert_eq!(c.qpip, Decimal::ZERO);
        assert_eq!(c.employer_total(), dec!(4230.45) + dec!(416) + dec!(1572.30));
    }

    #[test]
    fn test_enhanced_and_base_split() {
        let p = ontario_2026();
        let c = calculate_payroll(dec!(100_000), &p);
        // 4,230.45 * 1/5.95 = 711.00
        assert_eq!(c.enhanced_pension(&p), dec!(711.00));
        assert_eq!(c.base_pension(&p), dec!(3519.45));
    }

    #[test]
    fn test_quebec_substitutes_qpp_and_qpip() {
        let p = quebec_2026();
        let c = calculate_payroll(dec!(100_000), &p);
        // (74,600 - 3,500) * 6.4% = 4,550.40
        assert_eq!(c.cpp, dec!(4550.40));
        // 68,900 * 1.30% = 895.70
        assert_eq!(c.ei, dec!(895.70));
        // 100,000 * 0.494% = 494.00
        assert_eq!(c.qpip, dec!(494.00));
        assert_eq!(c.employer_qpip, dec!(692.00));
    }

    #[test]
    fn test_negative_salary_treated_as_zero() {
        let p = ontario_2026();
        let c = calculate_payroll(dec!(-5_000), &p);
        assert_eq!(c.employee_total(), Decimal::ZERO);
    }

    #[test]
    fn test_payroll_entry_point_envelope() {
        let input = PayrollInput {
            year: 2026,
            province: Province::Ontario,
            salary: dec!(60_000),
            inflation_rate: dec!(0.02),
        };
        let out = calculate_payroll_taxes(&input).unwrap();
        assert!(out.warnings.is_empty());
        assert_eq!(out.result.salary, dec!(60_000));
        assert!(out.methodology.contains("CPP"));
    }

    #[test]
    fn test_payroll_entry_point_rejects_negative() {
        let input = PayrollInput {
            year: 2026,
            province: Province::Ontario,
            salary: dec!(-1),
            inflation_rate: dec!(0.02),
        };
        assert!(calculate_payroll_taxes(&input).is_err());
    }
}
