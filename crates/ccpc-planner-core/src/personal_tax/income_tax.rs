use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PlannerError;
use crate::payroll::contributions::{calculate_payroll, PayrollContributions};
use crate::tax_data::{get_tax_year_data, HealthPremiumBand, TaxYearData};
use crate::time_value::safe_div;
use crate::types::{round_cents, with_metadata, ComputationOutput, Money, Province, Rate};
use crate::PlannerResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything that lands on one personal return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalIncome {
    pub salary: Money,
    /// Actual (not grossed-up) eligible dividends.
    pub eligible_dividends: Money,
    /// Actual (not grossed-up) non-eligible dividends.
    pub non_eligible_dividends: Money,
    /// Capital dividends are tax-free; carried for reporting only.
    #[serde(default)]
    pub capital_dividends: Money,
    /// Fully taxable other income (CPP, OAS, RRIF withdrawals).
    #[serde(default)]
    pub other_income: Money,
    #[serde(default)]
    pub rrsp_deduction: Money,
    /// Other deductions from net income (e.g. OAS recovery tax).
    #[serde(default)]
    pub other_deductions: Money,
}

impl PersonalIncome {
    /// Income actually received, before any gross-up.
    pub fn actual_income(&self) -> Money {
        self.salary + self.eligible_dividends + self.non_eligible_dividends + self.other_income
    }
}

/// Federal + provincial tax on one return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalTaxBreakdown {
    pub actual_income: Money,
    pub grossed_up_eligible: Money,
    pub grossed_up_non_eligible: Money,
    pub taxable_income: Money,
    pub federal_basic_tax: Money,
    pub federal_credits: Money,
    pub federal_dividend_credit: Money,
    pub federal_abatement: Money,
    pub federal_tax: Money,
    pub provincial_basic_tax: Money,
    pub provincial_credits: Money,
    pub provincial_dividend_credit: Money,
    pub surtax: Money,
    /// Provincial tax after credits, including surtax.
    pub provincial_tax: Money,
    pub health_premium: Money,
    /// federal_tax + provincial_tax + health_premium
    pub total_tax: Money,
    pub average_rate: Rate,
}

/// Input for a standalone personal tax calculation. Payroll contributions are
/// derived from `income.salary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalTaxInput {
    pub year: i32,
    pub province: Province,
    #[serde(default)]
    pub inflation_rate: Rate,
    pub income: PersonalIncome,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Graduated premium keyed on actual income: the highest band whose
/// threshold is exceeded applies.
pub fn calculate_health_premium(income: Money, bands: &[HealthPremiumBand]) -> Money {
    bands
        .iter()
        .rev()
        .find(|band| income > band.threshold)
        .map(|band| (band.base + band.rate * (income - band.threshold)).min(band.cap))
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Combined federal and provincial tax on salary, dividends and other income
/// reported on one return.
///
/// Dividends are grossed up and added to salary for a single taxable income;
/// enhanced CPP/QPP and CPP2/QPP2 contributions are deducted. Non-refundable
/// credits (basic personal amount, Canada employment amount, base CPP/QPP, EI,
/// QPIP) are valued at the lowest bracket rate, then the dividend tax credits
/// are applied. No stage may go below zero. Surtax applies to provincial tax
/// after credits; the health premium is keyed on actual income.
pub fn calculate_personal_tax(
    income: &PersonalIncome,
    payroll: &PayrollContributions,
    data: &TaxYearData,
) -> PersonalTaxBreakdown {
    let salary = income.salary.max(Decimal::ZERO);
    let eligible = income.eligible_dividends.max(Decimal::ZERO);
    let non_eligible = income.non_eligible_dividends.max(Decimal::ZERO);
    let other = income.other_income.max(Decimal::ZERO);

    let grossed_up_eligible = eligible * (Decimal::ONE + data.gross_up.eligible);
    let grossed_up_non_eligible = non_eligible * (Decimal::ONE + data.gross_up.non_eligible);

    let deductions = payroll.enhanced_pension(&data.payroll)
        + payroll.cpp2
        + income.rrsp_deduction.max(Decimal::ZERO)
        + income.other_deductions.max(Decimal::ZERO);
    let taxable_income =
        (salary + grossed_up_eligible + grossed_up_non_eligible + other - deductions)
            .max(Decimal::ZERO);

    let payroll_credit_base = payroll.base_pension(&data.payroll) + payroll.ei + payroll.qpip;

    // --- Federal ---
    let federal_basic_tax = data.federal.tax_on(taxable_income);
    let employment_amount = if salary > Decimal::ZERO {
        data.federal.employment_amount.min(salary)
    } else {
        Decimal::ZERO
    };
    let federal_credits = (data.federal.basic_personal_amount_for(taxable_income)
        + employment_amount
        + payroll_credit_base)
        * data.federal.lowest_rate();
    let federal_dividend_credit = grossed_up_eligible * data.federal.dividend_credit_eligible
        + grossed_up_non_eligible * data.federal.dividend_credit_non_eligible;
    let federal_after_credits = (federal_basic_tax - federal_credits).max(Decimal::ZERO);
    let federal_after_dtc = (federal_after_credits - federal_dividend_credit).max(Decimal::ZERO);
    let federal_abatement = federal_after_dtc * data.federal_abatement;
    let federal_tax = round_cents(federal_after_dtc - federal_abatement);

    // --- Provincial ---
    let provincial_basic_tax = data.provincial.tax_on(taxable_income);
    let provincial_credits = (data.provincial.basic_personal_amount_for(taxable_income)
        + payroll_credit_base)
        * data.provincial.lowest_rate();
    let provincial_dividend_credit = grossed_up_eligible
        * data.provincial.dividend_credit_eligible
        + grossed_up_non_eligible * data.provincial.dividend_credit_non_eligible;
    let provincial_after_credits = (provincial_basic_tax - provincial_credits).max(Decimal::ZERO);
    let provincial_after_dtc =
        (provincial_after_credits - provincial_dividend_credit).max(Decimal::ZERO);
    let surtax = data
        .surtax
        .as_ref()
        .map(|s| s.on(provincial_after_dtc))
        .unwrap_or(Decimal::ZERO);
    let provincial_tax = round_cents(provincial_after_dtc + surtax);

    let actual_income = income.actual_income();
    let health_premium = round_cents(calculate_health_premium(actual_income, &data.health_premium));

    let total_tax = federal_tax + provincial_tax + health_premium;
    let average_rate = safe_div(total_tax, actual_income, Decimal::ZERO);

    PersonalTaxBreakdown {
        actual_income,
        grossed_up_eligible,
        grossed_up_non_eligible,
        taxable_income,
        federal_basic_tax: round_cents(federal_basic_tax),
        federal_credits: round_cents(federal_credits),
        federal_dividend_credit: round_cents(federal_dividend_credit),
        federal_abatement: round_cents(federal_abatement),
        federal_tax,
        provincial_basic_tax: round_cents(provincial_basic_tax),
        provincial_credits: round_cents(provincial_credits),
        provincial_dividend_credit: round_cents(provincial_dividend_credit),
        surtax: round_cents(surtax),
        provincial_tax,
        health_premium,
        total_tax,
        average_rate,
    }
}

/// Average tax rate on an extra `probe` dollars of eligible and of
/// non-eligible dividends on top of `base`. Used to seed the dividend
/// waterfall's effective-rate estimates. Returns `(eligible, non_eligible)`.
pub fn incremental_dividend_rates(
    base: &PersonalIncome,
    probe: Money,
    payroll: &PayrollContributions,
    data: &TaxYearData,
) -> (Rate, Rate) {
    if probe <= Decimal::ZERO {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let base_tax = calculate_personal_tax(base, payroll, data).total_tax;

    let mut with_eligible = base.clone();
    with_eligible.eligible_dividends += probe;
    let eligible_tax = calculate_personal_tax(&with_eligible, payroll, data).total_tax;

    let mut with_non_eligible = base.clone();
    with_non_eligible.non_eligible_dividends += probe;
    let non_eligible_tax = calculate_personal_tax(&with_non_eligible, payroll, data).total_tax;

    (
        ((eligible_tax - base_tax) / probe).max(Decimal::ZERO),
        ((non_eligible_tax - base_tax) / probe).max(Decimal::ZERO),
    )
}

/// Personal tax for a year/province, with payroll derived from salary,
/// wrapped in the standard output envelope.
pub fn calculate_personal_income_tax(
    input: &PersonalTaxInput,
) -> PlannerResult<ComputationOutput<PersonalTaxBreakdown>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

    let inc = &input.income;
    for (field, value) in [
        ("salary", inc.salary),
        ("eligible_dividends", inc.eligible_dividends),
        ("non_eligible_dividends", inc.non_eligible_dividends),
        ("other_income", inc.other_income),
    ] {
        if value < Decimal::ZERO {
            return Err(PlannerError::InvalidInput {
                field: field.into(),
                reason: "must be >= 0".into(),
            });
        }
    }

    let data = get_tax_year_data(input.year, input.inflation_rate, input.province)?;
    let payroll = calculate_payroll(inc.salary, &data.payroll);
    let result = calculate_personal_tax(inc, &payroll, &data);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Combined federal + provincial personal tax (gross-up, DTC, surtax, health premium)",
        &serde_json::json!({
            "year": input.year,
            "province": input.province.code(),
            "projected_tables": data.projected,
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
    use rust_decimal_macros::dec;

    fn data(province: Province) -> TaxYearData {
        get_tax_year_data(2026, dec!(0.02), province).unwrap()
    }

    fn tax_for(income: &PersonalIncome, province: Province) -> PersonalTaxBreakdown {
        let d = data(province);
        let payroll = calculate_payroll(income.salary, &d.payroll);
        calculate_personal_tax(income, &payroll, &d)
    }

    fn salary(amount: Money) -> PersonalIncome {
        PersonalIncome {
            salary: amount,
            ..Default::default()
        }
    }

    fn within(actual: Money, expected: Money, tolerance: Money) -> bool {
        (actual - expected).abs() <= tolerance
    }

    #[test]
    fn test_ontario_100k_salary() {
        let t = tax_for(&salary(dec!(100_000)), Province::Ontario);
        // taxable = 100,000 - 711 enhanced CPP - 416 CPP2
        assert_eq!(t.taxable_income, dec!(98_873));
        // 58,523 * 14% + 40,350 * 20.5%
        assert_eq!(t.federal_basic_tax, dec!(16_464.97));
        // (16,452 BPA + 1,501 CEA + 3,519.45 base CPP + 1,123.07 EI) * 14%
        assert_eq!(t.federal_credits, dec!(3_163.37));
        assert_eq!(t.federal_tax, dec!(13_301.60));
        assert!(within(t.federal_tax, dec!(13_323.35), dec!(13_323.35) * dec!(0.005)));
        // 53,891 * 5.05% + 44,982 * 9.15%
        assert_eq!(t.provincial_basic_tax, dec!(6_837.35));
        // (12,989 BPA + 3,519.45 base CPP + 1,123.07 EI) * 5.05%
        assert_eq!(t.provincial_credits, dec!(890.39));
        // 20% of basic tax over 5,818
        assert_eq!(t.surtax, dec!(25.79));
        assert_eq!(t.provincial_tax, dec!(5_972.75));
        assert_eq!(t.health_premium, dec!(750));
        assert_eq!(t.total_tax, t.federal_tax + t.provincial_tax + t.health_premium);
    }

    #[test]
    fn test_zero_income_zero_tax() {
        let t = tax_for(&PersonalIncome::default(), Province::Ontario);
        assert_eq!(t.total_tax, Decimal::ZERO);
        assert_eq!(t.average_rate, Decimal::ZERO);
    }

    #[test]
    fn test_low_income_clamped_at_zero() {
        let t = tax_for(&salary(dec!(12_000)), Province::Ontario);
        assert_eq!(t.federal_tax, Decimal::ZERO);
        assert_eq!(t.provincial_tax, Decimal::ZERO);
        assert_eq!(t.health_premium, Decimal::ZERO);
    }

    #[test]
    fn test_eligible_dividends_taxed_less_than_salary() {
        let div = PersonalIncome {
            eligible_dividends: dec!(50_000),
            ..Default::default()
        };
        let t_div = tax_for(&div, Province::Ontario);
        let t_sal = tax_for(&salary(dec!(50_000)), Province::Ontario);
        assert_eq!(t_div.grossed_up_eligible, dec!(69_000));
        assert!(t_div.total_tax < t_sal.total_tax);
    }

    #[test]
    fn test_dividend_credit_cannot_create_refund() {
        // Large eligible dividend credit against modest tax: tax floors at zero
        let div = PersonalIncome {
            eligible_dividends: dec!(30_000),
            ..Default::default()
        };
        let t = tax_for(&div, Province::Ontario);
        assert!(t.federal_tax >= Decimal::ZERO);
        assert!(t.provincial_tax >= Decimal::ZERO);
        assert_eq!(t.federal_tax, Decimal::ZERO);
    }

    #[test]
    fn test_capital_dividends_tax_free() {
        let cap = PersonalIncome {
            capital_dividends: dec!(80_000),
            ..Default::default()
        };
        let t = tax_for(&cap, Province::Ontario);
        assert_eq!(t.total_tax, Decimal::ZERO);
        assert_eq!(t.actual_income, Decimal::ZERO);
    }

    #[test]
    fn test_health_premium_keyed_on_actual_income() {
        // 40,000 eligible grossed-up to 55,200 but premium uses 40,000:
        // 300 + 6% * 4,000 = 540 -> capped 450
        let div = PersonalIncome {
            eligible_dividends: dec!(40_000),
            ..Default::default()
        };
        let t = tax_for(&div, Province::Ontario);
        assert_eq!(t.health_premium, dec!(450));
    }

    #[test]
    fn test_health_premium_bands() {
        let bands = data(Province::Ontario).health_premium;
        assert_eq!(calculate_health_premium(dec!(20_000), &bands), Decimal::ZERO);
        assert_eq!(calculate_health_premium(dec!(25_000), &bands), dec!(300));
        assert_eq!(calculate_health_premium(dec!(50_000), &bands), dec!(600));
        assert_eq!(calculate_health_premium(dec!(72_400), &bands), dec!(700));
        assert_eq!(calculate_health_premium(dec!(500_000), &bands), dec!(900));
    }

    #[test]
    fn test_no_surtax_or_premium_outside_ontario() {
        let t = tax_for(&salary(dec!(250_000)), Province::Alberta);
        assert_eq!(t.surtax, Decimal::ZERO);
        assert_eq!(t.health_premium, Decimal::ZERO);
    }

    #[test]
    fn test_quebec_abatement_reduces_federal() {
        let on = tax_for(&salary(dec!(100_000)), Province::Ontario);
        let qc = tax_for(&salary(dec!(100_000)), Province::Quebec);
        assert!(qc.federal_abatement > Decimal::ZERO);
        assert!(qc.federal_tax < on.federal_tax);
    }

    #[test]
    fn test_other_income_and_rrsp_deduction() {
        let base = PersonalIncome {
            other_income: dec!(40_000),
            ..Default::default()
        };
        let with_rrsp = PersonalIncome {
            rrsp_deduction: dec!(10_000),
            ..base.clone()
        };
        let a = tax_for(&base, Province::Ontario);
        let b = tax_for(&with_rrsp, Province::Ontario);
        assert_eq!(a.taxable_income, dec!(40_000));
        assert_eq!(b.taxable_income, dec!(30_000));
        assert!(b.total_tax < a.total_tax);
    }

    #[test]
    fn test_incremental_rates_non_eligible_higher_at_top() {
        let d = data(Province::Ontario);
        let base = salary(dec!(200_000));
        let payroll = calculate_payroll(base.salary, &d.payroll);
        let (elig, non_elig) = incremental_dividend_rates(&base, dec!(10_000), &payroll, &d);
        assert!(elig > dec!(0.15) && elig < dec!(0.40), "elig={}", elig);
        assert!(non_elig > elig, "non_elig={} elig={}", non_elig, elig);
    }

    #[test]
    fn test_entry_point_rejects_negative_income() {
        let input = PersonalTaxInput {
            year: 2026,
            province: Province::Ontario,
            inflation_rate: dec!(0.02),
            income: PersonalIncome {
                salary: dec!(-1),
                ..Default::default()
            },
        };
        assert!(calculate_personal_income_tax(&input).is_err());
    }
}
