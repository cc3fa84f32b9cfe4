use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::tables::{
    self, CorporateRates, DividendGrossUp, HealthPremiumBand, PayrollParameters,
    PersonalTaxSchedule, ProvincialIndexation, RetirementParameters, Surtax,
    FIRST_PUBLISHED_YEAR, LAST_PUBLISHED_YEAR,
};
use crate::error::PlannerError;
use crate::time_value::compound;
use crate::types::{Money, Province, Rate};
use crate::PlannerResult;

/// Federal tax abatement for Quebec residents (Quebec collects its own tax).
const QUEBEC_ABATEMENT: Rate = dec!(0.165);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Immutable snapshot of every constant the planner needs for one
/// (year, province) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxYearData {
    pub year: i32,
    pub province: Province,
    /// True when the values were indexed forward from the last published year.
    pub projected: bool,
    pub federal: PersonalTaxSchedule,
    pub provincial: PersonalTaxSchedule,
    /// Reduction of basic federal tax (Quebec abatement), as a fraction.
    pub federal_abatement: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surtax: Option<Surtax>,
    pub health_premium: Vec<HealthPremiumBand>,
    pub gross_up: DividendGrossUp,
    pub payroll: PayrollParameters,
    pub corporate: CorporateRates,
    pub retirement: RetirementParameters,
}

/// Source of tax constants. The projection engine only ever talks to this
/// trait, so it can run against synthetic tables in tests.
pub trait TaxDataProvider {
    fn lookup(&self, year: i32, inflation_rate: Rate, province: Province)
        -> PlannerResult<TaxYearData>;
}

/// Provider backed by the published tables, projecting later years with the
/// caller's inflation rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishedTaxTables;

impl TaxDataProvider for PublishedTaxTables {
    fn lookup(
        &self,
        year: i32,
        inflation_rate: Rate,
        province: Province,
    ) -> PlannerResult<TaxYearData> {
        if year < FIRST_PUBLISHED_YEAR {
            return Err(PlannerError::NoTaxData { year, province });
        }
        if year <= LAST_PUBLISHED_YEAR {
            return published(year, province);
        }
        let base = published(LAST_PUBLISHED_YEAR, province)?;
        let indexation = tables::provincial_table(province, LAST_PUBLISHED_YEAR)
            .map(|t| t.indexation)
            .ok_or(PlannerError::NoTaxData { year, province })?;
        let years_out = (year - LAST_PUBLISHED_YEAR) as u32;
        Ok(project(base, year, inflation_rate, years_out, indexation))
    }
}

/// Provider returning the same snapshot for every year (relabelled with the
/// requested year and province). Useful for pinning tables in tests.
#[derive(Debug, Clone)]
pub struct FixedTaxYearData(pub TaxYearData);

impl TaxDataProvider for FixedTaxYearData {
    fn lookup(
        &self,
        year: i32,
        _inflation_rate: Rate,
        province: Province,
    ) -> PlannerResult<TaxYearData> {
        let mut data = self.0.clone();
        data.year = year;
        data.province = province;
        Ok(data)
    }
}

/// Look up constants for `year`/`province` from the published tables.
pub fn get_tax_year_data(
    year: i32,
    inflation_rate: Rate,
    province: Province,
) -> PlannerResult<TaxYearData> {
    PublishedTaxTables.lookup(year, inflation_rate, province)
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn published(year: i32, province: Province) -> PlannerResult<TaxYearData> {
    let missing = || PlannerError::NoTaxData { year, province };
    let federal = tables::federal_schedule(year).ok_or_else(missing)?;
    let provincial = tables::provincial_table(province, year).ok_or_else(missing)?;
    let payroll = tables::payroll_parameters(year, province).ok_or_else(missing)?;
    let retirement = tables::retirement_parameters(year).ok_or_else(missing)?;
    let corporate = tables::corporate_rates(&provincial);

    Ok(TaxYearData {
        year,
        province,
        projected: false,
        federal,
        provincial: provincial.schedule,
        federal_abatement: if province.is_quebec() {
            QUEBEC_ABATEMENT
        } else {
            Decimal::ZERO
        },
        surtax: provincial.surtax,
        health_premium: provincial.health_premium,
        gross_up: tables::dividend_gross_up(),
        payroll,
        corporate,
        retirement,
    })
}

// ---------------------------------------------------------------------------
// Indexation
// ---------------------------------------------------------------------------

fn round_dollar(value: Money) -> Money {
    value.round_dp(0)
}

/// Round down to a multiple of `step` (CPP ceilings round to $100, TFSA
/// limit to $500).
fn round_down_to(value: Money, step: Money) -> Money {
    (value / step).floor() * step
}

fn index_schedule(schedule: &PersonalTaxSchedule, factor: Decimal) -> PersonalTaxSchedule {
    let mut out = schedule.clone();
    for bracket in out.brackets.iter_mut() {
        if bracket.indexed {
            bracket.threshold = round_dollar(bracket.threshold * factor);
        }
    }
    out.basic_personal_amount = round_dollar(schedule.basic_personal_amount * factor);
    out.basic_personal_amount_minimum = schedule
        .basic_personal_amount_minimum
        .map(|m| round_dollar(m * factor));
    out.employment_amount = round_dollar(schedule.employment_amount * factor);
    out
}

fn project(
    base: TaxYearData,
    year: i32,
    inflation_rate: Rate,
    years_out: u32,
    indexation: ProvincialIndexation,
) -> TaxYearData {
    let factor = compound(inflation_rate.max(Decimal::ZERO), years_out);
    let provincial_factor = match indexation {
        ProvincialIndexation::Inflation => factor,
        ProvincialIndexation::Frozen => Decimal::ONE,
    };

    let federal = index_schedule(&base.federal, factor);
    let provincial = index_schedule(&base.provincial, provincial_factor);
    let surtax = base.surtax.as_ref().map(|s| Surtax {
        first_threshold: round_dollar(s.first_threshold * provincial_factor),
        second_threshold: round_dollar(s.second_threshold * provincial_factor),
        ..s.clone()
    });

    // The basic exemption is frozen at $3,500 by statute.
    let payroll = PayrollParameters {
        ympe: round_down_to(base.payroll.ympe * factor, dec!(100)),
        yampe: round_down_to(base.payroll.yampe * factor, dec!(100)),
        ei_max_insurable: round_down_to(base.payroll.ei_max_insurable * factor, dec!(100)),
        qpip_max_insurable: round_down_to(base.payroll.qpip_max_insurable * factor, dec!(100)),
        ..base.payroll.clone()
    };

    let rrsp_limit = round_down_to(base.retirement.rrsp_limit * factor, dec!(10));
    let retirement = RetirementParameters {
        rrsp_limit,
        tfsa_limit: round_down_to(base.retirement.tfsa_limit * factor, dec!(500)),
        db_pension_limit: (rrsp_limit / dec!(9)).round_dp(2),
        oas_max_monthly: (base.retirement.oas_max_monthly * factor).round_dp(2),
        oas_clawback_threshold: round_dollar(base.retirement.oas_clawback_threshold * factor),
    };

    TaxYearData {
        year,
        projected: true,
        federal,
        provincial,
        surtax,
        payroll,
        retirement,
        ..base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_year_not_projected() {
        let data = get_tax_year_data(2026, dec!(0.02), Province::Ontario).unwrap();
        assert!(!data.projected);
        assert_eq!(data.payroll.ympe, dec!(74_600));
        assert_eq!(data.federal_abatement, Decimal::ZERO);
    }

    #[test]
    fn test_year_before_tables_is_no_data() {
        let err = get_tax_year_data(2019, dec!(0.02), Province::Ontario).unwrap_err();
        match err {
            PlannerError::NoTaxData { year, province } => {
                assert_eq!(year, 2019);
                assert_eq!(province, Province::Ontario);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_projection_indexes_brackets() {
        let base = get_tax_year_data(2026, dec!(0.02), Province::Ontario).unwrap();
        let next = get_tax_year_data(2027, dec!(0.02), Province::Ontario).unwrap();
        assert!(next.projected);
        assert_eq!(next.year, 2027);
        // 58,523 * 1.02 = 59,693.46 -> 59,693
        assert_eq!(next.federal.brackets[1].threshold, dec!(59_693));
        assert_eq!(
            next.federal.basic_personal_amount,
            round_dollar(base.federal.basic_personal_amount * dec!(1.02))
        );
        // 74,600 * 1.02 = 76,092 -> 76,000
        assert_eq!(next.payroll.ympe, dec!(76_000));
        assert_eq!(next.payroll.basic_exemption, dec!(3_500));
    }

    #[test]
    fn test_projection_keeps_legislated_freezes() {
        let next = get_tax_year_data(2030, dec!(0.03), Province::Ontario).unwrap();
        let thresholds: Vec<Money> = next
            .provincial
            .brackets
            .iter()
            .map(|b| b.threshold)
            .collect();
        assert!(thresholds.contains(&dec!(150_000)));
        assert!(thresholds.contains(&dec!(220_000)));
        // Indexed threshold moved
        assert!(thresholds[1] > dec!(53_891));
        // Health premium bands unchanged
        assert_eq!(next.health_premium[0].threshold, dec!(20_000));
    }

    #[test]
    fn test_manitoba_frozen_provincially_but_federal_indexed() {
        let base = get_tax_year_data(2026, dec!(0.025), Province::Manitoba).unwrap();
        let next = get_tax_year_data(2028, dec!(0.025), Province::Manitoba).unwrap();
        assert_eq!(next.provincial, base.provincial);
        assert!(next.federal.basic_personal_amount > base.federal.basic_personal_amount);
    }

    #[test]
    fn test_tfsa_rounds_to_500() {
        // 7,000 * 1.05 = 7,350 -> 7,000; 7,000 * 1.05^2 = 7,717.5 -> 7,500
        let y1 = get_tax_year_data(2027, dec!(0.05), Province::Ontario).unwrap();
        let y2 = get_tax_year_data(2028, dec!(0.05), Province::Ontario).unwrap();
        assert_eq!(y1.retirement.tfsa_limit, dec!(7_000));
        assert_eq!(y2.retirement.tfsa_limit, dec!(7_500));
    }

    #[test]
    fn test_quebec_abatement() {
        let qc = get_tax_year_data(2026, dec!(0.02), Province::Quebec).unwrap();
        assert_eq!(qc.federal_abatement, dec!(0.165));
        assert!(qc.payroll.qpip_rate > Decimal::ZERO);
    }

    #[test]
    fn test_fixed_provider_relabels_year() {
        let base = get_tax_year_data(2026, dec!(0.02), Province::Ontario).unwrap();
        let fixed = FixedTaxYearData(base.clone());
        let data = fixed.lookup(2040, dec!(0.10), Province::Ontario).unwrap();
        assert_eq!(data.year, 2040);
        assert_eq!(data.federal, base.federal);
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let a = get_tax_year_data(2035, dec!(0.021), Province::BritishColumbia).unwrap();
        let b = get_tax_year_data(2035, dec!(0.021), Province::BritishColumbia).unwrap();
        assert_eq!(a, b);
    }
}
