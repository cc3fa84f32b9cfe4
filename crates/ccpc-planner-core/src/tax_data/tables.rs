use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Province, Rate};

/// First calendar year with published constants.
pub const FIRST_PUBLISHED_YEAR: i32 = 2025;
/// Last calendar year with published constants; later years are projected.
pub const LAST_PUBLISHED_YEAR: i32 = 2026;

const FEDERAL_SMALL_BUSINESS_RATE: Rate = dec!(0.09);
const FEDERAL_GENERAL_RATE: Rate = dec!(0.15);
/// Federal rate on investment income of a CCPC: 38% - 10% abatement
/// + 10 2/3% additional refundable tax.
const FEDERAL_INVESTMENT_RATE: Rate = dec!(0.3867);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One marginal bracket: `rate` applies to income above `threshold` up to the
/// next bracket's threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub threshold: Money,
    pub rate: Rate,
    /// False for thresholds frozen by statute (never indexed).
    #[serde(default = "default_true")]
    pub indexed: bool,
}

fn default_true() -> bool {
    true
}

/// A federal or provincial personal income tax schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalTaxSchedule {
    pub brackets: Vec<TaxBracket>,
    pub basic_personal_amount: Money,
    /// Federal BPA phases down to this amount between the 4th and 5th bracket
    /// thresholds. `None` for a flat BPA.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_personal_amount_minimum: Option<Money>,
    /// Canada employment amount (federal only).
    pub employment_amount: Money,
    /// Dividend tax credit on eligible dividends, as a fraction of the
    /// grossed-up amount.
    pub dividend_credit_eligible: Rate,
    /// Dividend tax credit on non-eligible dividends, as a fraction of the
    /// grossed-up amount.
    pub dividend_credit_non_eligible: Rate,
}

impl PersonalTaxSchedule {
    /// Rate of the first bracket; non-refundable credits are valued at it.
    pub fn lowest_rate(&self) -> Rate {
        self.brackets.first().map(|b| b.rate).unwrap_or(Decimal::ZERO)
    }

    /// Gross bracket tax on `income`, before any credit.
    pub fn tax_on(&self, income: Money) -> Money {
        if income <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let mut tax = Decimal::ZERO;
        for (i, bracket) in self.brackets.iter().enumerate() {
            if income <= bracket.threshold {
                break;
            }
            let upper = self
                .brackets
                .get(i + 1)
                .map(|next| next.threshold)
                .unwrap_or(Decimal::MAX);
            let portion = income.min(upper) - bracket.threshold;
            tax += portion * bracket.rate;
        }
        tax
    }

    /// Basic personal amount available at `net_income`, applying the
    /// phase-down when a minimum is configured.
    pub fn basic_personal_amount_for(&self, net_income: Money) -> Money {
        let Some(minimum) = self.basic_personal_amount_minimum else {
            return self.basic_personal_amount;
        };
        let (Some(start), Some(end)) = (self.brackets.get(3), self.brackets.get(4)) else {
            return self.basic_personal_amount;
        };
        let (start, end) = (start.threshold, end.threshold);
        if net_income <= start || end <= start {
            self.basic_personal_amount
        } else if net_income >= end {
            minimum
        } else {
            let reduction = (self.basic_personal_amount - minimum) * (net_income - start)
                / (end - start);
            self.basic_personal_amount - reduction
        }
    }
}

/// Provincial surtax on basic provincial tax (Ontario's two-threshold
/// stacked formula).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surtax {
    pub first_threshold: Money,
    pub first_rate: Rate,
    pub second_threshold: Money,
    pub second_rate: Rate,
}

impl Surtax {
    pub fn on(&self, provincial_tax: Money) -> Money {
        let first = (provincial_tax - self.first_threshold).max(Decimal::ZERO) * self.first_rate;
        let second =
            (provincial_tax - self.second_threshold).max(Decimal::ZERO) * self.second_rate;
        first + second
    }
}

/// One band of a graduated health premium: above `threshold`, the premium is
/// `base + rate * (income - threshold)`, capped at `cap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthPremiumBand {
    pub threshold: Money,
    pub base: Money,
    pub rate: Rate,
    pub cap: Money,
}

/// Dividend gross-up factors (0.38 = 38%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendGrossUp {
    pub eligible: Rate,
    pub non_eligible: Rate,
}

/// CPP/QPP, EI and QPIP parameters for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollParameters {
    pub ympe: Money,
    pub yampe: Money,
    pub basic_exemption: Money,
    /// Employee CPP/QPP rate including the enhanced portion.
    pub pension_rate: Rate,
    /// Base (pre-enhancement) portion of `pension_rate`; contributions at this
    /// rate earn a credit, the remainder is deductible.
    pub pension_base_rate: Rate,
    pub pension2_rate: Rate,
    pub ei_max_insurable: Money,
    pub ei_rate: Rate,
    pub ei_employer_multiplier: Decimal,
    pub qpip_max_insurable: Money,
    pub qpip_rate: Rate,
    pub qpip_employer_rate: Rate,
}

/// Combined (federal + provincial) corporate rates and the refundable-tax
/// mechanics that depend on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateRates {
    pub small_business_rate: Rate,
    pub general_rate: Rate,
    /// Combined rate on aggregate investment income (including the refundable
    /// additional tax).
    pub passive_investment_rate: Rate,
    pub business_limit: Money,
    /// Refundable portion of investment income tax added to nRDTOH.
    pub refundable_investment_rate: Rate,
    /// Part IV rate on taxable Canadian portfolio dividends received.
    pub part_iv_rate: Rate,
    /// Dividend refund per dollar of taxable dividend paid.
    pub rdtoh_refund_rate: Rate,
    /// Share of general-rate income added to GRIP.
    pub grip_rate: Rate,
    pub capital_gains_inclusion: Rate,
    pub foreign_withholding_rate: Rate,
}

/// Registered-plan limits and OAS parameters for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementParameters {
    pub rrsp_limit: Money,
    pub tfsa_limit: Money,
    /// Maximum defined-benefit pension accrual per year of service.
    pub db_pension_limit: Money,
    pub oas_max_monthly: Money,
    pub oas_clawback_threshold: Money,
}

/// How a province indexes its brackets in projected years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvincialIndexation {
    /// Indexed with the caller's inflation assumption.
    Inflation,
    /// Brackets and credits frozen at the last published values.
    Frozen,
}

/// Provincial slice of a tax year.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProvincialTable {
    pub schedule: PersonalTaxSchedule,
    pub surtax: Option<Surtax>,
    pub health_premium: Vec<HealthPremiumBand>,
    pub small_business_rate: Rate,
    pub general_rate: Rate,
    pub indexation: ProvincialIndexation,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn brackets(rows: &[(Money, Rate)]) -> Vec<TaxBracket> {
    rows.iter()
        .map(|&(threshold, rate)| TaxBracket {
            threshold,
            rate,
            indexed: true,
        })
        .collect()
}

/// Same as `brackets`, but thresholds listed in `frozen` are never indexed.
fn brackets_with_frozen(rows: &[(Money, Rate)], frozen: &[Money]) -> Vec<TaxBracket> {
    brackets(rows)
        .into_iter()
        .map(|mut b| {
            if frozen.contains(&b.threshold) {
                b.indexed = false;
            }
            b
        })
        .collect()
}

fn provincial_schedule(
    brackets: Vec<TaxBracket>,
    basic_personal_amount: Money,
    dividend_credit_eligible: Rate,
    dividend_credit_non_eligible: Rate,
) -> PersonalTaxSchedule {
    PersonalTaxSchedule {
        brackets,
        basic_personal_amount,
        basic_personal_amount_minimum: None,
        employment_amount: Decimal::ZERO,
        dividend_credit_eligible,
        dividend_credit_non_eligible,
    }
}

fn table(
    schedule: PersonalTaxSchedule,
    small_business_rate: Rate,
    general_rate: Rate,
) -> ProvincialTable {
    ProvincialTable {
        schedule,
        surtax: None,
        health_premium: Vec::new(),
        small_business_rate,
        general_rate,
        indexation: ProvincialIndexation::Inflation,
    }
}

fn band(threshold: Money, base: Money, rate: Rate, cap: Money) -> HealthPremiumBand {
    HealthPremiumBand {
        threshold,
        base,
        rate,
        cap,
    }
}

/// Ontario Health Premium bands. Not indexed.
fn ontario_health_premium() -> Vec<HealthPremiumBand> {
    vec![
        band(dec!(20_000), dec!(0), dec!(0.06), dec!(300)),
        band(dec!(36_000), dec!(300), dec!(0.06), dec!(450)),
        band(dec!(48_000), dec!(450), dec!(0.25), dec!(600)),
        band(dec!(72_000), dec!(600), dec!(0.25), dec!(750)),
        band(dec!(200_000), dec!(750), dec!(0.25), dec!(900)),
    ]
}

// ---------------------------------------------------------------------------
// Published tables
// ---------------------------------------------------------------------------

pub(crate) fn federal_schedule(year: i32) -> Option<PersonalTaxSchedule> {
    let (rows, bpa, bpa_min, cea): (&[(Money, Rate)], Money, Money, Money) = match year {
        2025 => (
            &[
                (dec!(0), dec!(0.145)),
                (dec!(57_375), dec!(0.205)),
                (dec!(114_750), dec!(0.26)),
                (dec!(177_882), dec!(0.29)),
                (dec!(253_414), dec!(0.33)),
            ],
            dec!(16_129),
            dec!(14_538),
            dec!(1_471),
        ),
        2026 => (
            &[
                (dec!(0), dec!(0.14)),
                (dec!(58_523), dec!(0.205)),
                (dec!(117_045), dec!(0.26)),
                (dec!(181_440), dec!(0.29)),
                (dec!(258_482), dec!(0.33)),
            ],
            dec!(16_452),
            dec!(14_829),
            dec!(1_501),
        ),
        _ => return None,
    };
    Some(PersonalTaxSchedule {
        brackets: brackets(rows),
        basic_personal_amount: bpa,
        basic_personal_amount_minimum: Some(bpa_min),
        employment_amount: cea,
        dividend_credit_eligible: dec!(0.150198),
        dividend_credit_non_eligible: dec!(0.090301),
    })
}

pub(crate) fn dividend_gross_up() -> DividendGrossUp {
    DividendGrossUp {
        eligible: dec!(0.38),
        non_eligible: dec!(0.15),
    }
}

pub(crate) fn payroll_parameters(year: i32, province: Province) -> Option<PayrollParameters> {
    let (ympe, yampe, ei_max, ei_rate, ei_rate_qc, qpip_max) = match year {
        2025 => (dec!(71_300), dec!(81_200), dec!(65_700), dec!(0.0164), dec!(0.0131), dec!(98_000)),
        2026 => (dec!(74_600), dec!(85_000), dec!(68_900), dec!(0.0163), dec!(0.0130), dec!(103_000)),
        _ => return None,
    };
    let params = if province.is_quebec() {
        PayrollParameters {
            ympe,
            yampe,
            basic_exemption: dec!(3_500),
            pension_rate: dec!(0.064),
            pension_base_rate: dec!(0.054),
            pension2_rate: dec!(0.04),
            ei_max_insurable: ei_max,
            ei_rate: ei_rate_qc,
            ei_employer_multiplier: dec!(1.4),
            qpip_max_insurable: qpip_max,
            qpip_rate: dec!(0.00494),
            qpip_employer_rate: dec!(0.00692),
        }
    } else {
        PayrollParameters {
            ympe,
            yampe,
            basic_exemption: dec!(3_500),
            pension_rate: dec!(0.0595),
            pension_base_rate: dec!(0.0495),
            pension2_rate: dec!(0.04),
            ei_max_insurable: ei_max,
            ei_rate,
            ei_employer_multiplier: dec!(1.4),
            qpip_max_insurable: Decimal::ZERO,
            qpip_rate: Decimal::ZERO,
            qpip_employer_rate: Decimal::ZERO,
        }
    };
    Some(params)
}

pub(crate) fn retirement_parameters(year: i32) -> Option<RetirementParameters> {
    let (rrsp, oas_monthly, oas_threshold) = match year {
        2025 => (dec!(32_490), dec!(727.67), dec!(93_454)),
        2026 => (dec!(33_810), dec!(742.31), dec!(95_323)),
        _ => return None,
    };
    Some(RetirementParameters {
        rrsp_limit: rrsp,
        tfsa_limit: dec!(7_000),
        db_pension_limit: (rrsp / dec!(9)).round_dp(2),
        oas_max_monthly: oas_monthly,
        oas_clawback_threshold: oas_threshold,
    })
}

pub(crate) fn corporate_rates(provincial: &ProvincialTable) -> CorporateRates {
    CorporateRates {
        small_business_rate: FEDERAL_SMALL_BUSINESS_RATE + provincial.small_business_rate,
        general_rate: FEDERAL_GENERAL_RATE + provincial.general_rate,
        passive_investment_rate: FEDERAL_INVESTMENT_RATE + provincial.general_rate,
        business_limit: dec!(500_000),
        refundable_investment_rate: dec!(0.3067),
        part_iv_rate: dec!(0.3833),
        rdtoh_refund_rate: dec!(0.3833),
        grip_rate: dec!(0.72),
        capital_gains_inclusion: dec!(0.5),
        foreign_withholding_rate: dec!(0.15),
    }
}

pub(crate) fn provincial_table(province: Province, year: i32) -> Option<ProvincialTable> {
    if !(FIRST_PUBLISHED_YEAR..=LAST_PUBLISHED_YEAR).contains(&year) {
        return None;
    }
    let latest = year == LAST_PUBLISHED_YEAR;
    let t = match province {
        Province::Ontario => {
            let rows: &[(Money, Rate)] = if latest {
                &[
                    (dec!(0), dec!(0.0505)),
                    (dec!(53_891), dec!(0.0915)),
                    (dec!(107_785), dec!(0.1116)),
                    (dec!(150_000), dec!(0.1216)),
                    (dec!(220_000), dec!(0.1316)),
                ]
            } else {
                &[
                    (dec!(0), dec!(0.0505)),
                    (dec!(52_886), dec!(0.0915)),
                    (dec!(105_775), dec!(0.1116)),
                    (dec!(150_000), dec!(0.1216)),
                    (dec!(220_000), dec!(0.1316)),
                ]
            };
            let bpa = if latest { dec!(12_989) } else { dec!(12_747) };
            let (s1, s2) = if latest {
                (dec!(5_818), dec!(7_446))
            } else {
                (dec!(5_710), dec!(7_307))
            };
            let mut t = table(
                provincial_schedule(
                    brackets_with_frozen(rows, &[dec!(150_000), dec!(220_000)]),
                    bpa,
                    dec!(0.10),
                    dec!(0.029863),
                ),
                dec!(0.032),
                dec!(0.115),
            );
            t.surtax = Some(Surtax {
                first_threshold: s1,
                first_rate: dec!(0.20),
                second_threshold: s2,
                second_rate: dec!(0.36),
            });
            t.health_premium = ontario_health_premium();
            t
        }
        Province::BritishColumbia => {
            let rows: &[(Money, Rate)] = if latest {
                &[
                    (dec!(0), dec!(0.056)),
                    (dec!(50_363), dec!(0.077)),
                    (dec!(100_728), dec!(0.105)),
                    (dec!(115_648), dec!(0.1229)),
                    (dec!(140_430), dec!(0.147)),
                    (dec!(190_405), dec!(0.168)),
                    (dec!(265_545), dec!(0.205)),
                ]
            } else {
                &[
                    (dec!(0), dec!(0.0506)),
                    (dec!(49_279), dec!(0.077)),
                    (dec!(98_560), dec!(0.105)),
                    (dec!(113_158), dec!(0.1229)),
                    (dec!(137_407), dec!(0.147)),
                    (dec!(186_306), dec!(0.168)),
                    (dec!(259_829), dec!(0.205)),
                ]
            };
            let bpa = if latest { dec!(13_216) } else { dec!(12_932) };
            table(
                provincial_schedule(brackets(rows), bpa, dec!(0.12), dec!(0.0196)),
                dec!(0.02),
                dec!(0.12),
            )
        }
        Province::Alberta => {
            let rows: &[(Money, Rate)] = if latest {
                &[
                    (dec!(0), dec!(0.08)),
                    (dec!(61_200), dec!(0.10)),
                    (dec!(154_259), dec!(0.12)),
                    (dec!(185_111), dec!(0.13)),
                    (dec!(246_813), dec!(0.14)),
                    (dec!(370_220), dec!(0.15)),
                ]
            } else {
                &[
                    (dec!(0), dec!(0.08)),
                    (dec!(60_000), dec!(0.10)),
                    (dec!(151_234), dec!(0.12)),
                    (dec!(181_481), dec!(0.13)),
                    (dec!(241_974), dec!(0.14)),
                    (dec!(362_961), dec!(0.15)),
                ]
            };
            let bpa = if latest { dec!(22_769) } else { dec!(22_323) };
            table(
                provincial_schedule(brackets(rows), bpa, dec!(0.0812), dec!(0.0218)),
                dec!(0.02),
                dec!(0.08),
            )
        }
        Province::Quebec => {
            let rows: &[(Money, Rate)] = if latest {
                &[
                    (dec!(0), dec!(0.14)),
                    (dec!(54_345), dec!(0.19)),
                    (dec!(108_680), dec!(0.24)),
                    (dec!(132_245), dec!(0.2575)),
                ]
            } else {
                &[
                    (dec!(0), dec!(0.14)),
                    (dec!(53_255), dec!(0.19)),
                    (dec!(106_495), dec!(0.24)),
                    (dec!(129_590), dec!(0.2575)),
                ]
            };
            let bpa = if latest { dec!(18_952) } else { dec!(18_571) };
            table(
                provincial_schedule(brackets(rows), bpa, dec!(0.117), dec!(0.0342)),
                dec!(0.032),
                dec!(0.115),
            )
        }
        Province::Manitoba => {
            let mut t = table(
                provincial_schedule(
                    brackets(&[
                        (dec!(0), dec!(0.108)),
                        (dec!(47_000), dec!(0.1275)),
                        (dec!(100_000), dec!(0.174)),
                    ]),
                    dec!(15_780),
                    dec!(0.08),
                    dec!(0.007835),
                ),
                dec!(0),
                dec!(0.12),
            );
            t.indexation = ProvincialIndexation::Frozen;
            t
        }
        Province::Saskatchewan => {
            let rows: &[(Money, Rate)] = if latest {
                &[
                    (dec!(0), dec!(0.105)),
                    (dec!(54_532), dec!(0.125)),
                    (dec!(155_805), dec!(0.145)),
                ]
            } else {
                &[
                    (dec!(0), dec!(0.105)),
                    (dec!(53_463), dec!(0.125)),
                    (dec!(152_750), dec!(0.145)),
                ]
            };
            let bpa = if latest { dec!(20_381) } else { dec!(19_491) };
            table(
                provincial_schedule(brackets(rows), bpa, dec!(0.11), dec!(0.02938)),
                dec!(0.01),
                dec!(0.12),
            )
        }
        Province::NovaScotia => {
            let rows: &[(Money, Rate)] = if latest {
                &[
                    (dec!(0), dec!(0.0879)),
                    (dec!(30_995), dec!(0.1495)),
                    (dec!(61_991), dec!(0.1667)),
                    (dec!(97_417), dec!(0.175)),
                    (dec!(157_124), dec!(0.21)),
                ]
            } else {
                &[
                    (dec!(0), dec!(0.0879)),
                    (dec!(30_507), dec!(0.1495)),
                    (dec!(61_015), dec!(0.1667)),
                    (dec!(95_883), dec!(0.175)),
                    (dec!(154_650), dec!(0.21)),
                ]
            };
            let bpa = if latest { dec!(11_932) } else { dec!(11_744) };
            table(
                provincial_schedule(brackets(rows), bpa, dec!(0.0885), dec!(0.015)),
                dec!(0.015),
                dec!(0.14),
            )
        }
        Province::NewBrunswick => {
            let rows: &[(Money, Rate)] = if latest {
                &[
                    (dec!(0), dec!(0.094)),
                    (dec!(52_333), dec!(0.14)),
                    (dec!(104_666), dec!(0.16)),
                    (dec!(193_861), dec!(0.195)),
                ]
            } else {
                &[
                    (dec!(0), dec!(0.094)),
                    (dec!(51_306), dec!(0.14)),
                    (dec!(102_614), dec!(0.16)),
                    (dec!(190_060), dec!(0.195)),
                ]
            };
            let bpa = if latest { dec!(13_664) } else { dec!(13_396) };
            table(
                provincial_schedule(brackets(rows), bpa, dec!(0.14), dec!(0.0275)),
                dec!(0.025),
                dec!(0.14),
            )
        }
        Province::NewfoundlandAndLabrador => {
            let rows: &[(Money, Rate)] = if latest {
                &[
                    (dec!(0), dec!(0.087)),
                    (dec!(44_678), dec!(0.145)),
                    (dec!(89_354), dec!(0.158)),
                    (dec!(159_528), dec!(0.178)),
                    (dec!(223_340), dec!(0.198)),
                    (dec!(285_319), dec!(0.208)),
                    (dec!(570_638), dec!(0.213)),
                    (dec!(1_141_275), dec!(0.218)),
                ]
            } else {
                &[
                    (dec!(0), dec!(0.087)),
                    (dec!(44_192), dec!(0.145)),
                    (dec!(88_382), dec!(0.158)),
                    (dec!(157_792), dec!(0.178)),
                    (dec!(220_910), dec!(0.198)),
                    (dec!(282_214), dec!(0.208)),
                    (dec!(564_429), dec!(0.213)),
                    (dec!(1_128_858), dec!(0.218)),
                ]
            };
            let bpa = if latest { dec!(11_188) } else { dec!(11_067) };
            table(
                provincial_schedule(brackets(rows), bpa, dec!(0.063), dec!(0.032)),
                dec!(0.025),
                dec!(0.15),
            )
        }
        Province::PrinceEdwardIsland => {
            let rows: &[(Money, Rate)] = if latest {
                &[
                    (dec!(0), dec!(0.095)),
                    (dec!(33_928), dec!(0.1347)),
                    (dec!(65_820), dec!(0.166)),
                    (dec!(106_890), dec!(0.1762)),
                    (dec!(142_250), dec!(0.19)),
                ]
            } else {
                &[
                    (dec!(0), dec!(0.095)),
                    (dec!(33_328), dec!(0.1347)),
                    (dec!(64_656), dec!(0.166)),
                    (dec!(105_000), dec!(0.1762)),
                    (dec!(140_000), dec!(0.19)),
                ]
            };
            let bpa = if latest { dec!(15_000) } else { dec!(14_650) };
            table(
                provincial_schedule(brackets(rows), bpa, dec!(0.105), dec!(0.013)),
                dec!(0.01),
                dec!(0.16),
            )
        }
    };
    Some(t)
}
