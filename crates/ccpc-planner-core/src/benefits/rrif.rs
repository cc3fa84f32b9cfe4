use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PlannerError;
use crate::types::{round_cents, with_metadata, ComputationOutput, Money, Rate};
use crate::PlannerResult;

/// An RRSP must be converted to a RRIF by the end of the year the
/// annuitant turns 71.
pub const RRIF_CONVERSION_AGE: u32 = 71;

/// Prescribed minimum rates from age 71 to 94; 95 and over is 20%.
const PRESCRIBED_RATES: [(u32, Rate); 24] = [
    (71, dec!(0.0528)),
    (72, dec!(0.0540)),
    (73, dec!(0.0553)),
    (74, dec!(0.0567)),
    (75, dec!(0.0582)),
    (76, dec!(0.0598)),
    (77, dec!(0.0617)),
    (78, dec!(0.0636)),
    (79, dec!(0.0658)),
    (80, dec!(0.0682)),
    (81, dec!(0.0708)),
    (82, dec!(0.0738)),
    (83, dec!(0.0771)),
    (84, dec!(0.0808)),
    (85, dec!(0.0851)),
    (86, dec!(0.0899)),
    (87, dec!(0.0955)),
    (88, dec!(0.1021)),
    (89, dec!(0.1099)),
    (90, dec!(0.1192)),
    (91, dec!(0.1306)),
    (92, dec!(0.1449)),
    (93, dec!(0.1634)),
    (94, dec!(0.1879)),
];
const FINAL_RATE: Rate = dec!(0.20);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrifYear {
    pub age: u32,
    pub opening_balance: Money,
    pub minimum_rate: Rate,
    pub withdrawal: Money,
    pub growth: Money,
    pub closing_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrifSchedule {
    pub years: Vec<RrifYear>,
    pub total_withdrawals: Money,
    pub final_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RrifInput {
    pub balance: Money,
    pub age: u32,
    pub years: u32,
    #[serde(default)]
    pub return_rate: Rate,
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Minimum withdrawal rate at `age` (age on January 1). Below 71 the rate is
/// 1 / (90 - age).
pub fn rrif_minimum_rate(age: u32) -> Rate {
    if age < RRIF_CONVERSION_AGE {
        return Decimal::ONE / Decimal::from(90 - age.min(89));
    }
    PRESCRIBED_RATES
        .iter()
        .find(|(a, _)| *a == age)
        .map(|(_, rate)| *rate)
        .unwrap_or(FINAL_RATE)
}

pub fn rrif_minimum_withdrawal(balance: Money, age: u32) -> Money {
    if balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_cents(balance * rrif_minimum_rate(age))
}

/// Year-by-year minimum withdrawals. Withdrawals come off the opening
/// balance; growth accrues on what remains.
pub fn project_rrif(
    balance: Money,
    start_age: u32,
    years: u32,
    return_rate: Rate,
) -> RrifSchedule {
    let mut rows = Vec::with_capacity(years as usize);
    let mut opening = balance.max(Decimal::ZERO);
    let mut total = Decimal::ZERO;
    for offset in 0..years {
        let age = start_age + offset;
        let minimum_rate = rrif_minimum_rate(age);
        let withdrawal = rrif_minimum_withdrawal(opening, age);
        let growth = round_cents((opening - withdrawal) * return_rate);
        let closing = (opening - withdrawal + growth).max(Decimal::ZERO);
        total += withdrawal;
        rows.push(RrifYear {
            age,
            opening_balance: opening,
            minimum_rate,
            withdrawal,
            growth,
            closing_balance: closing,
        });
        opening = closing;
    }
    RrifSchedule {
        years: rows,
        total_withdrawals: total,
        final_balance: opening,
    }
}

/// Standalone RRIF schedule, wrapped in the standard output envelope.
pub fn calculate_rrif_schedule(
    input: &RrifInput,
) -> PlannerResult<ComputationOutput<RrifSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.balance < Decimal::ZERO {
        return Err(PlannerError::InvalidInput {
            field: "balance".into(),
            reason: "must be >= 0".into(),
        });
    }
    if input.age < RRIF_CONVERSION_AGE {
        warnings.push(format!(
            "Age {} is before mandatory conversion; minimums use 1/(90 - age)",
            input.age
        ));
    }

    let result = project_rrif(input.balance, input.age, input.years, input.return_rate);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "RRIF prescribed minimum withdrawals (20% from age 95)",
        &serde_json::json!({
            "start_age": input.age,
            "return_rate": input.return_rate.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prescribed_rates() {
        assert_eq!(rrif_minimum_rate(71), dec!(0.0528));
        assert_eq!(rrif_minimum_rate(80), dec!(0.0682));
        assert_eq!(rrif_minimum_rate(94), dec!(0.1879));
        assert_eq!(rrif_minimum_rate(95), dec!(0.20));
        assert_eq!(rrif_minimum_rate(103), dec!(0.20));
    }

    #[test]
    fn test_rate_before_conversion() {
        // 1 / (90 - 65) = 4%
        assert_eq!(rrif_minimum_rate(65), dec!(0.04));
    }

    #[test]
    fn test_minimum_withdrawal() {
        assert_eq!(rrif_minimum_withdrawal(dec!(100_000), 71), dec!(5_280));
        assert_eq!(rrif_minimum_withdrawal(Decimal::ZERO, 80), Decimal::ZERO);
    }

    #[test]
    fn test_rates_increase_with_age() {
        for age in 71..100 {
            assert!(rrif_minimum_rate(age + 1) >= rrif_minimum_rate(age));
        }
    }

    #[test]
    fn test_schedule_balance_flow() {
        let s = project_rrif(dec!(500_000), 71, 3, dec!(0.05));
        assert_eq!(s.years.len(), 3);
        let first = &s.years[0];
        assert_eq!(first.withdrawal, dec!(26_400));
        // (500,000 - 26,400) * 5%
        assert_eq!(first.growth, dec!(23_680));
        assert_eq!(first.closing_balance, dec!(497_280));
        assert_eq!(s.years[1].opening_balance, first.closing_balance);
        assert_eq!(s.final_balance, s.years[2].closing_balance);
    }

    #[test]
    fn test_entry_point_warns_before_71() {
        let input = RrifInput {
            balance: dec!(100_000),
            age: 65,
            years: 2,
            return_rate: dec!(0.04),
        };
        let out = calculate_rrif_schedule(&input).unwrap();
        assert_eq!(out.warnings.len(), 1);
    }
}
