use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{Money, Rate};

/// Compute (1 + r)^n via iterative multiplication (avoids Decimal::powd drift).
pub fn compound(rate: Rate, n: u32) -> Decimal {
    let mut result = Decimal::ONE;
    let factor = Decimal::ONE + rate;
    for _ in 0..n {
        result *= factor;
    }
    result
}

/// Discount factor: 1 / (1 + r)^n. Returns zero when the compounded factor
/// collapses to zero (r = -100%).
pub fn discount_factor(rate: Rate, n: u32) -> Decimal {
    let c = compound(rate, n);
    if c.is_zero() {
        return Decimal::ZERO;
    }
    Decimal::ONE / c
}

/// Present-value factor of an annuity-due paying 1 at the start of each of
/// `n` periods: sum_{t=0..n-1} 1/(1+r)^t.
pub fn annuity_due_factor(rate: Rate, n: u32) -> Decimal {
    let mut total = Decimal::ZERO;
    let mut df = Decimal::ONE;
    let factor = Decimal::ONE + rate;
    if factor <= Decimal::ZERO {
        return Decimal::from(n);
    }
    for _ in 0..n {
        total += df;
        df /= factor;
    }
    total
}

/// Grow an amount by `rate` for `years` periods.
pub fn grow(amount: Money, rate: Rate, years: u32) -> Money {
    amount * compound(rate, years)
}

/// Divide, returning `fallback` when the denominator is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal, fallback: Decimal) -> Decimal {
    if denominator.is_zero() {
        fallback
    } else {
        numerator / denominator
    }
}

/// Gross amount needed so that `net` remains after a flat `rate`:
/// net / (1 - rate). Rates at or above 100% yield zero.
pub fn gross_up_for_rate(net: Money, rate: Rate) -> Money {
    let keep = Decimal::ONE - rate;
    if keep <= dec!(0) || net <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    net / keep
}
