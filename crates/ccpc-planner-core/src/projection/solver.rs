use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Default cap for salary-style solves.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;
/// Default convergence tolerance (one cent).
pub const DEFAULT_TOLERANCE: Money = dec!(0.01);

/// Result of a bounded fixed-point iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutcome {
    pub value: Money,
    pub iterations: u32,
    pub converged: bool,
    /// |x_n - x_(n-1)| at the last step.
    pub last_delta: Money,
}

/// Iterate `x = step(x)` from `initial` until successive values differ by at
/// most `tolerance` or `max_iterations` is reached. Never loops unboundedly.
pub fn fixed_point<F>(
    initial: Money,
    tolerance: Money,
    max_iterations: u32,
    mut step: F,
) -> SolverOutcome
where
    F: FnMut(Money) -> Money,
{
    let mut x = initial;
    let mut delta = Decimal::MAX;
    for i in 1..=max_iterations {
        let next = step(x);
        delta = (next - x).abs();
        x = next;
        if delta <= tolerance {
            return SolverOutcome {
                value: x,
                iterations: i,
                converged: true,
                last_delta: delta,
            };
        }
    }
    SolverOutcome {
        value: x,
        iterations: max_iterations,
        converged: false,
        last_delta: if max_iterations == 0 { Decimal::ZERO } else { delta },
    }
}

/// Find `x` with `evaluate(x) = target` for a monotone increasing `evaluate`
/// whose slope lies in (0, 1], by stepping `x += target - evaluate(x)`.
pub fn solve_for_target<F>(
    target: Money,
    initial: Money,
    tolerance: Money,
    max_iterations: u32,
    mut evaluate: F,
) -> SolverOutcome
where
    F: FnMut(Money) -> Money,
{
    fixed_point(initial, tolerance, max_iterations, |x| {
        (x + target - evaluate(x)).max(Decimal::ZERO)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_contraction_converges() {
        // x = 0.5x + 10 -> 20
        let out = fixed_point(Decimal::ZERO, dec!(0.0001), 100, |x| x * dec!(0.5) + dec!(10));
        assert!(out.converged);
        assert!((out.value - dec!(20)).abs() < dec!(0.001));
        assert!(out.iterations < 100);
    }

    #[test]
    fn test_fixed_point_reports_non_convergence() {
        // x = x + 1 never settles
        let out = fixed_point(Decimal::ZERO, dec!(0.01), 5, |x| x + Decimal::ONE);
        assert!(!out.converged);
        assert_eq!(out.iterations, 5);
        assert_eq!(out.value, dec!(5));
        assert_eq!(out.last_delta, Decimal::ONE);
    }

    #[test]
    fn test_solve_for_target_linear_tax() {
        // Net = 0.7 * gross; need 70,000 net -> 100,000 gross
        let out = solve_for_target(dec!(70_000), dec!(70_000), dec!(0.01), 50, |g| g * dec!(0.7));
        assert!(out.converged);
        assert!((out.value - dec!(100_000)).abs() < dec!(0.05));
    }

    #[test]
    fn test_zero_iterations_not_converged() {
        let out = fixed_point(dec!(3), dec!(0.01), 0, |x| x);
        assert!(!out.converged);
        assert_eq!(out.value, dec!(3));
    }
}
