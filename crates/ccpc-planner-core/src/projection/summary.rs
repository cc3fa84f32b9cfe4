use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::investment::accounts::NotionalAccounts;
use crate::projection::engine::YearlyResult;
use crate::time_value::safe_div;
use crate::types::{round_cents, Money, Rate};

/// Whole-horizon totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub years: u32,
    pub total_salary: Money,
    pub total_capital_dividends: Money,
    pub total_eligible_dividends: Money,
    pub total_non_eligible_dividends: Money,
    pub total_dividends: Money,
    pub total_personal_tax: Money,
    pub total_corporate_tax: Money,
    /// Employee CPP/QPP, CPP2/QPP2, EI and QPIP.
    pub total_payroll: Money,
    pub total_employer_payroll: Money,
    pub total_tax: Money,
    pub total_rdtoh_refund: Money,
    pub total_after_tax_income: Money,
    pub average_after_tax_income: Money,
    /// Total tax over after-tax income plus total tax.
    pub average_effective_tax_rate: Rate,
    pub total_retirement_income: Money,
    pub total_ipp_contributions: Money,
    pub final_accounts: NotionalAccounts,
    pub final_rrsp_balance: Money,
    pub final_ipp_balance: Money,
    pub final_debt_balance: Money,
    pub final_rrsp_room: Money,
    pub years_with_shortfall: Vec<i32>,
    pub total_shortfall: Money,
    pub total_spouse_dividends: Money,
    pub total_spouse_tax: Money,
    pub household_after_tax_income: Money,
    pub household_tax: Money,
}

/// Fold the yearly rows into totals. An empty slice gives an all-zero
/// summary.
pub fn summarize(years: &[YearlyResult]) -> ProjectionSummary {
    let mut s = ProjectionSummary {
        years: years.len() as u32,
        ..Default::default()
    };

    for y in years {
        s.total_salary += y.salary;
        s.total_capital_dividends += y.dividends.capital_dividends;
        s.total_eligible_dividends += y.dividends.eligible_dividends;
        s.total_non_eligible_dividends += y.dividends.non_eligible_dividends;
        s.total_dividends += y.dividends.gross_dividends;
        s.total_personal_tax += y.personal_tax;
        s.total_corporate_tax += y.corporate_tax;
        s.total_payroll += y.cpp + y.cpp2 + y.ei + y.qpip;
        s.total_employer_payroll += y.employer_payroll;
        s.total_tax += y.total_tax;
        s.total_rdtoh_refund += y.rdtoh_refund;
        s.total_after_tax_income += y.after_tax_income;
        s.total_retirement_income += y.retirement_income;
        s.total_ipp_contributions += y.ipp_contribution;
        s.total_shortfall += y.shortfall;
        if y.shortfall > Decimal::ZERO {
            s.years_with_shortfall.push(y.year);
        }
        if let Some(spouse) = &y.spouse {
            s.total_spouse_dividends += spouse.dividends.gross_dividends;
            s.total_spouse_tax += spouse.personal_tax;
            s.total_rdtoh_refund += spouse.rdtoh_refund;
        }
        s.household_after_tax_income += y.household_after_tax_income;
        s.household_tax += y.household_tax;
    }

    if let Some(last) = years.last() {
        s.final_accounts = last.accounts.clone();
        s.final_rrsp_balance = last.rrsp_balance;
        s.final_ipp_balance = last.ipp_balance;
        s.final_debt_balance = last.debt_balance;
        s.final_rrsp_room = last.rrsp_room;
    }

    s.average_after_tax_income = round_cents(safe_div(
        s.total_after_tax_income,
        Decimal::from(s.years),
        Decimal::ZERO,
    ));
    s.average_effective_tax_rate = safe_div(
        s.total_tax,
        s.total_after_tax_income + s.total_tax,
        Decimal::ZERO,
    );
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dividends::waterfall::DividendFunding;
    use rust_decimal_macros::dec;

    fn row(year: i32, salary: Money, dividends: Money, tax: Money, shortfall: Money) -> YearlyResult {
        YearlyResult {
            year,
            salary,
            dividends: DividendFunding {
                non_eligible_dividends: dividends,
                regular_dividends: dividends,
                gross_dividends: dividends,
                ..Default::default()
            },
            personal_tax: tax,
            total_tax: tax,
            after_tax_income: salary + dividends - tax,
            household_after_tax_income: salary + dividends - tax,
            household_tax: tax,
            shortfall,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_summary() {
        let s = summarize(&[]);
        assert_eq!(s.years, 0);
        assert_eq!(s.total_tax, Decimal::ZERO);
        assert_eq!(s.average_after_tax_income, Decimal::ZERO);
        assert_eq!(s.average_effective_tax_rate, Decimal::ZERO);
    }

    #[test]
    fn test_totals_and_averages() {
        let rows = vec![
            row(2026, dec!(50_000), dec!(30_000), dec!(20_000), Decimal::ZERO),
            row(2027, dec!(50_000), dec!(50_000), dec!(25_000), dec!(1_200)),
        ];
        let s = summarize(&rows);
        assert_eq!(s.years, 2);
        assert_eq!(s.total_salary, dec!(100_000));
        assert_eq!(s.total_non_eligible_dividends, dec!(80_000));
        assert_eq!(s.total_dividends, dec!(80_000));
        assert_eq!(s.total_tax, dec!(45_000));
        assert_eq!(s.total_after_tax_income, dec!(135_000));
        assert_eq!(s.average_after_tax_income, dec!(67_500));
        // 45,000 / 180,000
        assert_eq!(s.average_effective_tax_rate, dec!(0.25));
        assert_eq!(s.years_with_shortfall, vec![2027]);
        assert_eq!(s.total_shortfall, dec!(1_200));
    }
}
