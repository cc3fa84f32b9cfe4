use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use ccpc_planner_core::payroll::contributions::{calculate_payroll_taxes, PayrollInput};
use ccpc_planner_core::personal_tax::income_tax::{
    calculate_personal_income_tax, PersonalIncome, PersonalTaxInput,
};
use ccpc_planner_core::types::Province;

use super::{current_year, parse_province};
use crate::input;

/// Arguments for payroll contributions
#[derive(Args)]
pub struct PayrollArgs {
    /// Gross annual salary
    #[arg(long)]
    pub salary: Decimal,

    /// Tax year (defaults to the current year)
    #[arg(long)]
    pub year: Option<i32>,

    /// Two-letter province code (QC switches to QPP/QPIP)
    #[arg(long, default_value = "ON", value_parser = parse_province)]
    pub province: Province,

    /// Inflation rate for projected years
    #[arg(long, default_value = "0.02")]
    pub inflation: Decimal,
}

/// Arguments for personal income tax
#[derive(Args)]
pub struct PersonalTaxArgs {
    /// Path to a PersonalTaxInput file; flags are ignored when given
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long, default_value = "0")]
    pub salary: Decimal,

    /// Actual (not grossed-up) eligible dividends
    #[arg(long, default_value = "0")]
    pub eligible_dividends: Decimal,

    /// Actual (not grossed-up) non-eligible dividends
    #[arg(long, default_value = "0")]
    pub non_eligible_dividends: Decimal,

    /// Tax-free capital dividends
    #[arg(long, default_value = "0")]
    pub capital_dividends: Decimal,

    /// Pension, RRIF and other fully taxable income
    #[arg(long, default_value = "0")]
    pub other_income: Decimal,

    #[arg(long, default_value = "0")]
    pub rrsp_deduction: Decimal,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long, default_value = "ON", value_parser = parse_province)]
    pub province: Province,

    #[arg(long, default_value = "0.02")]
    pub inflation: Decimal,
}

pub fn run_payroll(args: PayrollArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let payroll_input = PayrollInput {
        year: args.year.unwrap_or_else(current_year),
        province: args.province,
        salary: args.salary,
        inflation_rate: args.inflation,
    };
    let result = calculate_payroll_taxes(&payroll_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_personal_tax(args: PersonalTaxArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let tax_input: PersonalTaxInput = if args.input.is_some() {
        input::read_input(args.input.as_deref(), "personal tax")?
    } else {
        PersonalTaxInput {
            year: args.year.unwrap_or_else(current_year),
            province: args.province,
            inflation_rate: args.inflation,
            income: PersonalIncome {
                salary: args.salary,
                eligible_dividends: args.eligible_dividends,
                non_eligible_dividends: args.non_eligible_dividends,
                capital_dividends: args.capital_dividends,
                other_income: args.other_income,
                rrsp_deduction: args.rrsp_deduction,
                other_deductions: Decimal::ZERO,
            },
        }
    };
    let result = calculate_personal_income_tax(&tax_input)?;
    Ok(serde_json::to_value(result)?)
}
