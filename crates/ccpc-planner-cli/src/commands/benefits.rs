use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use ccpc_planner_core::benefits::cpp_benefit::{calculate_cpp_benefit, CppBenefitInput};
use ccpc_planner_core::benefits::oas::{calculate_oas, OasInput};
use ccpc_planner_core::benefits::rrif::{calculate_rrif_schedule, RrifInput};

use super::current_year;

/// Arguments for a CPP retirement pension estimate
#[derive(Args)]
pub struct CppBenefitArgs {
    #[arg(long)]
    pub current_age: u32,

    /// Age pensionable earnings began
    #[arg(long, default_value = "22")]
    pub salary_start_age: u32,

    /// Age the pension starts (60 to 70)
    #[arg(long, default_value = "65")]
    pub cpp_start_age: u32,

    /// Level annual salary in today's dollars
    #[arg(long)]
    pub salary: Decimal,

    /// Age contributions stop, if before the pension starts
    #[arg(long)]
    pub retirement_age: Option<u32>,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long, default_value = "0.02")]
    pub inflation: Decimal,
}

/// Arguments for OAS
#[derive(Args)]
pub struct OasArgs {
    #[arg(long)]
    pub age: u32,

    /// Age OAS starts (65 to 70)
    #[arg(long, default_value = "65")]
    pub start_age: u32,

    /// Net income other than OAS
    #[arg(long, default_value = "0")]
    pub other_income: Decimal,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long, default_value = "0.02")]
    pub inflation: Decimal,
}

/// Arguments for a RRIF schedule
#[derive(Args)]
pub struct RrifArgs {
    /// Opening RRIF balance
    #[arg(long)]
    pub balance: Decimal,

    /// Age on January 1 of the first year
    #[arg(long)]
    pub age: u32,

    /// Number of years to schedule
    #[arg(long, default_value = "10")]
    pub years: u32,

    /// Annual return on the remaining balance
    #[arg(long, default_value = "0.05", allow_hyphen_values = true)]
    pub return_rate: Decimal,
}

pub fn run_cpp_benefit(args: CppBenefitArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let cpp_input = CppBenefitInput {
        year: args.year.unwrap_or_else(current_year),
        inflation_rate: args.inflation,
        current_age: args.current_age,
        salary_start_age: args.salary_start_age,
        cpp_start_age: args.cpp_start_age,
        annual_salary: args.salary,
        retirement_age: args.retirement_age,
    };
    let result = calculate_cpp_benefit(&cpp_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_oas(args: OasArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let oas_input = OasInput {
        year: args.year.unwrap_or_else(current_year),
        inflation_rate: args.inflation,
        age: args.age,
        oas_start_age: args.start_age,
        other_income: args.other_income,
    };
    let result = calculate_oas(&oas_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_rrif(args: RrifArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let rrif_input = RrifInput {
        balance: args.balance,
        age: args.age,
        years: args.years,
        return_rate: args.return_rate,
    };
    let result = calculate_rrif_schedule(&rrif_input)?;
    Ok(serde_json::to_value(result)?)
}
