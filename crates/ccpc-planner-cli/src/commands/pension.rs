use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use ccpc_planner_core::pension::ipp::{calculate_ipp, IppAssumptions, IppInput};

use super::current_year;

/// Arguments for an IPP contribution estimate
#[derive(Args)]
pub struct IppArgs {
    /// Salary paid by the corporation
    #[arg(long)]
    pub salary: Decimal,

    #[arg(long)]
    pub age: u32,

    #[arg(long, default_value = "65")]
    pub retirement_age: u32,

    /// Valuation interest rate
    #[arg(long, default_value = "0.075")]
    pub discount_rate: Decimal,

    /// Years the pension is assumed to be paid
    #[arg(long, default_value = "20")]
    pub payout_years: u32,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long, default_value = "0.02")]
    pub inflation: Decimal,
}

pub fn run_ipp(args: IppArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let ipp_input = IppInput {
        year: args.year.unwrap_or_else(current_year),
        inflation_rate: args.inflation,
        age: args.age,
        salary: args.salary,
        assumptions: IppAssumptions {
            discount_rate: args.discount_rate,
            payout_years: args.payout_years,
            retirement_age: args.retirement_age,
        },
    };
    let result = calculate_ipp(&ipp_input)?;
    Ok(serde_json::to_value(result)?)
}
