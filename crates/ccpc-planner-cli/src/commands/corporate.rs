use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use ccpc_planner_core::corporate::corporate_tax::{
    calculate_corporate_income_tax, CorporateTaxInput,
};
use ccpc_planner_core::dividends::waterfall::{calculate_dividend_waterfall, WaterfallInput};
use ccpc_planner_core::types::Province;

use super::{current_year, parse_province};
use crate::input;

/// Arguments for corporate tax on active business income
#[derive(Args)]
pub struct CorporateTaxArgs {
    /// Active business income after owner compensation
    #[arg(long, allow_hyphen_values = true)]
    pub active_income: Decimal,

    /// Adjusted aggregate investment income (drives the SBD grind)
    #[arg(long, default_value = "0")]
    pub aaii: Decimal,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long, default_value = "ON", value_parser = parse_province)]
    pub province: Province,

    #[arg(long, default_value = "0.02")]
    pub inflation: Decimal,
}

/// Arguments for the dividend waterfall
#[derive(Args)]
pub struct WaterfallArgs {
    /// Path to a WaterfallInput file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_corporate_tax(args: CorporateTaxArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let corp_input = CorporateTaxInput {
        year: args.year.unwrap_or_else(current_year),
        province: args.province,
        inflation_rate: args.inflation,
        active_income: args.active_income,
        aaii: args.aaii,
    };
    let result = calculate_corporate_income_tax(&corp_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_waterfall(args: WaterfallArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let wf_input: WaterfallInput = input::read_input(args.input.as_deref(), "the dividend waterfall")?;
    let result = calculate_dividend_waterfall(&wf_input)?;
    Ok(serde_json::to_value(result)?)
}
