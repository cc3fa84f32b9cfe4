use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use ccpc_planner_core::tax_data::get_tax_year_data;
use ccpc_planner_core::types::Province;

use super::{current_year, parse_province};

/// Arguments for printing a year's tax constants
#[derive(Args)]
pub struct TaxDataArgs {
    /// Tax year (defaults to the current year)
    #[arg(long)]
    pub year: Option<i32>,

    /// Two-letter province code
    #[arg(long, default_value = "ON", value_parser = parse_province)]
    pub province: Province,

    /// Inflation rate used to project years past the published tables
    #[arg(long, default_value = "0.02")]
    pub inflation: Decimal,
}

pub fn run_tax_data(args: TaxDataArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let year = args.year.unwrap_or_else(current_year);
    let data = get_tax_year_data(year, args.inflation, args.province)?;
    Ok(serde_json::json!({ "result": data }))
}
