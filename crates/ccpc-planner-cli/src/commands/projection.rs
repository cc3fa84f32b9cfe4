use clap::{Args, ValueEnum};
use serde_json::{json, Value};

use ccpc_planner_core::projection::{calculate_projection, UserInputs, YearlyResult};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProjectView {
    /// Complete output envelope
    Full,
    /// One flat row per year
    Years,
    /// Horizon totals only
    Summary,
}

/// Arguments for a multi-year projection
#[derive(Args)]
pub struct ProjectArgs {
    /// Path to a UserInputs file (JSON, or YAML by extension)
    #[arg(long)]
    pub input: Option<String>,

    /// Which part of the projection to print
    #[arg(long, default_value = "full")]
    pub view: ProjectView,

    /// Override the number of years projected
    #[arg(long)]
    pub horizon: Option<u32>,
}

fn year_row(y: &YearlyResult) -> Value {
    json!({
        "year": y.year,
        "age": y.age,
        "required": y.required_income,
        "salary": y.salary,
        "capital_div": y.dividends.capital_dividends,
        "eligible_div": y.dividends.eligible_dividends,
        "non_eligible_div": y.dividends.non_eligible_dividends,
        "retirement_income": y.retirement_income,
        "personal_tax": y.personal_tax,
        "corporate_tax": y.corporate_tax,
        "payroll": y.cpp + y.cpp2 + y.ei + y.qpip,
        "total_tax": y.total_tax,
        "after_tax": y.after_tax_income,
        "rdtoh_refund": y.rdtoh_refund,
        "investments": y.accounts.corporate_investments,
        "cda": y.accounts.cda,
        "rdtoh": y.accounts.total_rdtoh(),
        "grip": y.accounts.grip,
    })
}

pub fn run_project(args: ProjectArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut inputs: UserInputs = input::read_input(args.input.as_deref(), "a projection")?;
    if let Some(horizon) = args.horizon {
        inputs.horizon_years = horizon;
    }
    tracing::info!(
        province = inputs.province.code(),
        start_year = inputs.start_year,
        horizon = inputs.horizon_years,
        "running projection"
    );

    let output = calculate_projection(&inputs)?;
    let rows: Vec<Value> = output.result.years.iter().map(year_row).collect();
    let summary = serde_json::to_value(&output.result.summary)?;

    let mut value = serde_json::to_value(&output)?;
    match args.view {
        ProjectView::Full => {}
        ProjectView::Years => value["result"] = Value::Array(rows),
        ProjectView::Summary => value["result"] = summary,
    }
    Ok(value)
}
