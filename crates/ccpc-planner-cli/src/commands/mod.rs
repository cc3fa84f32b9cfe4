pub mod benefits;
pub mod corporate;
pub mod payroll;
pub mod pension;
pub mod projection;
pub mod tax_data;

use ccpc_planner_core::types::Province;
use chrono::Datelike;

/// clap value parser for two-letter province codes.
pub fn parse_province(code: &str) -> Result<Province, String> {
    Province::from_code(code).ok_or_else(|| {
        let known: Vec<&str> = Province::ALL.iter().map(|p| p.code()).collect();
        format!("unknown province '{}'; expected one of {}", code, known.join(", "))
    })
}

/// Tax year used when `--year` is omitted.
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}
