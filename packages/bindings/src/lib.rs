use napi::Result as NapiResult;
use napi_derive::napi;

use ccpc_planner_core::types::Province;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_projection(input_json: String) -> NapiResult<String> {
    let input: ccpc_planner_core::projection::UserInputs =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        ccpc_planner_core::projection::calculate_projection(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Payroll and personal tax
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_payroll_taxes(input_json: String) -> NapiResult<String> {
    let input: ccpc_planner_core::payroll::contributions::PayrollInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ccpc_planner_core::payroll::contributions::calculate_payroll_taxes(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_personal_income_tax(input_json: String) -> NapiResult<String> {
    let input: ccpc_planner_core::personal_tax::income_tax::PersonalTaxInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ccpc_planner_core::personal_tax::income_tax::calculate_personal_income_tax(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Corporate
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_corporate_income_tax(input_json: String) -> NapiResult<String> {
    let input: ccpc_planner_core::corporate::corporate_tax::CorporateTaxInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ccpc_planner_core::corporate::corporate_tax::calculate_corporate_income_tax(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_dividend_waterfall(input_json: String) -> NapiResult<String> {
    let input: ccpc_planner_core::dividends::waterfall::WaterfallInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ccpc_planner_core::dividends::waterfall::calculate_dividend_waterfall(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Retirement benefits and pension
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_cpp_benefit(input_json: String) -> NapiResult<String> {
    let input: ccpc_planner_core::benefits::cpp_benefit::CppBenefitInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ccpc_planner_core::benefits::cpp_benefit::calculate_cpp_benefit(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_oas(input_json: String) -> NapiResult<String> {
    let input: ccpc_planner_core::benefits::oas::OasInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ccpc_planner_core::benefits::oas::calculate_oas(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_rrif_schedule(input_json: String) -> NapiResult<String> {
    let input: ccpc_planner_core::benefits::rrif::RrifInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ccpc_planner_core::benefits::rrif::calculate_rrif_schedule(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_ipp(input_json: String) -> NapiResult<String> {
    let input: ccpc_planner_core::pension::ipp::IppInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ccpc_planner_core::pension::ipp::calculate_ipp(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Tax data
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct TaxDataBindingInput {
    year: i32,
    #[serde(default = "default_inflation")]
    inflation_rate: rust_decimal::Decimal,
    province: Province,
}

fn default_inflation() -> rust_decimal::Decimal {
    rust_decimal::Decimal::new(2, 2)
}

#[napi]
pub fn get_tax_year_data(input_json: String) -> NapiResult<String> {
    let input: TaxDataBindingInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let data = ccpc_planner_core::tax_data::get_tax_year_data(
        input.year,
        input.inflation_rate,
        input.province,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&data).map_err(to_napi_error)
}
