pub mod error;
pub mod time_value;
pub mod types;

pub mod benefits;
pub mod corporate;
pub mod dividends;
pub mod investment;
pub mod payroll;
pub mod pension;
pub mod personal_tax;
pub mod projection;
pub mod tax_data;

pub use error::PlannerError;
pub use types::*;

/// Standard result type for all planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
