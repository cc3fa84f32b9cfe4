use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::investment::accounts::NotionalAccounts;
use crate::investment::returns::{AssetAllocation, ReturnAssumption};
use crate::pension::ipp::IppAssumptions;
use crate::types::{Money, Province, Rate};
use crate::PlannerResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// How the owner is paid each year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompensationStrategy {
    /// Salary solved so that it alone meets the after-tax requirement.
    SalaryOnly,
    DividendsOnly,
    /// Fixed nominal salary, dividends for the rest.
    FixedSalary { salary: Money },
    /// Salary at the year's YMPE (maximises CPP), dividends for the rest.
    SalaryToYmpe,
}

impl Default for CompensationStrategy {
    fn default() -> Self {
        CompensationStrategy::DividendsOnly
    }
}

/// Personal debt repaid out of after-tax income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtInput {
    pub balance: Money,
    pub annual_rate: Rate,
    pub annual_payment: Money,
}

/// A spouse shareholder paid dividends only, after the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpouseInputs {
    pub age: u32,
    /// After-tax requirement in start-year dollars.
    pub required_income: Money,
}

/// Full configuration of one projection run. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInputs {
    #[serde(default)]
    pub province: Province,
    pub start_year: i32,
    pub horizon_years: u32,
    /// Owner's after-tax requirement in start-year dollars.
    pub required_income: Money,
    #[serde(default = "default_inflation")]
    pub inflation_rate: Rate,
    #[serde(default)]
    pub strategy: CompensationStrategy,

    /// Active business income before owner compensation.
    #[serde(default)]
    pub corporate_income: Money,
    #[serde(default)]
    pub corporate_income_growth: Rate,
    #[serde(default)]
    pub starting_accounts: NotionalAccounts,
    #[serde(default)]
    pub allocation: AssetAllocation,
    #[serde(default)]
    pub returns: ReturnAssumption,
    /// Fall back to non-eligible dividends from retained earnings once the
    /// notional accounts are exhausted.
    #[serde(default = "default_true")]
    pub allow_retained_earnings: bool,

    #[serde(default = "default_owner_age")]
    pub owner_age: u32,
    #[serde(default = "default_salary_start_age")]
    pub salary_start_age: u32,
    /// Salary assumed for years before the projection; `None` means earnings
    /// at the YMPE.
    #[serde(default)]
    pub historical_salary: Option<Money>,
    #[serde(default = "default_benefit_age")]
    pub cpp_start_age: u32,
    #[serde(default = "default_benefit_age")]
    pub oas_start_age: u32,

    #[serde(default)]
    pub rrsp_balance: Money,
    /// Unused RRSP room carried into the first year.
    #[serde(default)]
    pub rrsp_room: Money,
    #[serde(default)]
    pub ipp: Option<IppAssumptions>,
    #[serde(default)]
    pub debt: Option<DebtInput>,
    #[serde(default)]
    pub spouse: Option<SpouseInputs>,
}

fn default_inflation() -> Rate {
    dec!(0.02)
}

fn default_true() -> bool {
    true
}

fn default_owner_age() -> u32 {
    45
}

fn default_salary_start_age() -> u32 {
    25
}

fn default_benefit_age() -> u32 {
    65
}

impl Default for UserInputs {
    fn default() -> Self {
        Self {
            province: Province::Ontario,
            start_year: 2026,
            horizon_years: 1,
            required_income: dec!(100_000),
            inflation_rate: default_inflation(),
            strategy: CompensationStrategy::default(),
            corporate_income: Decimal::ZERO,
            corporate_income_growth: Decimal::ZERO,
            starting_accounts: NotionalAccounts::default(),
            allocation: AssetAllocation::default(),
            returns: ReturnAssumption::default(),
            allow_retained_earnings: true,
            owner_age: default_owner_age(),
            salary_start_age: default_salary_start_age(),
            historical_salary: None,
            cpp_start_age: default_benefit_age(),
            oas_start_age: default_benefit_age(),
            rrsp_balance: Decimal::ZERO,
            rrsp_room: Decimal::ZERO,
            ipp: None,
            debt: None,
            spouse: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, reason: &str) -> PlannerError {
    PlannerError::InvalidInput {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

impl UserInputs {
    /// Structural checks only: the engine clamps merely unusual values.
    pub fn validate(&self) -> PlannerResult<()> {
        if self.horizon_years == 0 {
            return Err(invalid("horizon_years", "must be at least 1"));
        }
        if !self.allocation.is_valid() {
            return Err(invalid(
                "allocation",
                "weights must be non-negative and sum to 100",
            ));
        }
        if self.required_income < Decimal::ZERO {
            return Err(invalid("required_income", "must be >= 0"));
        }
        let a = &self.starting_accounts;
        for (field, value) in [
            ("starting_accounts.cda", a.cda),
            ("starting_accounts.erdtoh", a.erdtoh),
            ("starting_accounts.nrdtoh", a.nrdtoh),
            ("starting_accounts.grip", a.grip),
            ("starting_accounts.corporate_investments", a.corporate_investments),
            ("starting_accounts.corporate_acb", a.corporate_acb),
            ("rrsp_balance", self.rrsp_balance),
            ("rrsp_room", self.rrsp_room),
        ] {
            if value < Decimal::ZERO {
                return Err(invalid(field, "must be >= 0"));
            }
        }
        if let CompensationStrategy::FixedSalary { salary } = self.strategy {
            if salary < Decimal::ZERO {
                return Err(invalid("strategy.salary", "must be >= 0"));
            }
        }
        if let Some(debt) = &self.debt {
            if debt.balance < Decimal::ZERO || debt.annual_payment < Decimal::ZERO {
                return Err(invalid("debt", "balance and payment must be >= 0"));
            }
        }
        if let Some(spouse) = &self.spouse {
            if spouse.required_income < Decimal::ZERO {
                return Err(invalid("spouse.required_income", "must be >= 0"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_inputs_valid() {
        assert!(UserInputs::default().validate().is_ok());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let inputs = UserInputs {
            horizon_years: 0,
            ..Default::default()
        };
        assert!(inputs.validate().is_err());
    }

    #[test]
    fn test_bad_allocation_rejected() {
        let inputs = UserInputs {
            allocation: AssetAllocation {
                canadian_equity: dec!(60),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(inputs.validate().is_err());
    }

    #[test]
    fn test_negative_balance_rejected() {
        let mut inputs = UserInputs::default();
        inputs.starting_accounts.cda = dec!(-1);
        let err = inputs.validate().unwrap_err();
        assert!(err.to_string().contains("starting_accounts.cda"));
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "start_year": 2026,
            "horizon_years": 3,
            "required_income": "80000",
            "strategy": { "type": "fixed_salary", "salary": "60000" }
        }"#;
        let inputs: UserInputs = serde_json::from_str(json).unwrap();
        assert_eq!(inputs.province, Province::Ontario);
        assert_eq!(inputs.inflation_rate, dec!(0.02));
        assert!(inputs.allow_retained_earnings);
        assert_eq!(
            inputs.strategy,
            CompensationStrategy::FixedSalary {
                salary: dec!(60_000)
            }
        );
    }
}
