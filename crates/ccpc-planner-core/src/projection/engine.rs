//! Multi-year projection: a left fold over years, each one taking the
//! previous year-end state to the next.
//!
//! Within a year the order is fixed: tax tables, investment returns, account
//! update, retirement income, compensation, corporate tax on active income,
//! owner dividends, spouse dividends.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::benefits::cpp_benefit::{
    level_salary_history, project_cpp_benefit, EarningsRecord, EARLIEST_START_AGE,
    LATEST_START_AGE,
};
use crate::benefits::oas::{gross_oas, solve_oas_clawback};
use crate::benefits::rrif::{rrif_minimum_withdrawal, RRIF_CONVERSION_AGE};
use crate::corporate::corporate_tax::calculate_corporate_tax;
use crate::corporate::passive_grind::calculate_aaii;
use crate::dividends::waterfall::{
    deplete_accounts_with_rates, DividendDraw, DividendFunding, WaterfallRates, WaterfallResult,
};
use crate::investment::accounts::{update_accounts_from_returns, NotionalAccounts};
use crate::investment::returns::{decompose_returns, InvestmentReturns};
use crate::payroll::contributions::{calculate_payroll, PayrollContributions};
use crate::pension::ipp::{calculate_ipp_contribution, rrsp_room_earned};
use crate::personal_tax::income_tax::{
    calculate_personal_tax, incremental_dividend_rates, PersonalIncome, PersonalTaxBreakdown,
};
use crate::projection::inputs::{CompensationStrategy, UserInputs};
use crate::projection::solver::{
    solve_for_target, SolverOutcome, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE,
};
use crate::projection::summary::{summarize, ProjectionSummary};
use crate::tax_data::{PublishedTaxTables, TaxDataProvider, TaxYearData};
use crate::time_value::{grow, safe_div};
use crate::types::{round_cents, with_metadata, ComputationOutput, Money, Rate};
use crate::PlannerResult;

/// After-tax income within a dollar of the target counts as funded.
const FUNDING_TOLERANCE: Money = dec!(1);
const FUNDING_MAX_ITERATIONS: u32 = 25;
/// Effective dividend rates are kept below this so gross-ups stay finite.
const MAX_EFFECTIVE_RATE: Rate = dec!(0.95);

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpouseYearResult {
    pub age: u32,
    pub required_income: Money,
    pub dividends: DividendFunding,
    pub personal_tax: Money,
    pub after_tax_income: Money,
    pub rdtoh_refund: Money,
    pub shortfall: Money,
}

/// One simulated year. Every field is a value snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearlyResult {
    pub year: i32,
    pub age: u32,
    pub projected_tables: bool,
    /// Owner's after-tax requirement, indexed, including any debt payment.
    pub required_income: Money,
    pub debt_payment: Money,

    pub salary: Money,
    pub dividends: DividendFunding,
    pub draws: Vec<DividendDraw>,

    pub cpp: Money,
    pub cpp2: Money,
    pub ei: Money,
    pub qpip: Money,
    pub employer_payroll: Money,

    pub federal_tax: Money,
    pub provincial_tax: Money,
    pub health_premium: Money,
    pub oas_clawback: Money,
    /// Federal + provincial + health premium + OAS recovery tax.
    pub personal_tax: Money,

    pub corporate_income: Money,
    /// Active business income after compensation and IPP funding.
    pub active_income: Money,
    pub active_income_tax: Money,
    pub passive_tax: Money,
    pub refundable_tax: Money,
    pub non_refundable_tax: Money,
    pub part_iv_tax: Money,
    /// Active income tax plus non-refundable passive tax.
    pub corporate_tax: Money,
    pub aaii: Money,
    pub reduced_business_limit: Money,
    pub grind_additional_tax: Money,
    pub rdtoh_refund: Money,
    pub erdtoh_refund: Money,
    pub nrdtoh_refund: Money,
    pub investment_returns: InvestmentReturns,

    pub cpp_benefit: Money,
    pub oas_gross: Money,
    pub rrif_withdrawal: Money,
    /// CPP benefit + gross OAS + RRIF withdrawal.
    pub retirement_income: Money,
    pub rrsp_balance: Money,
    pub rrsp_room: Money,
    pub ipp_contribution: Money,
    pub ipp_balance: Money,
    pub pension_adjustment: Money,
    pub debt_balance: Money,

    pub total_tax: Money,
    pub after_tax_income: Money,
    pub shortfall: Money,
    pub effective_tax_rate: Rate,
    pub funding_iterations: u32,
    pub funding_converged: bool,

    /// Year-end notional accounts.
    pub accounts: NotionalAccounts,
    pub spouse: Option<SpouseYearResult>,
    pub household_after_tax_income: Money,
    pub household_tax: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionOutput {
    pub years: Vec<YearlyResult>,
    pub summary: ProjectionSummary,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything carried from one year-end to the next year-start.
#[derive(Debug, Clone)]
struct ProjectionState {
    accounts: NotionalAccounts,
    rrsp_balance: Money,
    rrsp_room: Money,
    ipp_balance: Money,
    debt_balance: Money,
    earnings: Vec<EarningsRecord>,
    /// Annual CPP pension once it has started.
    cpp_benefit: Option<Money>,
}

impl ProjectionState {
    fn initial(inputs: &UserInputs) -> Self {
        Self {
            accounts: inputs.starting_accounts.clone(),
            rrsp_balance: inputs.rrsp_balance,
            rrsp_room: inputs.rrsp_room,
            ipp_balance: Decimal::ZERO,
            debt_balance: inputs
                .debt
                .as_ref()
                .map(|d| d.balance)
                .unwrap_or(Decimal::ZERO),
            earnings: Vec::new(),
            cpp_benefit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RetirementIncome {
    cpp_benefit: Money,
    oas_gross: Money,
    rrif_withdrawal: Money,
}

impl RetirementIncome {
    fn total(&self) -> Money {
        self.cpp_benefit + self.oas_gross + self.rrif_withdrawal
    }
}

/// Personal side of one shareholder's year.
#[derive(Debug, Clone)]
struct PersonalAssessment {
    breakdown: PersonalTaxBreakdown,
    oas_clawback: Money,
    personal_tax: Money,
    after_tax: Money,
}

#[derive(Debug, Clone)]
struct FundedDividends {
    waterfall: WaterfallResult,
    assessment: PersonalAssessment,
    outcome: SolverOutcome,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Tax one return. OAS recovery tax is solved against net income without
/// OAS, then deducted from income and added to tax.
fn assess(
    salary: Money,
    dividends: &DividendFunding,
    retirement: &RetirementIncome,
    payroll: &PayrollContributions,
    data: &TaxYearData,
) -> PersonalAssessment {
    let mut income = PersonalIncome {
        salary,
        eligible_dividends: dividends.eligible_dividends,
        non_eligible_dividends: dividends.non_eligible_dividends,
        capital_dividends: dividends.capital_dividends,
        other_income: retirement.total(),
        ..Default::default()
    };

    let mut oas_clawback = Decimal::ZERO;
    if retirement.oas_gross > Decimal::ZERO {
        let before = calculate_personal_tax(&income, payroll, data);
        let income_without_oas = (before.taxable_income - retirement.oas_gross).max(Decimal::ZERO);
        let outcome = solve_oas_clawback(
            retirement.oas_gross,
            income_without_oas,
            data.retirement.oas_clawback_threshold,
        );
        oas_clawback = round_cents(outcome.value);
        income.other_deductions = oas_clawback;
    }

    let breakdown = calculate_personal_tax(&income, payroll, data);
    let personal_tax = breakdown.total_tax + oas_clawback;
    let after_tax = salary + dividends.gross_dividends + retirement.total()
        - personal_tax
        - payroll.employee_total();
    PersonalAssessment {
        breakdown,
        oas_clawback,
        personal_tax,
        after_tax,
    }
}

/// Gross salary whose after-tax value (alongside retirement income) meets
/// `target`.
fn solve_salary(
    target: Money,
    retirement: &RetirementIncome,
    data: &TaxYearData,
) -> SolverOutcome {
    let mut outcome = solve_for_target(
        target,
        target,
        DEFAULT_TOLERANCE,
        DEFAULT_MAX_ITERATIONS,
        |salary| {
            let salary = round_cents(salary.max(Decimal::ZERO));
            let payroll = calculate_payroll(salary, &data.payroll);
            assess(salary, &DividendFunding::default(), retirement, &payroll, data).after_tax
        },
    );
    outcome.value = round_cents(outcome.value.max(Decimal::ZERO));
    outcome
}

/// Dividends on top of salary and retirement income to reach `target`.
///
/// Effective rates start from the incremental tax on the whole gap and are
/// rescaled each pass by actual / estimated tax on the regular dividends
/// drawn, until after-tax income lands within a dollar of the target. Stops
/// early once the waterfall cannot fund more.
fn fund_with_dividends(
    target: Money,
    salary: Money,
    payroll: &PayrollContributions,
    retirement: &RetirementIncome,
    accounts: &NotionalAccounts,
    data: &TaxYearData,
    allow_retained_earnings: bool,
) -> FundedDividends {
    let base = assess(salary, &DividendFunding::default(), retirement, payroll, data);
    let gap = round_cents(target - base.after_tax);
    let refund_rate = data.corporate.rdtoh_refund_rate;

    if gap <= FUNDING_TOLERANCE {
        let rates = WaterfallRates {
            rdtoh_refund_rate: refund_rate,
            eligible_tax_rate: Decimal::ZERO,
            non_eligible_tax_rate: Decimal::ZERO,
        };
        let outcome = SolverOutcome {
            value: base.after_tax,
            iterations: 0,
            converged: true,
            last_delta: Decimal::ZERO,
        };
        return FundedDividends {
            waterfall: deplete_accounts_with_rates(Decimal::ZERO, accounts, &rates, false),
            assessment: base,
            outcome,
        };
    }

    let base_income = PersonalIncome {
        salary,
        other_income: retirement.total(),
        ..Default::default()
    };
    let (seed_eligible, seed_non_eligible) =
        incremental_dividend_rates(&base_income, gap, payroll, data);
    let mut eligible_rate = seed_eligible.min(MAX_EFFECTIVE_RATE);
    let mut non_eligible_rate = seed_non_eligible.min(MAX_EFFECTIVE_RATE);

    let mut iterations = 0;
    let (waterfall, assessment, converged, last_delta) = loop {
        iterations += 1;
        let rates = WaterfallRates {
            rdtoh_refund_rate: refund_rate,
            eligible_tax_rate: eligible_rate,
            non_eligible_tax_rate: non_eligible_rate,
        };
        let waterfall = deplete_accounts_with_rates(gap, accounts, &rates, allow_retained_earnings);
        let assessment = assess(salary, &waterfall.funding, retirement, payroll, data);
        let delta = (target - assessment.after_tax).abs();

        let funding = &waterfall.funding;
        let settled = delta <= FUNDING_TOLERANCE
            || waterfall.shortfall > Decimal::ZERO
            || funding.regular_dividends.is_zero();
        if settled {
            break (waterfall, assessment, true, delta);
        }
        if iterations >= FUNDING_MAX_ITERATIONS {
            break (waterfall, assessment, false, delta);
        }

        let estimated = funding.eligible_dividends * eligible_rate
            + funding.non_eligible_dividends * non_eligible_rate;
        let actual = assessment.personal_tax - base.personal_tax;
        if estimated > Decimal::ZERO {
            let scale = actual / estimated;
            eligible_rate = (eligible_rate * scale).clamp(Decimal::ZERO, MAX_EFFECTIVE_RATE);
            non_eligible_rate =
                (non_eligible_rate * scale).clamp(Decimal::ZERO, MAX_EFFECTIVE_RATE);
        } else {
            let flat = safe_div(actual, funding.regular_dividends, Decimal::ZERO)
                .clamp(Decimal::ZERO, MAX_EFFECTIVE_RATE);
            eligible_rate = flat;
            non_eligible_rate = flat;
        }
    };

    let outcome = SolverOutcome {
        value: assessment.after_tax,
        iterations,
        converged,
        last_delta,
    };
    FundedDividends {
        waterfall,
        assessment,
        outcome,
    }
}

/// Part of `required` left unfunded; zero within the funding tolerance.
fn unfunded(required: Money, after_tax: Money) -> Money {
    let gap = round_cents(required - after_tax);
    if gap > FUNDING_TOLERANCE {
        gap
    } else {
        Decimal::ZERO
    }
}

/// Salary for the year under the chosen strategy.
fn salary_for_strategy(
    strategy: &CompensationStrategy,
    required: Money,
    retirement: &RetirementIncome,
    data: &TaxYearData,
    year: i32,
    warnings: &mut Vec<String>,
) -> Money {
    match strategy {
        CompensationStrategy::DividendsOnly => Decimal::ZERO,
        CompensationStrategy::FixedSalary { salary } => (*salary).max(Decimal::ZERO),
        CompensationStrategy::SalaryToYmpe => data.payroll.ympe,
        CompensationStrategy::SalaryOnly => {
            let outcome = solve_salary(required, retirement, data);
            if !outcome.converged {
                warnings.push(format!(
                    "Year {}: salary solve did not converge after {} iterations (delta {})",
                    year, outcome.iterations, outcome.last_delta
                ));
            }
            outcome.value
        }
    }
}

/// CPP pension for the year, starting it (from the recorded earnings) the
/// first year the owner reaches the start age.
fn cpp_for_year(
    state: &mut ProjectionState,
    age: u32,
    cpp_start_age: u32,
    inflation_rate: Rate,
    data: &TaxYearData,
) -> Money {
    if let Some(annual) = state.cpp_benefit {
        let indexed = round_cents(annual * (Decimal::ONE + inflation_rate));
        state.cpp_benefit = Some(indexed);
        return indexed;
    }
    if age < cpp_start_age {
        return Decimal::ZERO;
    }
    let history: Vec<EarningsRecord> = state
        .earnings
        .iter()
        .filter(|r| r.age < cpp_start_age)
        .cloned()
        .collect();
    let annual = project_cpp_benefit(&history, cpp_start_age, &data.payroll).annual_benefit;
    state.cpp_benefit = Some(annual);
    annual
}

// ---------------------------------------------------------------------------
// Year step
// ---------------------------------------------------------------------------

/// Advance one year. `state` is the previous year-end; the returned state is
/// this year's end.
fn project_year(
    inputs: &UserInputs,
    provider: &dyn TaxDataProvider,
    state: &ProjectionState,
    offset: u32,
    warnings: &mut Vec<String>,
) -> PlannerResult<(YearlyResult, ProjectionState)> {
    let year = inputs.start_year + offset as i32;
    let age = inputs.owner_age + offset;
    let data = provider.lookup(year, inputs.inflation_rate, inputs.province)?;
    let mut next = state.clone();
    let portfolio_rate = inputs.returns.portfolio_rate(&inputs.allocation);

    if offset == 0 {
        let prior_salary = inputs.historical_salary.unwrap_or(data.payroll.ympe);
        next.earnings = level_salary_history(
            prior_salary,
            inputs.salary_start_age,
            inputs.owner_age.max(inputs.salary_start_age),
            inputs.owner_age,
            year,
            &data.payroll,
        );
    }

    // Investment returns on the opening balance
    let returns = decompose_returns(
        state.accounts.corporate_investments,
        &inputs.allocation,
        &inputs.returns,
        &data.corporate,
    );
    let update = update_accounts_from_returns(
        &state.accounts,
        &returns,
        data.corporate.passive_investment_rate,
    );
    let mut accounts = update.accounts.clone();

    // Retirement income
    let cpp_start_age = inputs.cpp_start_age.clamp(EARLIEST_START_AGE, LATEST_START_AGE);
    let cpp_benefit = cpp_for_year(&mut next, age, cpp_start_age, inputs.inflation_rate, &data);
    // Converted at the end of the year the owner turns 71; the minimum is
    // keyed on age at January 1.
    let age_at_january_1 = age.saturating_sub(1);
    let rrif_withdrawal = if age_at_january_1 >= RRIF_CONVERSION_AGE {
        rrif_minimum_withdrawal(state.rrsp_balance, age_at_january_1)
    } else {
        Decimal::ZERO
    };
    next.rrsp_balance = round_cents(
        (state.rrsp_balance - rrif_withdrawal).max(Decimal::ZERO) * (Decimal::ONE + portfolio_rate),
    );
    let retirement = RetirementIncome {
        cpp_benefit,
        oas_gross: gross_oas(age, inputs.oas_start_age, &data.retirement),
        rrif_withdrawal,
    };

    // Debt service
    let mut debt_payment = Decimal::ZERO;
    if let Some(debt) = &inputs.debt {
        if state.debt_balance > Decimal::ZERO {
            let owing = round_cents(state.debt_balance * (Decimal::ONE + debt.annual_rate));
            debt_payment = debt.annual_payment.min(owing);
            next.debt_balance = owing - debt_payment;
        }
    }
    let required = round_cents(grow(inputs.required_income, inputs.inflation_rate, offset))
        + debt_payment;

    // Compensation
    let salary =
        salary_for_strategy(&inputs.strategy, required, &retirement, &data, year, warnings);
    let payroll = calculate_payroll(salary, &data.payroll);
    if age >= inputs.salary_start_age && age < cpp_start_age && next.cpp_benefit.is_none() {
        next.earnings.push(EarningsRecord {
            year,
            age,
            salary,
            ympe: data.payroll.ympe,
            yampe: data.payroll.yampe,
            basic_exemption: data.payroll.basic_exemption,
        });
    }

    let ipp = inputs
        .ipp
        .as_ref()
        .map(|assumptions| calculate_ipp_contribution(salary, age, assumptions, &data.retirement));
    let ipp_contribution = ipp
        .as_ref()
        .map(|c| c.current_service_cost)
        .unwrap_or(Decimal::ZERO);
    let pa = ipp
        .as_ref()
        .map(|c| c.pension_adjustment)
        .unwrap_or(Decimal::ZERO);
    next.ipp_balance =
        round_cents(state.ipp_balance * (Decimal::ONE + portfolio_rate)) + ipp_contribution;
    next.rrsp_room = state.rrsp_room
        + (rrsp_room_earned(salary, data.retirement.rrsp_limit) - pa).max(Decimal::ZERO);

    // Active business income
    let corporate_income = round_cents(grow(
        inputs.corporate_income,
        inputs.corporate_income_growth,
        offset,
    ));
    let active_income = corporate_income - salary - payroll.employer_total() - ipp_contribution;
    let aaii = calculate_aaii(
        returns.foreign_income,
        returns.realized_capital_gain,
        data.corporate.capital_gains_inclusion,
    );
    let corporate = calculate_corporate_tax(active_income, aaii, &data.corporate);
    if active_income >= Decimal::ZERO {
        accounts = accounts.deposit(active_income - corporate.total_tax);
        accounts.grip += corporate.grip_addition;
    } else {
        let deficit = -active_income;
        if accounts.corporate_investments < deficit {
            warnings.push(format!(
                "Year {}: compensation exceeds business income and corporate investments by {}",
                year,
                round_cents(deficit - accounts.corporate_investments.max(Decimal::ZERO))
            ));
        } else {
            warnings.push(format!(
                "Year {}: {} of compensation pre-financed from corporate investments",
                year,
                round_cents(deficit)
            ));
        }
        accounts = accounts.withdraw(deficit);
    }

    // Owner dividends
    let funded = fund_with_dividends(
        required,
        salary,
        &payroll,
        &retirement,
        &accounts,
        &data,
        inputs.allow_retained_earnings,
    );
    if !funded.outcome.converged {
        warnings.push(format!(
            "Year {}: dividend rate refinement stopped after {} iterations ({} from target)",
            year,
            funded.outcome.iterations,
            round_cents(funded.outcome.last_delta)
        ));
    }
    accounts = funded.waterfall.accounts.clone();
    let assessment = &funded.assessment;
    let shortfall = unfunded(required, assessment.after_tax);
    if shortfall > Decimal::ZERO {
        warnings.push(format!(
            "Year {}: after-tax income short of requirement by {}",
            year, shortfall
        ));
    }
    if retirement.oas_gross > Decimal::ZERO && assessment.oas_clawback >= retirement.oas_gross {
        warnings.push(format!("Year {}: OAS fully clawed back", year));
    }

    // Spouse dividends from what is left
    let mut spouse_result = None;
    if let Some(spouse) = &inputs.spouse {
        let spouse_required =
            round_cents(grow(spouse.required_income, inputs.inflation_rate, offset));
        let no_payroll = calculate_payroll(Decimal::ZERO, &data.payroll);
        let spouse_funded = fund_with_dividends(
            spouse_required,
            Decimal::ZERO,
            &no_payroll,
            &RetirementIncome::default(),
            &accounts,
            &data,
            inputs.allow_retained_earnings,
        );
        accounts = spouse_funded.waterfall.accounts.clone();
        let spouse_refund = spouse_funded.waterfall.rdtoh_refund;
        let spouse_shortfall = unfunded(spouse_required, spouse_funded.assessment.after_tax);
        if spouse_shortfall > Decimal::ZERO {
            warnings.push(format!(
                "Year {}: spouse after-tax income short of requirement by {}",
                year, spouse_shortfall
            ));
        }
        spouse_result = Some(SpouseYearResult {
            age: spouse.age + offset,
            required_income: spouse_required,
            dividends: spouse_funded.waterfall.funding.clone(),
            personal_tax: spouse_funded.assessment.personal_tax,
            after_tax_income: spouse_funded.assessment.after_tax,
            rdtoh_refund: spouse_refund,
            shortfall: spouse_shortfall,
        });
    }
    next.accounts = accounts.clone();

    // Totals
    let corporate_tax = corporate.total_tax + update.non_refundable_tax;
    let personal_tax = assessment.personal_tax;
    let total_tax = personal_tax + corporate_tax + payroll.employee_total();
    let after_tax_income = assessment.after_tax;
    let effective_tax_rate = safe_div(total_tax, after_tax_income + total_tax, Decimal::ZERO);
    let (spouse_after_tax, spouse_tax) = spouse_result
        .as_ref()
        .map(|s| (s.after_tax_income, s.personal_tax))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));

    debug!(
        year,
        age,
        salary = %salary,
        dividends = %funded.waterfall.funding.gross_dividends,
        corporate_investments = %accounts.corporate_investments,
        cda = %accounts.cda,
        rdtoh = %accounts.total_rdtoh(),
        "projection year"
    );

    let result = YearlyResult {
        year,
        age,
        projected_tables: data.projected,
        required_income: required,
        debt_payment,
        salary,
        dividends: funded.waterfall.funding.clone(),
        draws: funded.waterfall.draws.clone(),
        cpp: payroll.cpp,
        cpp2: payroll.cpp2,
        ei: payroll.ei,
        qpip: payroll.qpip,
        employer_payroll: payroll.employer_total(),
        federal_tax: assessment.breakdown.federal_tax,
        provincial_tax: assessment.breakdown.provincial_tax,
        health_premium: assessment.breakdown.health_premium,
        oas_clawback: assessment.oas_clawback,
        personal_tax,
        corporate_income,
        active_income,
        active_income_tax: corporate.total_tax,
        passive_tax: update.total_passive_tax,
        refundable_tax: update.refundable_tax,
        non_refundable_tax: update.non_refundable_tax,
        part_iv_tax: update.part_iv_tax,
        corporate_tax,
        aaii,
        reduced_business_limit: corporate.grind.reduced_limit,
        grind_additional_tax: corporate.grind.additional_tax,
        rdtoh_refund: funded.waterfall.rdtoh_refund,
        erdtoh_refund: funded.waterfall.erdtoh_refund,
        nrdtoh_refund: funded.waterfall.nrdtoh_refund,
        investment_returns: returns,
        cpp_benefit: retirement.cpp_benefit,
        oas_gross: retirement.oas_gross,
        rrif_withdrawal: retirement.rrif_withdrawal,
        retirement_income: retirement.total(),
        rrsp_balance: next.rrsp_balance,
        rrsp_room: next.rrsp_room,
        ipp_contribution,
        ipp_balance: next.ipp_balance,
        pension_adjustment: pa,
        debt_balance: next.debt_balance,
        total_tax,
        after_tax_income,
        shortfall,
        effective_tax_rate,
        funding_iterations: funded.outcome.iterations,
        funding_converged: funded.outcome.converged,
        accounts,
        spouse: spouse_result,
        household_after_tax_income: after_tax_income + spouse_after_tax,
        household_tax: total_tax + spouse_tax,
    };
    Ok((result, next))
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Project `inputs` against the published tax tables.
pub fn calculate_projection(
    inputs: &UserInputs,
) -> PlannerResult<ComputationOutput<ProjectionOutput>> {
    calculate_projection_with(inputs, &PublishedTaxTables)
}

/// Project `inputs` against any tax-data provider. Years run strictly in
/// order; identical inputs give identical results.
pub fn calculate_projection_with(
    inputs: &UserInputs,
    provider: &dyn TaxDataProvider,
) -> PlannerResult<ComputationOutput<ProjectionOutput>> {
    let start = Instant::now();
    inputs.validate()?;

    let mut warnings: Vec<String> = Vec::new();
    let mut state = ProjectionState::initial(inputs);
    let mut years = Vec::with_capacity(inputs.horizon_years as usize);
    for offset in 0..inputs.horizon_years {
        let (row, next) = project_year(inputs, provider, &state, offset, &mut warnings)?;
        years.push(row);
        state = next;
    }
    for w in &warnings {
        warn!("{}", w);
    }

    let summary = summarize(&years);
    let output = ProjectionOutput { years, summary };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annual fold: returns -> notional accounts -> compensation -> corporate tax -> dividend waterfall (CDA, eRDTOH, nRDTOH, eRDTOH cascade, GRIP, retained earnings)",
        &serde_json::json!({
            "province": inputs.province.code(),
            "start_year": inputs.start_year,
            "horizon_years": inputs.horizon_years,
            "inflation_rate": inputs.inflation_rate.to_string(),
            "strategy": inputs.strategy,
        }),
        warnings,
        elapsed,
        output,
    ))
}
