mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::benefits::{CppBenefitArgs, OasArgs, RrifArgs};
use commands::corporate::{CorporateTaxArgs, WaterfallArgs};
use commands::payroll::{PayrollArgs, PersonalTaxArgs};
use commands::pension::IppArgs;
use commands::projection::ProjectArgs;
use commands::tax_data::TaxDataArgs;

/// Salary/dividend planning for owners of Canadian private corporations
#[derive(Parser)]
#[command(
    name = "ccpc",
    version,
    about = "Salary/dividend planning for owners of Canadian private corporations",
    long_about = "Projects salary, dividends, personal and corporate tax, notional \
                  accounts (CDA, RDTOH, GRIP) and retirement income year by year \
                  with decimal precision. Individual calculators are exposed as \
                  subcommands."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a multi-year projection from a UserInputs file
    Project(ProjectArgs),
    /// CPP/QPP, CPP2, EI and QPIP on a salary
    Payroll(PayrollArgs),
    /// Combined federal and provincial personal tax
    PersonalTax(PersonalTaxArgs),
    /// Corporate tax on active income with the passive-income grind
    CorporateTax(CorporateTaxArgs),
    /// Fund an after-tax amount from the notional accounts
    Waterfall(WaterfallArgs),
    /// Estimate the CPP retirement pension
    CppBenefit(CppBenefitArgs),
    /// OAS pension and recovery tax
    Oas(OasArgs),
    /// RRIF minimum withdrawal schedule
    Rrif(RrifArgs),
    /// IPP current-service cost and RRSP room comparison
    Ipp(IppArgs),
    /// Print the tax constants for a year and province
    TaxData(TaxDataArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Project(args) => commands::projection::run_project(args),
        Commands::Payroll(args) => commands::payroll::run_payroll(args),
        Commands::PersonalTax(args) => commands::payroll::run_personal_tax(args),
        Commands::CorporateTax(args) => commands::corporate::run_corporate_tax(args),
        Commands::Waterfall(args) => commands::corporate::run_waterfall(args),
        Commands::CppBenefit(args) => commands::benefits::run_cpp_benefit(args),
        Commands::Oas(args) => commands::benefits::run_oas(args),
        Commands::Rrif(args) => commands::benefits::run_rrif(args),
        Commands::Ipp(args) => commands::pension::run_ipp(args),
        Commands::TaxData(args) => commands::tax_data::run_tax_data(args),
        Commands::Version => {
            println!("ccpc {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
