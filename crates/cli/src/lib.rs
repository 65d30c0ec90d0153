pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "rebook",
    about = "Rebook operator CLI",
    long_about = "Operate the rebooking service: migrations, demo fixtures, and manual sweeps.",
    after_help = "Examples:\n  rebook migrate\n  rebook seed\n  rebook sweep --job daily\n  rebook doctor"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset (idempotent)")]
    Seed,
    #[command(about = "Run one suggestion sweep by hand instead of waiting for the schedule")]
    Sweep {
        #[arg(long, value_enum, help = "Which sweep to run")]
        job: SweepJob,
    },
    #[command(about = "Diagnose configuration, database connectivity, and schema readiness")]
    Doctor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SweepJob {
    /// Generate suggestions for customers who are coming due.
    Daily,
    /// Expire suggestions whose window has closed.
    Expiry,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Sweep { job } => commands::sweep::run(job),
        Command::Doctor => commands::doctor::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
