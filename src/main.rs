//! localca - local certificate authority manager.

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use localca::cli::{self, args::Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "localca=debug" } else { "localca=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "Error:".red().bold());
            // A host without a working provider is a setup problem, not a failed run.
            if cli::is_dependency_missing(&err) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
