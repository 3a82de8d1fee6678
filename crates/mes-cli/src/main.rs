use std::io;
use std::process::ExitCode;

use clap::Parser;
use mes_cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

mod commands;

fn init_tracing(level: Option<tracing::Level>) {
    let filter = match level {
        Some(level) => EnvFilter::default().add_directive(level.into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let outcome = match &cli.command {
        Commands::Solve(args) => commands::solve::handle(args),
        Commands::Validate { problem } => commands::validate::handle(problem),
        Commands::Config { out } => commands::config::handle(out.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
