use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Regularized Benders decomposition for capacity expansion models", long_about = None)]
pub struct Cli {
    /// Set the logging level (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve a decomposed problem with Benders decomposition
    Solve(SolveArgs),
    /// Check a decomposed problem without solving it
    Validate {
        /// Decomposed problem (JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        problem: PathBuf,
    },
    /// Print the default run configuration as TOML
    Config {
        /// Write the configuration here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
pub struct SolveArgs {
    /// Decomposed problem (JSON)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub problem: PathBuf,

    /// Run configuration (TOML); defaults apply when omitted
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Write the run record (JSON) here
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,

    /// Override MaxIter
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Override MaxCpuTime (seconds)
    #[arg(long)]
    pub max_cpu_time: Option<f64>,

    /// Override ConvTol
    #[arg(long)]
    pub conv_tol: Option<f64>,

    /// Override StabParam (level-set γ in [0, 1])
    #[arg(long)]
    pub stab_param: Option<f64>,

    /// Adjust γ from bound progress
    #[arg(long)]
    pub stab_dynamic: bool,

    /// Keep integrality of investment variables
    #[arg(long)]
    pub integer_investment: bool,

    /// Give every subproblem a slack penalty and relax it up-front
    #[arg(long)]
    pub automatic_slack_penalty: bool,

    /// Evaluate subproblems in parallel
    #[arg(long)]
    pub distributed: bool,

    /// Worker threads for --distributed (0 = all cores)
    #[arg(long)]
    pub threads: Option<usize>,
}
