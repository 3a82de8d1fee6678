pub mod cli;
pub mod record;

pub use cli::{Cli, Commands, SolveArgs};
pub use record::{RunRecord, RunSummary};
