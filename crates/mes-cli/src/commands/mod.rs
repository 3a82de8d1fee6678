pub mod config;
pub mod solve;
pub mod validate;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use mes_algo::DecomposedProblem;

/// Read a decomposed problem from JSON.
pub fn load_problem(path: &Path) -> Result<DecomposedProblem> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading problem {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing problem {}", path.display()))
}
