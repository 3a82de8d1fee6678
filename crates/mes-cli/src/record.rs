use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::Utc;
use mes_algo::{BendersConfig, BendersResult, TerminationReason};
use serde::Serialize;
use uuid::Uuid;

/// Headline numbers of a run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub termination: TerminationReason,
    pub converged: bool,
    pub iterations: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub gap: f64,
    pub cpu_time: f64,
    pub cuts: usize,
}

impl RunSummary {
    pub fn from_result(result: &BendersResult) -> Self {
        Self {
            termination: result.termination,
            converged: result.converged,
            iterations: result.iterations,
            lower_bound: result.lower_bound(),
            upper_bound: result.upper_bound(),
            gap: result.gap,
            cpu_time: result.cpu_time.last().copied().unwrap_or(0.0),
            cuts: result.planning_problem.num_cuts(),
        }
    }
}

/// Everything written by `mes solve --out`.
#[derive(Serialize)]
pub struct RunRecord<'a> {
    pub run_id: String,
    pub version: String,
    pub timestamp: String,
    pub problem: String,
    pub config: &'a BendersConfig,
    pub summary: RunSummary,
    pub result: &'a BendersResult,
}

impl<'a> RunRecord<'a> {
    pub fn new(problem: &Path, config: &'a BendersConfig, result: &'a BendersResult) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().to_rfc3339(),
            problem: problem.display().to_string(),
            config,
            summary: RunSummary::from_result(result),
            result,
        }
    }

    /// Write as pretty JSON; non-finite bounds appear as `null`.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
