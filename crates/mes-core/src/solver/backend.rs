use crate::error::ModelResult;
use crate::model::LinearModel;
use crate::solution::ModelSolution;
use serde::{Deserialize, Serialize};

/// Settings shared by every [`SolverBackend`].
///
/// Field names follow Clarabel's settings so the mapping stays obvious.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Print solver progress to stdout.
    pub verbose: bool,
    /// Interior-point iteration limit per continuous solve.
    pub max_iter: u32,
    /// Wall-clock limit per continuous solve in seconds (none = unlimited).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
    pub tol_gap_abs: f64,
    pub tol_gap_rel: f64,
    pub tol_feas: f64,
    /// Let the backend drop redundant rows before factorizing.
    pub presolve: bool,
    /// Scale the constraint matrix before solving.
    pub equilibrate: bool,
    /// Branch-and-bound node limit for models with integer variables.
    pub max_nodes: usize,
    /// Distance from the nearest integer below which a value counts as integral.
    pub integrality_tol: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            max_iter: 200,
            time_limit: None,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
            tol_feas: 1e-8,
            presolve: true,
            equilibrate: true,
            max_nodes: 10_000,
            integrality_tol: 1e-6,
        }
    }
}

impl SolverSettings {
    /// Profile used when a solve is retried after a numerical failure:
    /// presolve off, equilibration on, more iterations, tighter tolerances.
    pub fn numerically_focused(&self) -> Self {
        Self {
            max_iter: self.max_iter.max(500),
            tol_gap_abs: self.tol_gap_abs.min(1e-9),
            tol_gap_rel: self.tol_gap_rel.min(1e-9),
            tol_feas: self.tol_feas.min(1e-9),
            presolve: false,
            equilibrate: true,
            ..self.clone()
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_max_iter(mut self, max_iter: u32) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
}

/// Trait for optimization backends able to solve a [`LinearModel`].
///
/// Backends must be shareable across the worker threads that evaluate
/// subproblems in parallel.
pub trait SolverBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Solve `model`. Infeasibility and unboundedness are reported through
    /// [`ModelSolution::status`]; `Err` is reserved for failures to run at all.
    fn solve(&self, model: &LinearModel, settings: &SolverSettings) -> ModelResult<ModelSolution>;

    /// Names of a set of constraints that is infeasible on its own, when the
    /// backend can compute one. `Ok(None)` means unsupported or feasible.
    fn conflicting_constraints(
        &self,
        _model: &LinearModel,
        _settings: &SolverSettings,
    ) -> ModelResult<Option<Vec<String>>> {
        Ok(None)
    }
}
