use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{BendersError, Result};
use super::problem::PlanningProblem;

/// Snapshot of a planning (master) solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningSolution {
    /// Objective of the planning problem, a lower bound on the true optimum.
    pub lower_bound: f64,
    /// `FixedCost` at `values`.
    pub fixed_cost: f64,
    /// Linking-variable values keyed by name.
    pub values: BTreeMap<String, f64>,
    /// Cost-proxy values, in the order of [`PlanningProblem::theta`].
    pub theta: Vec<f64>,
}

impl PlanningSolution {
    /// Read the linking variables, `FixedCost` and θ from a primal point of
    /// the planning model.
    pub fn from_primal(
        planning: &PlanningProblem,
        linking_variables: &[String],
        primal: &[f64],
        lower_bound: f64,
    ) -> Result<Self> {
        let mut values = BTreeMap::new();
        for name in linking_variables {
            let value = planning
                .model
                .variable_by_name(name)
                .and_then(|id| primal.get(id.index()).copied())
                .ok_or_else(|| {
                    BendersError::PlanningFailed(format!(
                        "no value for linking variable '{}'",
                        name
                    ))
                })?;
            values.insert(name.clone(), value);
        }
        let (fixed_cost, theta) = planning.objective_parts(primal);
        Ok(Self {
            lower_bound,
            fixed_cost,
            values,
            theta,
        })
    }

    /// `FixedCost + Σθ`, the planning objective at this point.
    pub fn planning_objective(&self) -> f64 {
        self.fixed_cost + self.theta.iter().sum::<f64>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubproblemStatus {
    Optimal,
    /// Infeasible without a slack penalty; `duals` holds the Farkas ray.
    Infeasible,
}

/// Outcome of one subproblem at one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubproblemResult {
    pub index: usize,
    /// Operational cost (slack penalties included); `+∞` when infeasible.
    pub objective: f64,
    /// Per linking variable: the shadow price of its fixing row when
    /// optimal, the Farkas ray entry when infeasible.
    pub duals: BTreeMap<String, f64>,
    pub status: SubproblemStatus,
    /// Certified infeasibility margin at the evaluated point (0 when optimal).
    pub infeasibility: f64,
    /// Total slack in use when the subproblem was solved with penalties.
    pub used_slack: f64,
}

impl SubproblemResult {
    pub fn is_feasible(&self) -> bool {
        self.status == SubproblemStatus::Optimal
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Relative gap at or below `ConvTol`.
    Converged,
    /// `MaxIter` iterations done.
    MaxIterations,
    /// `MaxCpuTime` seconds elapsed.
    MaxCpuTime,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::Converged => write!(f, "converged"),
            TerminationReason::MaxIterations => write!(f, "iteration limit"),
            TerminationReason::MaxCpuTime => write!(f, "time limit"),
        }
    }
}

/// Result of a Benders run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BendersResult {
    /// Planning problem with every cut added during the run.
    pub planning_problem: PlanningProblem,
    /// Best solution found (minimal upper bound).
    pub planning_sol: PlanningSolution,
    pub lb_hist: Vec<f64>,
    /// Upper bound per iteration; `+∞` where a subproblem was infeasible.
    pub ub_hist: Vec<f64>,
    /// Elapsed seconds at the end of each iteration.
    pub cpu_time: Vec<f64>,
    /// Evaluated planning solution per iteration.
    pub sol_hist: Vec<PlanningSolution>,
    /// γ used per iteration.
    pub gamma_hist: Vec<f64>,
    pub iterations: usize,
    pub termination: TerminationReason,
    pub converged: bool,
    /// Relative gap at termination.
    pub gap: f64,
}

impl BendersResult {
    pub fn lower_bound(&self) -> f64 {
        self.lb_hist.last().copied().unwrap_or(f64::NEG_INFINITY)
    }

    /// Best upper bound seen during the run.
    pub fn upper_bound(&self) -> f64 {
        self.ub_hist.iter().copied().fold(f64::INFINITY, f64::min)
    }
}
