//! Solver outcomes returned by a [`crate::SolverBackend`].

use crate::model::{ConstraintId, LinearModel, VarId};
use serde::{Deserialize, Serialize};

/// Termination status of a single solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Optimal solution found.
    Optimal,
    /// Problem is infeasible.
    Infeasible,
    /// Problem is unbounded.
    Unbounded,
    /// Iteration, node or time limit reached before optimality.
    IterationLimit,
    /// Numerical difficulties.
    NumericalFailure,
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::IterationLimit => write!(f, "iteration_limit"),
            SolveStatus::NumericalFailure => write!(f, "numerical_failure"),
        }
    }
}

/// Certificate of primal infeasibility expressed on constraint right-hand sides.
///
/// For right-hand sides `b'` the affine function
///
/// ```text
/// φ(b') = infeasibility + Σ_c ray[c]·(b'[c] − b[c])
/// ```
///
/// is positive at the solved point `b` and is `≤ 0` for every `b'` that makes
/// the model feasible. Requiring `φ(b') ≤ 0` is therefore a valid cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarkasCertificate {
    /// One entry per constraint, indexed by [`ConstraintId`].
    pub ray: Vec<f64>,
    /// `φ(b) > 0` at the right-hand sides that were solved.
    pub infeasibility: f64,
}

impl FarkasCertificate {
    pub fn ray(&self, id: ConstraintId) -> Option<f64> {
        self.ray.get(id.index()).copied()
    }
}

/// Result of solving a [`LinearModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSolution {
    pub status: SolveStatus,
    /// Objective value including constants; NaN unless optimal.
    pub objective: f64,
    /// Primal values indexed by [`VarId`]; empty unless optimal.
    pub primal: Vec<f64>,
    /// Shadow prices `∂objective/∂rhs` indexed by [`ConstraintId`]; empty for
    /// integer solves and non-optimal outcomes.
    pub duals: Vec<f64>,
    /// Present for infeasible continuous problems.
    pub farkas: Option<FarkasCertificate>,
    /// Interior-point iterations, or branch-and-bound nodes for integer solves.
    pub iterations: u32,
}

impl ModelSolution {
    /// A non-optimal outcome carrying no primal or dual information.
    pub fn without_solution(status: SolveStatus) -> Self {
        Self {
            status,
            objective: f64::NAN,
            primal: Vec::new(),
            duals: Vec::new(),
            farkas: None,
            iterations: 0,
        }
    }

    pub fn value(&self, id: VarId) -> Option<f64> {
        self.primal.get(id.index()).copied()
    }

    pub fn value_by_name(&self, model: &LinearModel, name: &str) -> Option<f64> {
        model.variable_by_name(name).and_then(|id| self.value(id))
    }

    pub fn dual(&self, id: ConstraintId) -> Option<f64> {
        self.duals.get(id.index()).copied()
    }
}
