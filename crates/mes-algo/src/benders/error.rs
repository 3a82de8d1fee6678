use mes_core::{ModelError, SolveStatus};
use thiserror::Error;

/// Error types for the Benders decomposition.
///
/// Non-convergence within `MaxIter`/`MaxCpuTime` and infeasible subproblems
/// are not errors: the former ends the run normally, the latter becomes a
/// feasibility cut.
#[derive(Debug, Error)]
pub enum BendersError {
    /// A configuration value is out of range.
    #[error("Invalid Benders configuration: {0}")]
    InvalidConfig(String),

    /// The decomposed problem does not satisfy the master/subproblem contract.
    #[error("Invalid decomposed problem: {0}")]
    InvalidProblem(String),

    /// The planning problem could not be solved, even after the retry.
    #[error("Planning problem solve ended {status}{}", describe_conflicts(.conflicts))]
    PlanningInfeasible {
        status: SolveStatus,
        conflicts: Option<Vec<String>>,
    },

    /// The planning problem returned an unusable solution.
    #[error("Planning problem failed: {0}")]
    PlanningFailed(String),

    /// The level-set projection did not return a solution.
    #[error("Interior level-set problem ended {status}")]
    StabilizationFailed { status: SolveStatus },

    /// An operational subproblem could not be evaluated.
    #[error("Subproblem {index} failed: {message}")]
    SubproblemFailed { index: usize, message: String },

    /// Model construction or backend error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// The worker pool for distributed evaluation could not be built.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

fn describe_conflicts(conflicts: &Option<Vec<String>>) -> String {
    match conflicts {
        Some(names) if !names.is_empty() => {
            format!("; conflicting constraints: {}", names.join(", "))
        }
        _ => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, BendersError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planning_error_lists_conflicts() {
        let err = BendersError::PlanningInfeasible {
            status: SolveStatus::Infeasible,
            conflicts: Some(vec!["feas_cut[3,1]".into(), "budget".into()]),
        };
        let message = err.to_string();
        assert!(message.contains("infeasible"));
        assert!(message.contains("feas_cut[3,1], budget"));

        let bare = BendersError::PlanningInfeasible {
            status: SolveStatus::NumericalFailure,
            conflicts: None,
        };
        assert!(!bare.to_string().contains("conflicting"));
    }

    #[test]
    fn test_model_error_conversion() {
        let err: BendersError = ModelError::UnknownVariable("capacity".into()).into();
        assert!(matches!(err, BendersError::Model(_)));
        assert!(err.to_string().contains("capacity"));
    }
}
