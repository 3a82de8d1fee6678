//! Planning (master) problem solve with the numerical guard and conflict
//! diagnostics.

use mes_core::{ModelSolution, SolveStatus, SolverBackend, SolverSettings};
use tracing::{debug, error, warn};

use super::error::{BendersError, Result};
use super::problem::PlanningProblem;
use super::solution::PlanningSolution;

/// Values below this on a non-negative linking variable are treated as a
/// solver artifact rather than round-off.
const NEGATIVE_CAPACITY_TOL: f64 = 1e-6;

/// Solve the current planning problem and read off the candidate solution.
///
/// A numerical failure, an iteration limit, or a negative value on a
/// non-negative linking variable triggers one retry with
/// [`SolverSettings::numerically_focused`]. If the problem is still not
/// solved, the backend is asked for a conflicting constraint set and the run
/// fails with [`BendersError::PlanningInfeasible`].
pub fn solve_planning_problem<B: SolverBackend>(
    backend: &B,
    planning: &PlanningProblem,
    linking_variables: &[String],
    settings: &SolverSettings,
) -> Result<PlanningSolution> {
    let mut solution = backend.solve(&planning.model, settings)?;

    let retry_reason = match solution.status {
        SolveStatus::NumericalFailure | SolveStatus::IterationLimit => {
            Some(solution.status.to_string())
        }
        SolveStatus::Optimal => negative_capacity(planning, linking_variables, &solution)
            .map(|(name, value)| format!("negative value {:.3e} on '{}'", value, name)),
        _ => None,
    };
    if let Some(reason) = retry_reason {
        warn!(
            backend = backend.name(),
            reason = %reason,
            "retrying planning problem with numerically focused settings"
        );
        solution = backend.solve(&planning.model, &settings.numerically_focused())?;
    }

    match solution.status {
        SolveStatus::Optimal => {}
        SolveStatus::Unbounded => {
            return Err(BendersError::PlanningFailed(
                "planning problem is unbounded; bound the investment variables".to_string(),
            ))
        }
        status => return Err(diagnose(backend, planning, settings, status)),
    }

    if let Some((name, value)) = negative_capacity(planning, linking_variables, &solution) {
        return Err(BendersError::PlanningFailed(format!(
            "linking variable '{}' is {:.6} after retry",
            name, value
        )));
    }

    debug!(
        objective = solution.objective,
        iterations = solution.iterations,
        "planning problem solved"
    );
    PlanningSolution::from_primal(planning, linking_variables, &solution.primal, solution.objective)
}

/// First linking variable with a non-negative lower bound whose value is
/// clearly negative.
fn negative_capacity(
    planning: &PlanningProblem,
    linking_variables: &[String],
    solution: &ModelSolution,
) -> Option<(String, f64)> {
    linking_variables.iter().find_map(|name| {
        let id = planning.model.variable_by_name(name)?;
        let variable = planning.model.variable(id)?;
        let value = solution.value(id)?;
        (variable.lower_bound() >= 0.0 && value < -NEGATIVE_CAPACITY_TOL)
            .then(|| (name.clone(), value))
    })
}

fn diagnose<B: SolverBackend>(
    backend: &B,
    planning: &PlanningProblem,
    settings: &SolverSettings,
    status: SolveStatus,
) -> BendersError {
    let conflicts = match backend.conflicting_constraints(&planning.model, settings) {
        Ok(conflicts) => conflicts,
        Err(err) => {
            warn!(error = %err, "could not compute conflicting constraints");
            None
        }
    };
    match &conflicts {
        Some(names) => error!(
            %status,
            conflicts = %names.join(", "),
            "planning problem not solved"
        ),
        None => error!(%status, "planning problem not solved"),
    }
    BendersError::PlanningInfeasible { status, conflicts }
}
