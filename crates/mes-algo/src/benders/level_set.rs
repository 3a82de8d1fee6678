//! Interior level-set stabilization.
//!
//! ```text
//! minimize    Σ_j (x_j − c_j)²                      over linking variables
//! subject to  FixedCost(x) + Σθ ≤ LB + γ·(UB − LB)
//!             every planning constraint and cut
//! ```
//!
//! `c` is the stabilization centre. The projected point replaces the master
//! solution for the subproblem evaluation, which damps the oscillation of
//! plain Benders iterates.

use mes_core::{LinearConstraint, LinearExpr, SolveStatus, SolverBackend, SolverSettings};
use tracing::debug;

use super::error::{BendersError, Result};
use super::planning::solve_planning_problem;
use super::problem::PlanningProblem;
use super::solution::PlanningSolution;

/// γ below this is treated as zero under dynamic adjustment.
const MIN_GAMMA: f64 = 1e-3;

/// Name of the level constraint in the projection model.
pub const LEVEL_SET: &str = "level_set";

/// Project `centre` onto the level set of the planning problem.
///
/// The returned solution carries `lower_bound` as its lower bound; its
/// planning objective is at most `lower_bound + gamma·(upper_bound − lower_bound)`.
/// With `gamma == 0` the master is solved as is and its own solution is
/// returned, whatever the centre and bounds.
#[allow(clippy::too_many_arguments)]
pub fn solve_int_level_set_problem<B: SolverBackend>(
    backend: &B,
    planning: &PlanningProblem,
    linking_variables: &[String],
    centre: &PlanningSolution,
    lower_bound: f64,
    upper_bound: f64,
    gamma: f64,
    settings: &SolverSettings,
) -> Result<PlanningSolution> {
    if !(0.0..=1.0).contains(&gamma) {
        return Err(BendersError::InvalidConfig(format!(
            "level-set parameter must lie in [0, 1], got {}",
            gamma
        )));
    }
    if gamma == 0.0 {
        return solve_planning_problem(backend, planning, linking_variables, settings);
    }
    if !(lower_bound.is_finite() && upper_bound.is_finite()) {
        return Err(BendersError::InvalidProblem(format!(
            "level set needs finite bounds, got LB = {}, UB = {}",
            lower_bound, upper_bound
        )));
    }

    let level = lower_bound + gamma * (upper_bound - lower_bound).max(0.0);

    let mut model = planning.model.clone();
    model.add_constraint(LinearConstraint::le(
        LEVEL_SET,
        planning.model.objective().clone(),
        level,
    ))?;

    let mut objective = LinearExpr::new();
    let mut weights = Vec::with_capacity(linking_variables.len());
    for name in linking_variables {
        let var = model.variable_by_name(name).ok_or_else(|| {
            BendersError::InvalidProblem(format!(
                "linking variable '{}' is not in the planning model",
                name
            ))
        })?;
        let c = centre.values.get(name).copied().ok_or_else(|| {
            BendersError::InvalidProblem(format!("centre has no value for '{}'", name))
        })?;
        objective.add_term(var, -2.0 * c);
        objective.add_constant(c * c);
        weights.push((var, 1.0));
    }
    model.set_objective(objective)?;
    model.set_quadratic_objective(weights)?;

    let solution = backend.solve(&model, settings)?;
    if solution.status != SolveStatus::Optimal {
        return Err(BendersError::StabilizationFailed {
            status: solution.status,
        });
    }
    debug!(
        level,
        gamma,
        distance = solution.objective.max(0.0).sqrt(),
        "level-set projection solved"
    );
    PlanningSolution::from_primal(planning, linking_variables, &solution.primal, lower_bound)
}

/// Next γ under dynamic stabilization.
///
/// Halved when the iteration did not improve the best upper bound (dropping
/// to 0 below 1e-3), doubled up to `configured` when it did.
pub(crate) fn dynamic_gamma(current: f64, configured: f64, improved: bool) -> f64 {
    if configured <= 0.0 {
        return 0.0;
    }
    if improved {
        (current.max(MIN_GAMMA) * 2.0).min(configured)
    } else {
        let halved = current / 2.0;
        if halved < MIN_GAMMA {
            0.0
        } else {
            halved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mes_core::{ClarabelBackend, LinearModel, Variable};
    use std::collections::BTreeMap;

    fn planning() -> PlanningProblem {
        let mut model = LinearModel::new();
        let x = model
            .add_variable(Variable::new("capacity").with_bounds(0.0, 10.0))
            .unwrap();
        let t = model.add_variable(Variable::new("theta").with_lower(0.0)).unwrap();
        model
            .add_constraint(LinearConstraint::ge(
                "opt_cut[1,all]",
                LinearExpr::new().with_term(t, 1.0).with_term(x, 2.0),
                8.0,
            ))
            .unwrap();
        PlanningProblem::new(model, LinearExpr::from(x), vec![t]).unwrap()
    }

    fn centre(value: f64) -> PlanningSolution {
        PlanningSolution {
            lower_bound: 0.0,
            fixed_cost: value,
            values: BTreeMap::from([("capacity".to_string(), value)]),
            theta: vec![0.0],
        }
    }

    #[test]
    fn test_projects_onto_level() {
        // master optimum is x = 4 at cost 4; level 4 + 0.5·(10 − 4) = 7
        let solution = solve_int_level_set_problem(
            &ClarabelBackend::new(),
            &planning(),
            &["capacity".to_string()],
            &centre(8.0),
            4.0,
            10.0,
            0.5,
            &SolverSettings::default(),
        )
        .unwrap();
        assert!((solution.values["capacity"] - 7.0).abs() < 1e-4);
        assert!(solution.planning_objective() <= 7.0 + 1e-5);
        assert_eq!(solution.lower_bound, 4.0);
    }

    #[test]
    fn test_centre_inside_level_set_is_kept() {
        let solution = solve_int_level_set_problem(
            &ClarabelBackend::new(),
            &planning(),
            &["capacity".to_string()],
            &centre(5.0),
            4.0,
            10.0,
            0.5,
            &SolverSettings::default(),
        )
        .unwrap();
        assert!((solution.values["capacity"] - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_rejects_infinite_upper_bound() {
        let err = solve_int_level_set_problem(
            &ClarabelBackend::new(),
            &planning(),
            &["capacity".to_string()],
            &centre(8.0),
            4.0,
            f64::INFINITY,
            0.5,
            &SolverSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BendersError::InvalidProblem(_)));
    }

    #[test]
    fn test_zero_gamma_returns_master_solution() {
        // min 2x + θ with θ + 2x ≥ 8: every x in [0, 4] is optimal
        let mut model = LinearModel::new();
        let x = model
            .add_variable(Variable::new("capacity").with_bounds(0.0, 10.0))
            .unwrap();
        let t = model.add_variable(Variable::new("theta").with_lower(0.0)).unwrap();
        model
            .add_constraint(LinearConstraint::ge(
                "opt_cut[1,all]",
                LinearExpr::new().with_term(t, 1.0).with_term(x, 2.0),
                8.0,
            ))
            .unwrap();
        let planning =
            PlanningProblem::new(model, LinearExpr::new().with_term(x, 2.0), vec![t]).unwrap();
        let linking = ["capacity".to_string()];
        let backend = ClarabelBackend::new();
        let settings = SolverSettings::default();

        let master = solve_planning_problem(&backend, &planning, &linking, &settings).unwrap();
        let solution = solve_int_level_set_problem(
            &backend,
            &planning,
            &linking,
            &centre(9.0),
            8.0,
            20.0,
            0.0,
            &settings,
        )
        .unwrap();
        assert!((solution.values["capacity"] - master.values["capacity"]).abs() < 1e-9);
        assert!(solution.values["capacity"] <= 4.0 + 1e-6);
        assert!((solution.lower_bound - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_dynamic_gamma() {
        assert_eq!(dynamic_gamma(0.5, 0.5, false), 0.25);
        assert_eq!(dynamic_gamma(0.25, 0.5, true), 0.5);
        assert_eq!(dynamic_gamma(0.5, 0.5, true), 0.5);
        assert_eq!(dynamic_gamma(0.0015, 0.5, false), 0.0);
        assert_eq!(dynamic_gamma(0.0, 0.5, true), 0.002);
        assert_eq!(dynamic_gamma(0.3, 0.0, true), 0.0);
    }
}
