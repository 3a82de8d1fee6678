//! Evaluation of operational subproblems at fixed linking-variable values.
//!
//! Each linking variable `x` of a subproblem gets a fixing row
//! `fix[x]: x = x̄` whose right-hand side is updated before every solve. Its
//! shadow price is the cut coefficient, and its Farkas ray entry is the
//! feasibility-cut coefficient.

use std::collections::BTreeMap;

use mes_core::{
    ConstraintId, LinearConstraint, LinearExpr, LinearModel, ModelSolution, SolveStatus,
    SolverBackend, SolverSettings, VarId,
};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, warn};

use super::error::{BendersError, Result};
use super::problem::Subproblem;
use super::solution::{SubproblemResult, SubproblemStatus};

/// Automatic slack penalty: 1000 times the largest objective coefficient
/// (at least 1000).
pub fn automatic_slack_penalty(model: &LinearModel) -> f64 {
    let largest = model
        .objective()
        .terms
        .iter()
        .map(|&(_, coeff)| coeff.abs())
        .fold(1.0_f64, f64::max);
    1e3 * largest
}

/// Name of the row fixing a linking variable inside a subproblem.
pub fn fixing_row_name(linking_variable: &str) -> String {
    format!("fix[{}]", linking_variable)
}

/// A subproblem prepared for repeated evaluation.
#[derive(Debug, Clone)]
pub struct SubproblemEvaluator {
    index: usize,
    model: LinearModel,
    fixing_rows: Vec<(String, ConstraintId)>,
    slack_penalty: Option<f64>,
    /// Penalized copy of `model`, solved in place of it whenever a slack
    /// penalty is set.
    relaxed: Option<(LinearModel, Vec<VarId>)>,
}

impl SubproblemEvaluator {
    /// Add the fixing rows and settle the slack policy.
    ///
    /// With `automatic_penalty` on, a subproblem without a penalty receives
    /// [`automatic_slack_penalty`]. Every penalized subproblem is relaxed here,
    /// before its first solve, so all of its cuts come from the same model.
    pub fn new(subproblem: Subproblem, automatic_penalty: bool) -> Result<Self> {
        let Subproblem {
            index,
            mut model,
            linking_variables,
            slack_penalty,
        } = subproblem;

        let relaxed_integers = model.relax_integrality();
        if relaxed_integers > 0 {
            warn!(
                subproblem = index,
                count = relaxed_integers,
                "integer variables in subproblem solved as continuous"
            );
        }

        let mut fixing_rows = Vec::with_capacity(linking_variables.len());
        for name in linking_variables {
            let var = model.variable_by_name(&name).ok_or_else(|| {
                BendersError::InvalidProblem(format!(
                    "subproblem {} has no variable named '{}'",
                    index, name
                ))
            })?;
            let row = model.add_constraint(LinearConstraint::eq(
                fixing_row_name(&name),
                LinearExpr::from(var),
                0.0,
            ))?;
            fixing_rows.push((name, row));
        }

        let slack_penalty = match slack_penalty {
            None if automatic_penalty => Some(automatic_slack_penalty(&model)),
            penalty => penalty,
        };

        let mut evaluator = Self {
            index,
            model,
            fixing_rows,
            slack_penalty,
            relaxed: None,
        };
        if let Some(penalty) = slack_penalty {
            evaluator.relax(penalty)?;
        }
        Ok(evaluator)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn slack_penalty(&self) -> Option<f64> {
        self.slack_penalty
    }

    /// Whether the penalized copy is in use.
    pub fn is_relaxed(&self) -> bool {
        self.relaxed.is_some()
    }

    /// Solve at `values`, which must contain every linking variable of this
    /// subproblem.
    pub fn evaluate<B: SolverBackend>(
        &mut self,
        backend: &B,
        values: &BTreeMap<String, f64>,
        settings: &SolverSettings,
    ) -> Result<SubproblemResult> {
        for (name, row) in &self.fixing_rows {
            let value = *values.get(name).ok_or_else(|| BendersError::SubproblemFailed {
                index: self.index,
                message: format!("no value for linking variable '{}'", name),
            })?;
            self.model.set_rhs(*row, value)?;
            if let Some((relaxed, _)) = self.relaxed.as_mut() {
                relaxed.set_rhs(*row, value)?;
            }
        }

        let solution = self.solve_current(backend, settings)?;
        match solution.status {
            SolveStatus::Optimal => return self.optimal_result(&solution),
            SolveStatus::Infeasible => {}
            status => {
                return Err(BendersError::SubproblemFailed {
                    index: self.index,
                    message: format!("solver ended {}", status),
                })
            }
        }

        if self.relaxed.is_some() {
            return Err(BendersError::SubproblemFailed {
                index: self.index,
                message: "infeasible even with penalized slacks".to_string(),
            });
        }

        let certificate = solution.farkas.ok_or_else(|| BendersError::SubproblemFailed {
            index: self.index,
            message: "infeasible without an infeasibility certificate".to_string(),
        })?;
        let duals = self
            .fixing_rows
            .iter()
            .map(|(name, row)| (name.clone(), certificate.ray(*row).unwrap_or(0.0)))
            .collect();
        debug!(
            subproblem = self.index,
            infeasibility = certificate.infeasibility,
            "subproblem infeasible"
        );
        Ok(SubproblemResult {
            index: self.index,
            objective: f64::INFINITY,
            duals,
            status: SubproblemStatus::Infeasible,
            infeasibility: certificate.infeasibility,
            used_slack: 0.0,
        })
    }

    fn relax(&mut self, penalty: f64) -> Result<()> {
        let mut relaxed = self.model.clone();
        let slacks = relaxed.relax_with_penalty(penalty)?;
        self.relaxed = Some((relaxed, slacks));
        Ok(())
    }

    /// Solve whichever model is active, retrying once on a numerical failure.
    fn solve_current<B: SolverBackend>(
        &self,
        backend: &B,
        settings: &SolverSettings,
    ) -> Result<ModelSolution> {
        let model = self.relaxed.as_ref().map_or(&self.model, |(m, _)| m);
        let solution = backend.solve(model, settings)?;
        match solution.status {
            SolveStatus::NumericalFailure | SolveStatus::IterationLimit => {
                warn!(
                    subproblem = self.index,
                    status = %solution.status,
                    "retrying subproblem with numerically focused settings"
                );
                Ok(backend.solve(model, &settings.numerically_focused())?)
            }
            _ => Ok(solution),
        }
    }

    fn optimal_result(&self, solution: &ModelSolution) -> Result<SubproblemResult> {
        let mut duals = BTreeMap::new();
        for (name, row) in &self.fixing_rows {
            let dual = solution.dual(*row).ok_or_else(|| BendersError::SubproblemFailed {
                index: self.index,
                message: format!("no dual value for {}", fixing_row_name(name)),
            })?;
            duals.insert(name.clone(), dual);
        }
        let used_slack = self.relaxed.as_ref().map_or(0.0, |(_, slacks)| {
            slacks
                .iter()
                .filter_map(|&s| solution.value(s))
                .map(|v| v.max(0.0))
                .sum()
        });
        if used_slack > 1e-6 {
            warn!(subproblem = self.index, used_slack, "penalized slack absorbs infeasibility");
        }
        debug!(
            subproblem = self.index,
            objective = solution.objective,
            "subproblem solved"
        );
        Ok(SubproblemResult {
            index: self.index,
            objective: solution.objective,
            duals,
            status: SubproblemStatus::Optimal,
            infeasibility: 0.0,
            used_slack,
        })
    }
}

/// Evaluate every subproblem at `values` and collect the results by index.
///
/// With a pool the evaluations run concurrently; each task owns its
/// evaluator exclusively and only reads `values`.
pub fn solve_subproblems<B: SolverBackend>(
    backend: &B,
    evaluators: &mut [SubproblemEvaluator],
    values: &BTreeMap<String, f64>,
    settings: &SolverSettings,
    pool: Option<&ThreadPool>,
) -> Result<BTreeMap<usize, SubproblemResult>> {
    let results: Vec<SubproblemResult> = match pool {
        Some(pool) => pool.install(|| {
            evaluators
                .par_iter_mut()
                .map(|evaluator| evaluator.evaluate(backend, values, settings))
                .collect::<Result<Vec<_>>>()
        })?,
        None => evaluators
            .iter_mut()
            .map(|evaluator| evaluator.evaluate(backend, values, settings))
            .collect::<Result<Vec<_>>>()?,
    };
    Ok(results.into_iter().map(|r| (r.index, r)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mes_core::{ClarabelBackend, Variable};

    /// Serves `capacity` exactly, but at most 3 units: infeasible above 3.
    fn capped(slack_penalty: Option<f64>) -> Subproblem {
        let mut model = LinearModel::new();
        let x = model.add_variable(Variable::new("capacity")).unwrap();
        let g = model.add_variable(Variable::new("generation")).unwrap();
        model
            .add_constraint(LinearConstraint::eq(
                "dispatch",
                LinearExpr::new().with_term(g, 1.0).with_term(x, -1.0),
                0.0,
            ))
            .unwrap();
        model
            .add_constraint(LinearConstraint::le("limit", LinearExpr::from(g), 3.0))
            .unwrap();
        model.set_objective(LinearExpr::from(g)).unwrap();
        Subproblem {
            index: 0,
            model,
            linking_variables: vec!["capacity".to_string()],
            slack_penalty,
        }
    }

    fn at(value: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([("capacity".to_string(), value)])
    }

    #[test]
    fn test_fixing_rows_and_dual() {
        let backend = ClarabelBackend::new();
        let mut evaluator = SubproblemEvaluator::new(capped(None), false).unwrap();
        let result = evaluator
            .evaluate(&backend, &at(2.0), &SolverSettings::default())
            .unwrap();
        assert!(result.is_feasible());
        assert!((result.objective - 2.0).abs() < 1e-6);
        assert!((result.duals["capacity"] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_infeasible_returns_ray() {
        let backend = ClarabelBackend::new();
        let mut evaluator = SubproblemEvaluator::new(capped(None), false).unwrap();
        let result = evaluator
            .evaluate(&backend, &at(5.0), &SolverSettings::default())
            .unwrap();
        assert_eq!(result.status, SubproblemStatus::Infeasible);
        assert!(result.infeasibility > 0.0);
        assert!(result.duals["capacity"] > 0.0);
        assert!(result.objective.is_infinite());
    }

    #[test]
    fn test_explicit_penalty_relaxes_before_first_solve() {
        let backend = ClarabelBackend::new();
        let mut evaluator = SubproblemEvaluator::new(capped(Some(100.0)), false).unwrap();
        assert!(evaluator.is_relaxed());

        let inside = evaluator
            .evaluate(&backend, &at(2.0), &SolverSettings::default())
            .unwrap();
        assert!((inside.objective - 2.0).abs() < 1e-5);
        assert!(inside.used_slack < 1e-5);

        let result = evaluator
            .evaluate(&backend, &at(5.0), &SolverSettings::default())
            .unwrap();
        assert!(result.is_feasible());
        assert!((result.used_slack - 2.0).abs() < 1e-4);
        assert!((result.objective - 203.0).abs() < 1e-3);
    }

    #[test]
    fn test_automatic_penalty_relaxes_up_front() {
        let evaluator = SubproblemEvaluator::new(capped(None), true).unwrap();
        assert!(evaluator.is_relaxed());
        assert_eq!(evaluator.slack_penalty(), Some(1e3));
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let backend = ClarabelBackend::new();
        let mut evaluator = SubproblemEvaluator::new(capped(None), false).unwrap();
        let err = evaluator
            .evaluate(&backend, &BTreeMap::new(), &SolverSettings::default())
            .unwrap_err();
        assert!(matches!(err, BendersError::SubproblemFailed { index: 0, .. }));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let backend = ClarabelBackend::new();
        let build = |n: usize| -> Vec<SubproblemEvaluator> {
            (0..n)
                .map(|i| {
                    let mut sub = capped(None);
                    sub.index = i;
                    SubproblemEvaluator::new(sub, false).unwrap()
                })
                .collect()
        };
        let settings = SolverSettings::default();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

        let mut sequential = build(4);
        let mut parallel = build(4);
        let a = solve_subproblems(&backend, &mut sequential, &at(1.5), &settings, None).unwrap();
        let b = solve_subproblems(&backend, &mut parallel, &at(1.5), &settings, Some(&pool)).unwrap();

        assert_eq!(a.keys().collect::<Vec<_>>(), vec![&0, &1, &2, &3]);
        for (index, result) in &a {
            assert!((result.objective - b[index].objective).abs() < 1e-9);
        }
    }
}
