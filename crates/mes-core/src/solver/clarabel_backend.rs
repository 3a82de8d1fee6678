//! Clarabel interior-point backend
//!
//! A [`LinearModel`] is mapped onto Clarabel's conic form
//!
//! ```text
//! minimize    ½·xᵀPx + qᵀx
//! subject to  Ax + s = b,   s ∈ K
//! ```
//!
//! | model element          | row(s) of A                 | cone         |
//! |------------------------|-----------------------------|--------------|
//! | `a·x = r`              | `a·x + s = r`               | zero         |
//! | `a·x ≤ r`              | `a·x + s = r`               | non-negative |
//! | `a·x ≥ r`              | `−a·x + s = −r`             | non-negative |
//! | `l ≤ x_j`              | `−x_j + s = −l`             | non-negative |
//! | `x_j ≤ u`              | `x_j + s = u`               | non-negative |
//! | `l = x_j = u`          | `x_j + s = l`               | zero         |
//!
//! Writing `σ = −1` for negated (`≥`) rows and `σ = +1` otherwise, the shadow
//! price of a constraint is `−σ·z` and, for an infeasible model, the Farkas
//! ray entry is `−σ·z` with `−bᵀz > 0` as the infeasibility margin.

use super::backend::{SolverBackend, SolverSettings};
use super::branch_and_bound::solve_mixed_integer;
use super::conflict::deletion_filter;
use crate::error::{ModelError, ModelResult};
use crate::model::{LinearModel, Sense};
use crate::solution::{FarkasCertificate, ModelSolution, SolveStatus};
use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};
use tracing::{debug, trace};

/// Backend solving continuous models with Clarabel and integer models with
/// branch-and-bound on top of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClarabelBackend;

impl ClarabelBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SolverBackend for ClarabelBackend {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve(&self, model: &LinearModel, settings: &SolverSettings) -> ModelResult<ModelSolution> {
        let solution = if model.has_integer_variables() {
            solve_mixed_integer(model, settings)?
        } else {
            Relaxation::new(model).solve(settings)?
        };
        debug!(
            status = %solution.status,
            objective = solution.objective,
            iterations = solution.iterations,
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            "clarabel solve finished"
        );
        Ok(solution)
    }

    fn conflicting_constraints(
        &self,
        model: &LinearModel,
        settings: &SolverSettings,
    ) -> ModelResult<Option<Vec<String>>> {
        deletion_filter(model, settings)
    }
}

/// Continuous relaxation of a model with overridable bounds and an optional
/// subset of active constraints.
#[derive(Debug, Clone)]
pub(crate) struct Relaxation<'a> {
    model: &'a LinearModel,
    pub(crate) lower: Vec<f64>,
    pub(crate) upper: Vec<f64>,
    pub(crate) active: Vec<bool>,
    /// Drop the objective; only feasibility matters.
    pub(crate) feasibility_only: bool,
}

struct Row {
    constraint: Option<usize>,
    sign: f64,
    b: f64,
    equality: bool,
}

/// Append one row's cone, merging with the previous cone of the same kind.
fn push_cone(cones: &mut Vec<SupportedConeT<f64>>, equality: bool) {
    if equality {
        match cones.last_mut() {
            Some(SupportedConeT::ZeroConeT(n)) => *n += 1,
            _ => cones.push(SupportedConeT::ZeroConeT(1)),
        }
    } else {
        match cones.last_mut() {
            Some(SupportedConeT::NonnegativeConeT(n)) => *n += 1,
            _ => cones.push(SupportedConeT::NonnegativeConeT(1)),
        }
    }
}

impl<'a> Relaxation<'a> {
    pub(crate) fn new(model: &'a LinearModel) -> Self {
        let variables = model.variables();
        Self {
            model,
            lower: variables.iter().map(|v| v.lower_bound()).collect(),
            upper: variables.iter().map(|v| v.upper_bound()).collect(),
            active: vec![true; model.num_constraints()],
            feasibility_only: false,
        }
    }

    pub(crate) fn model(&self) -> &'a LinearModel {
        self.model
    }

    pub(crate) fn solve(&self, settings: &SolverSettings) -> ModelResult<ModelSolution> {
        let model = self.model;
        let n = model.num_variables();

        if self.lower.iter().zip(&self.upper).any(|(l, u)| l > u) {
            return Ok(ModelSolution::without_solution(SolveStatus::Infeasible));
        }

        // Assemble A column-wise together with b and the cone list
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut rows: Vec<Row> = Vec::new();
        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();

        for (idx, constraint) in model.constraints().iter().enumerate() {
            if !self.active[idx] {
                continue;
            }
            let sign = if constraint.sense == Sense::Ge { -1.0 } else { 1.0 };
            let row = rows.len();
            for (var, coeff) in constraint.expr.coefficients() {
                if coeff != 0.0 {
                    columns[var.index()].push((row, sign * coeff));
                }
            }
            rows.push(Row {
                constraint: Some(idx),
                sign,
                b: sign * (constraint.rhs - constraint.expr.constant),
                equality: constraint.sense == Sense::Eq,
            });
            push_cone(&mut cones, constraint.sense == Sense::Eq);
        }

        for j in 0..n {
            let (lower, upper) = (self.lower[j], self.upper[j]);
            if lower.is_finite() && lower == upper {
                columns[j].push((rows.len(), 1.0));
                rows.push(Row { constraint: None, sign: 1.0, b: lower, equality: true });
                push_cone(&mut cones, true);
                continue;
            }
            if lower.is_finite() {
                columns[j].push((rows.len(), -1.0));
                rows.push(Row { constraint: None, sign: 1.0, b: -lower, equality: false });
                push_cone(&mut cones, false);
            }
            if upper.is_finite() {
                columns[j].push((rows.len(), 1.0));
                rows.push(Row { constraint: None, sign: 1.0, b: upper, equality: false });
                push_cone(&mut cones, false);
            }
        }

        let mut q = vec![0.0; n];
        let mut weights = vec![0.0; n];
        if !self.feasibility_only {
            for (var, coeff) in model.objective().coefficients() {
                q[var.index()] += coeff;
            }
            for &(var, weight) in model.quadratic() {
                weights[var.index()] += weight;
            }
        }

        if n == 0 {
            return Ok(self.solve_without_variables(&rows));
        }
        if rows.is_empty() {
            return Ok(self.solve_unconstrained(&q, &weights));
        }

        let m = rows.len();
        let mut col_ptr = Vec::with_capacity(n + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        for column in columns.iter_mut() {
            col_ptr.push(row_idx.len());
            column.sort_by_key(|(r, _)| *r);
            for &(r, v) in column.iter() {
                row_idx.push(r);
                values.push(v);
            }
        }
        col_ptr.push(row_idx.len());
        let a_mat = CscMatrix::new(m, n, col_ptr, row_idx, values);

        // P is diagonal; the factor 2 offsets Clarabel's ½
        let mut p_col_ptr = Vec::with_capacity(n + 1);
        let mut p_row_idx = Vec::new();
        let mut p_values = Vec::new();
        for (j, &weight) in weights.iter().enumerate() {
            p_col_ptr.push(p_row_idx.len());
            if weight > 0.0 {
                p_row_idx.push(j);
                p_values.push(2.0 * weight);
            }
        }
        p_col_ptr.push(p_row_idx.len());
        let p_mat = CscMatrix::new(n, n, p_col_ptr, p_row_idx, p_values);

        let b: Vec<f64> = rows.iter().map(|row| row.b).collect();

        let clarabel_settings = DefaultSettingsBuilder::default()
            .verbose(settings.verbose)
            .max_iter(settings.max_iter)
            .time_limit(settings.time_limit.unwrap_or(f64::INFINITY))
            .tol_gap_abs(settings.tol_gap_abs)
            .tol_gap_rel(settings.tol_gap_rel)
            .tol_feas(settings.tol_feas)
            .presolve_enable(settings.presolve)
            .equilibrate_enable(settings.equilibrate)
            .build()
            .map_err(|e| ModelError::Backend(format!("Clarabel settings error: {:?}", e)))?;

        let mut solver = DefaultSolver::new(&p_mat, &q, &a_mat, &b, &cones, clarabel_settings)
            .map_err(|e| ModelError::Backend(format!("Clarabel initialization failed: {:?}", e)))?;
        solver.solve();

        let sol = &solver.solution;
        trace!(status = ?sol.status, rows = m, columns = n, "clarabel returned");

        let status = match sol.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => SolveStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                SolveStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                SolveStatus::Unbounded
            }
            SolverStatus::MaxIterations | SolverStatus::MaxTime => SolveStatus::IterationLimit,
            _ => SolveStatus::NumericalFailure,
        };

        let mut solution = ModelSolution::without_solution(status);
        solution.iterations = sol.iterations;

        match status {
            SolveStatus::Optimal => {
                let mut duals = vec![0.0; model.num_constraints()];
                for (row, &z) in rows.iter().zip(&sol.z) {
                    if let Some(c) = row.constraint {
                        duals[c] = -row.sign * z;
                    }
                }
                solution.primal = sol.x.clone();
                solution.objective = if self.feasibility_only {
                    0.0
                } else {
                    model.objective_value(&solution.primal)
                };
                solution.duals = duals;
            }
            SolveStatus::Infeasible => match self.certificate(&rows, &sol.z) {
                Some(certificate) => solution.farkas = Some(certificate),
                None => {
                    debug!("infeasibility certificate has no positive margin");
                    solution.status = SolveStatus::NumericalFailure;
                }
            },
            _ => {}
        }
        Ok(solution)
    }

    /// Normalized Farkas certificate from Clarabel's infeasibility ray `z`.
    fn certificate(&self, rows: &[Row], z: &[f64]) -> Option<FarkasCertificate> {
        let scale = z.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if !(scale.is_finite() && scale > 0.0) {
            return None;
        }
        let infeasibility = -rows.iter().zip(z).map(|(row, zr)| row.b * zr).sum::<f64>() / scale;
        if !(infeasibility.is_finite() && infeasibility > 0.0) {
            return None;
        }
        let mut ray = vec![0.0; self.model.num_constraints()];
        for (row, &zr) in rows.iter().zip(z) {
            if let Some(c) = row.constraint {
                ray[c] = -row.sign * zr / scale;
            }
        }
        Some(FarkasCertificate { ray, infeasibility })
    }

    fn solve_without_variables(&self, rows: &[Row]) -> ModelSolution {
        let feasible = rows.iter().all(|row| {
            if row.equality {
                row.b.abs() <= 1e-9
            } else {
                row.b >= -1e-9
            }
        });
        if !feasible {
            return ModelSolution::without_solution(SolveStatus::Infeasible);
        }
        ModelSolution {
            status: SolveStatus::Optimal,
            objective: if self.feasibility_only {
                0.0
            } else {
                self.model.objective().constant
            },
            primal: Vec::new(),
            duals: vec![0.0; self.model.num_constraints()],
            farkas: None,
            iterations: 0,
        }
    }

    /// Closed-form minimum of a separable objective without any rows.
    fn solve_unconstrained(&self, q: &[f64], weights: &[f64]) -> ModelSolution {
        let mut primal = Vec::with_capacity(q.len());
        for (&qj, &wj) in q.iter().zip(weights) {
            if wj > 0.0 {
                primal.push(-qj / (2.0 * wj));
            } else if qj == 0.0 {
                primal.push(0.0);
            } else {
                return ModelSolution::without_solution(SolveStatus::Unbounded);
            }
        }
        ModelSolution {
            status: SolveStatus::Optimal,
            objective: if self.feasibility_only {
                0.0
            } else {
                self.model.objective_value(&primal)
            },
            primal,
            duals: vec![0.0; self.model.num_constraints()],
            farkas: None,
            iterations: 0,
        }
    }
}
