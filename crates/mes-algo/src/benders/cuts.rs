//! Benders cuts built from subproblem results.
//!
//! ```text
//! optimality   θ_w ≥ f_w(x̄) + Σ_j λ_j·(x_j − x̄_j)        λ = fixing-row shadow prices
//! feasibility  φ_w + Σ_j r_j·(x_j − x̄_j) ≤ 0              r = Farkas ray on fixing rows
//! ```
//!
//! With one θ per subproblem every feasible subproblem gets its own
//! optimality cut. With a single θ the optimality cuts are summed into one
//! aggregated cut, added only when every subproblem is feasible. Feasibility
//! cuts are always per subproblem.

use std::collections::BTreeMap;

use mes_core::{LinearConstraint, LinearExpr, VarId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{BendersError, Result};
use super::problem::PlanningProblem;
use super::solution::{SubproblemResult, SubproblemStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutKind {
    Optimality,
    Feasibility,
}

/// A cut over the linking variables (and θ for optimality cuts).
///
/// Optimality: `θ − Σ coefficients·x ≥ rhs`.
/// Feasibility: `Σ coefficients·x ≤ rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BendersCut {
    pub name: String,
    pub kind: CutKind,
    /// `None` for the aggregated optimality cut.
    pub subproblem: Option<usize>,
    pub theta: Option<VarId>,
    pub coefficients: BTreeMap<String, f64>,
    pub rhs: f64,
}

impl BendersCut {
    fn optimality(
        name: String,
        subproblem: Option<usize>,
        theta: VarId,
        objective: f64,
        duals: &BTreeMap<String, f64>,
        values: &BTreeMap<String, f64>,
    ) -> Result<Self> {
        let rhs = objective - weighted_sum(duals, values)?;
        Ok(Self {
            name,
            kind: CutKind::Optimality,
            subproblem,
            theta: Some(theta),
            coefficients: duals.clone(),
            rhs,
        })
    }

    fn feasibility(
        name: String,
        subproblem: usize,
        infeasibility: f64,
        ray: &BTreeMap<String, f64>,
        values: &BTreeMap<String, f64>,
    ) -> Result<Self> {
        let rhs = weighted_sum(ray, values)? - infeasibility;
        Ok(Self {
            name,
            kind: CutKind::Feasibility,
            subproblem: Some(subproblem),
            theta: None,
            coefficients: ray.clone(),
            rhs,
        })
    }

    /// `Σ coefficients·x` at named linking-variable values.
    pub fn linking_term(&self, values: &BTreeMap<String, f64>) -> Result<f64> {
        weighted_sum(&self.coefficients, values)
    }

    /// Amount by which the point `(values, theta)` violates this cut.
    pub fn violation(&self, values: &BTreeMap<String, f64>, theta: f64) -> Result<f64> {
        let term = self.linking_term(values)?;
        Ok(match self.kind {
            CutKind::Optimality => (self.rhs - (theta - term)).max(0.0),
            CutKind::Feasibility => (term - self.rhs).max(0.0),
        })
    }

    /// Express the cut as a constraint of the planning model.
    pub fn to_constraint(&self, planning: &PlanningProblem) -> Result<LinearConstraint> {
        let sign = match self.kind {
            CutKind::Optimality => -1.0,
            CutKind::Feasibility => 1.0,
        };
        let mut expr = LinearExpr::new();
        if let Some(theta) = self.theta {
            expr.add_term(theta, 1.0);
        }
        for (name, &coeff) in &self.coefficients {
            if coeff == 0.0 {
                continue;
            }
            let var = planning.model.variable_by_name(name).ok_or_else(|| {
                BendersError::InvalidProblem(format!(
                    "cut references '{}', which is not in the planning model",
                    name
                ))
            })?;
            expr.add_term(var, sign * coeff);
        }
        Ok(match self.kind {
            CutKind::Optimality => LinearConstraint::ge(self.name.clone(), expr, self.rhs),
            CutKind::Feasibility => LinearConstraint::le(self.name.clone(), expr, self.rhs),
        })
    }
}

fn weighted_sum(coefficients: &BTreeMap<String, f64>, values: &BTreeMap<String, f64>) -> Result<f64> {
    coefficients.iter().try_fold(0.0, |acc, (name, coeff)| {
        let value = values.get(name).ok_or_else(|| {
            BendersError::InvalidProblem(format!("no value for linking variable '{}'", name))
        })?;
        Ok(acc + coeff * value)
    })
}

/// Turn the results of iteration `iteration` into cuts.
pub fn generate_cuts(
    planning: &PlanningProblem,
    results: &BTreeMap<usize, SubproblemResult>,
    values: &BTreeMap<String, f64>,
    iteration: usize,
) -> Result<Vec<BendersCut>> {
    let mut cuts = Vec::new();

    for (&index, result) in results {
        if result.status == SubproblemStatus::Infeasible {
            cuts.push(BendersCut::feasibility(
                format!("feas_cut[{},{}]", iteration, index),
                index,
                result.infeasibility,
                &result.duals,
                values,
            )?);
        }
    }

    if planning.is_multi_cut() {
        for (&index, result) in results.iter().filter(|(_, r)| r.is_feasible()) {
            let theta = planning.theta_for(index).ok_or_else(|| {
                BendersError::InvalidProblem(format!("no theta variable for subproblem {}", index))
            })?;
            cuts.push(BendersCut::optimality(
                format!("opt_cut[{},{}]", iteration, index),
                Some(index),
                theta,
                result.objective,
                &result.duals,
                values,
            )?);
        }
    } else if results.values().all(|r| r.is_feasible()) {
        let theta = planning.theta_for(0).ok_or_else(|| {
            BendersError::InvalidProblem("planning problem has no theta variable".to_string())
        })?;
        let mut duals: BTreeMap<String, f64> = BTreeMap::new();
        let mut objective = 0.0;
        for result in results.values() {
            objective += result.objective;
            for (name, &dual) in &result.duals {
                *duals.entry(name.clone()).or_insert(0.0) += dual;
            }
        }
        cuts.push(BendersCut::optimality(
            format!("opt_cut[{},all]", iteration),
            None,
            theta,
            objective,
            &duals,
            values,
        )?);
    }

    Ok(cuts)
}

/// Append cuts to the planning model. Cuts are never removed.
pub fn add_cuts(planning: &mut PlanningProblem, cuts: &[BendersCut]) -> Result<()> {
    for cut in cuts {
        let constraint = cut.to_constraint(planning)?;
        planning.model.add_constraint(constraint)?;
        debug!(cut = %cut.name, kind = ?cut.kind, rhs = cut.rhs, "cut added");
    }
    Ok(())
}
