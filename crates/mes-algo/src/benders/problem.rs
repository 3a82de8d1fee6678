//! Inputs of a decomposition run: the planning (master) problem, the
//! operational subproblems and the linking variables that couple them.

use std::collections::{BTreeMap, BTreeSet};

use mes_core::{LinearExpr, LinearModel, VarId};
use serde::{Deserialize, Serialize};

use super::error::{BendersError, Result};

/// Name of the planning expression holding the investment cost.
pub const FIXED_COST: &str = "FixedCost";
/// Name of the planning expression holding Σθ.
pub const APPROXIMATE_VARIABLE_COST: &str = "ApproximateVariableCost";

#[derive(Deserialize)]
struct PlanningData {
    model: LinearModel,
    fixed_cost: LinearExpr,
    theta: Vec<VarId>,
}

impl TryFrom<PlanningData> for PlanningProblem {
    type Error = BendersError;

    fn try_from(data: PlanningData) -> Result<Self> {
        PlanningProblem::new(data.model, data.fixed_cost, data.theta)
    }
}

/// Master problem over investment decisions.
///
/// The objective is `FixedCost + Σ θ_w`, where each θ approximates the
/// operational cost of one subproblem (multi-cut) or of all of them
/// (a single θ, aggregated cuts). Cuts accumulate in `model` as the run
/// progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PlanningData")]
pub struct PlanningProblem {
    pub model: LinearModel,
    pub fixed_cost: LinearExpr,
    pub theta: Vec<VarId>,
}

impl PlanningProblem {
    /// Install the objective and the `FixedCost`/`ApproximateVariableCost`
    /// expressions on `model`.
    pub fn new(mut model: LinearModel, fixed_cost: LinearExpr, theta: Vec<VarId>) -> Result<Self> {
        check_theta(&model, &theta)?;

        let approximate: LinearExpr = theta.iter().map(|&t| (t, 1.0)).collect();
        let mut objective = fixed_cost.clone();
        objective.add_scaled(&approximate, 1.0);

        model.set_objective(objective)?;
        model.add_expression(FIXED_COST, fixed_cost.clone())?;
        model.add_expression(APPROXIMATE_VARIABLE_COST, approximate)?;

        Ok(Self {
            model,
            fixed_cost,
            theta,
        })
    }

    /// One θ per subproblem rather than a single aggregated θ.
    pub fn is_multi_cut(&self) -> bool {
        self.theta.len() > 1
    }

    /// θ variable bounding the cost of subproblem `index`.
    pub fn theta_for(&self, index: usize) -> Option<VarId> {
        if self.is_multi_cut() {
            self.theta.get(index).copied()
        } else {
            self.theta.first().copied()
        }
    }

    /// Cuts added so far, optimality and feasibility together.
    pub fn num_cuts(&self) -> usize {
        self.model
            .constraints()
            .iter()
            .filter(|c| c.name.starts_with("opt_cut[") || c.name.starts_with("feas_cut["))
            .count()
    }

    /// Values of `FixedCost + Σθ` at a primal point.
    pub fn objective_parts(&self, primal: &[f64]) -> (f64, Vec<f64>) {
        let theta = self
            .theta
            .iter()
            .map(|t| primal.get(t.index()).copied().unwrap_or(f64::NAN))
            .collect();
        (self.fixed_cost.evaluate(primal), theta)
    }
}

fn check_theta(model: &LinearModel, theta: &[VarId]) -> Result<()> {
    if theta.is_empty() {
        return Err(BendersError::InvalidProblem(
            "planning problem needs at least one cost-proxy (theta) variable".to_string(),
        ));
    }
    for &t in theta {
        let variable = model.variable(t).ok_or_else(|| {
            BendersError::InvalidProblem(format!("theta variable {} is not in the planning model", t))
        })?;
        if !variable.lower_bound().is_finite() {
            return Err(BendersError::InvalidProblem(format!(
                "theta variable '{}' needs a finite lower bound, otherwise the first planning \
                 problem is unbounded",
                variable.name
            )));
        }
    }
    Ok(())
}

/// Operational subproblem solved for fixed linking-variable values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subproblem {
    /// Position in `0..N`, also selecting θ in multi-cut mode.
    pub index: usize,
    pub model: LinearModel,
    /// Names of the linking variables this subproblem's model contains.
    pub linking_variables: Vec<String>,
    /// Cost per unit of slack absorbing infeasibility. Without one,
    /// infeasibility is turned into a feasibility cut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_penalty: Option<f64>,
}

impl Subproblem {
    pub fn new(index: usize, model: LinearModel, linking_variables: Vec<String>) -> Self {
        Self {
            index,
            model,
            linking_variables,
            slack_penalty: None,
        }
    }

    pub fn with_slack_penalty(mut self, penalty: f64) -> Self {
        self.slack_penalty = Some(penalty);
        self
    }
}

/// Everything a run needs, in the shape read from disk by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposedProblem {
    pub planning: PlanningProblem,
    pub linking_variables: Vec<String>,
    pub subproblems: Vec<Subproblem>,
}

impl DecomposedProblem {
    pub fn new(
        planning: PlanningProblem,
        linking_variables: Vec<String>,
        subproblems: Vec<Subproblem>,
    ) -> Self {
        Self {
            planning,
            linking_variables,
            subproblems,
        }
    }

    /// Replace each subproblem's linking subset with the entry for its index.
    pub fn with_linking_subsets(mut self, subsets: &BTreeMap<usize, Vec<String>>) -> Self {
        for subproblem in &mut self.subproblems {
            if let Some(names) = subsets.get(&subproblem.index) {
                subproblem.linking_variables = names.clone();
            }
        }
        self
    }

    /// Check the master/subproblem contract.
    pub fn validate(&self) -> Result<()> {
        check_theta(&self.planning.model, &self.planning.theta)?;

        let n = self.subproblems.len();
        if n == 0 {
            return Err(BendersError::InvalidProblem(
                "at least one subproblem is required".to_string(),
            ));
        }
        let n_theta = self.planning.theta.len();
        if n_theta != 1 && n_theta != n {
            return Err(BendersError::InvalidProblem(format!(
                "expected 1 or {} theta variables, found {}",
                n, n_theta
            )));
        }

        let mut global = BTreeSet::new();
        for name in &self.linking_variables {
            if !global.insert(name.as_str()) {
                return Err(BendersError::InvalidProblem(format!(
                    "linking variable '{}' is listed twice",
                    name
                )));
            }
            if self.planning.model.variable_by_name(name).is_none() {
                return Err(BendersError::InvalidProblem(format!(
                    "linking variable '{}' is not in the planning model",
                    name
                )));
            }
        }

        let indices: BTreeSet<usize> = self.subproblems.iter().map(|s| s.index).collect();
        if indices.len() != n || indices.iter().next_back() != Some(&(n - 1)) {
            return Err(BendersError::InvalidProblem(format!(
                "subproblem indices must be unique and cover 0..{}",
                n
            )));
        }

        for subproblem in &self.subproblems {
            for name in &subproblem.linking_variables {
                if !global.contains(name.as_str()) {
                    return Err(BendersError::InvalidProblem(format!(
                        "subproblem {} links '{}', which is not a linking variable",
                        subproblem.index, name
                    )));
                }
                if subproblem.model.variable_by_name(name).is_none() {
                    return Err(BendersError::InvalidProblem(format!(
                        "subproblem {} has no variable named '{}'",
                        subproblem.index, name
                    )));
                }
            }
            if let Some(penalty) = subproblem.slack_penalty {
                if !(penalty.is_finite() && penalty > 0.0) {
                    return Err(BendersError::InvalidProblem(format!(
                        "subproblem {} has slack penalty {}; it must be positive",
                        subproblem.index, penalty
                    )));
                }
            }
        }
        Ok(())
    }
}
