//! Deletion-filter conflict detection.
//!
//! Starting from all constraints of the continuous relaxation, each
//! constraint is dropped in turn; if the rest stays infeasible it is left
//! out, otherwise it is restored. What remains is an irreducible infeasible
//! subset (variable bounds are always kept).

use super::backend::SolverSettings;
use super::clarabel_backend::Relaxation;
use crate::error::ModelResult;
use crate::model::LinearModel;
use crate::solution::SolveStatus;
use tracing::debug;

pub(crate) fn deletion_filter(
    model: &LinearModel,
    settings: &SolverSettings,
) -> ModelResult<Option<Vec<String>>> {
    let mut relaxation = Relaxation::new(model);
    relaxation.feasibility_only = true;

    if relaxation.solve(settings)?.status != SolveStatus::Infeasible {
        return Ok(None);
    }

    for idx in 0..model.num_constraints() {
        relaxation.active[idx] = false;
        let status = relaxation.solve(settings)?.status;
        if status != SolveStatus::Infeasible {
            relaxation.active[idx] = true;
        }
    }

    let conflicts: Vec<String> = relaxation
        .model()
        .constraints()
        .iter()
        .zip(&relaxation.active)
        .filter(|&(_, &active)| active)
        .map(|(constraint, _)| constraint.name.clone())
        .collect();
    debug!(count = conflicts.len(), "deletion filter finished");
    Ok(Some(conflicts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinearConstraint, LinearExpr, Variable};

    #[test]
    fn test_isolates_conflicting_pair() {
        let mut model = LinearModel::new();
        let x = model.add_variable(Variable::new("x").with_lower(0.0)).unwrap();
        let y = model.add_variable(Variable::new("y").with_lower(0.0)).unwrap();
        model
            .add_constraint(LinearConstraint::le("y_cap", LinearExpr::from(y), 4.0))
            .unwrap();
        model
            .add_constraint(LinearConstraint::ge("x_min", LinearExpr::from(x), 3.0))
            .unwrap();
        model
            .add_constraint(LinearConstraint::le("x_max", LinearExpr::from(x), 1.0))
            .unwrap();

        let conflicts = deletion_filter(&model, &SolverSettings::default())
            .unwrap()
            .expect("model is infeasible");
        assert_eq!(conflicts, vec!["x_min".to_string(), "x_max".to_string()]);
    }

    #[test]
    fn test_feasible_model_has_no_conflict() {
        let mut model = LinearModel::new();
        let x = model.add_variable(Variable::new("x").with_lower(0.0)).unwrap();
        model
            .add_constraint(LinearConstraint::le("x_max", LinearExpr::from(x), 1.0))
            .unwrap();
        assert_eq!(deletion_filter(&model, &SolverSettings::default()).unwrap(), None);
    }
}
