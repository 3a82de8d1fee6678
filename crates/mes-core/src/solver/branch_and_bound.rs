//! Depth-first branch-and-bound for models with integer variables.
//!
//! Each node is a continuous [`Relaxation`] with tightened bounds. The most
//! fractional integer variable is branched on, and the child on the side the
//! value is closer to is explored first. Nodes whose relaxation bound cannot
//! beat the incumbent are pruned.

use super::backend::SolverSettings;
use super::clarabel_backend::Relaxation;
use crate::error::ModelResult;
use crate::model::LinearModel;
use crate::solution::{ModelSolution, SolveStatus};
use tracing::{debug, warn};

struct Node {
    lower: Vec<f64>,
    upper: Vec<f64>,
    depth: usize,
}

/// Integer variable with the largest distance to the nearest integer, if any
/// exceeds the integrality tolerance.
fn most_fractional(model: &LinearModel, values: &[f64], tol: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;
    for (j, variable) in model.variables().iter().enumerate() {
        if !variable.integer {
            continue;
        }
        let value = values[j];
        let distance = (value - value.round()).abs();
        if distance <= tol {
            continue;
        }
        if best.map_or(true, |(_, _, d)| distance > d) {
            best = Some((j, value, distance));
        }
    }
    best.map(|(j, value, _)| (j, value))
}

pub(crate) fn solve_mixed_integer(
    model: &LinearModel,
    settings: &SolverSettings,
) -> ModelResult<ModelSolution> {
    let root = Relaxation::new(model);
    let mut stack = vec![Node {
        lower: root.lower.clone(),
        upper: root.upper.clone(),
        depth: 0,
    }];

    let mut incumbent: Option<ModelSolution> = None;
    let mut explored: usize = 0;
    let mut node_limit_hit = false;
    let mut failed_nodes = 0usize;

    while let Some(node) = stack.pop() {
        if explored >= settings.max_nodes {
            node_limit_hit = true;
            break;
        }
        explored += 1;

        let mut relaxation = root.clone();
        relaxation.lower = node.lower;
        relaxation.upper = node.upper;
        let solution = relaxation.solve(settings)?;

        match solution.status {
            SolveStatus::Optimal => {}
            SolveStatus::Infeasible => continue,
            SolveStatus::Unbounded if node.depth == 0 => {
                return Ok(ModelSolution::without_solution(SolveStatus::Unbounded));
            }
            status => {
                failed_nodes += 1;
                debug!(depth = node.depth, %status, "branch-and-bound node failed");
                continue;
            }
        }

        if let Some(best) = &incumbent {
            let cutoff = best.objective - 1e-9 * best.objective.abs().max(1.0);
            if solution.objective >= cutoff {
                continue;
            }
        }

        match most_fractional(model, &solution.primal, settings.integrality_tol) {
            None => {
                let mut primal = solution.primal;
                for (value, variable) in primal.iter_mut().zip(model.variables()) {
                    if variable.integer {
                        *value = value.round();
                    }
                }
                let objective = model.objective_value(&primal);
                debug!(depth = node.depth, objective, "new integer incumbent");
                incumbent = Some(ModelSolution {
                    status: SolveStatus::Optimal,
                    objective,
                    primal,
                    duals: Vec::new(),
                    farkas: None,
                    iterations: 0,
                });
            }
            Some((j, value)) => {
                let mut down = Node {
                    lower: relaxation.lower.clone(),
                    upper: relaxation.upper.clone(),
                    depth: node.depth + 1,
                };
                down.upper[j] = value.floor();
                let mut up = Node {
                    lower: relaxation.lower,
                    upper: relaxation.upper,
                    depth: node.depth + 1,
                };
                up.lower[j] = value.ceil();

                // the last child pushed is explored first
                if value - value.floor() < 0.5 {
                    stack.push(up);
                    stack.push(down);
                } else {
                    stack.push(down);
                    stack.push(up);
                }
            }
        }
    }

    let nodes = u32::try_from(explored).unwrap_or(u32::MAX);
    match incumbent {
        Some(mut best) => {
            if node_limit_hit {
                warn!(
                    nodes = explored,
                    objective = best.objective,
                    "branch-and-bound node limit reached; incumbent not proven optimal"
                );
                best.status = SolveStatus::IterationLimit;
            }
            best.iterations = nodes;
            Ok(best)
        }
        None => {
            let status = if node_limit_hit {
                SolveStatus::IterationLimit
            } else if failed_nodes > 0 {
                SolveStatus::NumericalFailure
            } else {
                SolveStatus::Infeasible
            };
            let mut solution = ModelSolution::without_solution(status);
            solution.iterations = nodes;
            Ok(solution)
        }
    }
}
