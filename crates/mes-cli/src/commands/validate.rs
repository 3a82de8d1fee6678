use std::path::Path;

use anyhow::{Context, Result};

use super::load_problem;

pub fn handle(path: &Path) -> Result<()> {
    let problem = load_problem(path)?;
    problem
        .validate()
        .with_context(|| format!("validating {}", path.display()))?;

    let planning = &problem.planning;
    println!("Problem {} is valid", path.display());
    println!(
        "  planning: {} variables, {} constraints, {}",
        planning.model.num_variables(),
        planning.model.num_constraints(),
        if planning.is_multi_cut() {
            "multi-cut"
        } else {
            "single cut"
        }
    );
    println!("  linking variables: {}", problem.linking_variables.len());
    for subproblem in &problem.subproblems {
        println!(
            "  subproblem {}: {} variables, {} constraints, {} linked",
            subproblem.index,
            subproblem.model.num_variables(),
            subproblem.model.num_constraints(),
            subproblem.linking_variables.len()
        );
    }
    Ok(())
}
