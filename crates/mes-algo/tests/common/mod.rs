//! Small capacity expansion instances with known optima.

#![allow(dead_code)]

use mes_algo::benders::{DecomposedProblem, PlanningProblem, Subproblem};
use mes_core::{LinearConstraint, LinearExpr, LinearModel, Variable};

pub const CAPACITY: &str = "capacity";

pub fn linking() -> Vec<String> {
    vec![CAPACITY.to_string()]
}

/// Planning side: build `capacity ∈ [0, 10]` at unit cost, one θ per
/// subproblem (or a single θ when `n_theta == 1`).
pub fn planning(n_theta: usize, integer: bool) -> PlanningProblem {
    let mut model = LinearModel::new();
    let mut capacity = Variable::new(CAPACITY).with_bounds(0.0, 10.0);
    if integer {
        capacity = capacity.as_integer();
    }
    let x = model.add_variable(capacity).unwrap();
    let theta = (0..n_theta)
        .map(|i| {
            model
                .add_variable(Variable::new(format!("theta[{}]", i)).with_lower(0.0))
                .unwrap()
        })
        .collect();
    PlanningProblem::new(model, LinearExpr::from(x), theta).unwrap()
}

/// Serve `demand` from generation up to the built capacity; unserved energy
/// costs `price` per unit.
pub fn dispatch(index: usize, demand: f64, price: f64) -> Subproblem {
    let mut model = LinearModel::new();
    let x = model.add_variable(Variable::new(CAPACITY)).unwrap();
    let g = model
        .add_variable(Variable::new("generation").with_lower(0.0))
        .unwrap();
    let u = model
        .add_variable(Variable::new("unserved").with_lower(0.0))
        .unwrap();
    model
        .add_constraint(LinearConstraint::le(
            "gen_limit",
            LinearExpr::new().with_term(g, 1.0).with_term(x, -1.0),
            0.0,
        ))
        .unwrap();
    model
        .add_constraint(LinearConstraint::ge(
            "demand",
            LinearExpr::new().with_term(g, 1.0).with_term(u, 1.0),
            demand,
        ))
        .unwrap();
    model
        .set_objective(LinearExpr::new().with_term(u, price))
        .unwrap();
    Subproblem::new(index, model, linking())
}

/// Two periods with demands 4 and 6 and shortage prices 3 and 0.5.
///
/// Total cost `x + 3·(4 − x)⁺ + 0.5·(6 − x)⁺` is minimal at `x = 4` with
/// value 5.
pub fn two_period(n_theta: usize) -> DecomposedProblem {
    DecomposedProblem::new(
        planning(n_theta, false),
        linking(),
        vec![dispatch(0, 4.0, 3.0), dispatch(1, 6.0, 0.5)],
    )
}

pub const TWO_PERIOD_OPTIMUM: f64 = 5.0;
pub const TWO_PERIOD_CAPACITY: f64 = 4.0;

/// Subproblem that must use exactly the built capacity but can run at most
/// 3 units: infeasible for `capacity > 3`. Its cost equals the capacity.
pub fn capped(index: usize, slack_penalty: Option<f64>) -> Subproblem {
    let mut model = LinearModel::new();
    let x = model.add_variable(Variable::new(CAPACITY)).unwrap();
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
    let subproblem = Subproblem::new(index, model, linking());
    match slack_penalty {
        Some(penalty) => subproblem.with_slack_penalty(penalty),
        None => subproblem,
    }
}

/// Capacity earns 2 per unit (`FixedCost = −2x`, `x ∈ [0, 5]`) but the
/// capped subproblem charges 1 per unit and cannot exceed 3: the optimum
/// is `x = 3` with value −3.
pub fn capped_problem(slack_penalty: Option<f64>) -> DecomposedProblem {
    let mut model = LinearModel::new();
    let x = model
        .add_variable(Variable::new(CAPACITY).with_bounds(0.0, 5.0))
        .unwrap();
    let theta = model
        .add_variable(Variable::new("theta").with_lower(0.0))
        .unwrap();
    let planning =
        PlanningProblem::new(model, LinearExpr::new().with_term(x, -2.0), vec![theta]).unwrap();
    DecomposedProblem::new(planning, linking(), vec![capped(0, slack_penalty)])
}

/// Capacity costs 0.5 per unit (`x ∈ [0, 5]`). The subproblem dispatches
/// exactly the capacity, at most 3 units, against a demand of 4 whose
/// shortfall costs 3 per unit; every row is elastic at 1 per unit.
///
/// On the penalized model the shortfall is cheaper as slack, so the total
/// cost is `4 − 0.5x` up to `x = 3` and rises beyond: optimum 2.5 at `x = 3`.
pub fn cheap_slack_problem() -> DecomposedProblem {
    let mut model = LinearModel::new();
    let x = model
        .add_variable(Variable::new(CAPACITY).with_bounds(0.0, 5.0))
        .unwrap();
    let theta = model
        .add_variable(Variable::new("theta").with_lower(0.0))
        .unwrap();
    let planning =
        PlanningProblem::new(model, LinearExpr::new().with_term(x, 0.5), vec![theta]).unwrap();

    let mut model = LinearModel::new();
    let x = model.add_variable(Variable::new(CAPACITY)).unwrap();
    let g = model.add_variable(Variable::new("generation")).unwrap();
    let u = model
        .add_variable(Variable::new("unserved").with_lower(0.0))
        .unwrap();
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
    model
        .add_constraint(LinearConstraint::ge(
            "demand",
            LinearExpr::new().with_term(g, 1.0).with_term(u, 1.0),
            4.0,
        ))
        .unwrap();
    model
        .set_objective(LinearExpr::new().with_term(u, 3.0))
        .unwrap();
    let subproblem = Subproblem::new(0, model, linking()).with_slack_penalty(1.0);

    DecomposedProblem::new(planning, linking(), vec![subproblem])
}

pub const CHEAP_SLACK_OPTIMUM: f64 = 2.5;
