//! Regularized Benders decomposition
//!
//! A capacity expansion model splits into a planning (master) problem over
//! investment decisions and one operational subproblem per period or
//! scenario. The two sides only share the *linking variables*.
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            │ planning: min FixedCost + Σθ │◄─────────── cuts
//!            └──────────────┬───────────────┘               │
//!                   x̄, LB   │                               │
//!            ┌──────────────▼───────────────┐               │
//!            │ level set (γ > 0, UB finite) │               │
//!            └──────────────┬───────────────┘               │
//!                       x̂   │  fan-out (rayon when Distributed)
//!          ┌────────────────┼────────────────┐              │
//!          ▼                ▼                ▼              │
//!    subproblem 0     subproblem 1  …  subproblem N−1       │
//!          └────────────────┼────────────────┘              │
//!                           │ objectives, duals / rays      │
//!                           ▼                               │
//!              UB = FixedCost(x̂) + Σ costs ─────────────────┘
//! ```
//!
//! Iterations stop when `(UB_best − LB)/|UB_best| ≤ ConvTol`, after `MaxIter`
//! iterations, or once `MaxCpuTime` seconds have passed. Cuts are never
//! removed from the planning problem.
//!
//! ## Example
//!
//! ```ignore
//! use mes_algo::benders::{BendersConfig, BendersSolver};
//!
//! let problem: DecomposedProblem = serde_json::from_str(&input)?;
//! let result = BendersSolver::new(BendersConfig::default().with_stab_param(0.5))
//!     .solve(problem)?;
//! println!("{} after {} iterations, gap {:.2e}", result.termination, result.iterations, result.gap);
//! ```

mod config;
mod cuts;
mod error;
mod history;
mod level_set;
mod planning;
mod problem;
mod solution;
mod solver;
mod subproblem;

pub use config::BendersConfig;
pub use cuts::{add_cuts, generate_cuts, BendersCut, CutKind};
pub use error::{BendersError, Result};
pub use history::RunHistory;
pub use level_set::{solve_int_level_set_problem, LEVEL_SET};
pub use planning::solve_planning_problem;
pub use problem::{
    DecomposedProblem, PlanningProblem, Subproblem, APPROXIMATE_VARIABLE_COST, FIXED_COST,
};
pub use solution::{
    BendersResult, PlanningSolution, SubproblemResult, SubproblemStatus, TerminationReason,
};
pub use solver::{benders, BendersSolver};
pub use subproblem::{
    automatic_slack_penalty, fixing_row_name, solve_subproblems, SubproblemEvaluator,
};
