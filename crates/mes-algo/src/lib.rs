//! # mes-algo: Decomposition Algorithms for Macro-Energy Planning
//!
//! Capacity expansion models couple long-horizon investment decisions with
//! many short operational periods. This crate solves them by regularized
//! Benders decomposition:
//!
//! - [`BendersSolver`]: the iteration loop (planning solve, level-set
//!   stabilization, subproblem evaluation, cut generation, bound tracking)
//! - [`BendersConfig`]: run configuration with the `MaxIter`, `ConvTol`,
//!   `StabParam`, ... keys, loadable from TOML
//! - [`DecomposedProblem`]: planning problem, linking variables and
//!   subproblems, serializable to JSON
//!
//! Models are built with [`mes_core`] and solved through any
//! [`mes_core::SolverBackend`], Clarabel by default.
//!
//! ## Example
//!
//! ```ignore
//! use mes_algo::{benders, BendersConfig};
//!
//! let result = benders(planning, linking, subproblems, &BTreeMap::new(), BendersConfig::default())?;
//! println!("LB {:.3} UB {:.3}", result.lower_bound(), result.upper_bound());
//! ```

pub mod benders;

pub use benders::{
    benders, BendersConfig, BendersError, BendersResult, BendersSolver, DecomposedProblem,
    PlanningProblem, PlanningSolution, Subproblem, TerminationReason,
};
