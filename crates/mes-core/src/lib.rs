//! # mes-core: Optimization Models and Solver Backends
//!
//! Shared building blocks for the decomposition algorithms in `mes-algo`:
//!
//! - [`LinearModel`]: named variables and constraints, a linear objective with an
//!   optional diagonal quadratic term, and named expressions
//! - [`SolverBackend`]: the seam between algorithms and solvers
//! - [`ClarabelBackend`]: interior-point backend with shadow prices, Farkas
//!   certificates, branch-and-bound for integer columns and conflict detection
//! - [`ModelError`]: the error type for everything above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mes_core::*;
//!
//! let mut model = LinearModel::new();
//! let build = model.add_variable(Variable::new("build").with_bounds(0.0, 10.0))?;
//! let flow = model.add_variable(Variable::new("flow").with_lower(0.0))?;
//! model.add_constraint(LinearConstraint::le(
//!     "capacity",
//!     LinearExpr::new().with_term(flow, 1.0).with_term(build, -1.0),
//!     0.0,
//! ))?;
//! model.add_constraint(LinearConstraint::ge("demand", LinearExpr::from(flow), 4.0))?;
//! model.set_objective(LinearExpr::new().with_term(build, 10.0).with_term(flow, 1.0))?;
//!
//! let solution = ClarabelBackend::new().solve(&model, &SolverSettings::default())?;
//! assert_eq!(solution.status, SolveStatus::Optimal);
//! # Ok::<(), ModelError>(())
//! ```

pub mod error;
pub mod model;
pub mod solution;
pub mod solver;

pub use error::{ModelError, ModelResult};
pub use model::{
    ConstraintId, LinearConstraint, LinearExpr, LinearModel, ModelData, Sense, VarId, Variable,
};
pub use solution::{FarkasCertificate, ModelSolution, SolveStatus};
pub use solver::{ClarabelBackend, SolverBackend, SolverSettings};
