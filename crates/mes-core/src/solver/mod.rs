//! Solver backends for [`crate::LinearModel`]
//!
//! ```text
//!   LinearModel ──► ClarabelBackend::solve
//!                     ├── continuous ──► Relaxation ──► Clarabel IPM
//!                     └── integer    ──► branch-and-bound over Relaxation
//!
//!   ClarabelBackend::conflicting_constraints ──► deletion filter over Relaxation
//! ```

mod backend;
mod branch_and_bound;
mod clarabel_backend;
mod conflict;

pub use backend::{SolverBackend, SolverSettings};
pub use clarabel_backend::ClarabelBackend;
