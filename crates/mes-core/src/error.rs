//! Error types for model construction and solver backends
//!
//! [`ModelError`] covers everything that can go wrong before or while a
//! backend is invoked: malformed models, references to unknown variables or
//! constraints, and failures inside the backend itself. Solver *outcomes*
//! (infeasible, unbounded, numerical failure) are not errors; they are
//! reported through [`crate::SolveStatus`] so callers can react to them.
//!
//! # Example
//!
//! ```
//! use mes_core::{LinearModel, ModelResult, Variable};
//!
//! fn build() -> ModelResult<LinearModel> {
//!     let mut model = LinearModel::new();
//!     model.add_variable(Variable::new("capacity").with_lower(0.0))?;
//!     Ok(model)
//! }
//! # build().unwrap();
//! ```

use thiserror::Error;

/// Unified error type for model and backend operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Structural problems with a model (duplicate names, bad indices, ...)
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// A variable was referenced by a name the model does not contain
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A constraint was referenced by a name or index the model does not contain
    #[error("Unknown constraint: {0}")]
    UnknownConstraint(String),

    /// The backend could not be set up or crashed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience type alias for Results using ModelError.
pub type ModelResult<T> = Result<T, ModelError>;

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::Backend("factorization failed".into());
        assert!(err.to_string().contains("Backend error"));
        assert!(err.to_string().contains("factorization failed"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<f64>("not a number").unwrap_err();
        let err: ModelError = json_err.into();
        assert!(matches!(err, ModelError::Parse(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ModelResult<()> {
            Err(ModelError::UnknownVariable("x".into()))
        }

        fn outer() -> ModelResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
