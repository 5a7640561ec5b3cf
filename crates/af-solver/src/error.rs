//! Error types for root finding and time integration.

use af_core::{AfError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Solver configuration error: {what}")]
    Configuration { what: String },

    #[error(
        "Convergence failed: {what} (residual norm {residual_norm:.3e} after {iterations} iterations)"
    )]
    Convergence {
        what: String,
        /// Values of the last iterate or integrated state.
        last_iterate: Vec<f64>,
        residual_norm: f64,
        iterations: usize,
    },

    /// Failure reported by the equation being solved.
    #[error("Equation error ({kind}): {what}")]
    Equation { kind: ErrorKind, what: String },

    #[error("Core error: {0}")]
    Core(#[from] AfError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    pub fn configuration(what: impl Into<String>) -> Self {
        SolverError::Configuration { what: what.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SolverError::Configuration { .. } => ErrorKind::Configuration,
            SolverError::Convergence { .. } => ErrorKind::Convergence,
            SolverError::Equation { kind, .. } => *kind,
            SolverError::Core(e) => e.kind(),
        }
    }
}
