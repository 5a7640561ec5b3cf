//! Error types for the structural stages.

use af_core::{AfError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FemError {
    #[error("FEM configuration error: {what}")]
    Configuration { what: String },

    #[error("Numerical consistency check '{check}' failed: deviation {deviation:.3e} exceeds {tolerance:.3e}")]
    NumericalConsistency {
        check: &'static str,
        deviation: f64,
        tolerance: f64,
    },

    #[error("Eigen solver did not converge: {what}")]
    EigenSolve { what: String },

    #[error("Core error: {0}")]
    Core(#[from] AfError),
}

pub type FemResult<T> = Result<T, FemError>;

impl FemError {
    pub fn configuration(what: impl Into<String>) -> Self {
        FemError::Configuration { what: what.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FemError::Configuration { .. } => ErrorKind::Configuration,
            FemError::NumericalConsistency { .. } | FemError::EigenSolve { .. } => {
                ErrorKind::NumericalConsistency
            }
            FemError::Core(e) => e.kind(),
        }
    }
}
