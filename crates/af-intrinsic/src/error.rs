//! Error types for the intrinsic equations and the differentiable pipeline.

use af_aero::AeroError;
use af_core::{AfError, ErrorKind};
use af_fem::FemError;
use af_solver::SolverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntrinsicError {
    #[error("Case configuration error: {what}")]
    Configuration { what: String },

    #[error("FEM error: {0}")]
    Fem(#[from] FemError),

    #[error("Aero error: {0}")]
    Aero(#[from] AeroError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Core error: {0}")]
    Core(#[from] AfError),
}

pub type IntrinsicResult<T> = Result<T, IntrinsicError>;

impl IntrinsicError {
    pub fn configuration(what: impl Into<String>) -> Self {
        IntrinsicError::Configuration { what: what.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IntrinsicError::Configuration { .. } => ErrorKind::Configuration,
            IntrinsicError::Fem(e) => e.kind(),
            IntrinsicError::Aero(e) => e.kind(),
            IntrinsicError::Solver(e) => e.kind(),
            IntrinsicError::Core(e) => e.kind(),
        }
    }
}
