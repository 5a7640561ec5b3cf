//! Error types for aerodynamic scaling and gust synthesis.

use af_core::{AfError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AeroError {
    #[error("Aero configuration error: {what}")]
    Configuration { what: String },

    #[error("Singular aerodynamic operator {what}: pivot {pivot:.3e} below {threshold:.3e}")]
    SingularOperator {
        what: &'static str,
        pivot: f64,
        threshold: f64,
    },

    #[error("Core error: {0}")]
    Core(#[from] AfError),
}

pub type AeroResult<T> = Result<T, AeroError>;

impl AeroError {
    pub fn configuration(what: impl Into<String>) -> Self {
        AeroError::Configuration { what: what.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AeroError::Configuration { .. } => ErrorKind::Configuration,
            AeroError::SingularOperator { .. } => ErrorKind::SingularAeroOperator,
            AeroError::Core(e) => e.kind(),
        }
    }
}
