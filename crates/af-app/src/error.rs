//! Error types for the orchestration layer.

use crate::stages::{DriverState, Stage};
use af_aero::AeroError;
use af_config::{ConfigError, ValidationError};
use af_core::{AfError, ErrorKind};
use af_fem::FemError;
use af_intrinsic::IntrinsicError;
use af_results::{ContainerKey, ResultsError};

/// Application error wrapping the stage crates, with the failing case
/// attached by [`CaseContext::in_case`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("FEM error: {0}")]
    Fem(#[from] FemError),

    #[error("Aero error: {0}")]
    Aero(#[from] AeroError),

    #[error("Intrinsic error: {0}")]
    Intrinsic(#[from] IntrinsicError),

    #[error("Results error: {0}")]
    Results(#[from] ResultsError),

    #[error("Core error: {0}")]
    Core(#[from] AfError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Driver is {state}, cannot {action}")]
    Transition {
        state: DriverState,
        action: &'static str,
    },

    #[error("Cached {key} was computed from other inputs (stored {stored}, expected {expected})")]
    StaleCache {
        key: ContainerKey,
        stored: String,
        expected: String,
    },

    #[error("Case '{case}' failed while {stage}: {source}")]
    Case {
        case: String,
        stage: Stage,
        source: Box<AppError>,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Config(ConfigError::Validation(err))
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(e) => e.kind(),
            AppError::Fem(e) => e.kind(),
            AppError::Aero(e) => e.kind(),
            AppError::Intrinsic(e) => e.kind(),
            AppError::Results(e) => e.kind(),
            AppError::Core(e) => e.kind(),
            AppError::InvalidInput(_)
            | AppError::Transition { .. }
            | AppError::StaleCache { .. } => ErrorKind::Configuration,
            AppError::Case { source, .. } => source.kind(),
        }
    }

    /// Innermost error below any case wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Case { source, .. } => source.root(),
            other => other,
        }
    }
}

pub trait CaseContext<T> {
    /// Attaches the case label and stage; the innermost label wins.
    fn in_case(self, case: &str, stage: Stage) -> AppResult<T>;
}

impl<T, E: Into<AppError>> CaseContext<T> for Result<T, E> {
    fn in_case(self, case: &str, stage: Stage) -> AppResult<T> {
        self.map_err(|e| match e.into() {
            wrapped @ AppError::Case { .. } => wrapped,
            source => AppError::Case {
                case: case.to_string(),
                stage,
                source: Box::new(source),
            },
        })
    }
}
