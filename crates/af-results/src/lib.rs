//! af-results: solution store for computed containers.
//!
//! Containers are named groups of dense arrays keyed by `(kind, label)`.
//! Each key is written once, through a `ContainerSlot` claimed from the
//! store, and can be persisted as one JSON file per array plus a manifest.

pub mod array_io;
pub mod hash;
pub mod store;
pub mod types;

pub use array_io::{read_array, write_array};
pub use hash::{Fingerprinter, sha256_hex};
pub use store::{ContainerSlot, SolutionStore};
pub use types::*;

use af_core::ErrorKind;
use std::path::PathBuf;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Container not found: {key}")]
    ContainerNotFound { key: ContainerKey },

    #[error("Container {key} is already written or claimed")]
    AlreadyWritten { key: ContainerKey },

    #[error("Checksum mismatch for {path}: manifest {expected}, file {actual}")]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Array '{name}' holds non-finite values and cannot be stored")]
    NonFinite { name: String },

    #[error("Invalid container label '{label}'")]
    InvalidLabel { label: String },

    #[error("Array {path}: {source}")]
    Array {
        path: PathBuf,
        source: af_core::AfError,
    },
}

impl ResultsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResultsError::InvalidLabel { .. } => ErrorKind::Configuration,
            _ => ErrorKind::Storage,
        }
    }
}
