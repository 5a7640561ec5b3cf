use thiserror::Error;

pub type AfResult<T> = Result<T, AfError>;

#[derive(Error, Debug)]
pub enum AfError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    Shape {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Singular matrix in {what}: pivot {pivot:.3e} below {threshold:.3e}")]
    Singular {
        what: &'static str,
        pivot: f64,
        threshold: f64,
    },
}

/// Failure classes every crate maps its errors onto.
///
/// Callers decide their policy (abort the case, accept a partial result)
/// from the class alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing settings, shape mismatches, unknown names.
    Configuration,
    /// Mode truncation or coupling sanity checks out of tolerance.
    NumericalConsistency,
    /// `I - A2hat` (or another feedback operator) is near-singular.
    SingularAeroOperator,
    /// A root solver or integrator did not reach its tolerance.
    Convergence,
    /// Persistent storage failed (I/O, encoding, checksums).
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::NumericalConsistency => "NumericalConsistencyError",
            ErrorKind::SingularAeroOperator => "SingularAeroOperatorError",
            ErrorKind::Convergence => "ConvergenceError",
            ErrorKind::Storage => "StorageError",
        };
        f.write_str(name)
    }
}

impl AfError {
    /// A singular pivot is a [`ErrorKind::Convergence`] failure here, which
    /// fits the Newton Jacobian. Callers factoring a feedback operator remap
    /// it (`AeroError::SingularOperator` for `I - A2hat`) before it surfaces.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AfError::NonFinite { .. } => ErrorKind::NumericalConsistency,
            AfError::Singular { .. } => ErrorKind::Convergence,
            AfError::InvalidArg { .. } | AfError::Shape { .. } | AfError::IndexOob { .. } => {
                ErrorKind::Configuration
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singular_pivot_defaults_to_convergence() {
        let err = AfError::Singular {
            what: "Newton Jacobian",
            pivot: 1e-16,
            threshold: 1e-14,
        };
        assert_eq!(err.kind(), ErrorKind::Convergence);
        assert_eq!(err.kind().to_string(), "ConvergenceError");
    }
}
