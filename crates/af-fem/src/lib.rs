//! af-fem: modal reduction of clamped beam structures.
//!
//! - tree (component connectivity, element frames)
//! - eigen (generalized eigenproblem, Cholesky reduction)
//! - modes (mass-normalised modal basis and orthogonality checks)
//! - couplings (gamma1 / gamma2 tensors)

pub mod couplings;
pub mod eigen;
pub mod error;
pub mod modes;
pub mod tree;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use couplings::{CouplingTensors, Tensor3, build_couplings};
pub use eigen::{EigenMethod, EigenPairs};
pub use error::{FemError, FemResult};
pub use modes::{AlphaReport, EigenSource, FemInput, ModalBasis, ModeField, check_alphas, compute_modes};
pub use tree::{BeamTree, ComponentDef, GridPoint};
