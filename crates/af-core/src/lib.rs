//! af-core: stable foundation for aeroflex.
//!
//! Contains:
//! - scalar (the `Scalar` trait shared by plain, forward and reverse evaluation)
//! - dual (forward-mode dual numbers)
//! - tape (reverse-mode recording)
//! - linalg (small 3x3 kernels, dense matrices and a pivoted LU)
//! - array (dense n-d arrays exchanged with configuration and storage)
//! - numeric (float helpers)
//! - error (shared error types and the error taxonomy)

pub mod array;
pub mod dual;
pub mod error;
pub mod linalg;
pub mod numeric;
pub mod scalar;
pub mod tape;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use array::ArrayData;
pub use dual::Dual;
pub use error::{AfError, AfResult, ErrorKind};
pub use linalg::{DenseLu, DenseMatrix, Mat3, Vec3};
pub use numeric::*;
pub use scalar::Scalar;
pub use tape::{Gradient, Var};
