//! Equations the backends solve.

use crate::error::SolverResult;
use af_core::{DenseMatrix, Scalar};

/// `dq/dt = f(t, q)`.
///
/// Time is never differentiated; the state carries the scalar type.
pub trait OdeSystem<S: Scalar> {
    fn dimension(&self) -> usize;

    fn rhs(&self, t: f64, q: &[S]) -> SolverResult<Vec<S>>;
}

/// `R(t, q) = 0` for every load step `t`.
pub trait RootSystem<S: Scalar> {
    fn dimension(&self) -> usize;

    fn residual(&self, t: f64, q: &[S]) -> SolverResult<Vec<S>>;

    /// `∂R/∂q` at plain values.
    fn jacobian(&self, t: f64, q: &[f64]) -> SolverResult<DenseMatrix<f64>>;
}

/// An equation handed to a backend.
#[derive(Clone, Copy)]
pub enum Problem<'a, S: Scalar> {
    Ode(&'a dyn OdeSystem<S>),
    Root(&'a dyn RootSystem<S>),
}

impl<S: Scalar> Problem<'_, S> {
    pub fn dimension(&self) -> usize {
        match self {
            Problem::Ode(p) => p.dimension(),
            Problem::Root(p) => p.dimension(),
        }
    }
}
