use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::Debug;

/// Number type every differentiable kernel is written against.
///
/// Implemented by `f64` (plain evaluation), [`crate::Dual`] (forward mode) and
/// [`crate::Var`] (reverse mode). Control flow (branch selection, step-size
/// decisions, convergence tests) must only ever look at [`Scalar::value`], so
/// the three evaluations follow the same discrete path.
pub trait Scalar: Float + NumAssign + FromPrimitive + Debug + Send + Sync + 'static {
    /// Plain value with all derivative information dropped.
    fn value(&self) -> f64;

    /// Constant with zero derivative.
    fn cst(v: f64) -> Self;

    /// Returns `when_true` if `cond` holds, `when_false` otherwise.
    ///
    /// Only the selected operand contributes derivatives, so both operands
    /// must be finite for every input.
    fn select(cond: bool, when_true: Self, when_false: Self) -> Self {
        if cond { when_true } else { when_false }
    }
}

impl Scalar for f64 {
    fn value(&self) -> f64 {
        *self
    }

    fn cst(v: f64) -> Self {
        v
    }
}

/// Values of a slice of scalars.
pub fn values<S: Scalar>(xs: &[S]) -> Vec<f64> {
    xs.iter().map(Scalar::value).collect()
}

/// Lifts plain values into constants of `S`.
pub fn constants<S: Scalar>(xs: &[f64]) -> Vec<S> {
    xs.iter().map(|&x| S::cst(x)).collect()
}

/// Sum of `a[i] * b[i]`.
pub fn dot<S: Scalar>(a: &[S], b: &[S]) -> S {
    a.iter()
        .zip(b)
        .fold(S::zero(), |acc, (&x, &y)| acc + x * y)
}
