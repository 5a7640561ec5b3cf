//! Reverse-mode differentiation on a thread-local tape.
//!
//! A [`Var`] is a value plus the index of the tape node that produced it.
//! Every arithmetic operation between variables appends one node holding the
//! local partial derivatives with respect to (at most) two parents. Constants
//! never touch the tape.
//!
//! Recording is scoped: [`record`] installs a fresh tape on the current thread,
//! runs the closure and hands the finished tape back. Variables must not be
//! carried from one recording into another.

use crate::scalar::Scalar;
use num_traits::{Float, FromPrimitive, Num, NumCast, One, ToPrimitive, Zero};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

const NO_PARENT: usize = usize::MAX;

#[derive(Clone, Copy, Debug)]
struct Node {
    parents: [usize; 2],
    partials: [f64; 2],
}

/// Finished recording of one evaluation.
#[derive(Debug, Default)]
pub struct Tape {
    nodes: Vec<Node>,
}

thread_local! {
    static TAPE: RefCell<Option<Tape>> = const { RefCell::new(None) };
}

fn push(node: Node) -> usize {
    TAPE.with(|cell| match cell.borrow_mut().as_mut() {
        Some(tape) => {
            tape.nodes.push(node);
            tape.nodes.len() - 1
        }
        None => NO_PARENT,
    })
}

/// Runs `f` with a fresh tape installed on this thread.
///
/// The previously installed tape (if any) is restored afterwards, so nested
/// recordings on one thread are independent of each other.
pub fn record<R>(f: impl FnOnce() -> R) -> (R, Tape) {
    let previous = TAPE.with(|cell| cell.borrow_mut().replace(Tape::default()));
    let out = f();
    let tape = TAPE.with(|cell| std::mem::replace(&mut *cell.borrow_mut(), previous));
    (out, tape.unwrap_or_default())
}

impl Tape {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Backward sweep seeded at `output`.
    pub fn gradient(&self, output: Var) -> Gradient {
        let mut adjoints = vec![0.0; self.nodes.len()];
        if output.idx < adjoints.len() {
            adjoints[output.idx] = 1.0;
            for i in (0..=output.idx).rev() {
                let a = adjoints[i];
                if a == 0.0 {
                    continue;
                }
                let node = self.nodes[i];
                for k in 0..2 {
                    let p = node.parents[k];
                    if p != NO_PARENT {
                        adjoints[p] += node.partials[k] * a;
                    }
                }
            }
        }
        Gradient { adjoints }
    }
}

/// Adjoints of one output with respect to every recorded node.
#[derive(Debug, Clone)]
pub struct Gradient {
    adjoints: Vec<f64>,
}

impl Gradient {
    /// Derivative of the seeded output with respect to `input`.
    pub fn wrt(&self, input: Var) -> f64 {
        self.adjoints.get(input.idx).copied().unwrap_or(0.0)
    }
}

/// Reverse-mode scalar.
#[derive(Clone, Copy, Debug)]
pub struct Var {
    val: f64,
    idx: usize,
}

impl Var {
    /// Independent variable on the active tape.
    ///
    /// Outside [`record`] this is a plain constant.
    pub fn input(val: f64) -> Self {
        let idx = push(Node {
            parents: [NO_PARENT; 2],
            partials: [0.0; 2],
        });
        Self { val, idx }
    }

    pub fn constant(val: f64) -> Self {
        Self {
            val,
            idx: NO_PARENT,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.idx == NO_PARENT
    }

    #[inline]
    fn unary(self, val: f64, deriv: f64) -> Self {
        if self.is_constant() {
            return Self::constant(val);
        }
        let idx = push(Node {
            parents: [self.idx, NO_PARENT],
            partials: [deriv, 0.0],
        });
        Self { val, idx }
    }

    #[inline]
    fn binary(self, other: Self, val: f64, d_self: f64, d_other: f64) -> Self {
        match (self.is_constant(), other.is_constant()) {
            (true, true) => Self::constant(val),
            (false, true) => self.unary(val, d_self),
            (true, false) => other.unary(val, d_other),
            (false, false) => {
                let idx = push(Node {
                    parents: [self.idx, other.idx],
                    partials: [d_self, d_other],
                });
                Self { val, idx }
            }
        }
    }
}

impl Scalar for Var {
    fn value(&self) -> f64 {
        self.val
    }

    fn cst(v: f64) -> Self {
        Self::constant(v)
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val
    }
}

impl PartialOrd for Var {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.val.partial_cmp(&other.val)
    }
}

impl Zero for Var {
    fn zero() -> Self {
        Self::constant(0.0)
    }
    fn is_zero(&self) -> bool {
        self.val == 0.0
    }
}

impl One for Var {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Add for Var {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.binary(rhs, self.val + rhs.val, 1.0, 1.0)
    }
}

impl Sub for Var {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.binary(rhs, self.val - rhs.val, 1.0, -1.0)
    }
}

impl Mul for Var {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        self.binary(rhs, self.val * rhs.val, rhs.val, self.val)
    }
}

impl Div for Var {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let q = self.val / rhs.val;
        self.binary(rhs, q, 1.0 / rhs.val, -q / rhs.val)
    }
}

impl Neg for Var {
    type Output = Self;
    fn neg(self) -> Self {
        self.unary(-self.val, -1.0)
    }
}

impl Rem for Var {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        let q = (self.val / rhs.val).trunc();
        self.binary(rhs, self.val % rhs.val, 1.0, -q)
    }
}

impl AddAssign for Var {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl SubAssign for Var {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl MulAssign for Var {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
impl DivAssign for Var {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}
impl RemAssign for Var {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl Num for Var {
    type FromStrRadixErr = <f64 as Num>::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        f64::from_str_radix(str, radix).map(Self::constant)
    }
}

impl ToPrimitive for Var {
    fn to_i64(&self) -> Option<i64> {
        self.val.to_i64()
    }
    fn to_u64(&self) -> Option<u64> {
        self.val.to_u64()
    }
    fn to_f64(&self) -> Option<f64> {
        Some(self.val)
    }
}

impl FromPrimitive for Var {
    fn from_i64(n: i64) -> Option<Self> {
        Some(Self::constant(n as f64))
    }
    fn from_u64(n: u64) -> Option<Self> {
        Some(Self::constant(n as f64))
    }
    fn from_f64(n: f64) -> Option<Self> {
        Some(Self::constant(n))
    }
}

impl NumCast for Var {
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        n.to_f64().map(Self::constant)
    }
}

impl Float for Var {
    fn nan() -> Self {
        Self::constant(f64::NAN)
    }
    fn infinity() -> Self {
        Self::constant(f64::INFINITY)
    }
    fn neg_infinity() -> Self {
        Self::constant(f64::NEG_INFINITY)
    }
    fn neg_zero() -> Self {
        Self::constant(-0.0)
    }
    fn min_value() -> Self {
        Self::constant(f64::MIN)
    }
    fn min_positive_value() -> Self {
        Self::constant(f64::MIN_POSITIVE)
    }
    fn max_value() -> Self {
        Self::constant(f64::MAX)
    }
    fn epsilon() -> Self {
        Self::constant(f64::EPSILON)
    }
    fn is_nan(self) -> bool {
        self.val.is_nan()
    }
    fn is_infinite(self) -> bool {
        self.val.is_infinite()
    }
    fn is_finite(self) -> bool {
        self.val.is_finite()
    }
    fn is_normal(self) -> bool {
        self.val.is_normal()
    }
    fn classify(self) -> std::num::FpCategory {
        self.val.classify()
    }
    fn floor(self) -> Self {
        Self::constant(self.val.floor())
    }
    fn ceil(self) -> Self {
        Self::constant(self.val.ceil())
    }
    fn round(self) -> Self {
        Self::constant(self.val.round())
    }
    fn trunc(self) -> Self {
        Self::constant(self.val.trunc())
    }
    fn fract(self) -> Self {
        self.unary(self.val.fract(), 1.0)
    }
    fn abs(self) -> Self {
        self.unary(self.val.abs(), if self.val >= 0.0 { 1.0 } else { -1.0 })
    }
    fn signum(self) -> Self {
        Self::constant(self.val.signum())
    }
    fn is_sign_positive(self) -> bool {
        self.val.is_sign_positive()
    }
    fn is_sign_negative(self) -> bool {
        self.val.is_sign_negative()
    }
    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }
    fn recip(self) -> Self {
        self.unary(1.0 / self.val, -1.0 / (self.val * self.val))
    }
    fn powi(self, n: i32) -> Self {
        if n == 0 {
            return Self::one();
        }
        self.unary(self.val.powi(n), n as f64 * self.val.powi(n - 1))
    }
    fn powf(self, n: Self) -> Self {
        let val_pow = self.val.powf(n.val);
        let d_base = if self.is_constant() {
            0.0
        } else {
            n.val * self.val.powf(n.val - 1.0)
        };
        let d_exp = if n.is_constant() {
            0.0
        } else {
            val_pow * self.val.ln()
        };
        self.binary(n, val_pow, d_base, d_exp)
    }
    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        self.unary(s, 0.5 / s)
    }
    fn exp(self) -> Self {
        let e = self.val.exp();
        self.unary(e, e)
    }
    fn exp2(self) -> Self {
        let e = self.val.exp2();
        self.unary(e, e * std::f64::consts::LN_2)
    }
    fn ln(self) -> Self {
        self.unary(self.val.ln(), 1.0 / self.val)
    }
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }
    fn log2(self) -> Self {
        self.unary(self.val.log2(), 1.0 / (self.val * std::f64::consts::LN_2))
    }
    fn log10(self) -> Self {
        self.unary(self.val.log10(), 1.0 / (self.val * std::f64::consts::LN_10))
    }
    fn max(self, other: Self) -> Self {
        if self.val >= other.val { self } else { other }
    }
    fn min(self, other: Self) -> Self {
        if self.val <= other.val { self } else { other }
    }
    #[allow(deprecated)]
    fn abs_sub(self, other: Self) -> Self {
        if self.val <= other.val {
            Self::zero()
        } else {
            self - other
        }
    }
    fn cbrt(self) -> Self {
        let c = self.val.cbrt();
        self.unary(c, 1.0 / (3.0 * c * c))
    }
    fn hypot(self, other: Self) -> Self {
        let h = self.val.hypot(other.val);
        self.binary(other, h, self.val / h, other.val / h)
    }
    fn sin(self) -> Self {
        self.unary(self.val.sin(), self.val.cos())
    }
    fn cos(self) -> Self {
        self.unary(self.val.cos(), -self.val.sin())
    }
    fn tan(self) -> Self {
        let t = self.val.tan();
        self.unary(t, 1.0 + t * t)
    }
    fn asin(self) -> Self {
        self.unary(self.val.asin(), 1.0 / (1.0 - self.val * self.val).sqrt())
    }
    fn acos(self) -> Self {
        self.unary(self.val.acos(), -1.0 / (1.0 - self.val * self.val).sqrt())
    }
    fn atan(self) -> Self {
        self.unary(self.val.atan(), 1.0 / (1.0 + self.val * self.val))
    }
    fn atan2(self, other: Self) -> Self {
        let r2 = self.val * self.val + other.val * other.val;
        self.binary(
            other,
            self.val.atan2(other.val),
            other.val / r2,
            -self.val / r2,
        )
    }
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }
    fn exp_m1(self) -> Self {
        self.unary(self.val.exp_m1(), self.val.exp())
    }
    fn ln_1p(self) -> Self {
        self.unary(self.val.ln_1p(), 1.0 / (1.0 + self.val))
    }
    fn sinh(self) -> Self {
        self.unary(self.val.sinh(), self.val.cosh())
    }
    fn cosh(self) -> Self {
        self.unary(self.val.cosh(), self.val.sinh())
    }
    fn tanh(self) -> Self {
        let t = self.val.tanh();
        self.unary(t, 1.0 - t * t)
    }
    fn asinh(self) -> Self {
        self.unary(self.val.asinh(), 1.0 / (self.val * self.val + 1.0).sqrt())
    }
    fn acosh(self) -> Self {
        self.unary(self.val.acosh(), 1.0 / (self.val * self.val - 1.0).sqrt())
    }
    fn atanh(self) -> Self {
        self.unary(self.val.atanh(), 1.0 / (1.0 - self.val * self.val))
    }
    fn integer_decode(self) -> (u64, i16, i8) {
        self.val.integer_decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dual::{Dual, derivative};
    use proptest::prelude::*;

    #[test]
    fn gradient_of_two_inputs() {
        let ((x, y, z), tape) = record(|| {
            let x = Var::input(2.0);
            let y = Var::input(3.0);
            let z = x * y + x.sin();
            (x, y, z)
        });
        let g = tape.gradient(z);
        assert!((g.wrt(x) - (3.0 + 2.0_f64.cos())).abs() < 1e-14);
        assert!((g.wrt(y) - 2.0).abs() < 1e-14);
    }

    #[test]
    fn constants_stay_off_the_tape() {
        let (_, tape) = record(|| {
            let a = Var::constant(1.0);
            let b = Var::constant(2.0);
            (a * b).exp()
        });
        assert!(tape.is_empty());
    }

    #[test]
    fn outside_recording_inputs_are_constants() {
        let x = Var::input(1.0);
        assert!(x.is_constant());
        assert_eq!((x + x).value(), 2.0);
    }

    #[test]
    fn nested_recordings_are_independent() {
        let ((outer_x, outer_y, inner_grad), tape) = record(|| {
            let x = Var::input(1.5);
            let ((ix, iy), inner) = record(|| {
                let ix = Var::input(4.0);
                (ix, ix * ix)
            });
            let inner_grad = inner.gradient(iy).wrt(ix);
            (x, x * x * x, inner_grad)
        });
        assert!((inner_grad - 8.0).abs() < 1e-14);
        assert!((tape.gradient(outer_y).wrt(outer_x) - 3.0 * 1.5 * 1.5).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn reverse_matches_forward(x in 0.2f64..2.0) {
            fn f<S: Scalar>(x: S) -> S {
                let two = S::cst(2.0);
                (x * x + two).sqrt() / (x.cos() + two) + x.atan2(two) * x.tanh()
            }
            let (_, d_fwd) = derivative(x, f::<Dual>);
            let ((xv, y), tape) = record(|| {
                let xv = Var::input(x);
                (xv, f(xv))
            });
            let d_rev = tape.gradient(y).wrt(xv);
            prop_assert!((d_fwd - d_rev).abs() <= 1e-12 * (1.0 + d_fwd.abs()));
        }
    }
}
