//! Linear algebra generic over [`Scalar`].
//!
//! nalgebra covers the `f64`-only work (eigen solves, Cholesky). The kernels
//! here run inside differentiated code, so they are written against `Scalar`
//! with pivoting and branching decided on values only.

use crate::error::{AfError, AfResult};
use crate::scalar::Scalar;

pub type Vec3<S> = [S; 3];
pub type Mat3<S> = [[S; 3]; 3];

pub fn zero3<S: Scalar>() -> Vec3<S> {
    [S::zero(); 3]
}

pub fn identity3<S: Scalar>() -> Mat3<S> {
    let mut m = [[S::zero(); 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = S::one();
    }
    m
}

/// Skew-symmetric matrix with `tilde(a) * b == cross(a, b)`.
pub fn tilde<S: Scalar>(v: &Vec3<S>) -> Mat3<S> {
    let z = S::zero();
    [[z, -v[2], v[1]], [v[2], z, -v[0]], [-v[1], v[0], z]]
}

pub fn cross<S: Scalar>(a: &Vec3<S>, b: &Vec3<S>) -> Vec3<S> {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn dot3<S: Scalar>(a: &Vec3<S>, b: &Vec3<S>) -> S {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn add3<S: Scalar>(a: &Vec3<S>, b: &Vec3<S>) -> Vec3<S> {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub3<S: Scalar>(a: &Vec3<S>, b: &Vec3<S>) -> Vec3<S> {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale3<S: Scalar>(a: &Vec3<S>, s: S) -> Vec3<S> {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn norm3(a: &Vec3<f64>) -> f64 {
    dot3(a, a).sqrt()
}

pub fn mat3_mul<S: Scalar>(a: &Mat3<S>, b: &Mat3<S>) -> Mat3<S> {
    let mut c = [[S::zero(); 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            c[i][j] = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    c
}

pub fn mat3_add<S: Scalar>(a: &Mat3<S>, b: &Mat3<S>) -> Mat3<S> {
    let mut c = *a;
    for i in 0..3 {
        for j in 0..3 {
            c[i][j] += b[i][j];
        }
    }
    c
}

pub fn mat3_scale<S: Scalar>(a: &Mat3<S>, s: S) -> Mat3<S> {
    let mut c = *a;
    for row in c.iter_mut() {
        for v in row.iter_mut() {
            *v *= s;
        }
    }
    c
}

pub fn transpose3<S: Scalar>(a: &Mat3<S>) -> Mat3<S> {
    let mut t = *a;
    for i in 0..3 {
        for j in 0..3 {
            t[i][j] = a[j][i];
        }
    }
    t
}

pub fn mat3_vec<S: Scalar>(a: &Mat3<S>, v: &Vec3<S>) -> Vec3<S> {
    [dot3(&a[0], v), dot3(&a[1], v), dot3(&a[2], v)]
}

/// `aᵀ v`
pub fn mat3_tvec<S: Scalar>(a: &Mat3<S>, v: &Vec3<S>) -> Vec3<S> {
    [
        a[0][0] * v[0] + a[1][0] * v[1] + a[2][0] * v[2],
        a[0][1] * v[0] + a[1][1] * v[1] + a[2][1] * v[2],
        a[0][2] * v[0] + a[1][2] * v[1] + a[2][2] * v[2],
    ]
}

pub fn lift3<S: Scalar>(v: &Vec3<f64>) -> Vec3<S> {
    [S::cst(v[0]), S::cst(v[1]), S::cst(v[2])]
}

pub fn lift_mat3<S: Scalar>(a: &Mat3<f64>) -> Mat3<S> {
    [lift3(&a[0]), lift3(&a[1]), lift3(&a[2])]
}

/// Row-major dense matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix<S> {
    rows: usize,
    cols: usize,
    data: Vec<S>,
}

impl<S: Scalar> DenseMatrix<S> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![S::zero(); rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = S::one();
        }
        m
    }

    pub fn from_row_major(rows: usize, cols: usize, data: Vec<S>) -> AfResult<Self> {
        if data.len() != rows * cols {
            return Err(AfError::Shape {
                what: "dense matrix data".to_string(),
                expected: vec![rows, cols],
                actual: vec![data.len()],
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> S) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn as_slice(&self) -> &[S] {
        &self.data
    }

    pub fn get(&self, i: usize, j: usize) -> S {
        self.data[i * self.cols + j]
    }

    pub fn set(&mut self, i: usize, j: usize, v: S) {
        self.data[i * self.cols + j] = v;
    }

    pub fn row(&self, i: usize) -> &[S] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// `self * x`
    pub fn matvec(&self, x: &[S]) -> Vec<S> {
        debug_assert_eq!(x.len(), self.cols);
        (0..self.rows)
            .map(|i| {
                self.row(i)
                    .iter()
                    .zip(x)
                    .fold(S::zero(), |acc, (&a, &b)| acc + a * b)
            })
            .collect()
    }

    /// `self * x` accumulated into `out`.
    pub fn matvec_add_into(&self, x: &[S], out: &mut [S]) {
        for (i, o) in out.iter_mut().enumerate().take(self.rows) {
            *o += self
                .row(i)
                .iter()
                .zip(x)
                .fold(S::zero(), |acc, (&a, &b)| acc + a * b);
        }
    }

    pub fn map<T: Scalar>(&self, f: impl Fn(S) -> T) -> DenseMatrix<T> {
        DenseMatrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn values(&self) -> DenseMatrix<f64> {
        self.map(|v| v.value())
    }

    /// `I - self`
    pub fn identity_minus(&self) -> Self {
        let mut m = self.map(|v| -v);
        for i in 0..self.rows.min(self.cols) {
            let d = m.get(i, i);
            m.set(i, i, S::one() + d);
        }
        m
    }

    pub fn max_abs_value(&self) -> f64 {
        self.data
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.value().abs()))
    }
}

impl DenseMatrix<f64> {
    /// Constant matrix `factor * self` in the scalar type `S`.
    pub fn scaled<S: Scalar>(&self, factor: S) -> DenseMatrix<S> {
        self.map(|v| S::cst(v) * factor)
    }

    pub fn lift<S: Scalar>(&self) -> DenseMatrix<S> {
        self.map(S::cst)
    }
}

/// LU factorisation with partial pivoting, `P A = L U`.
///
/// Pivot rows are chosen on values, so the elimination order is the same for
/// `f64`, `Dual` and `Var` instances of one matrix.
#[derive(Debug, Clone)]
pub struct DenseLu<S> {
    n: usize,
    lu: Vec<S>,
    perm: Vec<usize>,
    pivot_ratio: f64,
}

impl<S: Scalar> DenseLu<S> {
    /// Fails with [`AfError::Singular`] if any pivot falls below
    /// `rel_tol * max|a_ij|`.
    pub fn factor(a: &DenseMatrix<S>, what: &'static str, rel_tol: f64) -> AfResult<Self> {
        let n = a.rows();
        if a.cols() != n {
            return Err(AfError::Shape {
                what: what.to_string(),
                expected: vec![n, n],
                actual: vec![a.rows(), a.cols()],
            });
        }
        let scale = a.max_abs_value();
        let threshold = rel_tol * scale;
        let mut lu = a.as_slice().to_vec();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut min_pivot = f64::INFINITY;
        let mut max_pivot: f64 = 0.0;

        for k in 0..n {
            let mut p = k;
            let mut best = lu[k * n + k].value().abs();
            for i in (k + 1)..n {
                let v = lu[i * n + k].value().abs();
                if v > best {
                    best = v;
                    p = i;
                }
            }
            if best <= threshold || best == 0.0 {
                return Err(AfError::Singular {
                    what,
                    pivot: best,
                    threshold,
                });
            }
            min_pivot = min_pivot.min(best);
            max_pivot = max_pivot.max(best);
            if p != k {
                for j in 0..n {
                    lu.swap(k * n + j, p * n + j);
                }
                perm.swap(k, p);
            }
            let pivot = lu[k * n + k];
            for i in (k + 1)..n {
                let factor = lu[i * n + k] / pivot;
                lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    let u = lu[k * n + j];
                    lu[i * n + j] -= factor * u;
                }
            }
        }

        let pivot_ratio = if n == 0 { 1.0 } else { min_pivot / max_pivot };
        Ok(Self {
            n,
            lu,
            perm,
            pivot_ratio,
        })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    /// Smallest over largest pivot magnitude.
    pub fn pivot_ratio(&self) -> f64 {
        self.pivot_ratio
    }

    pub fn solve(&self, b: &[S]) -> Vec<S> {
        let n = self.n;
        let mut x: Vec<S> = self.perm.iter().map(|&p| b[p]).collect();
        for i in 0..n {
            for j in 0..i {
                let l = self.lu[i * n + j];
                let xj = x[j];
                x[i] -= l * xj;
            }
        }
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                let u = self.lu[i * n + j];
                let xj = x[j];
                x[i] -= u * xj;
            }
            x[i] /= self.lu[i * n + i];
        }
        x
    }

    pub fn inverse(&self) -> DenseMatrix<S> {
        let n = self.n;
        let mut inv = DenseMatrix::zeros(n, n);
        let mut e = vec![S::zero(); n];
        for j in 0..n {
            e.iter_mut().for_each(|v| *v = S::zero());
            e[j] = S::one();
            let col = self.solve(&e);
            for (i, v) in col.into_iter().enumerate() {
                inv.set(i, j, v);
            }
        }
        inv
    }
}
