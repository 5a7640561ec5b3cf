//! Jacobians by forward-mode differentiation and by finite differences.

use crate::error::SolverResult;
use af_core::{DenseMatrix, Dual};

/// Exact Jacobian of `f` at `x`, one dual-number pass per column.
pub fn forward_jacobian<F>(x: &[f64], f: F) -> SolverResult<DenseMatrix<f64>>
where
    F: Fn(&[Dual]) -> SolverResult<Vec<Dual>>,
{
    let n = x.len();
    let mut seeded: Vec<Dual> = x.iter().map(|&v| Dual::new(v, 0.0)).collect();
    let mut columns = Vec::with_capacity(n);
    for j in 0..n {
        seeded[j].eps = 1.0;
        columns.push(f(&seeded)?);
        seeded[j].eps = 0.0;
    }
    let m = columns.first().map_or(0, Vec::len);
    Ok(DenseMatrix::from_fn(m, n, |i, j| columns[j][i].eps))
}

/// Central finite-difference Jacobian (2n evaluations).
pub fn central_difference_jacobian<F>(
    x: &[f64],
    f: F,
    epsilon: f64,
) -> SolverResult<DenseMatrix<f64>>
where
    F: Fn(&[f64]) -> SolverResult<Vec<f64>>,
{
    let n = x.len();
    let mut columns = Vec::with_capacity(n);
    for j in 0..n {
        let dx = epsilon * x[j].abs().max(1.0);

        let mut x_plus = x.to_vec();
        x_plus[j] += dx;
        let f_plus = f(&x_plus)?;

        let mut x_minus = x.to_vec();
        x_minus[j] -= dx;
        let f_minus = f(&x_minus)?;

        columns.push(
            f_plus
                .iter()
                .zip(&f_minus)
                .map(|(a, b)| (a - b) / (2.0 * dx))
                .collect::<Vec<_>>(),
        );
    }
    let m = columns.first().map_or(0, Vec::len);
    Ok(DenseMatrix::from_fn(m, n, |i, j| columns[j][i]))
}
