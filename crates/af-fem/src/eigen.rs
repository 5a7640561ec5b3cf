//! Generalized eigenproblem `K φ = λ M φ`.
//!
//! Both in-process paths reduce the problem with the Cholesky factor of the
//! mass matrix, `M = L Lᵀ`, solve the standard symmetric problem
//! `L⁻¹ K L⁻ᵀ ψ = λ ψ` and map back with `φ = L⁻ᵀ ψ`, which makes the
//! eigenvectors mass-orthonormal.

use crate::error::{FemError, FemResult};
use af_core::ArrayData;
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

const MAX_SWEEPS: usize = 100;

/// How the eigenpairs are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EigenMethod {
    /// Cyclic Jacobi rotations, in process.
    #[default]
    Jacobi,
    /// `nalgebra::SymmetricEigen`.
    Nalgebra,
    /// Precomputed eigenvalues/eigenvectors read from array files.
    Load,
}

/// Eigenvalues with eigenvectors stored as matrix columns.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenPairs {
    pub values: Vec<f64>,
    pub vectors: DMatrix<f64>,
}

impl EigenPairs {
    /// From a vector of eigenvalues and a `[num_dofs, num_pairs]` array.
    pub fn from_arrays(values: &ArrayData, vectors: &ArrayData) -> FemResult<Self> {
        vectors.expect_ndim("eigenvectors", 2)?;
        let (rows, cols) = (vectors.shape[0], vectors.shape[1]);
        if values.len() != cols {
            return Err(FemError::configuration(format!(
                "{} eigenvalues for {cols} eigenvectors",
                values.len()
            )));
        }
        Ok(Self {
            values: values.data.clone(),
            vectors: DMatrix::from_row_slice(rows, cols, &vectors.data),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reorders pairs by ascending eigenvalue.
    pub fn sorted(self) -> Self {
        let mut idx: Vec<usize> = (0..self.values.len()).collect();
        idx.sort_by(|&a, &b| self.values[a].total_cmp(&self.values[b]));
        let values = idx.iter().map(|&i| self.values[i]).collect();
        let vectors = DMatrix::from_fn(self.vectors.nrows(), idx.len(), |r, c| {
            self.vectors[(r, idx[c])]
        });
        Self { values, vectors }
    }

    /// Keeps the `num_modes` lowest pairs.
    ///
    /// Every retained eigenvalue must be positive: a zero or negative one
    /// means an unconstrained (free-floating) or indefinite model.
    pub fn truncated(self, num_modes: usize) -> FemResult<Self> {
        if num_modes == 0 {
            return Err(FemError::configuration("num_modes must be at least 1"));
        }
        if num_modes > self.values.len() {
            return Err(FemError::configuration(format!(
                "num_modes = {num_modes} exceeds the {} available eigenpairs",
                self.values.len()
            )));
        }
        if let Some((i, v)) = self.values[..num_modes]
            .iter()
            .enumerate()
            .find(|(_, v)| **v <= 0.0)
        {
            return Err(FemError::configuration(format!(
                "eigenvalue {i} = {v:.3e} is not positive; is the structure clamped?"
            )));
        }
        Ok(Self {
            values: self.values[..num_modes].to_vec(),
            vectors: self.vectors.columns(0, num_modes).into_owned(),
        })
    }
}

/// Solves `K φ = λ M φ` in process, sorted ascending.
pub fn solve_generalized(
    stiffness: &DMatrix<f64>,
    mass: &DMatrix<f64>,
    method: EigenMethod,
) -> FemResult<EigenPairs> {
    let n = stiffness.nrows();
    if stiffness.shape() != (n, n) || mass.shape() != (n, n) {
        return Err(FemError::configuration(format!(
            "stiffness {:?} and mass {:?} must be square and equally sized",
            stiffness.shape(),
            mass.shape()
        )));
    }

    let chol = mass
        .clone()
        .cholesky()
        .ok_or_else(|| FemError::configuration("mass matrix is not positive definite"))?;
    let l = chol.l();
    let l_inv_k = l
        .solve_lower_triangular(stiffness)
        .ok_or_else(|| FemError::configuration("mass Cholesky factor is singular"))?;
    let reduced = l
        .solve_lower_triangular(&l_inv_k.transpose())
        .ok_or_else(|| FemError::configuration("mass Cholesky factor is singular"))?;
    let reduced = (&reduced + reduced.transpose()) * 0.5;

    let (values, psi) = match method {
        EigenMethod::Jacobi => jacobi_eigen(reduced)?,
        EigenMethod::Nalgebra => {
            let eig = SymmetricEigen::new(reduced);
            (eig.eigenvalues.iter().copied().collect(), eig.eigenvectors)
        }
        EigenMethod::Load => {
            return Err(FemError::configuration(
                "eigenpairs for method 'load' are read from files, not solved",
            ));
        }
    };

    let vectors = l
        .transpose()
        .solve_upper_triangular(&psi)
        .ok_or_else(|| FemError::configuration("mass Cholesky factor is singular"))?;

    tracing::debug!(?method, size = n, "generalized eigenproblem solved");
    Ok(EigenPairs { values, vectors }.sorted())
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
///
/// Off-diagonal entries that no longer change the diagonal in floating point
/// are set to zero after the first sweeps, so the iteration ends with an
/// exactly diagonal matrix.
pub fn jacobi_eigen(mut a: DMatrix<f64>) -> FemResult<(Vec<f64>, DMatrix<f64>)> {
    let n = a.nrows();
    let mut v = DMatrix::<f64>::identity(n, n);

    for sweep in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[(p, q)].abs();
            }
        }
        if off == 0.0 {
            let values = (0..n).map(|i| a[(i, i)]).collect();
            return Ok((values, v));
        }
        let threshold = if sweep < 3 {
            0.2 * off / (n * n) as f64
        } else {
            0.0
        };

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[(p, q)];
                let g = 100.0 * apq.abs();
                let app = a[(p, p)];
                let aqq = a[(q, q)];
                if sweep > 3 && app.abs() + g == app.abs() && aqq.abs() + g == aqq.abs() {
                    a[(p, q)] = 0.0;
                    a[(q, p)] = 0.0;
                    continue;
                }
                if apq.abs() <= threshold || apq == 0.0 {
                    continue;
                }

                let h = aqq - app;
                let t = if h.abs() + g == h.abs() {
                    apq / h
                } else {
                    let theta = 0.5 * h / apq;
                    let t = 1.0 / (theta.abs() + (1.0 + theta * theta).sqrt());
                    if theta < 0.0 { -t } else { t }
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[(k, p)];
                    let akq = a[(k, q)];
                    a[(k, p)] = c * akp - s * akq;
                    a[(k, q)] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[(p, k)];
                    let aqk = a[(q, k)];
                    a[(p, k)] = c * apk - s * aqk;
                    a[(q, k)] = s * apk + c * aqk;
                }
                a[(p, q)] = 0.0;
                a[(q, p)] = 0.0;
                for k in 0..n {
                    let vkp = v[(k, p)];
                    let vkq = v[(k, q)];
                    v[(k, p)] = c * vkp - s * vkq;
                    v[(k, q)] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(FemError::EigenSolve {
        what: format!("Jacobi iteration did not converge in {MAX_SWEEPS} sweeps (n = {n})"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jacobi_diagonalises_small_matrix() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 1.0]);
        let (values, v) = jacobi_eigen(a.clone()).unwrap();
        for (k, lambda) in values.iter().enumerate() {
            let x = v.column(k);
            let r = &a * x - x * *lambda;
            assert!(r.norm() < 1e-12);
        }
        let vtv = v.transpose() * &v;
        assert!((vtv - DMatrix::identity(3, 3)).norm() < 1e-12);
    }

    #[test]
    fn both_solvers_agree_on_generalized_problem() {
        let k = DMatrix::from_row_slice(2, 2, &[6.0, -2.0, -2.0, 4.0]);
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1.0]);
        let a = solve_generalized(&k, &m, EigenMethod::Jacobi).unwrap();
        let b = solve_generalized(&k, &m, EigenMethod::Nalgebra).unwrap();
        assert!(a.values[0] <= a.values[1]);
        for (x, y) in a.values.iter().zip(&b.values) {
            assert!((x - y).abs() < 1e-12);
        }
        // mass orthonormal
        let g = a.vectors.transpose() * &m * &a.vectors;
        assert!((g - DMatrix::identity(2, 2)).norm() < 1e-12);
    }

    #[test]
    fn truncation_checks_counts_and_signs() {
        let pairs = EigenPairs {
            values: vec![-1.0, 2.0],
            vectors: DMatrix::identity(2, 2),
        };
        assert!(matches!(
            pairs.clone().truncated(3),
            Err(FemError::Configuration { .. })
        ));
        assert!(matches!(
            pairs.truncated(1),
            Err(FemError::Configuration { .. })
        ));
    }

    #[test]
    fn indefinite_mass_is_a_configuration_error() {
        let k = DMatrix::identity(2, 2);
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        let err = solve_generalized(&k, &m, EigenMethod::Nalgebra).unwrap_err();
        assert!(matches!(err, FemError::Configuration { .. }));
    }
}
