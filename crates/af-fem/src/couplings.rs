//! Nonlinear modal coupling tensors.

use crate::modes::{ModalBasis, split};
use af_core::linalg::{Vec3, add3, cross, dot3};
use af_core::{ArrayData, Scalar};
use rayon::prelude::*;

/// Dense `n × n × n` tensor, last index fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor3 {
    n: usize,
    data: Vec<f64>,
}

impl Tensor3 {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n * n],
        }
    }

    pub fn from_data(n: usize, data: Vec<f64>) -> Option<Self> {
        (data.len() == n * n * n).then_some(Self { n, data })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[(i * self.n + j) * self.n + k]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// `out_i = Σ_jk T_ijk a_j b_k`.
    pub fn contract_last<S: Scalar>(&self, a: &[S], b: &[S]) -> Vec<S> {
        let n = self.n;
        (0..n)
            .map(|i| {
                let mut acc = S::zero();
                for j in 0..n {
                    let row = &self.data[(i * n + j) * n..(i * n + j + 1) * n];
                    let mut inner = S::zero();
                    for (t, bk) in row.iter().zip(b) {
                        if *t != 0.0 {
                            inner += S::cst(*t) * *bk;
                        }
                    }
                    acc += a[j] * inner;
                }
                acc
            })
            .collect()
    }

    /// `out_k = Σ_ij T_ijk a_i b_j`.
    pub fn contract_first<S: Scalar>(&self, a: &[S], b: &[S]) -> Vec<S> {
        let n = self.n;
        let mut out = vec![S::zero(); n];
        for i in 0..n {
            for j in 0..n {
                let w = a[i] * b[j];
                let row = &self.data[(i * n + j) * n..(i * n + j + 1) * n];
                for (o, t) in out.iter_mut().zip(row) {
                    if *t != 0.0 {
                        *o += S::cst(*t) * w;
                    }
                }
            }
        }
        out
    }

    pub fn to_array(&self) -> ArrayData {
        ArrayData {
            shape: vec![self.n; 3],
            data: self.data.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouplingTensors {
    pub gamma1: Tensor3,
    pub gamma2: Tensor3,
}

impl CouplingTensors {
    pub fn num_modes(&self) -> usize {
        self.gamma1.dim()
    }
}

/// Builds `gamma1` (velocity-momentum) and `gamma2` (velocity-force-strain)
/// from the modal fields.
pub fn build_couplings(basis: &ModalBasis) -> CouplingTensors {
    let nm = basis.num_modes();
    let nn = basis.num_nodes();

    let slabs: Vec<(Vec<f64>, Vec<f64>)> = (0..nm)
        .into_par_iter()
        .map(|i| {
            let mut g1 = vec![0.0; nm * nm];
            let mut g2 = vec![0.0; nm * nm];
            for j in 0..nm {
                for k in 0..nm {
                    let mut s1 = 0.0;
                    let mut s2 = 0.0;
                    for n in 0..nn {
                        s1 += gamma1_term(
                            &basis.phi1l[i][n],
                            &basis.phi1l[j][n],
                            &basis.psi1l[k][n],
                        );
                        s2 += basis.x_delta[n]
                            * gamma2_term(
                                &basis.phi1ml[i][n],
                                &basis.phi2l[j][n],
                                &basis.psi2l[k][n],
                            );
                    }
                    g1[j * nm + k] = s1;
                    g2[j * nm + k] = s2;
                }
            }
            (g1, g2)
        })
        .collect();

    let mut gamma1 = Tensor3::zeros(nm);
    let mut gamma2 = Tensor3::zeros(nm);
    for (i, (g1, g2)) in slabs.into_iter().enumerate() {
        gamma1.data[i * nm * nm..(i + 1) * nm * nm].copy_from_slice(&g1);
        gamma2.data[i * nm * nm..(i + 1) * nm * nm].copy_from_slice(&g2);
    }
    tracing::debug!(num_modes = nm, "coupling tensors built");
    CouplingTensors { gamma1, gamma2 }
}

/// `phi_iᵀ L1(phi_j) psi_k` with `L1(v, w) = [[w̃, 0], [ṽ, w̃]]`.
fn gamma1_term(phi_i: &[f64; 6], phi_j: &[f64; 6], psi_k: &[f64; 6]) -> f64 {
    let (vi, wi) = split(phi_i);
    let (vj, wj) = split(phi_j);
    let (p, h) = split(psi_k);
    let top = cross(&wj, &p);
    let bottom: Vec3<f64> = add3(&cross(&vj, &p), &cross(&wj, &h));
    dot3(&vi, &top) + dot3(&wi, &bottom)
}

/// `phi_iᵀ L2(phi2_j) psi2_k` with `L2(f, m) = [[0, f̃], [f̃, m̃]]`.
fn gamma2_term(phi_i: &[f64; 6], phi2_j: &[f64; 6], psi2_k: &[f64; 6]) -> f64 {
    let (vi, wi) = split(phi_i);
    let (f, m) = split(phi2_j);
    let (gamma, kappa) = split(psi2_k);
    let top = cross(&f, &kappa);
    let bottom = add3(&cross(&f, &gamma), &cross(&m, &kappa));
    dot3(&vi, &top) + dot3(&wi, &bottom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contractions_match_explicit_sums() {
        let t = Tensor3::from_data(2, (0..8).map(f64::from).collect()).unwrap();
        let a = [1.0, 2.0];
        let b = [3.0, -1.0];
        let last = t.contract_last(&a, &b);
        let first = t.contract_first(&a, &b);
        for i in 0..2 {
            let mut want = 0.0;
            let mut want_first = 0.0;
            for j in 0..2 {
                for k in 0..2 {
                    want += t.get(i, j, k) * a[j] * b[k];
                    want_first += t.get(j, k, i) * a[j] * b[k];
                }
            }
            assert_eq!(last[i], want);
            assert_eq!(first[i], want_first);
        }
    }

    #[test]
    fn gamma1_term_vanishes_on_diagonal() {
        let phi = [0.3, -1.0, 2.0, 0.5, 0.1, -0.7];
        let psi = [1.0, 0.2, -0.4, 0.9, 0.0, 1.5];
        // v·(w×P) + w·(v×P) cancels and w·(w×H) is zero
        assert!(gamma1_term(&phi, &phi, &psi).abs() < 1e-14);
    }
}
