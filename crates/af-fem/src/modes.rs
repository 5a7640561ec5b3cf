//! Modal basis of the clamped beam structure.
//!
//! Velocity/momentum modes live on nodes, force/strain modes on element
//! mid-points. Per-node fields are `[mode][node][6]` with translational
//! components first; the clamped root node (and its non-existent element)
//! carries zeros everywhere.

use crate::eigen::{EigenMethod, EigenPairs, solve_generalized};
use crate::error::{FemError, FemResult};
use crate::tree::BeamTree;
use af_core::linalg::{Mat3, Vec3, add3, cross, mat3_tvec, mat3_vec, scale3, sub3, zero3};
use af_core::{ArrayData, identity_deviation};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

/// `[mode][node][component]`.
pub type ModeField = Vec<Vec<[f64; 6]>>;

/// Structural model the modes are extracted from.
#[derive(Debug, Clone)]
pub struct FemInput {
    pub tree: BeamTree,
    pub stiffness: DMatrix<f64>,
    pub mass: DMatrix<f64>,
}

/// Where eigenpairs come from.
#[derive(Debug, Clone)]
pub enum EigenSource {
    Solve(EigenMethod),
    Precomputed(EigenPairs),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModalBasis {
    pub omega: Vec<f64>,
    pub eigenvalues: Vec<f64>,
    /// Mass-normalised eigenvectors as columns, `[num_dofs, num_modes]`.
    pub eigenvectors: DMatrix<f64>,
    pub phi1: ModeField,
    pub psi1: ModeField,
    pub phi1l: ModeField,
    pub phi1ml: ModeField,
    pub psi1l: ModeField,
    pub phi2: ModeField,
    pub phi2l: ModeField,
    pub psi2l: ModeField,
    pub x_delta: Vec<f64>,
    pub c0ab: Vec<Mat3<f64>>,
}

/// Largest deviations of the orthogonality matrices from identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaReport {
    pub alpha1: f64,
    pub alpha2: f64,
}

const FIELDS: [&str; 8] = [
    "phi1", "psi1", "phi1l", "phi1ml", "psi1l", "phi2", "phi2l", "psi2l",
];

pub fn compute_modes(
    input: &FemInput,
    source: &EigenSource,
    num_modes: usize,
) -> FemResult<ModalBasis> {
    let tree = &input.tree;
    let ndof = tree.num_dofs();
    for (name, m) in [("stiffness", &input.stiffness), ("mass", &input.mass)] {
        if m.shape() != (ndof, ndof) {
            return Err(FemError::configuration(format!(
                "{name} matrix is {:?}, expected {ndof}x{ndof} for {} nodes",
                m.shape(),
                tree.num_nodes()
            )));
        }
    }

    let pairs = match source {
        EigenSource::Solve(method) => solve_generalized(&input.stiffness, &input.mass, *method)?,
        EigenSource::Precomputed(pairs) => {
            if pairs.vectors.nrows() != ndof {
                return Err(FemError::configuration(format!(
                    "precomputed eigenvectors have {} rows, expected {ndof}",
                    pairs.vectors.nrows()
                )));
            }
            pairs.clone().sorted()
        }
    };
    let pairs = pairs.truncated(num_modes)?;

    let mut vectors = pairs.vectors;
    for mut col in vectors.column_iter_mut() {
        let norm2 = col.dot(&(&input.mass * &col));
        if norm2 <= 0.0 || !norm2.is_finite() {
            return Err(FemError::configuration(
                "eigenvector has non-positive modal mass",
            ));
        }
        col /= norm2.sqrt();
        let mut lead = 0;
        for (i, v) in col.iter().enumerate() {
            if v.abs() > col[lead].abs() {
                lead = i;
            }
        }
        if col[lead] < 0.0 {
            col.neg_mut();
        }
    }

    let omega: Vec<f64> = pairs.values.iter().map(|l| l.sqrt()).collect();
    let momenta = &input.mass * &vectors;
    let forces = &input.stiffness * &vectors;

    let nm = num_modes;
    let nn = tree.num_nodes();
    let zero_field = || vec![vec![[0.0; 6]; nn]; nm];
    let mut basis = ModalBasis {
        omega,
        eigenvalues: pairs.values,
        eigenvectors: DMatrix::zeros(0, 0),
        phi1: zero_field(),
        psi1: zero_field(),
        phi1l: zero_field(),
        phi1ml: zero_field(),
        psi1l: zero_field(),
        phi2: zero_field(),
        phi2l: zero_field(),
        psi2l: zero_field(),
        x_delta: tree.ds_all().to_vec(),
        c0ab: tree.c0ab_all().to_vec(),
    };

    for m in 0..nm {
        let v = nodal(tree, &vectors.column(m).into_owned());
        let p = nodal(tree, &momenta.column(m).into_owned());
        let f = nodal(tree, &forces.column(m).into_owned());
        let w = basis.omega[m];

        let (sub_force, sub_moment) = subtree_loads(tree, &f);

        for n in 0..nn {
            basis.phi1[m][n] = v[n];
            basis.psi1[m][n] = p[n];
            let Some(parent) = tree.parent(n) else {
                continue;
            };
            let c = tree.c0ab(n);
            let ds = tree.ds(n);
            basis.phi1l[m][n] = to_local(c, &v[n]);
            basis.psi1l[m][n] = to_local(c, &p[n]);

            let mean = [0, 1, 2, 3, 4, 5].map(|k| 0.5 * (v[parent][k] + v[n][k]));
            basis.phi1ml[m][n] = to_local(c, &mean);

            let (up, tp) = split(&v[parent]);
            let (un, tn) = split(&v[n]);
            let du = sub3(&un, &up);
            let theta_mean = scale3(&add3(&tn, &tp), 0.5);
            let gamma = add3(
                &scale3(&mat3_tvec(c, &du), 1.0 / ds),
                &cross(&[1.0, 0.0, 0.0], &mat3_tvec(c, &theta_mean)),
            );
            let kappa = scale3(&mat3_tvec(c, &sub3(&tn, &tp)), 1.0 / ds);

            let mid = tree.midpoint(n);
            let moment = sub3(&sub_moment[n], &cross(&mid, &sub_force[n]));
            let force_l = mat3_tvec(c, &sub_force[n]);
            let moment_l = mat3_tvec(c, &moment);

            let phi2l = join(&scale3(&force_l, -1.0 / w), &scale3(&moment_l, -1.0 / w));
            basis.phi2l[m][n] = phi2l;
            let (fl, ml) = split(&phi2l);
            basis.phi2[m][n] = join(&mat3_vec(c, &fl), &mat3_vec(c, &ml));
            basis.psi2l[m][n] = join(&scale3(&gamma, -1.0 / w), &scale3(&kappa, -1.0 / w));
        }
    }
    basis.eigenvectors = vectors;

    tracing::info!(
        num_modes = nm,
        num_nodes = nn,
        omega_min = basis.omega.first().copied().unwrap_or(0.0),
        omega_max = basis.omega.last().copied().unwrap_or(0.0),
        "modal basis computed"
    );
    Ok(basis)
}

/// Splits a dof vector into per-node six-vectors, root first.
fn nodal(tree: &BeamTree, v: &DVector<f64>) -> Vec<[f64; 6]> {
    (0..tree.num_nodes())
        .map(|n| match tree.dof(n) {
            Some(d) => [v[d], v[d + 1], v[d + 2], v[d + 3], v[d + 4], v[d + 5]],
            None => [0.0; 6],
        })
        .collect()
}

/// Force and moment (about the origin) summed over the subtree of each node.
fn subtree_loads(tree: &BeamTree, f: &[[f64; 6]]) -> (Vec<Vec3<f64>>, Vec<Vec3<f64>>) {
    let nn = tree.num_nodes();
    let mut force = vec![zero3(); nn];
    let mut moment = vec![zero3(); nn];
    for &n in tree.order().iter().rev() {
        let (fn_, mn) = split(&f[n]);
        force[n] = add3(&force[n], &fn_);
        moment[n] = add3(&moment[n], &add3(&mn, &cross(tree.coords(n), &fn_)));
        if let Some(p) = tree.parent(n) {
            force[p] = add3(&force[p], &force[n]);
            moment[p] = add3(&moment[p], &moment[n]);
        }
    }
    (force, moment)
}

pub(crate) fn split(x: &[f64; 6]) -> (Vec3<f64>, Vec3<f64>) {
    ([x[0], x[1], x[2]], [x[3], x[4], x[5]])
}

pub(crate) fn join(a: &Vec3<f64>, b: &Vec3<f64>) -> [f64; 6] {
    [a[0], a[1], a[2], b[0], b[1], b[2]]
}

fn to_local(c: &Mat3<f64>, x: &[f64; 6]) -> [f64; 6] {
    let (a, b) = split(x);
    join(&mat3_tvec(c, &a), &mat3_tvec(c, &b))
}

fn dot6(a: &[f64; 6], b: &[f64; 6]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl ModalBasis {
    pub fn num_modes(&self) -> usize {
        self.omega.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.x_delta.len()
    }

    /// `alpha1[i][j] = Σ_n phi1_i · psi1_j`.
    pub fn alpha1(&self) -> Vec<Vec<f64>> {
        let nm = self.num_modes();
        (0..nm)
            .map(|i| {
                (0..nm)
                    .map(|j| {
                        self.phi1[i]
                            .iter()
                            .zip(&self.psi1[j])
                            .map(|(a, b)| dot6(a, b))
                            .sum()
                    })
                    .collect()
            })
            .collect()
    }

    /// `alpha2[i][j] = Σ_n ds_n phi2l_i · psi2l_j`.
    pub fn alpha2(&self) -> Vec<Vec<f64>> {
        let nm = self.num_modes();
        (0..nm)
            .map(|i| {
                (0..nm)
                    .map(|j| {
                        (0..self.num_nodes())
                            .map(|n| self.x_delta[n] * dot6(&self.phi2l[i][n], &self.psi2l[j][n]))
                            .sum()
                    })
                    .collect()
            })
            .collect()
    }

    /// Named arrays for persistence.
    pub fn to_arrays(&self) -> Vec<(&'static str, ArrayData)> {
        let nm = self.num_modes();
        let nn = self.num_nodes();
        let ndof = self.eigenvectors.nrows();
        let mut out = vec![
            ("omega", ArrayData::vector(self.omega.clone())),
            ("eigenvalues", ArrayData::vector(self.eigenvalues.clone())),
            (
                "eigenvectors",
                ArrayData {
                    shape: vec![ndof, nm],
                    data: (0..ndof)
                        .flat_map(|r| (0..nm).map(move |c| (r, c)))
                        .map(|(r, c)| self.eigenvectors[(r, c)])
                        .collect(),
                },
            ),
        ];
        for name in FIELDS {
            let field = self.field(name);
            out.push((
                name,
                ArrayData {
                    shape: vec![nm, nn, 6],
                    data: field.iter().flatten().flatten().copied().collect(),
                },
            ));
        }
        out.push(("x_delta", ArrayData::vector(self.x_delta.clone())));
        out.push((
            "c0ab",
            ArrayData {
                shape: vec![nn, 3, 3],
                data: self.c0ab.iter().flatten().flatten().copied().collect(),
            },
        ));
        out
    }

    /// Inverse of [`ModalBasis::to_arrays`].
    pub fn from_arrays(arrays: &BTreeMap<String, ArrayData>) -> FemResult<Self> {
        let get = |name: &str| {
            arrays
                .get(name)
                .ok_or_else(|| FemError::configuration(format!("modal array '{name}' is missing")))
        };
        let omega = get("omega")?;
        omega.expect_ndim("omega", 1)?;
        let nm = omega.len();
        let x_delta = get("x_delta")?;
        x_delta.expect_ndim("x_delta", 1)?;
        let nn = x_delta.len();

        let eigenvalues = get("eigenvalues")?;
        eigenvalues.expect_shape("eigenvalues", &[nm])?;
        let vectors = get("eigenvectors")?;
        vectors.expect_ndim("eigenvectors", 2)?;
        vectors.expect_shape("eigenvectors", &[vectors.shape[0], nm])?;
        let c0ab = get("c0ab")?;
        c0ab.expect_shape("c0ab", &[nn, 3, 3])?;

        let mut fields = BTreeMap::new();
        for name in FIELDS {
            let a = get(name)?;
            a.expect_shape(name, &[nm, nn, 6])?;
            let field: ModeField = a
                .data
                .chunks(6 * nn)
                .map(|mode| {
                    mode.chunks(6)
                        .map(|c| [c[0], c[1], c[2], c[3], c[4], c[5]])
                        .collect()
                })
                .collect();
            fields.insert(name, field);
        }
        let mut take = |name: &str| fields.remove(name).unwrap_or_default();

        Ok(Self {
            omega: omega.data.clone(),
            eigenvalues: eigenvalues.data.clone(),
            eigenvectors: DMatrix::from_row_slice(vectors.shape[0], nm, &vectors.data),
            phi1: take("phi1"),
            psi1: take("psi1"),
            phi1l: take("phi1l"),
            phi1ml: take("phi1ml"),
            psi1l: take("psi1l"),
            phi2: take("phi2"),
            phi2l: take("phi2l"),
            psi2l: take("psi2l"),
            x_delta: x_delta.data.clone(),
            c0ab: c0ab
                .data
                .chunks(9)
                .map(|c| [[c[0], c[1], c[2]], [c[3], c[4], c[5]], [c[6], c[7], c[8]]])
                .collect(),
        })
    }

    fn field(&self, name: &str) -> &ModeField {
        match name {
            "phi1" => &self.phi1,
            "psi1" => &self.psi1,
            "phi1l" => &self.phi1l,
            "phi1ml" => &self.phi1ml,
            "psi1l" => &self.psi1l,
            "phi2" => &self.phi2,
            "phi2l" => &self.phi2l,
            _ => &self.psi2l,
        }
    }
}

/// Compares `alpha1` and `alpha2` with identity.
///
/// A deviation above `tolerance` is an error unless `tolerate` is set, in
/// which case it is logged and the report returned.
pub fn check_alphas(basis: &ModalBasis, tolerance: f64, tolerate: bool) -> FemResult<AlphaReport> {
    let report = AlphaReport {
        alpha1: identity_deviation(&basis.alpha1()),
        alpha2: identity_deviation(&basis.alpha2()),
    };
    for (check, deviation) in [("alpha1", report.alpha1), ("alpha2", report.alpha2)] {
        if deviation > tolerance || !deviation.is_finite() {
            if tolerate {
                tracing::warn!(check, deviation, tolerance, "modal orthogonality out of tolerance");
            } else {
                return Err(FemError::NumericalConsistency {
                    check,
                    deviation,
                    tolerance,
                });
            }
        }
    }
    tracing::debug!(alpha1 = report.alpha1, alpha2 = report.alpha2, "modal orthogonality");
    Ok(report)
}
