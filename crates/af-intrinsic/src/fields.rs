//! Physical fields recovered from modal states.
//!
//! `X1`, `X2` and `X3` are six-component element-frame quantities per node:
//! velocities, internal loads and strains. Positions `ra` and orientations
//! `Cab` are integrated from the root along the tree.

use crate::rotation::{h0, h1};
use crate::states::StateLayout;
use af_core::Scalar;
use af_core::linalg::{Mat3, Vec3, add3, lift3, lift_mat3, mat3_mul, mat3_vec, scale3, transpose3};
use af_fem::{BeamTree, ModalBasis, ModeField};
use af_solver::StateMatrix;

/// `[node][6]` field of one step.
pub type NodeField<S> = Vec<[S; 6]>;

/// `Σ_k field[k][n] q_k` at every node.
pub fn superpose<S: Scalar>(field: &ModeField, q: &[S]) -> NodeField<S> {
    let nn = field.first().map_or(0, Vec::len);
    let mut out = vec![[S::zero(); 6]; nn];
    for (mode, qk) in field.iter().zip(q) {
        for (o, f) in out.iter_mut().zip(mode) {
            for c in 0..6 {
                if f[c] != 0.0 {
                    o[c] += S::cst(f[c]) * *qk;
                }
            }
        }
    }
    out
}

/// Orientation and position of every node for one strain field.
pub struct Kinematics<S> {
    pub cab: Vec<Mat3<S>>,
    pub ra: Vec<Vec3<S>>,
}

/// Integrates `Cab` and `ra` from the clamped root using the strains `x3`.
pub fn kinematics<S: Scalar>(
    tree: &BeamTree,
    basis: &ModalBasis,
    x3: &NodeField<S>,
    rotation_threshold: f64,
) -> Kinematics<S> {
    let nn = tree.num_nodes();
    let mut cab = vec![lift_mat3::<S>(&basis.c0ab[0]); nn];
    let mut ra = vec![lift3::<S>(tree.coords(0)); nn];
    let e1 = [S::one(), S::zero(), S::zero()];

    for &n in tree.order().iter().skip(1) {
        let Some(p) = tree.parent(n) else { continue };
        let ds = basis.x_delta[n];
        let c0_rel = mat3_mul(&transpose3(&basis.c0ab[p]), &basis.c0ab[n]);
        let start = mat3_mul(&cab[p], &lift_mat3(&c0_rel));

        let strain = &x3[n];
        let gamma = [strain[0], strain[1], strain[2]];
        let psi = scale3(&[strain[3], strain[4], strain[5]], S::cst(ds));

        cab[n] = mat3_mul(&start, &h0(&psi, rotation_threshold));
        let stretch = add3(&e1, &gamma);
        let step = mat3_vec(&mat3_mul(&start, &h1(&psi, ds, rotation_threshold)), &stretch);
        ra[n] = add3(&ra[p], &step);
    }
    Kinematics { cab, ra }
}

/// Fields of a whole trajectory, `[step][node][..]`.
#[derive(Debug, Clone)]
pub struct Fields<S> {
    pub x1: Vec<NodeField<S>>,
    pub x2: Vec<NodeField<S>>,
    pub x3: Vec<NodeField<S>>,
    pub ra: Vec<Vec<Vec3<S>>>,
    pub cab: Vec<Vec<Mat3<S>>>,
}

impl<S: Scalar> Fields<S> {
    pub fn num_steps(&self) -> usize {
        self.x2.len()
    }
}

pub fn recover_fields<S: Scalar>(
    tree: &BeamTree,
    basis: &ModalBasis,
    layout: &StateLayout,
    states: &StateMatrix<S>,
    rotation_threshold: f64,
) -> Fields<S> {
    let steps = states.num_steps();
    let mut fields = Fields {
        x1: Vec::with_capacity(steps),
        x2: Vec::with_capacity(steps),
        x3: Vec::with_capacity(steps),
        ra: Vec::with_capacity(steps),
        cab: Vec::with_capacity(steps),
    };
    for row in &states.rows {
        let q = layout.split(row);
        let x1 = if q.q1.is_empty() {
            vec![[S::zero(); 6]; basis.num_nodes()]
        } else {
            superpose(&basis.phi1l, q.q1)
        };
        let x2 = superpose(&basis.phi2l, q.q2);
        let x3 = superpose(&basis.psi2l, q.q2);
        let k = kinematics(tree, basis, &x3, rotation_threshold);
        fields.x1.push(x1);
        fields.x2.push(x2);
        fields.x3.push(x3);
        fields.ra.push(k.ra);
        fields.cab.push(k.cab);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_fem::testing::reference_cantilever;
    use af_fem::{EigenMethod, EigenSource, compute_modes};

    #[test]
    fn zero_strain_reproduces_undeformed_geometry() {
        let input = reference_cantilever(5, 4.0).unwrap();
        let basis = compute_modes(&input, &EigenSource::Solve(EigenMethod::Jacobi), 4).unwrap();
        let x3 = superpose(&basis.psi2l, &[0.0; 4]);
        let k = kinematics(&input.tree, &basis, &x3, 1e-3);
        for n in 0..input.tree.num_nodes() {
            for c in 0..3 {
                assert!((k.ra[n][c] - input.tree.coords(n)[c]).abs() < 1e-12);
            }
            assert_eq!(k.cab[n], basis.c0ab[n]);
        }
    }

    #[test]
    fn uniform_curvature_bends_into_an_arc() {
        let input = reference_cantilever(11, 1.0).unwrap();
        let basis = compute_modes(&input, &EigenSource::Solve(EigenMethod::Jacobi), 2).unwrap();
        // quarter circle of radius 2/π about local z
        let kappa = std::f64::consts::FRAC_PI_2;
        let mut x3 = vec![[0.0; 6]; 11];
        for s in x3.iter_mut().skip(1) {
            s[5] = kappa;
        }
        let k = kinematics(&input.tree, &basis, &x3, 1e-3);
        let r = 1.0 / kappa;
        assert!((k.ra[10][0] - r).abs() < 1e-12);
        assert!((k.ra[10][1] - r).abs() < 1e-12);
        assert!((k.cab[10][1][0] - 1.0).abs() < 1e-12);
    }
}
