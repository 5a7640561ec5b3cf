//! Reference beam models for tests.
//!
//! Linear Timoshenko elements with one-point (mid-element) strain sampling
//! and lumped nodal mass, assembled on a [`BeamTree`]. The strain
//! interpolation is the same finite difference the modal post-processing
//! uses, so the orthogonality checks on these models hold to round-off.

use crate::error::{FemError, FemResult};
use crate::modes::FemInput;
use crate::tree::{BeamTree, ComponentDef, GridPoint};
use af_core::linalg::{Mat3, mat3_mul, tilde, transpose3};
use nalgebra::DMatrix;

/// Uniform cross-section properties.
#[derive(Debug, Clone, Copy)]
pub struct BeamProperties {
    pub ea: f64,
    pub ga_y: f64,
    pub ga_z: f64,
    pub gj: f64,
    pub ei_y: f64,
    pub ei_z: f64,
    /// Mass per unit length.
    pub mass: f64,
    /// Rotational inertia per unit length about local x, y, z.
    pub inertia: [f64; 3],
}

impl Default for BeamProperties {
    fn default() -> Self {
        Self {
            ea: 1e7,
            ga_y: 5e6,
            ga_z: 5e6,
            gj: 1e4,
            ei_y: 2e4,
            ei_z: 4e4,
            mass: 10.0,
            inertia: [0.1, 0.05, 0.05],
        }
    }
}

/// Assembles stiffness and lumped mass for `tree` with uniform properties.
pub fn beam_fem(tree: BeamTree, props: &BeamProperties) -> FemInput {
    let ndof = tree.num_dofs();
    let mut k = DMatrix::<f64>::zeros(ndof, ndof);
    let mut m = DMatrix::<f64>::zeros(ndof, ndof);
    let d = [
        props.ea, props.ga_y, props.ga_z, props.gj, props.ei_y, props.ei_z,
    ];

    for n in 1..tree.num_nodes() {
        let Some(p) = tree.parent(n) else { continue };
        let c = tree.c0ab(n);
        let ct = transpose3(c);
        let ds = tree.ds(n);
        let e1 = tilde(&[1.0, 0.0, 0.0]);
        let e1ct = mat3_mul(&e1, &ct);

        // strain-displacement rows over [u_p, θ_p, u_n, θ_n]
        let mut b = [[0.0; 12]; 6];
        put(&mut b, 0, 0, &ct, -1.0 / ds);
        put(&mut b, 0, 3, &e1ct, 0.5);
        put(&mut b, 0, 6, &ct, 1.0 / ds);
        put(&mut b, 0, 9, &e1ct, 0.5);
        put(&mut b, 3, 3, &ct, -1.0 / ds);
        put(&mut b, 3, 9, &ct, 1.0 / ds);

        let dofs = |local: usize| -> Option<usize> {
            let node = if local < 6 { p } else { n };
            tree.dof(node).map(|d0| d0 + local % 6)
        };
        for a in 0..12 {
            let Some(ga) = dofs(a) else { continue };
            for bb in 0..12 {
                let Some(gb) = dofs(bb) else { continue };
                let kab: f64 = (0..6).map(|r| b[r][a] * d[r] * b[r][bb]).sum();
                k[(ga, gb)] += ds * kab;
            }
        }

        let rot = rotated_inertia(c, &props.inertia);
        for node in [p, n] {
            let Some(d0) = tree.dof(node) else { continue };
            for i in 0..3 {
                m[(d0 + i, d0 + i)] += 0.5 * ds * props.mass;
                for j in 0..3 {
                    m[(d0 + 3 + i, d0 + 3 + j)] += 0.5 * ds * rot[i][j];
                }
            }
        }
    }

    FemInput {
        tree,
        stiffness: k,
        mass: m,
    }
}

fn put(b: &mut [[f64; 12]; 6], row: usize, col: usize, block: &Mat3<f64>, factor: f64) {
    for i in 0..3 {
        for j in 0..3 {
            b[row + i][col + j] += factor * block[i][j];
        }
    }
}

fn rotated_inertia(c: &Mat3<f64>, inertia: &[f64; 3]) -> Mat3<f64> {
    let mut diag = [[0.0; 3]; 3];
    for i in 0..3 {
        diag[i][i] = inertia[i];
    }
    mat3_mul(&mat3_mul(c, &diag), &transpose3(c))
}

/// Straight cantilever along global x, clamped at the origin.
pub fn cantilever_tree(num_nodes: usize, length: f64) -> FemResult<BeamTree> {
    if num_nodes < 2 {
        return Err(FemError::configuration("a cantilever needs at least two nodes"));
    }
    let comps = [ComponentDef {
        name: "beam".into(),
        children: Vec::new(),
    }];
    let grid: Vec<GridPoint> = (0..num_nodes)
        .map(|i| GridPoint {
            x: [length * i as f64 / (num_nodes - 1) as f64, 0.0, 0.0],
            component: "beam".into(),
        })
        .collect();
    BeamTree::new(&comps, &grid, 1e-4)
}

pub fn reference_cantilever(num_nodes: usize, length: f64) -> FemResult<FemInput> {
    Ok(beam_fem(
        cantilever_tree(num_nodes, length)?,
        &BeamProperties::default(),
    ))
}

/// Fuselage along x (clamped at the nose) with two wings towards ±y
/// attached at its last node.
pub fn tee_tree() -> FemResult<BeamTree> {
    let comps = [
        ComponentDef {
            name: "fuselage".into(),
            children: vec!["wing_r".into(), "wing_l".into()],
        },
        ComponentDef {
            name: "wing_r".into(),
            children: Vec::new(),
        },
        ComponentDef {
            name: "wing_l".into(),
            children: Vec::new(),
        },
    ];
    let mut grid = Vec::new();
    for i in 0..4 {
        grid.push(GridPoint {
            x: [i as f64, 0.0, 0.0],
            component: "fuselage".into(),
        });
    }
    for side in [("wing_r", 1.0), ("wing_l", -1.0)] {
        for i in 1..=4 {
            grid.push(GridPoint {
                x: [3.0, side.1 * 1.5 * i as f64, 0.0],
                component: side.0.into(),
            });
        }
    }
    BeamTree::new(&comps, &grid, 1e-4)
}

pub fn reference_tee() -> FemResult<FemInput> {
    Ok(beam_fem(tee_tree()?, &BeamProperties::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stiffness_and_mass_are_symmetric() {
        let fem = reference_tee().unwrap();
        let k = &fem.stiffness;
        let m = &fem.mass;
        assert_eq!(k.nrows(), 6 * 11);
        assert!((k - k.transpose()).amax() < 1e-6 * k.amax());
        assert!((m - m.transpose()).amax() < 1e-12);
        assert!(m.clone().cholesky().is_some());
    }
}
