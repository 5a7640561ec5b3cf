//! Beam connectivity tree.
//!
//! The structure is a rooted tree of named components. Grid nodes are tagged
//! with their component and listed in order along it; node 0 is the clamped
//! root. Every other node `n` closes the element running from its parent to
//! `n`, so element and node indices coincide.

use crate::error::{FemError, FemResult};
use af_core::linalg::{Mat3, Vec3, add3, cross, identity3, norm3, scale3, sub3};
use std::collections::{HashMap, VecDeque};

/// Named component and the components attached to its last node.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDef {
    pub name: String,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    pub x: Vec3<f64>,
    pub component: String,
}

#[derive(Debug, Clone)]
pub struct BeamTree {
    coords: Vec<Vec3<f64>>,
    component: Vec<usize>,
    component_names: Vec<String>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    order: Vec<usize>,
    ds: Vec<f64>,
    c0ab: Vec<Mat3<f64>>,
}

impl BeamTree {
    pub fn new(components: &[ComponentDef], grid: &[GridPoint], cab_xtol: f64) -> FemResult<Self> {
        if grid.len() < 2 {
            return Err(FemError::configuration(format!(
                "grid needs a root and at least one free node, got {} nodes",
                grid.len()
            )));
        }

        let mut index = HashMap::new();
        for (i, c) in components.iter().enumerate() {
            if index.insert(c.name.as_str(), i).is_some() {
                return Err(FemError::configuration(format!(
                    "duplicate component '{}'",
                    c.name
                )));
            }
        }

        let mut parent_component: Vec<Option<usize>> = vec![None; components.len()];
        for (i, c) in components.iter().enumerate() {
            for child in &c.children {
                let j = *index.get(child.as_str()).ok_or_else(|| {
                    FemError::configuration(format!(
                        "component '{}' lists unknown child '{child}'",
                        c.name
                    ))
                })?;
                if parent_component[j].replace(i).is_some() {
                    return Err(FemError::configuration(format!(
                        "component '{child}' has more than one parent"
                    )));
                }
            }
        }
        let roots: Vec<usize> = (0..components.len())
            .filter(|&i| parent_component[i].is_none())
            .collect();
        if roots.len() != 1 {
            return Err(FemError::configuration(format!(
                "connectivity must have exactly one root component, found {}",
                roots.len()
            )));
        }

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
        let mut component = Vec::with_capacity(grid.len());
        for (n, p) in grid.iter().enumerate() {
            let c = *index.get(p.component.as_str()).ok_or_else(|| {
                FemError::configuration(format!(
                    "grid node {n} references unknown component '{}'",
                    p.component
                ))
            })?;
            members[c].push(n);
            component.push(c);
        }
        if component[0] != roots[0] {
            return Err(FemError::configuration(format!(
                "node 0 must belong to the root component '{}'",
                components[roots[0]].name
            )));
        }
        if let Some(empty) = members.iter().position(Vec::is_empty) {
            return Err(FemError::configuration(format!(
                "component '{}' has no grid nodes",
                components[empty].name
            )));
        }

        let mut parent = vec![None; grid.len()];
        for (c, nodes) in members.iter().enumerate() {
            for (k, &n) in nodes.iter().enumerate() {
                parent[n] = if k > 0 {
                    Some(nodes[k - 1])
                } else {
                    // first node hangs from the last node of the parent component
                    parent_component[c].and_then(|pc| members[pc].last().copied())
                };
            }
        }

        let mut children = vec![Vec::new(); grid.len()];
        for (n, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(n);
            }
        }

        let mut order = Vec::with_capacity(grid.len());
        let mut queue = VecDeque::from([0usize]);
        while let Some(n) = queue.pop_front() {
            order.push(n);
            queue.extend(children[n].iter().copied());
        }
        if order.len() != grid.len() {
            return Err(FemError::configuration(format!(
                "connectivity reaches {} of {} grid nodes from the root",
                order.len(),
                grid.len()
            )));
        }

        let coords: Vec<Vec3<f64>> = grid.iter().map(|p| p.x).collect();
        let mut ds = vec![0.0; grid.len()];
        let mut c0ab = vec![identity3(); grid.len()];
        for &n in order.iter().skip(1) {
            let Some(p) = parent[n] else { continue };
            let d = sub3(&coords[n], &coords[p]);
            let len = norm3(&d);
            if len <= f64::EPSILON {
                return Err(FemError::configuration(format!(
                    "element {p} -> {n} has zero length"
                )));
            }
            ds[n] = len;
            c0ab[n] = element_frame(&scale3(&d, 1.0 / len), cab_xtol);
        }

        Ok(Self {
            coords,
            component,
            component_names: components.iter().map(|c| c.name.clone()).collect(),
            parent,
            children,
            order,
            ds,
            c0ab,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.coords.len()
    }

    /// Unconstrained degrees of freedom, six per non-root node.
    pub fn num_dofs(&self) -> usize {
        6 * (self.num_nodes() - 1)
    }

    /// First degree of freedom of node `n`; the clamped root has none.
    pub fn dof(&self, n: usize) -> Option<usize> {
        if n == 0 { None } else { Some(6 * (n - 1)) }
    }

    pub fn parent(&self, n: usize) -> Option<usize> {
        self.parent[n]
    }

    pub fn children(&self, n: usize) -> &[usize] {
        &self.children[n]
    }

    /// Root-first traversal order; parents always precede children.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Length of the element ending at `n` (zero for the root).
    pub fn ds(&self, n: usize) -> f64 {
        self.ds[n]
    }

    pub fn ds_all(&self) -> &[f64] {
        &self.ds
    }

    /// Undeformed frame of the element ending at `n`, columns are local axes.
    pub fn c0ab(&self, n: usize) -> &Mat3<f64> {
        &self.c0ab[n]
    }

    pub fn c0ab_all(&self) -> &[Mat3<f64>] {
        &self.c0ab
    }

    pub fn coords(&self, n: usize) -> &Vec3<f64> {
        &self.coords[n]
    }

    pub fn component_of(&self, n: usize) -> &str {
        &self.component_names[self.component[n]]
    }

    pub fn component_names(&self) -> &[String] {
        &self.component_names
    }

    /// Mid-point of the element ending at `n`.
    pub fn midpoint(&self, n: usize) -> Vec3<f64> {
        match self.parent[n] {
            Some(p) => scale3(&add3(&self.coords[n], &self.coords[p]), 0.5),
            None => self.coords[n],
        }
    }

    /// Nodes of the subtree rooted at `n`, including `n`.
    pub fn subtree(&self, n: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![n];
        while let Some(k) = stack.pop() {
            out.push(k);
            stack.extend(self.children[k].iter().copied());
        }
        out
    }
}

/// Frame with local x along `x`. Local y is `ez × x`, or `ey × x` when `x`
/// lies within `xtol` of the global z axis.
pub fn element_frame(x: &Vec3<f64>, xtol: f64) -> Mat3<f64> {
    let ez = [0.0, 0.0, 1.0];
    let ey = [0.0, 1.0, 0.0];
    let near_z = norm3(&sub3(x, &ez)) <= xtol || norm3(&add3(x, &ez)) <= xtol;
    let y = if near_z { cross(&ey, x) } else { cross(&ez, x) };
    let y = scale3(&y, 1.0 / norm3(&y));
    let z = cross(x, &y);
    [
        [x[0], y[0], z[0]],
        [x[1], y[1], z[1]],
        [x[2], y[2], z[2]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tee() -> (Vec<ComponentDef>, Vec<GridPoint>) {
        let comps = vec![
            ComponentDef {
                name: "fus".into(),
                children: vec!["wr".into(), "wl".into()],
            },
            ComponentDef {
                name: "wr".into(),
                children: vec![],
            },
            ComponentDef {
                name: "wl".into(),
                children: vec![],
            },
        ];
        let g = |x: [f64; 3], c: &str| GridPoint {
            x,
            component: c.into(),
        };
        let grid = vec![
            g([0.0, 0.0, 0.0], "fus"),
            g([1.0, 0.0, 0.0], "fus"),
            g([1.0, 1.0, 0.0], "wr"),
            g([1.0, -1.0, 0.0], "wl"),
            g([1.0, 2.0, 0.0], "wr"),
        ];
        (comps, grid)
    }

    #[test]
    fn children_hang_from_last_parent_node() {
        let (c, g) = tee();
        let t = BeamTree::new(&c, &g, 1e-4).unwrap();
        assert_eq!(t.parent(0), None);
        assert_eq!(t.parent(1), Some(0));
        assert_eq!(t.parent(2), Some(1));
        assert_eq!(t.parent(3), Some(1));
        assert_eq!(t.parent(4), Some(2));
        assert_eq!(t.order()[0], 0);
        assert_eq!(t.num_dofs(), 24);
        assert_eq!(t.component_of(3), "wl");
        let mut sub = t.subtree(2);
        sub.sort();
        assert_eq!(sub, vec![2, 4]);
    }

    #[test]
    fn frames_are_right_handed() {
        let (c, g) = tee();
        let t = BeamTree::new(&c, &g, 1e-4).unwrap();
        // wr runs along +y: local y = ez × ey = -ex
        let f = t.c0ab(2);
        assert!((f[1][0] - 1.0).abs() < 1e-15);
        assert!((f[0][1] + 1.0).abs() < 1e-15);
        assert!((f[2][2] - 1.0).abs() < 1e-15);
        assert!((t.ds(3) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn vertical_element_uses_fallback_axis() {
        let f = element_frame(&[0.0, 0.0, 1.0], 1e-4);
        // y = ey × ez = ex, z = ez × ex = ey
        assert!((f[0][1] - 1.0).abs() < 1e-15);
        assert!((f[1][2] - 1.0).abs() < 1e-15);
    }

    #[test]
    fn rejects_two_roots_and_unknown_components() {
        let (mut c, g) = tee();
        c[0].children.pop();
        assert!(BeamTree::new(&c, &g, 1e-4).is_err());

        let (c, mut g) = tee();
        g[4].component = "tail".into();
        assert!(BeamTree::new(&c, &g, 1e-4).is_err());
    }
}
