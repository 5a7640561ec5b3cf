//! External point loads projected onto the modes.
//!
//! Follower loads keep their direction in the deformed frame and project
//! through `phi1`. Dead loads keep their global direction; they are rotated
//! into the deformed element frame `Cab` before projection through `phi1l`.

use crate::error::{IntrinsicError, IntrinsicResult};
use af_core::Scalar;
use af_core::linalg::{Mat3, lift3, mat3_tvec};
use af_fem::ModalBasis;

/// One loaded degree of freedom with its value at each table time.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLoad {
    pub node: usize,
    /// 0..3 forces, 3..6 moments.
    pub component: usize,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExternalLoads {
    /// Time or load-step breakpoints, strictly increasing.
    pub times: Vec<f64>,
    pub follower: Vec<PointLoad>,
    pub dead: Vec<PointLoad>,
}

impl ExternalLoads {
    pub fn check(&self, num_nodes: usize) -> IntrinsicResult<()> {
        if self.times.is_empty() || self.times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(IntrinsicError::configuration(
                "external load times must be non-empty and strictly increasing",
            ));
        }
        for p in self.follower.iter().chain(&self.dead) {
            if p.node == 0 || p.node >= num_nodes {
                return Err(IntrinsicError::configuration(format!(
                    "point load on node {} outside free nodes 1..{num_nodes}",
                    p.node
                )));
            }
            if p.component >= 6 {
                return Err(IntrinsicError::configuration(format!(
                    "point load component {} on node {} must be below 6",
                    p.component, p.node
                )));
            }
            if p.values.len() != self.times.len() {
                return Err(IntrinsicError::configuration(format!(
                    "point load on node {} has {} values for {} times",
                    p.node,
                    p.values.len(),
                    self.times.len()
                )));
            }
        }
        Ok(())
    }

    pub fn has_dead(&self) -> bool {
        !self.dead.is_empty()
    }

    fn sample(&self, values: &[f64], t: f64) -> f64 {
        let n = self.times.len();
        if t <= self.times[0] {
            return values[0];
        }
        if t >= self.times[n - 1] {
            return values[n - 1];
        }
        let hi = self.times.partition_point(|&x| x <= t);
        let lo = hi - 1;
        let w = (t - self.times[lo]) / (self.times[hi] - self.times[lo]);
        (1.0 - w) * values[lo] + w * values[hi]
    }

    /// Follower contribution `Σ phi1 f(t)`, before the load factor.
    pub fn follower_modal(&self, basis: &ModalBasis, t: f64) -> Vec<f64> {
        let mut eta = vec![0.0; basis.num_modes()];
        for p in &self.follower {
            let f = self.sample(&p.values, t);
            for (k, e) in eta.iter_mut().enumerate() {
                *e += basis.phi1[k][p.node][p.component] * f;
            }
        }
        eta
    }

    /// Dead contribution with the current element frames `cab`.
    pub fn dead_modal<S: Scalar>(&self, basis: &ModalBasis, cab: &[Mat3<S>], t: f64) -> Vec<S> {
        let nn = basis.num_nodes();
        let mut nodal = vec![[0.0; 6]; nn];
        for p in &self.dead {
            nodal[p.node][p.component] += self.sample(&p.values, t);
        }
        let mut eta = vec![S::zero(); basis.num_modes()];
        for (n, f) in nodal.iter().enumerate() {
            if f.iter().all(|v| *v == 0.0) {
                continue;
            }
            let force = mat3_tvec(&cab[n], &lift3(&[f[0], f[1], f[2]]));
            let moment = mat3_tvec(&cab[n], &lift3(&[f[3], f[4], f[5]]));
            for (k, e) in eta.iter_mut().enumerate() {
                let phi = &basis.phi1l[k][n];
                for c in 0..3 {
                    *e += S::cst(phi[c]) * force[c] + S::cst(phi[c + 3]) * moment[c];
                }
            }
        }
        eta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ExternalLoads {
        ExternalLoads {
            times: vec![0.0, 1.0, 2.0],
            follower: vec![PointLoad {
                node: 1,
                component: 2,
                values: vec![0.0, 10.0, 30.0],
            }],
            dead: Vec::new(),
        }
    }

    #[test]
    fn table_is_piecewise_linear_and_held_at_ends() {
        let l = table();
        let v = &l.follower[0].values;
        assert_eq!(l.sample(v, 0.5), 5.0);
        assert_eq!(l.sample(v, 1.5), 20.0);
        assert_eq!(l.sample(v, 5.0), 30.0);
        assert_eq!(l.sample(v, -1.0), 0.0);
    }

    #[test]
    fn root_node_and_bad_components_are_rejected() {
        let mut l = table();
        l.follower[0].node = 0;
        assert!(l.check(3).is_err());
        let mut l = table();
        l.follower[0].component = 6;
        assert!(l.check(3).is_err());
        let mut l = table();
        l.follower[0].values.pop();
        assert!(l.check(3).is_err());
        assert!(table().check(3).is_ok());
    }
}
