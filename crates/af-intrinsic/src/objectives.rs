//! Scalar summaries of recovered fields.

use crate::error::{IntrinsicError, IntrinsicResult};
use crate::fields::Fields;
use af_core::Scalar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectiveVar {
    X1,
    X2,
    X3,
    #[serde(rename = "ra")]
    Ra,
    /// Row-major, components 0..9.
    Cab,
}

impl ObjectiveVar {
    pub fn num_components(self) -> usize {
        match self {
            ObjectiveVar::X1 | ObjectiveVar::X2 | ObjectiveVar::X3 => 6,
            ObjectiveVar::Ra => 3,
            ObjectiveVar::Cab => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveFun {
    #[default]
    Max,
    Min,
    Sum,
    Mean,
    Last,
}

/// Reduction over steps of the selected `(node, component)` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Objective {
    pub var: ObjectiveVar,
    #[serde(default)]
    pub fun: ObjectiveFun,
    pub nodes: Vec<usize>,
    pub components: Vec<usize>,
}

impl Objective {
    /// Output length, node-major.
    pub fn len(&self) -> usize {
        self.nodes.len() * self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn check(&self, num_nodes: usize) -> IntrinsicResult<()> {
        if self.is_empty() {
            return Err(IntrinsicError::configuration(
                "objective selects no entries",
            ));
        }
        if let Some(n) = self.nodes.iter().find(|n| **n >= num_nodes) {
            return Err(IntrinsicError::configuration(format!(
                "objective node {n} outside 0..{num_nodes}"
            )));
        }
        let nc = self.var.num_components();
        if let Some(c) = self.components.iter().find(|c| **c >= nc) {
            return Err(IntrinsicError::configuration(format!(
                "objective component {c} outside 0..{nc} for {:?}",
                self.var
            )));
        }
        Ok(())
    }

    fn entry<S: Scalar>(&self, fields: &Fields<S>, step: usize, node: usize, c: usize) -> S {
        match self.var {
            ObjectiveVar::X1 => fields.x1[step][node][c],
            ObjectiveVar::X2 => fields.x2[step][node][c],
            ObjectiveVar::X3 => fields.x3[step][node][c],
            ObjectiveVar::Ra => fields.ra[step][node][c],
            ObjectiveVar::Cab => fields.cab[step][node][c / 3][c % 3],
        }
    }

    pub fn evaluate<S: Scalar>(&self, fields: &Fields<S>) -> IntrinsicResult<Vec<S>> {
        let steps = fields.num_steps();
        if steps == 0 {
            return Err(IntrinsicError::configuration(
                "objective over an empty trajectory",
            ));
        }
        let mut out = Vec::with_capacity(self.len());
        for &n in &self.nodes {
            for &c in &self.components {
                let series = (0..steps).map(|s| self.entry(fields, s, n, c));
                out.push(reduce(self.fun, series, steps));
            }
        }
        Ok(out)
    }
}

fn reduce<S: Scalar>(fun: ObjectiveFun, mut series: impl Iterator<Item = S>, len: usize) -> S {
    match fun {
        ObjectiveFun::Max => series
            .reduce(|a, b| S::select(b.value() > a.value(), b, a))
            .unwrap_or_else(S::zero),
        ObjectiveFun::Min => series
            .reduce(|a, b| S::select(b.value() < a.value(), b, a))
            .unwrap_or_else(S::zero),
        ObjectiveFun::Sum => series.fold(S::zero(), |a, b| a + b),
        ObjectiveFun::Mean => series.fold(S::zero(), |a, b| a + b) / S::cst(len as f64),
        ObjectiveFun::Last => series.last().unwrap_or_else(S::zero),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Fields<f64> {
        let step = |v: f64| vec![[v, 0.0, 0.0, 0.0, 0.0, 2.0 * v]; 2];
        Fields {
            x1: vec![step(0.0); 3],
            x2: vec![step(1.0), step(-3.0), step(2.0)],
            x3: vec![step(0.0); 3],
            ra: vec![vec![[0.0; 3]; 2]; 3],
            cab: vec![vec![[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]; 2]; 3],
        }
    }

    fn objective(fun: ObjectiveFun) -> Objective {
        Objective {
            var: ObjectiveVar::X2,
            fun,
            nodes: vec![1],
            components: vec![0, 5],
        }
    }

    #[test]
    fn reductions_over_time() {
        let f = fields();
        assert_eq!(objective(ObjectiveFun::Max).evaluate(&f).unwrap(), vec![2.0, 4.0]);
        assert_eq!(objective(ObjectiveFun::Min).evaluate(&f).unwrap(), vec![-3.0, -6.0]);
        assert_eq!(objective(ObjectiveFun::Sum).evaluate(&f).unwrap(), vec![0.0, 0.0]);
        assert_eq!(objective(ObjectiveFun::Last).evaluate(&f).unwrap(), vec![2.0, 4.0]);
        assert_eq!(objective(ObjectiveFun::Mean).evaluate(&f).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn orientation_components_are_row_major() {
        let o = Objective {
            var: ObjectiveVar::Cab,
            fun: ObjectiveFun::Last,
            nodes: vec![0],
            components: vec![0, 1, 4, 8],
        };
        assert_eq!(o.evaluate(&fields()).unwrap(), vec![1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn out_of_range_selection_is_rejected() {
        let mut o = objective(ObjectiveFun::Max);
        o.components = vec![6];
        assert!(o.check(2).is_err());
        o.components = vec![0];
        o.nodes = vec![2];
        assert!(o.check(2).is_err());
        o.nodes = vec![1];
        assert!(o.check(2).is_ok());
    }
}
