//! Physical parameters that can carry derivatives.

use af_core::{Dual, Scalar, Var};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    GustIntensity,
    GustLength,
    UInf,
    RhoInf,
    LoadFactor,
}

impl ParamKind {
    pub const ALL: [ParamKind; 5] = [
        ParamKind::GustIntensity,
        ParamKind::GustLength,
        ParamKind::UInf,
        ParamKind::RhoInf,
        ParamKind::LoadFactor,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters<S> {
    pub gust_intensity: S,
    pub gust_length: S,
    pub u_inf: S,
    pub rho_inf: S,
    /// Multiplies the external point loads.
    pub load_factor: S,
}

impl<S: Scalar> Parameters<S> {
    pub fn get(&self, kind: ParamKind) -> S {
        match kind {
            ParamKind::GustIntensity => self.gust_intensity,
            ParamKind::GustLength => self.gust_length,
            ParamKind::UInf => self.u_inf,
            ParamKind::RhoInf => self.rho_inf,
            ParamKind::LoadFactor => self.load_factor,
        }
    }

    pub fn set(&mut self, kind: ParamKind, v: S) {
        match kind {
            ParamKind::GustIntensity => self.gust_intensity = v,
            ParamKind::GustLength => self.gust_length = v,
            ParamKind::UInf => self.u_inf = v,
            ParamKind::RhoInf => self.rho_inf = v,
            ParamKind::LoadFactor => self.load_factor = v,
        }
    }

    pub fn values(&self) -> Parameters<f64> {
        Parameters {
            gust_intensity: self.gust_intensity.value(),
            gust_length: self.gust_length.value(),
            u_inf: self.u_inf.value(),
            rho_inf: self.rho_inf.value(),
            load_factor: self.load_factor.value(),
        }
    }
}

impl Parameters<f64> {
    /// Every entry as a constant of `S`.
    pub fn lift<S: Scalar>(&self) -> Parameters<S> {
        Parameters {
            gust_intensity: S::cst(self.gust_intensity),
            gust_length: S::cst(self.gust_length),
            u_inf: S::cst(self.u_inf),
            rho_inf: S::cst(self.rho_inf),
            load_factor: S::cst(self.load_factor),
        }
    }

    /// Dual parameters with a unit tangent on `kind`.
    pub fn seeded(&self, kind: ParamKind) -> Parameters<Dual> {
        let mut p = self.lift::<Dual>();
        p.set(kind, Dual::variable(self.get(kind)));
        p
    }

    /// Tape parameters with `inputs` registered as independent variables,
    /// returned in the order given. Must run inside a recording.
    pub fn taped(&self, inputs: &[ParamKind]) -> (Parameters<Var>, Vec<Var>) {
        let mut p = self.lift::<Var>();
        let vars = inputs
            .iter()
            .map(|&k| {
                let v = Var::input(self.get(k));
                p.set(k, v);
                v
            })
            .collect();
        (p, vars)
    }

    /// Copy with `kinds[i]` replaced by `row[i]`.
    pub fn with_row(&self, kinds: &[ParamKind], row: &[f64]) -> Parameters<f64> {
        let mut p = *self;
        for (k, v) in kinds.iter().zip(row) {
            p.set(*k, *v);
        }
        p
    }
}

impl Default for Parameters<f64> {
    fn default() -> Self {
        Self {
            gust_intensity: 0.0,
            gust_length: 1.0,
            u_inf: 1.0,
            rho_inf: 1.0,
            load_factor: 1.0,
        }
    }
}

/// Rows of parameter values for a shard, one column per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    pub kinds: Vec<ParamKind>,
    pub rows: Vec<Vec<f64>>,
}

impl ParameterTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row must have one value per kind and no kind may repeat.
    pub fn check(&self) -> Result<(), String> {
        for (i, k) in self.kinds.iter().enumerate() {
            if self.kinds[..i].contains(k) {
                return Err(format!("shard parameter {k:?} listed twice"));
            }
        }
        if let Some(bad) = self.rows.iter().position(|r| r.len() != self.kinds.len()) {
            return Err(format!(
                "shard row {bad} has {} values for {} parameters",
                self.rows[bad].len(),
                self.kinds.len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_core::tape::record;

    #[test]
    fn seeding_marks_only_the_chosen_entry() {
        let p = Parameters {
            u_inf: 10.0,
            ..Default::default()
        };
        let d = p.seeded(ParamKind::UInf);
        assert_eq!(d.u_inf.eps, 1.0);
        assert_eq!(d.rho_inf.eps, 0.0);
        assert_eq!(d.values(), p);
    }

    #[test]
    fn every_kind_addresses_its_own_field() {
        let row: Vec<f64> = (1..=5).map(f64::from).collect();
        let p = Parameters::default().with_row(&ParamKind::ALL, &row);
        for (kind, want) in ParamKind::ALL.iter().zip(&row) {
            assert_eq!(p.get(*kind), *want);
        }
    }

    #[test]
    fn taped_inputs_follow_request_order() {
        let p = Parameters::default();
        let ((vars, out), tape) = record(|| {
            let (tp, vars) = p.taped(&[ParamKind::RhoInf, ParamKind::UInf]);
            (vars, tp.rho_inf * tp.u_inf * tp.u_inf)
        });
        let g = tape.gradient(out);
        assert_eq!(g.wrt(vars[0]), 1.0);
        assert_eq!(g.wrt(vars[1]), 2.0);
    }

    #[test]
    fn table_rows_must_match_kinds() {
        let t = ParameterTable {
            kinds: vec![ParamKind::GustLength, ParamKind::GustLength],
            rows: vec![vec![1.0, 2.0]],
        };
        assert!(t.check().is_err());
        let t = ParameterTable {
            kinds: vec![ParamKind::GustLength],
            rows: vec![vec![1.0, 2.0]],
        };
        assert!(t.check().is_err());
    }
}
