//! Systems: one configured case each, instantiated through a fixed table.

use crate::error::{AppError, AppResult, CaseContext};
use crate::inputs::{external_loads, gust_case, nominal_parameters};
use crate::stages::Stage;
use af_aero::RawAero;
use af_config::SystemConfig;
use af_core::{ArrayData, DenseMatrix};
use af_intrinsic::{
    AdMode, AeroCase, CaseData, Derivative, EquationKind, Evaluation, Parameters, Structure,
    differentiate, evaluate, evaluate_shard,
};
use af_results::{ContainerKind, SolutionStore};
use af_solver::{Backend, lookup};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemKind {
    Static,
    Dynamic,
    /// Either equation evaluated over a parameter table.
    Shard,
}

/// `(equation, has parameter table)` to system kind.
pub const SYSTEM_KINDS: &[((EquationKind, bool), SystemKind)] = &[
    ((EquationKind::Static, false), SystemKind::Static),
    ((EquationKind::Dynamic, false), SystemKind::Dynamic),
    ((EquationKind::Static, true), SystemKind::Shard),
    ((EquationKind::Dynamic, true), SystemKind::Shard),
];

impl SystemKind {
    pub fn resolve(config: &SystemConfig) -> AppResult<Self> {
        let key = (config.solution, config.shard.is_some());
        SYSTEM_KINDS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| AppError::InvalidInput(format!("no system registered for {key:?}")))
    }

    pub fn container(self) -> ContainerKind {
        match self {
            SystemKind::Static => ContainerKind::StaticSystem,
            SystemKind::Dynamic => ContainerKind::DynamicSystem,
            SystemKind::Shard => ContainerKind::ShardSystem,
        }
    }
}

#[derive(Debug, Clone)]
pub struct System {
    pub name: String,
    pub kind: SystemKind,
    pub backend: Backend,
    pub grid: Vec<f64>,
    pub config: SystemConfig,
}

impl System {
    pub fn new(name: &str, config: &SystemConfig) -> AppResult<Self> {
        let kind = SystemKind::resolve(config)?;
        let backend = lookup(config.solver_library, config.solver_function)
            .map_err(af_intrinsic::IntrinsicError::from)?;
        let grid = config.time_grid().map_err(AppError::InvalidInput)?;
        Ok(Self {
            name: name.to_string(),
            kind,
            backend,
            grid,
            config: config.clone(),
        })
    }

    pub fn nominal(&self) -> Parameters<f64> {
        nominal_parameters(&self.config)
    }

    pub fn build_case(&self, structure: Arc<Structure>, raw: Option<RawAero>) -> AppResult<CaseData> {
        let aero = match (&self.config.aero, raw) {
            (Some(cfg), Some(raw)) => Some(AeroCase {
                raw,
                c_ref: cfg.c_ref,
                singular_tol: cfg.singular_tol,
                gust: cfg.gust.as_ref().map(gust_case).transpose()?,
            }),
            (None, _) => None,
            (Some(_), None) => {
                return Err(AppError::InvalidInput(format!(
                    "modal aerodynamics of '{}' were not prepared",
                    self.name
                )));
            }
        };
        Ok(CaseData {
            structure,
            equation: self.config.solution,
            backend: self.backend,
            settings: self.config.solver_settings.clone(),
            grid: self.grid.clone(),
            aero,
            loads: self.config.xloads.as_ref().map(external_loads),
            nominal: self.nominal(),
            rotation_threshold: self.config.rotation_threshold,
        })
    }

    /// Configured `q0`, or zeros.
    pub fn initial_state(&self, case: &CaseData) -> Vec<f64> {
        self.config.q0.clone().unwrap_or_else(|| case.zero_state())
    }

    /// Solves the case and commits its container under the system name.
    pub fn run(&self, case: &CaseData, store: &mut SolutionStore) -> AppResult<()> {
        let arrays = match self.kind {
            SystemKind::Static | SystemKind::Dynamic => self.solve(case),
            SystemKind::Shard => self.solve_shard(case),
        }
        .in_case(&self.name, Stage::Solving)?;

        let kind = self.kind.container();
        let store_result = (|| -> AppResult<()> {
            let mut slot = store.claim(kind, &self.name)?;
            slot.extend(arrays);
            store.commit(slot)?;
            if self.config.save {
                store.save(kind, &self.name)?;
            }
            Ok(())
        })();
        store_result.in_case(&self.name, Stage::Storing)
    }

    fn solve(&self, case: &CaseData) -> AppResult<Vec<(String, ArrayData)>> {
        let params = self.nominal();
        let q0 = self.initial_state(case);
        let ad = self.config.ad.as_ref();
        let ev = evaluate(&params, &q0, case, ad.map(|a| &a.objective))?;
        let mut arrays = trajectory_arrays(&ev)?;
        tracing::info!(
            system = %self.name,
            steps = ev.states.num_steps(),
            state_size = ev.states.state_size(),
            "system solved"
        );

        if let Some(ad) = ad {
            let derivative = match ad.mode {
                AdMode::Value => Derivative {
                    value: ev.objective.clone(),
                    inputs: Vec::new(),
                    jacobian: None,
                },
                mode => differentiate(mode, &params, &ad.inputs, &q0, case, &ad.objective)?,
            };
            arrays.push(("objective".into(), ArrayData::vector(derivative.value)));
            if let Some(jac) = derivative.jacobian {
                arrays.push(("jacobian".into(), matrix_array(&jac)?));
            }
        }
        Ok(arrays)
    }

    fn solve_shard(&self, case: &CaseData) -> AppResult<Vec<(String, ArrayData)>> {
        let (Some(table), Some(ad)) = (&self.config.shard, &self.config.ad) else {
            return Err(AppError::InvalidInput(format!(
                "shard system '{}' needs a parameter table and an objective",
                self.name
            )));
        };
        let q0 = self.initial_state(case);
        let results = evaluate_shard(
            table,
            &self.nominal(),
            ad.mode,
            &ad.inputs,
            &q0,
            case,
            &ad.objective,
        )?;
        tracing::info!(system = %self.name, rows = results.len(), "shard evaluated");

        let mut arrays = vec![
            ("parameters".to_string(), ArrayData::from_rows(&table.rows)?),
            (
                "objective".to_string(),
                ArrayData::from_rows(&results.iter().map(|d| d.value.clone()).collect::<Vec<_>>())?,
            ),
        ];
        if ad.mode != AdMode::Value {
            let nout = ad.objective.len();
            let nin = ad.inputs.len();
            let mut data = Vec::with_capacity(results.len() * nout * nin);
            for d in &results {
                let jac = d.jacobian.as_ref().ok_or_else(|| {
                    AppError::InvalidInput("shard row is missing its Jacobian".to_string())
                })?;
                data.extend_from_slice(jac.as_slice());
            }
            arrays.push((
                "jacobian".to_string(),
                ArrayData::new(vec![results.len(), nout, nin], data)?,
            ));
        }
        Ok(arrays)
    }
}

fn matrix_array(m: &DenseMatrix<f64>) -> AppResult<ArrayData> {
    Ok(ArrayData::new(vec![m.rows(), m.cols()], m.as_slice().to_vec())?)
}

fn six(f: &[Vec<[f64; 6]>]) -> Vec<f64> {
    f.iter().flatten().flatten().copied().collect()
}

/// Time, states and recovered fields, `[step][node]..` row-major.
fn trajectory_arrays(ev: &Evaluation<f64>) -> AppResult<Vec<(String, ArrayData)>> {
    let steps = ev.states.num_steps();
    let fields = &ev.fields;
    let nodes = fields.x2.first().map_or(0, Vec::len);

    Ok(vec![
        ("time".into(), ArrayData::vector(ev.states.time.clone())),
        ("q".into(), ArrayData::from_rows(&ev.states.rows)?),
        ("X1".into(), ArrayData::new(vec![steps, nodes, 6], six(&fields.x1))?),
        ("X2".into(), ArrayData::new(vec![steps, nodes, 6], six(&fields.x2))?),
        ("X3".into(), ArrayData::new(vec![steps, nodes, 6], six(&fields.x3))?),
        (
            "ra".into(),
            ArrayData::new(
                vec![steps, nodes, 3],
                fields.ra.iter().flatten().flatten().copied().collect(),
            )?,
        ),
        (
            "Cab".into(),
            ArrayData::new(
                vec![steps, nodes, 3, 3],
                fields.cab.iter().flatten().flatten().flatten().copied().collect(),
            )?,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_equation_resolves_with_and_without_a_table() {
        for solution in [EquationKind::Static, EquationKind::Dynamic] {
            for sharded in [false, true] {
                assert!(SYSTEM_KINDS.iter().any(|(k, _)| *k == (solution, sharded)));
            }
        }
    }

    #[test]
    fn kinds_map_to_their_containers() {
        assert_eq!(SystemKind::Static.container(), ContainerKind::StaticSystem);
        assert_eq!(SystemKind::Dynamic.container(), ContainerKind::DynamicSystem);
        assert_eq!(SystemKind::Shard.container(), ContainerKind::ShardSystem);
    }
}
