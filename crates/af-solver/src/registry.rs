//! Backend registration table.
//!
//! A `(library, function)` pair names a backend. The table is fixed at
//! compile time; pairs that are not listed are configuration errors.

use crate::adaptive::integrate;
use crate::error::{SolverError, SolverResult};
use crate::marching::march;
use crate::newton::newton_sweep;
use crate::problem::Problem;
use crate::settings::SolverSettings;
use af_core::Scalar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverLibrary {
    RungeKutta,
    Adaptive,
    Newton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverFunction {
    Ode,
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Fixed-step Runge–Kutta marching.
    Marching,
    /// Dormand–Prince 5(4).
    Dopri5,
    /// Damped Newton per load step.
    Newton,
}

pub const REGISTRY: &[((SolverLibrary, SolverFunction), Backend)] = &[
    ((SolverLibrary::RungeKutta, SolverFunction::Ode), Backend::Marching),
    ((SolverLibrary::Adaptive, SolverFunction::Ode), Backend::Dopri5),
    ((SolverLibrary::Newton, SolverFunction::Root), Backend::Newton),
];

pub fn lookup(library: SolverLibrary, function: SolverFunction) -> SolverResult<Backend> {
    REGISTRY
        .iter()
        .find(|(key, _)| *key == (library, function))
        .map(|(_, b)| *b)
        .ok_or_else(|| {
            SolverError::configuration(format!(
                "no solver registered for library {library:?} with function {function:?}"
            ))
        })
}

/// Backend output before the states are extracted.
#[derive(Debug, Clone)]
pub enum RawTrajectory<S> {
    Marching {
        time: Vec<f64>,
        states: Vec<Vec<S>>,
        rhs_evals: usize,
    },
    Adaptive {
        time: Vec<f64>,
        states: Vec<Vec<S>>,
        accepted: usize,
        rejected: usize,
    },
    Newton {
        load_steps: Vec<f64>,
        states: Vec<Vec<S>>,
        iterations: Vec<usize>,
        residual_norms: Vec<f64>,
    },
}

/// `[steps × state_size]` states with their time or load-step values.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMatrix<S> {
    pub time: Vec<f64>,
    pub rows: Vec<Vec<S>>,
}

impl<S: Scalar> StateMatrix<S> {
    pub fn num_steps(&self) -> usize {
        self.rows.len()
    }

    pub fn state_size(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn last(&self) -> Option<&[S]> {
        self.rows.last().map(Vec::as_slice)
    }

    pub fn values(&self) -> StateMatrix<f64> {
        StateMatrix {
            time: self.time.clone(),
            rows: self
                .rows
                .iter()
                .map(|r| r.iter().map(Scalar::value).collect())
                .collect(),
        }
    }
}

impl Backend {
    pub fn solve<S: Scalar>(
        &self,
        problem: Problem<'_, S>,
        settings: &SolverSettings,
        q0: &[S],
        grid: &[f64],
    ) -> SolverResult<RawTrajectory<S>> {
        if q0.len() != problem.dimension() {
            return Err(SolverError::configuration(format!(
                "initial state has {} entries, equation expects {}",
                q0.len(),
                problem.dimension()
            )));
        }
        if grid.is_empty() || grid.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(SolverError::configuration(
                "time/load-step grid must be non-empty and strictly increasing",
            ));
        }
        match (self, problem) {
            (Backend::Marching, Problem::Ode(system)) => {
                let out = march(system, &settings.runge_kutta()?, q0, grid)?;
                Ok(RawTrajectory::Marching {
                    time: grid.to_vec(),
                    states: out.states,
                    rhs_evals: out.rhs_evals,
                })
            }
            (Backend::Dopri5, Problem::Ode(system)) => {
                let out = integrate(system, &settings.adaptive()?, q0, grid)?;
                Ok(RawTrajectory::Adaptive {
                    time: grid.to_vec(),
                    states: out.states,
                    accepted: out.accepted,
                    rejected: out.rejected,
                })
            }
            (Backend::Newton, Problem::Root(system)) => {
                let out = newton_sweep(system, &settings.newton()?, q0, grid)?;
                Ok(RawTrajectory::Newton {
                    load_steps: grid.to_vec(),
                    states: out.states,
                    iterations: out.iterations,
                    residual_norms: out.residual_norms,
                })
            }
            (backend, _) => Err(SolverError::configuration(format!(
                "backend {backend:?} cannot solve this kind of equation"
            ))),
        }
    }

    pub fn pull_states<S: Scalar>(&self, raw: RawTrajectory<S>) -> StateMatrix<S> {
        match raw {
            RawTrajectory::Marching { time, states, .. }
            | RawTrajectory::Adaptive { time, states, .. } => StateMatrix { time, rows: states },
            RawTrajectory::Newton {
                load_steps, states, ..
            } => StateMatrix {
                time: load_steps,
                rows: states,
            },
        }
    }
}
