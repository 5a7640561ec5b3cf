//! Solver settings.
//!
//! One flat, optional-field table is accepted for every backend; each
//! backend resolves the fields it understands into a typed settings struct
//! with documented defaults. A field the resolved backend does not use is a
//! configuration error.

use crate::error::{SolverError, SolverResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RkMethod {
    #[default]
    Rk4,
    Tsit5,
    Euler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormKind {
    #[default]
    L2,
    Linf,
}

impl NormKind {
    pub fn norm(self, x: &[f64]) -> f64 {
        match self {
            NormKind::L2 => x.iter().map(|v| v * v).sum::<f64>().sqrt(),
            NormKind::Linf => x.iter().fold(0.0, |m, v| m.max(v.abs())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_name: Option<RkMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substeps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt0: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm: Option<NormKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damping: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_search_beta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_line_search_iters: Option<usize>,
}

/// Fixed-step marching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RkSettings {
    pub method: RkMethod,
    /// Steps between consecutive output times.
    pub substeps: usize,
}

/// Dormand–Prince 5(4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Initial step; `None` uses a tenth of the first output interval.
    pub dt0: Option<f64>,
    pub dt_max: f64,
    /// Attempted steps (accepted and rejected) over the whole integration.
    pub max_steps: usize,
}

/// Damped Newton with backtracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Iterations per load step.
    pub max_steps: usize,
    pub norm: NormKind,
    pub damping: f64,
    pub line_search_beta: f64,
    pub max_line_search_iters: usize,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-6,
            max_steps: 50,
            norm: NormKind::L2,
            damping: 1.0,
            line_search_beta: 0.5,
            max_line_search_iters: 20,
        }
    }
}

fn positive(name: &str, v: f64) -> SolverResult<f64> {
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(SolverError::configuration(format!(
            "solver setting '{name}' must be positive, got {v}"
        )))
    }
}

fn at_least_one(name: &str, v: usize) -> SolverResult<usize> {
    if v >= 1 {
        Ok(v)
    } else {
        Err(SolverError::configuration(format!(
            "solver setting '{name}' must be at least 1"
        )))
    }
}

const RK_FIELDS: &[&str] = &["solver_name", "substeps"];
const ADAPTIVE_FIELDS: &[&str] = &["rtol", "atol", "dt0", "dt_max", "max_steps"];
const NEWTON_FIELDS: &[&str] = &[
    "rtol",
    "atol",
    "max_steps",
    "norm",
    "damping",
    "line_search_beta",
    "max_line_search_iters",
];

impl SolverSettings {
    /// Names of the fields that are set.
    pub fn given(&self) -> Vec<&'static str> {
        [
            ("solver_name", self.solver_name.is_some()),
            ("substeps", self.substeps.is_some()),
            ("rtol", self.rtol.is_some()),
            ("atol", self.atol.is_some()),
            ("dt0", self.dt0.is_some()),
            ("dt_max", self.dt_max.is_some()),
            ("max_steps", self.max_steps.is_some()),
            ("norm", self.norm.is_some()),
            ("damping", self.damping.is_some()),
            ("line_search_beta", self.line_search_beta.is_some()),
            ("max_line_search_iters", self.max_line_search_iters.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    fn only(&self, backend: &str, allowed: &[&str]) -> SolverResult<()> {
        let stray: Vec<&str> = self
            .given()
            .into_iter()
            .filter(|name| !allowed.contains(name))
            .collect();
        if stray.is_empty() {
            Ok(())
        } else {
            Err(SolverError::configuration(format!(
                "{backend} does not use solver settings {stray:?}"
            )))
        }
    }

    pub fn runge_kutta(&self) -> SolverResult<RkSettings> {
        self.only("fixed-step marching", RK_FIELDS)?;
        Ok(RkSettings {
            method: self.solver_name.unwrap_or_default(),
            substeps: at_least_one("substeps", self.substeps.unwrap_or(1))?,
        })
    }

    pub fn adaptive(&self) -> SolverResult<AdaptiveSettings> {
        self.only("adaptive integration", ADAPTIVE_FIELDS)?;
        Ok(AdaptiveSettings {
            rtol: positive("rtol", self.rtol.unwrap_or(1e-6))?,
            atol: positive("atol", self.atol.unwrap_or(1e-8))?,
            dt0: self.dt0.map(|v| positive("dt0", v)).transpose()?,
            dt_max: match self.dt_max {
                Some(v) => positive("dt_max", v)?,
                None => f64::INFINITY,
            },
            max_steps: at_least_one("max_steps", self.max_steps.unwrap_or(100_000))?,
        })
    }

    pub fn newton(&self) -> SolverResult<NewtonSettings> {
        self.only("Newton", NEWTON_FIELDS)?;
        let d = NewtonSettings::default();
        let damping = self.damping.unwrap_or(d.damping);
        if !(damping > 0.0 && damping <= 1.0) {
            return Err(SolverError::configuration(format!(
                "Newton damping must lie in (0, 1], got {damping}"
            )));
        }
        let beta = self.line_search_beta.unwrap_or(d.line_search_beta);
        if !(beta > 0.0 && beta < 1.0) {
            return Err(SolverError::configuration(format!(
                "line_search_beta must lie in (0, 1), got {beta}"
            )));
        }
        Ok(NewtonSettings {
            rtol: positive("rtol", self.rtol.unwrap_or(d.rtol))?,
            atol: positive("atol", self.atol.unwrap_or(d.atol))?,
            max_steps: at_least_one("max_steps", self.max_steps.unwrap_or(d.max_steps))?,
            norm: self.norm.unwrap_or(d.norm),
            damping,
            line_search_beta: beta,
            max_line_search_iters: self
                .max_line_search_iters
                .unwrap_or(d.max_line_search_iters),
        })
    }
}
