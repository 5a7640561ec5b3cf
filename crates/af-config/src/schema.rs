//! Configuration schema.
//!
//! Every table rejects unknown keys. Optional keys carry the defaults
//! documented on their field.

use af_aero::{GustProfile, SpanShape};
use af_core::ArrayData;
use af_fem::EigenMethod;
use af_intrinsic::{AdMode, EquationKind, Objective, ParamKind, ParameterTable};
use af_solver::{SolverFunction, SolverLibrary, SolverSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub fem: FemConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Systems by name; serial simulations run them in name order.
    pub systems: BTreeMap<String, SystemConfig>,
}

/// Dense matrix given inline or as an array file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MatrixSource {
    File(PathBuf),
    Inline(ArrayData),
}

impl MatrixSource {
    /// File path resolved against `folder`, if any.
    pub fn path_in(&self, folder: Option<&Path>) -> Option<PathBuf> {
        match self {
            MatrixSource::File(p) => Some(match folder {
                Some(f) if p.is_relative() => f.join(p),
                _ => p.clone(),
            }),
            MatrixSource::Inline(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GridPointDef {
    pub component: String,
    pub x: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FemConfig {
    /// Base directory for file matrices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,
    pub num_modes: usize,
    /// Default `jacobi`.
    #[serde(default)]
    pub eig_type: EigenMethod,
    /// Eigenvalue and eigenvector files, required by `eig_type: load`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eig_names: Option<[PathBuf; 2]>,
    /// Component name to the components attached to its last node.
    pub connectivity: BTreeMap<String, Vec<String>>,
    /// Nodes in order along each component, clamped root first.
    pub grid: Vec<GridPointDef>,
    pub stiffness: MatrixSource,
    pub mass: MatrixSource,
    /// Default `1e-4`.
    #[serde(default = "default_cab_xtol")]
    pub cab_xtol: f64,
    /// Default `1e-6`.
    #[serde(default = "default_alpha_tolerance")]
    pub alpha_tolerance: f64,
    #[serde(default)]
    pub tolerate_inconsistency: bool,
}

fn default_cab_xtol() -> f64 {
    1e-4
}

fn default_alpha_tolerance() -> f64 {
    1e-6
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Intrinsic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    #[serde(default, rename = "typeof")]
    pub kind: DriverKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sol_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub compute_fem: bool,
    #[serde(default)]
    pub save_fem: bool,
    #[serde(default = "default_true")]
    pub compute_modalaero: bool,
    #[serde(default)]
    pub save_modalaero: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::Intrinsic,
            sol_path: None,
            compute_fem: true,
            save_fem: false,
            compute_modalaero: true,
            save_modalaero: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimulationKind {
    /// Exactly one system.
    #[default]
    Single,
    /// Every system, one after the other.
    Serial,
    /// Every system over its parameter table.
    Shard,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    #[serde(default, rename = "typeof")]
    pub kind: SimulationKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PointLoadDef {
    pub node: usize,
    pub component: usize,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct XloadsConfig {
    pub times: Vec<f64>,
    #[serde(default)]
    pub follower: Vec<PointLoadDef>,
    #[serde(default)]
    pub dead: Vec<PointLoadDef>,
    /// Nominal load factor, default 1.
    #[serde(default = "default_one")]
    pub load_factor: f64,
}

fn default_one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GustConfig {
    #[serde(default)]
    pub profile: GustProfile,
    #[serde(default)]
    pub span_shape: SpanShape,
    pub intensity: f64,
    pub length: f64,
    /// Distance the front travels before reaching the first panel.
    #[serde(default)]
    pub shift: f64,
    /// Forcing table step.
    pub step: f64,
    pub collocation: Vec<[f64; 3]>,
    /// Panel dihedral in radians, default zero for every panel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dihedral: Option<Vec<f64>>,
}

impl GustConfig {
    pub fn dihedral(&self) -> Vec<f64> {
        self.dihedral
            .clone()
            .unwrap_or_else(|| vec![0.0; self.collocation.len()])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AeroConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,
    pub c_ref: f64,
    pub u_inf: f64,
    pub rho_inf: f64,
    /// Lag poles (reduced frequencies).
    #[serde(default)]
    pub poles: Vec<f64>,
    /// Stacked `[3 + num_poles, num_modes, num_modes]` motion coefficients.
    pub a: MatrixSource,
    /// Stacked `[3 + num_poles, num_modes, num_panels]` gust coefficients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<MatrixSource>,
    /// Relative pivot tolerance for `I - A2hat`, default `1e-10`.
    #[serde(default = "default_singular_tol")]
    pub singular_tol: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gust: Option<GustConfig>,
}

fn default_singular_tol() -> f64 {
    1e-10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AdConfig {
    #[serde(default)]
    pub mode: AdMode,
    #[serde(default)]
    pub inputs: Vec<ParamKind>,
    pub objective: Objective,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    pub solution: EquationKind,
    pub solver_library: SolverLibrary,
    pub solver_function: SolverFunction,
    #[serde(default)]
    pub solver_settings: SolverSettings,
    /// Default `0`.
    #[serde(default)]
    pub t0: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tn: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
    /// Explicit grid; overrides `t0..t1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xloads: Option<XloadsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aero: Option<AeroConfig>,
    /// Initial state, zeros when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q0: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad: Option<AdConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<ParameterTable>,
    /// Persist the system container.
    #[serde(default)]
    pub save: bool,
    /// Default `1e-3`.
    #[serde(default = "default_rotation_threshold")]
    pub rotation_threshold: f64,
}

fn default_rotation_threshold() -> f64 {
    1e-3
}

impl SystemConfig {
    /// Output times (dynamic) or load steps (static).
    ///
    /// `t` wins when given. Otherwise `t0..=t1` is split into `tn` points or
    /// steps of `dt`. A static system without any of these has the single
    /// load step `1`.
    pub fn time_grid(&self) -> Result<Vec<f64>, String> {
        let grid = if let Some(t) = &self.t {
            t.clone()
        } else if let Some(t1) = self.t1 {
            let span = t1 - self.t0;
            let n = match (self.tn, self.dt) {
                (Some(n), _) => n,
                (None, Some(dt)) if dt > 0.0 => (span / dt).round() as usize + 1,
                (None, Some(dt)) => return Err(format!("dt must be positive, got {dt}")),
                (None, None) => return Err("t1 needs either tn or dt".to_string()),
            };
            if n < 2 {
                return Err(format!("time grid t0..t1 needs at least 2 points, got {n}"));
            }
            af_core::linspace(self.t0, t1, n)
        } else if self.solution == EquationKind::Static {
            vec![1.0]
        } else {
            return Err("dynamic system needs t or t1 with tn or dt".to_string());
        };
        if grid.is_empty() || grid.windows(2).any(|w| !(w[1] > w[0])) {
            return Err("time grid must be non-empty and strictly increasing".to_string());
        }
        Ok(grid)
    }

    pub fn num_poles(&self) -> usize {
        self.aero.as_ref().map_or(0, |a| a.poles.len())
    }

    /// Expected state length for `num_modes` modes.
    pub fn state_size(&self, num_modes: usize) -> usize {
        match self.solution {
            EquationKind::Static => num_modes,
            EquationKind::Dynamic => num_modes * (2 + self.num_poles()),
        }
    }
}
