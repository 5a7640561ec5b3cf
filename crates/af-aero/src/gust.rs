//! Discrete gust downwash on the aerodynamic panels.
//!
//! The gust front travels with the free stream; panel `j` sees the profile
//! at `s_j(t) = U t - (x_j - x_min) - shift`. The time grid is fixed from
//! nominal flight values so that its length never depends on a
//! differentiated parameter.

use crate::error::{AeroError, AeroResult};
use af_core::{Scalar, Vec3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GustProfile {
    /// One-minus-cosine.
    #[default]
    Mc,
    /// Single sine period.
    Sine,
}

/// Spanwise intensity distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanShape {
    #[default]
    Const,
    /// Linear taper to zero at the outermost panel.
    Linear,
}

impl SpanShape {
    pub fn factor(self, y: f64, y_max: f64) -> f64 {
        match self {
            SpanShape::Const => 1.0,
            SpanShape::Linear if y_max > 0.0 => 1.0 - y.abs() / y_max,
            SpanShape::Linear => 1.0,
        }
    }
}

/// Panel collocation points and dihedral angles (radians).
#[derive(Debug, Clone, PartialEq)]
pub struct PanelGeometry {
    pub collocation: Vec<Vec3<f64>>,
    pub dihedral: Vec<f64>,
}

impl PanelGeometry {
    pub fn new(collocation: Vec<Vec3<f64>>, dihedral: Vec<f64>) -> AeroResult<Self> {
        if collocation.is_empty() || collocation.len() != dihedral.len() {
            return Err(AeroError::configuration(format!(
                "{} collocation points for {} dihedral angles",
                collocation.len(),
                dihedral.len()
            )));
        }
        Ok(Self {
            collocation,
            dihedral,
        })
    }

    pub fn num_panels(&self) -> usize {
        self.collocation.len()
    }

    /// Streamwise extent `(x_min, x_max)`.
    pub fn x_range(&self) -> (f64, f64) {
        self.collocation
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[0]), hi.max(p[0]))
            })
    }

    pub fn y_max(&self) -> f64 {
        self.collocation.iter().fold(0.0, |m, p| m.max(p[1].abs()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GustSettings {
    pub profile: GustProfile,
    pub span_shape: SpanShape,
    pub shift: f64,
    pub step: f64,
}

/// Downwash angle and its time derivatives, `[time][panel]`.
#[derive(Debug, Clone)]
pub struct Gust<S> {
    pub time: Vec<f64>,
    pub downwash: Vec<Vec<S>>,
    pub downwash_rate: Vec<Vec<S>>,
    pub downwash_accel: Vec<Vec<S>>,
    pub total_time: S,
}

/// Time for the gust to sweep the whole configuration.
pub fn total_time<S: Scalar>(
    geometry: &PanelGeometry,
    shift: f64,
    length: S,
    u_inf: S,
) -> S {
    let (x_min, x_max) = geometry.x_range();
    (length + S::cst(x_max - x_min + shift)) / u_inf
}

/// Uniform grid covering the nominal gust duration.
pub fn time_grid(
    settings: &GustSettings,
    geometry: &PanelGeometry,
    nominal_length: f64,
    nominal_u_inf: f64,
) -> AeroResult<Vec<f64>> {
    if !(settings.step.is_finite() && settings.step > 0.0) {
        return Err(AeroError::configuration(format!(
            "gust step must be positive, got {}",
            settings.step
        )));
    }
    if !(nominal_u_inf > 0.0 && nominal_length > 0.0) {
        return Err(AeroError::configuration(format!(
            "gust length {nominal_length} and u_inf {nominal_u_inf} must be positive"
        )));
    }
    let total = total_time(geometry, settings.shift, nominal_length, nominal_u_inf);
    let n = (total / settings.step).ceil() as usize + 1;
    Ok((0..n).map(|i| i as f64 * settings.step).collect())
}

pub fn build_gust<S: Scalar>(
    settings: &GustSettings,
    geometry: &PanelGeometry,
    time: &[f64],
    intensity: S,
    length: S,
    u_inf: S,
) -> Gust<S> {
    let (x_min, _) = geometry.x_range();
    let y_max = geometry.y_max();
    let k = S::cst(2.0 * PI) / length;
    let omega = k * u_inf;
    let amp = intensity * S::cst(0.5);

    // projection onto the panel normal and conversion to an angle
    let panel_factor: Vec<S> = geometry
        .collocation
        .iter()
        .zip(&geometry.dihedral)
        .map(|(p, d)| S::cst(d.cos() * settings.span_shape.factor(p[1], y_max)) / u_inf)
        .collect();

    let mut downwash = Vec::with_capacity(time.len());
    let mut rate = Vec::with_capacity(time.len());
    let mut accel = Vec::with_capacity(time.len());
    for &t in time {
        let mut w_t = Vec::with_capacity(geometry.num_panels());
        let mut wd_t = Vec::with_capacity(geometry.num_panels());
        let mut wdd_t = Vec::with_capacity(geometry.num_panels());
        for (p, f) in geometry.collocation.iter().zip(&panel_factor) {
            let s = u_inf * S::cst(t) - S::cst(p[0] - x_min + settings.shift);
            let inside = s.value() >= 0.0 && s.value() <= length.value();
            let phase = k * s;
            let (w, wd, wdd) = match settings.profile {
                GustProfile::Mc => (
                    amp * (S::one() - phase.cos()),
                    amp * omega * phase.sin(),
                    amp * omega * omega * phase.cos(),
                ),
                GustProfile::Sine => (
                    amp * phase.sin(),
                    amp * omega * phase.cos(),
                    -amp * omega * omega * phase.sin(),
                ),
            };
            w_t.push(S::select(inside, w * *f, S::zero()));
            wd_t.push(S::select(inside, wd * *f, S::zero()));
            wdd_t.push(S::select(inside, wdd * *f, S::zero()));
        }
        downwash.push(w_t);
        rate.push(wd_t);
        accel.push(wdd_t);
    }

    Gust {
        time: time.to_vec(),
        downwash,
        downwash_rate: rate,
        downwash_accel: accel,
        total_time: total_time(geometry, settings.shift, length, u_inf),
    }
}
