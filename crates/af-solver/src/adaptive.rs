//! Dormand–Prince 5(4) with PI step-size control.
//!
//! Error estimates, step acceptance and step sizes are computed on plain
//! values, so a differentiated run takes exactly the steps of the value run.

use crate::error::{SolverError, SolverResult};
use crate::problem::OdeSystem;
use crate::settings::AdaptiveSettings;
use af_core::Scalar;

const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A: [&[f64]; 7] = [
    &[],
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
    ],
    &[
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
    &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];
/// Fifth-order weights minus the embedded fourth-order ones.
const E: [f64; 7] = [
    35.0 / 384.0 - 5179.0 / 57600.0,
    0.0,
    500.0 / 1113.0 - 7571.0 / 16695.0,
    125.0 / 192.0 - 393.0 / 640.0,
    -2187.0 / 6784.0 + 92097.0 / 339200.0,
    11.0 / 84.0 - 187.0 / 2100.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const FAC_MIN: f64 = 0.2;
const FAC_MAX: f64 = 5.0;
const ALPHA: f64 = 0.7 / 5.0;
const BETA: f64 = 0.4 / 5.0;

#[derive(Debug)]
pub struct AdaptiveResult<S> {
    pub states: Vec<Vec<S>>,
    pub accepted: usize,
    pub rejected: usize,
}

fn stage<S: Scalar>(x: &[S], dt: f64, a: &[f64], k: &[Vec<S>]) -> Vec<S> {
    let mut out = x.to_vec();
    for (aj, kj) in a.iter().zip(k) {
        if *aj == 0.0 {
            continue;
        }
        let w = S::cst(dt * aj);
        for (o, v) in out.iter_mut().zip(kj) {
            *o += w * *v;
        }
    }
    out
}

pub fn integrate<S: Scalar>(
    system: &dyn OdeSystem<S>,
    settings: &AdaptiveSettings,
    q0: &[S],
    grid: &[f64],
) -> SolverResult<AdaptiveResult<S>> {
    let mut states = Vec::with_capacity(grid.len());
    let mut x = q0.to_vec();
    states.push(x.clone());
    if grid.len() < 2 {
        return Ok(AdaptiveResult {
            states,
            accepted: 0,
            rejected: 0,
        });
    }

    let mut h = settings
        .dt0
        .unwrap_or((grid[1] - grid[0]) / 10.0)
        .min(settings.dt_max);
    let mut err_prev: f64 = 1e-4;
    let mut accepted = 0;
    let mut rejected = 0;
    let mut t = grid[0];
    let mut k1 = system.rhs(t, &x)?;

    for &t_out in &grid[1..] {
        while t < t_out {
            if accepted + rejected >= settings.max_steps {
                return Err(SolverError::Convergence {
                    what: format!(
                        "adaptive integration exceeded {} steps at t = {t:.6e} before reaching {:.6e}",
                        settings.max_steps,
                        grid[grid.len() - 1]
                    ),
                    last_iterate: x.iter().map(Scalar::value).collect(),
                    residual_norm: err_prev,
                    iterations: accepted + rejected,
                });
            }
            let remaining = t_out - t;
            let clipped = h >= remaining;
            let dt = if clipped { remaining } else { h };
            if dt <= 1e-14 * t.abs().max(1.0) {
                return Err(SolverError::Convergence {
                    what: format!("step size underflow at t = {t:.6e}"),
                    last_iterate: x.iter().map(Scalar::value).collect(),
                    residual_norm: err_prev,
                    iterations: accepted + rejected,
                });
            }

            let mut k = Vec::with_capacity(7);
            k.push(k1.clone());
            for s in 1..7 {
                let xs = stage(&x, dt, A[s], &k);
                k.push(system.rhs(t + C[s] * dt, &xs)?);
            }
            // A[6] are the fifth-order weights, so the last stage input is the new state
            let x_new = stage(&x, dt, A[6], &k);

            let mut sum = 0.0;
            for i in 0..x.len() {
                let e: f64 = dt * (0..7).map(|s| E[s] * k[s][i].value()).sum::<f64>();
                let scale = settings.atol
                    + settings.rtol * x[i].value().abs().max(x_new[i].value().abs());
                sum += (e / scale).powi(2);
            }
            let err = if x.is_empty() {
                0.0
            } else {
                (sum / x.len() as f64).sqrt()
            };
            if !err.is_finite() {
                return Err(SolverError::Convergence {
                    what: format!("non-finite error estimate at t = {t:.6e}"),
                    last_iterate: x.iter().map(Scalar::value).collect(),
                    residual_norm: err,
                    iterations: accepted + rejected,
                });
            }

            if err <= 1.0 {
                let fac = if err == 0.0 {
                    FAC_MAX
                } else {
                    (SAFETY * err.powf(-ALPHA) * err_prev.powf(BETA)).clamp(FAC_MIN, FAC_MAX)
                };
                let proposal = (dt * fac).min(settings.dt_max);
                h = if clipped { h.max(proposal).min(settings.dt_max) } else { proposal };
                t = if clipped { t_out } else { t + dt };
                x = x_new;
                k1 = k.swap_remove(6);
                err_prev = err.max(1e-4);
                accepted += 1;
            } else {
                let fac = (SAFETY * err.powf(-0.2)).clamp(FAC_MIN, 1.0);
                h = dt * fac;
                rejected += 1;
            }
        }
        states.push(x.clone());
    }

    tracing::debug!(accepted, rejected, "adaptive integration finished");
    Ok(AdaptiveResult {
        states,
        accepted,
        rejected,
    })
}
