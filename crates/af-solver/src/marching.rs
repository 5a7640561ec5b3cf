//! Fixed-step explicit integrators.

use crate::error::{SolverError, SolverResult};
use crate::problem::OdeSystem;
use crate::settings::{RkMethod, RkSettings};
use af_core::Scalar;

/// One explicit step of a Runge–Kutta scheme.
pub trait Integrator<S: Scalar> {
    fn step(&self, system: &dyn OdeSystem<S>, t: f64, x: &[S], dt: f64) -> SolverResult<Vec<S>>;

    /// Right-hand side evaluations per step.
    fn stages(&self) -> usize;
}

/// `x + dt * Σ a_i k_i`
fn combine<S: Scalar>(x: &[S], dt: f64, terms: &[(f64, &[S])]) -> Vec<S> {
    let mut out = x.to_vec();
    for (a, k) in terms {
        if *a == 0.0 {
            continue;
        }
        let w = S::cst(dt * a);
        for (o, ki) in out.iter_mut().zip(k.iter()) {
            *o += w * *ki;
        }
    }
    out
}

/// Explicit Euler.
#[derive(Clone, Debug)]
pub struct ForwardEuler;

impl<S: Scalar> Integrator<S> for ForwardEuler {
    fn step(&self, system: &dyn OdeSystem<S>, t: f64, x: &[S], dt: f64) -> SolverResult<Vec<S>> {
        let k1 = system.rhs(t, x)?;
        Ok(combine(x, dt, &[(1.0, &k1[..])]))
    }

    fn stages(&self) -> usize {
        1
    }
}

/// Classical RK4.
#[derive(Clone, Debug)]
pub struct Rk4;

impl<S: Scalar> Integrator<S> for Rk4 {
    fn step(&self, system: &dyn OdeSystem<S>, t: f64, x: &[S], dt: f64) -> SolverResult<Vec<S>> {
        let k1 = system.rhs(t, x)?;
        let k2 = system.rhs(t + 0.5 * dt, &combine(x, dt, &[(0.5, &k1[..])]))?;
        let k3 = system.rhs(t + 0.5 * dt, &combine(x, dt, &[(0.5, &k2[..])]))?;
        let k4 = system.rhs(t + dt, &combine(x, dt, &[(1.0, &k3[..])]))?;
        Ok(combine(
            x,
            dt / 6.0,
            &[(1.0, &k1[..]), (2.0, &k2[..]), (2.0, &k3[..]), (1.0, &k4[..])],
        ))
    }

    fn stages(&self) -> usize {
        4
    }
}

/// Tsitouras 5(4), fifth-order solution without error control.
#[derive(Clone, Debug)]
pub struct Tsit5;

const TSIT5_C: [f64; 6] = [0.0, 0.161, 0.327, 0.9, 0.9800255409045097, 1.0];
const TSIT5_A: [&[f64]; 6] = [
    &[],
    &[0.161],
    &[-0.008480655492356989, 0.335480655492357],
    &[2.898, -6.359447987781783, 4.361447987781783],
    &[
        5.325864858437957,
        -11.748883564062828,
        7.495539342889693,
        -0.09249506636030195,
    ],
    &[
        5.86145544294642,
        -12.92096931784711,
        8.159367898576159,
        -0.071584973281401,
        -0.02826857949054663,
    ],
];
const TSIT5_B: [f64; 6] = [
    0.09646076681806523,
    0.01,
    0.4798896504144996,
    1.379008574103742,
    -3.290069515436099,
    2.324710524099774,
];

impl<S: Scalar> Integrator<S> for Tsit5 {
    fn step(&self, system: &dyn OdeSystem<S>, t: f64, x: &[S], dt: f64) -> SolverResult<Vec<S>> {
        let mut k: Vec<Vec<S>> = Vec::with_capacity(6);
        for stage in 0..6 {
            let terms: Vec<(f64, &[S])> = TSIT5_A[stage]
                .iter()
                .zip(&k)
                .map(|(a, ki)| (*a, ki.as_slice()))
                .collect();
            let xs = combine(x, dt, &terms);
            let ks = system.rhs(t + TSIT5_C[stage] * dt, &xs)?;
            k.push(ks);
        }
        let terms: Vec<(f64, &[S])> = TSIT5_B
            .iter()
            .zip(&k)
            .map(|(b, ki)| (*b, ki.as_slice()))
            .collect();
        Ok(combine(x, dt, &terms))
    }

    fn stages(&self) -> usize {
        6
    }
}

pub fn integrator<S: Scalar>(method: RkMethod) -> Box<dyn Integrator<S>> {
    match method {
        RkMethod::Rk4 => Box::new(Rk4),
        RkMethod::Tsit5 => Box::new(Tsit5),
        RkMethod::Euler => Box::new(ForwardEuler),
    }
}

/// States at every grid time, `grid[0]` holding `q0`.
pub struct MarchResult<S> {
    pub states: Vec<Vec<S>>,
    pub rhs_evals: usize,
}

pub fn march<S: Scalar>(
    system: &dyn OdeSystem<S>,
    settings: &RkSettings,
    q0: &[S],
    grid: &[f64],
) -> SolverResult<MarchResult<S>> {
    let stepper = integrator::<S>(settings.method);
    let mut states = Vec::with_capacity(grid.len());
    let mut x = q0.to_vec();
    states.push(x.clone());
    let mut rhs_evals = 0;

    for w in grid.windows(2) {
        let dt = (w[1] - w[0]) / settings.substeps as f64;
        for s in 0..settings.substeps {
            x = stepper.step(system, w[0] + s as f64 * dt, &x, dt)?;
            rhs_evals += stepper.stages();
        }
        if let Some(bad) = x.iter().position(|v| !v.value().is_finite()) {
            return Err(SolverError::Convergence {
                what: format!("state component {bad} became non-finite at t = {}", w[1]),
                last_iterate: x.iter().map(Scalar::value).collect(),
                residual_norm: f64::NAN,
                iterations: states.len(),
            });
        }
        states.push(x.clone());
    }
    Ok(MarchResult { states, rhs_evals })
}
