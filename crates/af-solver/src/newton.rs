//! Damped Newton with backtracking line search, one solve per load step.
//!
//! The Jacobian is formed on plain values and the update is applied in the
//! scalar type of the state. A final full Newton correction at the converged
//! point makes the derivative of the solution the implicit-function
//! derivative `-J⁻¹ ∂R/∂p`, whatever the iteration history was.

use crate::error::{SolverError, SolverResult};
use crate::problem::RootSystem;
use crate::settings::NewtonSettings;
use af_core::{AfError, DenseLu, Scalar};

/// Solution of one load step.
#[derive(Debug)]
pub struct NewtonResult<S> {
    pub x: Vec<S>,
    pub residual_norm: f64,
    pub iterations: usize,
}

/// All load steps, `states[i]` solving the equation at `grid[i]`.
pub struct NewtonSweep<S> {
    pub states: Vec<Vec<S>>,
    pub iterations: Vec<usize>,
    pub residual_norms: Vec<f64>,
}

const PIVOT_TOL: f64 = 1e-14;

fn values<S: Scalar>(x: &[S]) -> Vec<f64> {
    x.iter().map(Scalar::value).collect()
}

fn newton_direction<S: Scalar>(
    system: &dyn RootSystem<S>,
    t: f64,
    x: &[S],
    r: &[S],
) -> SolverResult<Vec<S>> {
    let jac = system.jacobian(t, &values(x))?;
    let lu = DenseLu::factor(&jac.lift::<S>(), "Newton Jacobian", PIVOT_TOL).map_err(|e| {
        match e {
            AfError::Singular { pivot, .. } => SolverError::Convergence {
                what: format!("singular Jacobian at load step t = {t} (pivot {pivot:.3e})"),
                last_iterate: values(x),
                residual_norm: f64::NAN,
                iterations: 0,
            },
            other => SolverError::Core(other),
        }
    })?;
    let neg: Vec<S> = r.iter().map(|v| -*v).collect();
    Ok(lu.solve(&neg))
}

fn axpy<S: Scalar>(x: &[S], alpha: f64, dx: &[S]) -> Vec<S> {
    let a = S::cst(alpha);
    x.iter().zip(dx).map(|(xi, di)| *xi + a * *di).collect()
}

/// Solves `R(t, x) = 0` from `x0`.
pub fn newton_solve<S: Scalar>(
    system: &dyn RootSystem<S>,
    t: f64,
    x0: &[S],
    settings: &NewtonSettings,
) -> SolverResult<NewtonResult<S>> {
    let norm = |r: &[S]| settings.norm.norm(&values(r));
    let mut x = x0.to_vec();
    let mut r = system.residual(t, &x)?;
    let mut r_norm = norm(&r);
    let r0_norm = r_norm;

    // the last pass only tests the iterate left by the final update
    for iter in 0..=settings.max_steps {
        if !r_norm.is_finite() {
            break;
        }
        if r_norm < settings.atol || r_norm < settings.rtol * r0_norm {
            // full correction at the converged point carries the tangent
            let dx = newton_direction(system, t, &x, &r)?;
            let x = axpy(&x, 1.0, &dx);
            let residual_norm = norm(&system.residual(t, &x)?);
            tracing::debug!(t, iterations = iter, residual_norm, "Newton converged");
            return Ok(NewtonResult {
                x,
                residual_norm,
                iterations: iter,
            });
        }
        if iter == settings.max_steps {
            break;
        }

        let dx = newton_direction(system, t, &x, &r).map_err(|e| match e {
            SolverError::Convergence { what, .. } => SolverError::Convergence {
                what,
                last_iterate: values(&x),
                residual_norm: r_norm,
                iterations: iter,
            },
            other => other,
        })?;

        let mut alpha = settings.damping;
        let mut x_new = axpy(&x, alpha, &dx);
        let mut r_new = system.residual(t, &x_new)?;
        let mut r_new_norm = norm(&r_new);
        for _ in 0..settings.max_line_search_iters {
            if r_new_norm < r_norm {
                break;
            }
            alpha *= settings.line_search_beta;
            x_new = axpy(&x, alpha, &dx);
            r_new = system.residual(t, &x_new)?;
            r_new_norm = norm(&r_new);
        }

        x = x_new;
        r = r_new;
        r_norm = r_new_norm;

        if alpha < 1e-10 {
            return Err(SolverError::Convergence {
                what: format!("line search stagnated at iteration {iter}, load step t = {t}"),
                last_iterate: values(&x),
                residual_norm: r_norm,
                iterations: iter + 1,
            });
        }
    }

    Err(SolverError::Convergence {
        what: format!(
            "Newton reached {} iterations at load step t = {t}",
            settings.max_steps
        ),
        last_iterate: values(&x),
        residual_norm: r_norm,
        iterations: settings.max_steps,
    })
}

/// Solves every load step in `grid`, warm starting from the previous one.
pub fn newton_sweep<S: Scalar>(
    system: &dyn RootSystem<S>,
    settings: &NewtonSettings,
    q0: &[S],
    grid: &[f64],
) -> SolverResult<NewtonSweep<S>> {
    let mut sweep = NewtonSweep {
        states: Vec::with_capacity(grid.len()),
        iterations: Vec::with_capacity(grid.len()),
        residual_norms: Vec::with_capacity(grid.len()),
    };
    let mut guess = q0.to_vec();
    for &t in grid {
        let res = newton_solve(system, t, &guess, settings)?;
        guess.clone_from(&res.x);
        sweep.states.push(res.x);
        sweep.iterations.push(res.iterations);
        sweep.residual_norms.push(res.residual_norm);
    }
    Ok(sweep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::forward_jacobian;
    use af_core::{DenseMatrix, Dual};

    /// `x² - p t = 0` with `p` carried in the scalar type.
    struct Sqrt<S> {
        p: S,
    }

    fn residual<T: Scalar>(p: T, t: f64, x: &[T]) -> Vec<T> {
        vec![x[0] * x[0] - p * T::cst(t)]
    }

    impl<S: Scalar> RootSystem<S> for Sqrt<S> {
        fn dimension(&self) -> usize {
            1
        }

        fn residual(&self, t: f64, q: &[S]) -> SolverResult<Vec<S>> {
            Ok(residual(self.p, t, q))
        }

        fn jacobian(&self, t: f64, q: &[f64]) -> SolverResult<DenseMatrix<f64>> {
            let p = Dual::new(self.p.value(), 0.0);
            forward_jacobian(q, |x| Ok(residual(p, t, x)))
        }
    }

    #[test]
    fn simple_quadratic() {
        let sys = Sqrt { p: 4.0 };
        let res = newton_solve(&sys, 1.0, &[3.0], &NewtonSettings::default()).unwrap();
        assert!((res.x[0] - 2.0).abs() < 1e-6);
        assert!(res.residual_norm < 1e-6);
    }

    #[test]
    fn converged_solution_carries_implicit_derivative() {
        let sys = Sqrt {
            p: Dual::variable(4.0),
        };
        let res = newton_solve(&sys, 1.0, &[Dual::new(3.0, 0.0)], &NewtonSettings::default())
            .unwrap();
        // x = sqrt(p) so dx/dp = 1 / (2 sqrt(p)) = 0.25
        assert!((res.x[0].eps - 0.25).abs() < 1e-6);
    }

    #[test]
    fn sweep_warm_starts_each_load_step() {
        let sys = Sqrt { p: 1.0 };
        let sweep = newton_sweep(
            &sys,
            &NewtonSettings::default(),
            &[1.0],
            &[1.0, 4.0, 9.0],
        )
        .unwrap();
        for (x, want) in sweep.states.iter().zip([1.0, 2.0, 3.0]) {
            assert!((x[0] - want).abs() < 1e-6);
        }
        assert_eq!(sweep.iterations[0], 0);
    }

    /// `x - c = 0`, solved exactly by one full Newton step.
    struct Shift {
        c: f64,
    }

    impl RootSystem<f64> for Shift {
        fn dimension(&self) -> usize {
            1
        }

        fn residual(&self, _t: f64, q: &[f64]) -> SolverResult<Vec<f64>> {
            Ok(vec![q[0] - self.c])
        }

        fn jacobian(&self, _t: f64, _q: &[f64]) -> SolverResult<DenseMatrix<f64>> {
            Ok(DenseMatrix::identity(1))
        }
    }

    fn limited(max_steps: usize) -> NewtonSettings {
        NewtonSettings {
            max_steps,
            ..Default::default()
        }
    }

    #[test]
    fn linear_residual_converges_within_one_step() {
        let res = newton_solve(&Shift { c: 2.0 }, 0.0, &[0.0], &limited(1)).unwrap();
        assert_eq!(res.x, vec![2.0]);
        assert_eq!(res.iterations, 1);
        assert_eq!(res.residual_norm, 0.0);
    }

    #[test]
    fn converging_on_the_last_allowed_step_succeeds() {
        let sys = Sqrt { p: 4.0 };
        let free = newton_solve(&sys, 1.0, &[3.0], &NewtonSettings::default()).unwrap();
        assert!(free.iterations >= 2);

        let exact = newton_solve(&sys, 1.0, &[3.0], &limited(free.iterations)).unwrap();
        assert_eq!(exact.iterations, free.iterations);
        assert_eq!(exact.x, free.x);

        let err = newton_solve(&sys, 1.0, &[3.0], &limited(free.iterations - 1)).unwrap_err();
        assert_eq!(err.kind(), af_core::ErrorKind::Convergence);
    }

    #[test]
    fn converged_start_needs_no_update() {
        let res = newton_solve(&Shift { c: 2.0 }, 0.0, &[2.0], &limited(1)).unwrap();
        assert_eq!(res.iterations, 0);
        assert_eq!(res.x, vec![2.0]);
    }

    #[test]
    fn iteration_limit_reports_final_residual() {
        let sys = Sqrt { p: 4.0 };
        let settings = NewtonSettings {
            max_steps: 1,
            atol: 1e-14,
            rtol: 1e-14,
            ..Default::default()
        };
        let err = newton_solve(&sys, 1.0, &[100.0], &settings).unwrap_err();
        match err {
            SolverError::Convergence {
                residual_norm,
                iterations,
                ..
            } => {
                assert!(residual_norm > 0.0);
                assert_eq!(iterations, 1);
            }
            other => panic!("unexpected {other}"),
        }
    }
}
