//! Exponential map of the rotation group and its integral.
//!
//! With `θ = |Ψ|`:
//! `H0(Ψ) = I + sinθ/θ Ψ̃ + (1 - cosθ)/θ² Ψ̃²` and
//! `H1(Ψ, ds) = ds (I + (1 - cosθ)/θ² Ψ̃ + (θ - sinθ)/θ³ Ψ̃²)`.
//!
//! Below `threshold` the coefficients switch to their Taylor series. The
//! closed forms are then evaluated at a safe unit angle so that the branch
//! not taken stays finite for every scalar type.

use af_core::Scalar;
use af_core::linalg::{Mat3, Vec3, dot3, identity3, mat3_add, mat3_mul, mat3_scale, tilde};

struct Coefficients<S> {
    /// `sinθ/θ`
    c1: S,
    /// `(1 - cosθ)/θ²`
    c2: S,
    /// `(θ - sinθ)/θ³`
    c3: S,
}

fn coefficients<S: Scalar>(psi: &Vec3<S>, threshold: f64) -> Coefficients<S> {
    let theta2 = dot3(psi, psi);
    let small = theta2.value() < threshold * threshold;
    let theta = S::select(small, S::one(), theta2).sqrt();
    let (s, c) = theta.sin_cos();
    let t2 = S::select(small, S::one(), theta2);
    let t3 = t2 * theta;

    let series = |a: f64, b: f64, d: f64| S::cst(a) - theta2 / S::cst(b) + theta2 * theta2 / S::cst(d);
    Coefficients {
        c1: S::select(small, series(1.0, 6.0, 120.0), s / theta),
        c2: S::select(small, series(0.5, 24.0, 720.0), (S::one() - c) / t2),
        c3: S::select(small, series(1.0 / 6.0, 120.0, 5040.0), (theta - s) / t3),
    }
}

/// Rotation matrix of the rotation vector `psi`.
pub fn h0<S: Scalar>(psi: &Vec3<S>, threshold: f64) -> Mat3<S> {
    let k = coefficients(psi, threshold);
    let p = tilde(psi);
    let p2 = mat3_mul(&p, &p);
    mat3_add(
        &mat3_add(&identity3(), &mat3_scale(&p, k.c1)),
        &mat3_scale(&p2, k.c2),
    )
}

/// Integral of `H0(s Ψ / ds)` over an element of length `ds`.
pub fn h1<S: Scalar>(psi: &Vec3<S>, ds: f64, threshold: f64) -> Mat3<S> {
    let k = coefficients(psi, threshold);
    let p = tilde(psi);
    let p2 = mat3_mul(&p, &p);
    let m = mat3_add(
        &mat3_add(&identity3(), &mat3_scale(&p, k.c2)),
        &mat3_scale(&p2, k.c3),
    );
    mat3_scale(&m, S::cst(ds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_core::Dual;
    use af_core::linalg::transpose3;
    use proptest::prelude::*;

    #[test]
    fn quarter_turn_about_z() {
        let r = h0(&[0.0, 0.0, std::f64::consts::FRAC_PI_2], 1e-3);
        assert!((r[0][1] + 1.0).abs() < 1e-14);
        assert!((r[1][0] - 1.0).abs() < 1e-14);
        assert!((r[2][2] - 1.0).abs() < 1e-14);
    }

    #[test]
    fn zero_rotation_has_finite_derivative() {
        let psi = [Dual::variable(0.0), Dual::new(0.0, 0.0), Dual::new(0.0, 0.0)];
        let r = h0(&psi, 1e-3);
        let m = h1(&psi, 2.0, 1e-3);
        for i in 0..3 {
            for j in 0..3 {
                assert!(r[i][j].eps.is_finite());
                assert!(m[i][j].eps.is_finite());
            }
        }
        // dH0/dψx at zero is tilde(ex)
        assert!((r[2][1].eps - 1.0).abs() < 1e-14);
        assert!((r[1][2].eps + 1.0).abs() < 1e-14);
        assert!((m[0][0].val - 2.0).abs() < 1e-15);
    }

    proptest! {
        #[test]
        fn branches_agree_across_threshold(x in -1.0f64..1.0, y in -1.0f64..1.0) {
            // just above the threshold, the closed form and the series meet
            let scale = 1.01e-3 / (x * x + y * y + 1e-12).sqrt();
            let psi = [x * scale, y * scale, 0.0];
            let closed = h0(&psi, 1e-3);
            let series = h0(&psi, 1e-2);
            for i in 0..3 {
                for j in 0..3 {
                    prop_assert!((closed[i][j] - series[i][j]).abs() < 1e-12);
                }
            }
        }

        #[test]
        fn rotations_are_orthogonal(x in -2.0f64..2.0, y in -2.0f64..2.0, z in -2.0f64..2.0) {
            let r = h0(&[x, y, z], 1e-3);
            let rtr = mat3_mul(&transpose3(&r), &r);
            for i in 0..3 {
                for j in 0..3 {
                    let want = if i == j { 1.0 } else { 0.0 };
                    prop_assert!((rtr[i][j] - want).abs() < 1e-12);
                }
            }
        }
    }
}
