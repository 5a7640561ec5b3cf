//! Roger rational-function approximation of the generalized aerodynamic
//! forces, scaled to flight conditions.
//!
//! `A` holds `3 + num_poles` square blocks over the structural modes
//! (stiffness, damping and mass terms followed by one block per lag pole);
//! `D` holds the same number of blocks mapping panel downwash to modal
//! forces.

use crate::error::{AeroError, AeroResult};
use af_core::{AfError, ArrayData, DenseLu, DenseMatrix, Scalar};

/// Unscaled aerodynamic matrices as delivered by the panel code.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAero {
    a: Vec<DenseMatrix<f64>>,
    d: Option<Vec<DenseMatrix<f64>>>,
    poles: Vec<f64>,
}

impl RawAero {
    pub fn new(
        a: Vec<DenseMatrix<f64>>,
        d: Option<Vec<DenseMatrix<f64>>>,
        poles: Vec<f64>,
    ) -> AeroResult<Self> {
        let blocks = 3 + poles.len();
        if a.len() != blocks {
            return Err(AeroError::configuration(format!(
                "A has {} blocks, expected 3 + {} poles",
                a.len(),
                poles.len()
            )));
        }
        let nm = a[0].rows();
        if let Some(bad) = a.iter().position(|m| m.shape() != (nm, nm)) {
            return Err(AeroError::configuration(format!(
                "A block {bad} is {:?}, expected {nm}x{nm}",
                a[bad].shape()
            )));
        }
        if let Some(d) = &d {
            if d.len() != blocks {
                return Err(AeroError::configuration(format!(
                    "D has {} blocks, expected {blocks}",
                    d.len()
                )));
            }
            let np = d[0].cols();
            if let Some(bad) = d.iter().position(|m| m.shape() != (nm, np)) {
                return Err(AeroError::configuration(format!(
                    "D block {bad} is {:?}, expected {nm}x{np}",
                    d[bad].shape()
                )));
            }
        }
        if let Some(p) = poles.iter().find(|p| !p.is_finite() || **p <= 0.0) {
            return Err(AeroError::configuration(format!(
                "lag pole {p} must be positive"
            )));
        }
        Ok(Self { a, d, poles })
    }

    /// From `[3 + np, nm, nm]`, optional `[3 + np, nm, npanels]` and `[np]`.
    pub fn from_arrays(
        a: &ArrayData,
        d: Option<&ArrayData>,
        poles: &ArrayData,
    ) -> AeroResult<Self> {
        poles.expect_ndim("poles", 1)?;
        let blocks = |arr: &ArrayData, what: &str| -> AeroResult<Vec<DenseMatrix<f64>>> {
            arr.expect_ndim(what, 3)?;
            (0..arr.shape[0])
                .map(|i| {
                    DenseMatrix::from_row_major(arr.shape[1], arr.shape[2], arr.block(i).to_vec())
                        .map_err(AeroError::from)
                })
                .collect()
        };
        let a = blocks(a, "A")?;
        let d = d.map(|d| blocks(d, "D")).transpose()?;
        Self::new(a, d, poles.data.clone())
    }

    pub fn to_arrays(&self) -> Vec<(&'static str, ArrayData)> {
        let stack = |ms: &[DenseMatrix<f64>]| {
            let (r, c) = ms[0].shape();
            ArrayData {
                shape: vec![ms.len(), r, c],
                data: ms.iter().flat_map(|m| m.as_slice().to_vec()).collect(),
            }
        };
        let mut out = vec![
            ("A", stack(&self.a)),
            ("poles", ArrayData::vector(self.poles.clone())),
        ];
        if let Some(d) = &self.d {
            out.push(("D", stack(d)));
        }
        out
    }

    pub fn num_modes(&self) -> usize {
        self.a[0].rows()
    }

    pub fn num_poles(&self) -> usize {
        self.poles.len()
    }

    pub fn num_panels(&self) -> Option<usize> {
        self.d.as_ref().map(|d| d[0].cols())
    }

    pub fn poles(&self) -> &[f64] {
        &self.poles
    }
}

/// Panel-downwash operators scaled to flight conditions.
#[derive(Debug, Clone)]
pub struct GustOperators<S> {
    pub d0hat: DenseMatrix<S>,
    pub d1hat: DenseMatrix<S>,
    pub d2hat: DenseMatrix<S>,
    pub d3hat: Vec<DenseMatrix<S>>,
}

#[derive(Debug, Clone)]
pub struct AerodynamicModel<S> {
    pub a0hat: DenseMatrix<S>,
    pub a1hat: DenseMatrix<S>,
    pub a2hat: DenseMatrix<S>,
    pub a3hat: Vec<DenseMatrix<S>>,
    /// `(I - A2hat)⁻¹`
    pub a2hat_inv: DenseMatrix<S>,
    /// Present when `D` was supplied.
    pub gust: Option<GustOperators<S>>,
    pub poles: Vec<f64>,
    pub c_ref: f64,
    pub u_inf: S,
    pub rho_inf: S,
    pub q_inf: S,
}

impl<S: Scalar> AerodynamicModel<S> {
    pub fn num_modes(&self) -> usize {
        self.a0hat.rows()
    }

    pub fn num_poles(&self) -> usize {
        self.poles.len()
    }

    /// Decay rate of lag state `p`, `2 U γ_p / c`.
    pub fn lag_rate(&self, p: usize) -> S {
        S::cst(2.0 * self.poles[p] / self.c_ref) * self.u_inf
    }

    /// Same operators in another scalar type.
    pub fn map_scalar<T: Scalar>(&self, f: impl Fn(S) -> T + Copy) -> AerodynamicModel<T> {
        AerodynamicModel {
            a0hat: self.a0hat.map(f),
            a1hat: self.a1hat.map(f),
            a2hat: self.a2hat.map(f),
            a3hat: self.a3hat.iter().map(|m| m.map(f)).collect(),
            a2hat_inv: self.a2hat_inv.map(f),
            gust: self.gust.as_ref().map(|g| GustOperators {
                d0hat: g.d0hat.map(f),
                d1hat: g.d1hat.map(f),
                d2hat: g.d2hat.map(f),
                d3hat: g.d3hat.iter().map(|m| m.map(f)).collect(),
            }),
            poles: self.poles.clone(),
            c_ref: self.c_ref,
            u_inf: f(self.u_inf),
            rho_inf: f(self.rho_inf),
            q_inf: f(self.q_inf),
        }
    }
}

/// Scales the raw matrices with dynamic pressure and reduced-frequency
/// factors and factors `I - A2hat`.
///
/// A pivot of `I - A2hat` at or below `singular_tol` times its largest entry
/// is reported as [`AeroError::SingularOperator`].
pub fn scale_aero<S: Scalar>(
    raw: &RawAero,
    u_inf: S,
    rho_inf: S,
    c_ref: f64,
    singular_tol: f64,
) -> AeroResult<AerodynamicModel<S>> {
    if !c_ref.is_finite() || c_ref <= 0.0 {
        return Err(AeroError::configuration(format!(
            "reference chord must be positive, got {c_ref}"
        )));
    }
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(u_inf.value()) || !positive(rho_inf.value()) {
        return Err(AeroError::configuration(format!(
            "u_inf = {} and rho_inf = {} must be positive",
            u_inf.value(),
            rho_inf.value()
        )));
    }

    let half = S::cst(0.5);
    let q_inf = half * rho_inf * u_inf * u_inf;
    let f1 = S::cst(c_ref / 4.0) * rho_inf * u_inf;
    let f2 = S::cst(c_ref * c_ref / 8.0) * rho_inf;

    let a2hat = raw.a[2].scaled(f2);
    let lu = DenseLu::factor(&a2hat.identity_minus(), "I - A2hat", singular_tol).map_err(
        |e| match e {
            AfError::Singular {
                what,
                pivot,
                threshold,
            } => AeroError::SingularOperator {
                what,
                pivot,
                threshold,
            },
            other => AeroError::Core(other),
        },
    )?;
    tracing::debug!(pivot_ratio = lu.pivot_ratio(), "I - A2hat factored");

    let gust = raw.d.as_ref().map(|d| GustOperators {
        d0hat: d[0].scaled(q_inf),
        d1hat: d[1].scaled(f1),
        d2hat: d[2].scaled(f2),
        d3hat: d[3..].iter().map(|m| m.scaled(q_inf)).collect(),
    });

    Ok(AerodynamicModel {
        a0hat: raw.a[0].scaled(q_inf),
        a1hat: raw.a[1].scaled(f1),
        a3hat: raw.a[3..].iter().map(|m| m.scaled(q_inf)).collect(),
        a2hat_inv: lu.inverse(),
        a2hat,
        gust,
        poles: raw.poles.clone(),
        c_ref,
        u_inf,
        rho_inf,
        q_inf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_core::Dual;

    fn diag(v: f64, n: usize) -> DenseMatrix<f64> {
        DenseMatrix::from_fn(n, n, |i, j| if i == j { v } else { 0.0 })
    }

    #[test]
    fn scaling_factors_follow_dynamic_pressure() {
        let raw = RawAero::new(
            vec![diag(1.0, 2), diag(1.0, 2), diag(1.0, 2), diag(1.0, 2)],
            None,
            vec![0.3],
        )
        .unwrap();
        let m = scale_aero(&raw, 10.0, 1.2, 2.0, 1e-12).unwrap();
        assert!((m.q_inf - 60.0).abs() < 1e-12);
        assert!((m.a0hat.get(0, 0) - 60.0).abs() < 1e-12);
        assert!((m.a1hat.get(1, 1) - 2.0 * 1.2 * 10.0 / 4.0).abs() < 1e-12);
        assert!((m.a2hat.get(0, 0) - 4.0 * 1.2 / 8.0).abs() < 1e-12);
        assert!((m.a2hat_inv.get(0, 0) - 1.0 / (1.0 - 0.6)).abs() < 1e-12);
        assert!((m.lag_rate(0) - 3.0).abs() < 1e-12);
        assert!(m.gust.is_none());
    }

    #[test]
    fn dynamic_pressure_derivative_is_carried() {
        let raw = RawAero::new(
            vec![diag(1.0, 1), diag(0.0, 1), diag(0.0, 1)],
            None,
            Vec::new(),
        )
        .unwrap();
        let m = scale_aero(&raw, Dual::variable(10.0), Dual::new(1.2, 0.0), 1.0, 1e-12).unwrap();
        // dq/dU = rho U
        assert!((m.a0hat.get(0, 0).eps - 12.0).abs() < 1e-12);
    }

    #[test]
    fn near_singular_mass_term_is_reported() {
        // c²ρ/8 = 1 makes I - A2hat vanish
        let raw = RawAero::new(
            vec![diag(1.0, 2), diag(1.0, 2), diag(8.0, 2)],
            None,
            Vec::new(),
        )
        .unwrap();
        let err = scale_aero(&raw, 10.0, 1.0, 1.0, 1e-10).unwrap_err();
        assert!(matches!(err, AeroError::SingularOperator { .. }));
        assert_eq!(err.kind(), af_core::ErrorKind::SingularAeroOperator);
    }

    #[test]
    fn block_count_must_match_poles() {
        let err = RawAero::new(vec![diag(1.0, 2); 3], None, vec![0.1]).unwrap_err();
        assert!(matches!(err, AeroError::Configuration { .. }));
    }
}
