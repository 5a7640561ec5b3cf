//! Intrinsic modal state equations.
//!
//! Static: `R(q2) = ω q2 - Γ2(q2, q2) + η`.
//!
//! Dynamic, on `[q1, q2, ql]`:
//! - `F1 = ω q2 - Γ1(q1, q1) - Γ2(q2, q2)`,
//! - `F2 = -ω q1 + Γ2ᵀ(q1, q2)`,
//! - `q1' = (I - A2hat)⁻¹ (F1 + η)`, `q2' = F2`,
//! - `ql_p' = A3hat_p q1 - (2U/c) γ_p ql_p + Ql_wdot_p(t)`.
//!
//! `Γ(a, b)_i = Σ_jk Γ_ijk a_j b_k` and `Γᵀ(a, b)_k = Σ_ij Γ_ijk a_i b_j`.
//! The modal displacement entering the quasi-steady aero term is
//! `q0 = -q2 / ω`.

use crate::error::{IntrinsicError, IntrinsicResult};
use crate::fields::{kinematics, superpose};
use crate::states::{EquationKind, StateLayout};
use crate::xloads::ExternalLoads;
use af_aero::{AerodynamicModel, GustForcing};
use af_core::{DenseMatrix, Dual, Scalar};
use af_fem::{BeamTree, CouplingTensors, ModalBasis};
use af_solver::{OdeSystem, RootSystem, SolverResult, forward_jacobian};

/// Everything the state equations read besides the state itself.
///
/// The structural data is shared and never differentiated; the aerodynamic
/// operators, gust forcing and load factor carry the scalar type.
#[derive(Debug, Clone)]
pub struct DqArgs<'a, S> {
    pub basis: &'a ModalBasis,
    pub couplings: &'a CouplingTensors,
    pub tree: &'a BeamTree,
    pub layout: StateLayout,
    pub aero: Option<AerodynamicModel<S>>,
    pub gust: Option<GustForcing<S>>,
    pub loads: Option<&'a ExternalLoads>,
    pub load_factor: S,
    pub rotation_threshold: f64,
}

impl<'a, S: Scalar> DqArgs<'a, S> {
    /// Cross-checks sizes once so the equations themselves cannot fail.
    pub fn check(&self) -> IntrinsicResult<()> {
        let nm = self.basis.num_modes();
        if self.couplings.num_modes() != nm || self.layout.num_modes != nm {
            return Err(IntrinsicError::configuration(format!(
                "couplings have {} modes and the state {} but the basis has {nm}",
                self.couplings.num_modes(),
                self.layout.num_modes
            )));
        }
        if self.tree.num_nodes() != self.basis.num_nodes() {
            return Err(IntrinsicError::configuration(format!(
                "tree has {} nodes, modal basis {}",
                self.tree.num_nodes(),
                self.basis.num_nodes()
            )));
        }
        if let Some(aero) = &self.aero {
            if aero.num_modes() != nm {
                return Err(IntrinsicError::configuration(format!(
                    "aerodynamic matrices have {} modes, structure {nm}",
                    aero.num_modes()
                )));
            }
            let carried = match self.layout.equation {
                EquationKind::Static => 0,
                EquationKind::Dynamic => aero.num_poles(),
            };
            if carried != self.layout.num_poles {
                return Err(IntrinsicError::configuration(format!(
                    "state carries {} lag poles, aerodynamics has {}",
                    self.layout.num_poles,
                    aero.num_poles()
                )));
            }
        } else if self.layout.num_poles != 0 {
            return Err(IntrinsicError::configuration(
                "lag states requested without aerodynamics",
            ));
        }
        if self.gust.is_some() {
            if self.layout.equation == EquationKind::Static {
                return Err(IntrinsicError::configuration(
                    "gust forcing applies to dynamic systems only",
                ));
            }
            if self.aero.is_none() {
                return Err(IntrinsicError::configuration(
                    "gust forcing requires aerodynamics",
                ));
            }
        }
        if let Some(loads) = self.loads {
            loads.check(self.basis.num_nodes())?;
            if loads.has_dead() && self.layout.equation == EquationKind::Dynamic {
                return Err(IntrinsicError::configuration(
                    "dead loads are supported in static systems only",
                ));
            }
        }
        Ok(())
    }

    /// Same arguments in another scalar type.
    pub fn map_scalar<T: Scalar>(&self, f: impl Fn(S) -> T + Copy) -> DqArgs<'a, T> {
        DqArgs {
            basis: self.basis,
            couplings: self.couplings,
            tree: self.tree,
            layout: self.layout,
            aero: self.aero.as_ref().map(|a| a.map_scalar(f)),
            gust: self.gust.as_ref().map(|g| g.map_scalar(f)),
            loads: self.loads,
            load_factor: f(self.load_factor),
            rotation_threshold: self.rotation_threshold,
        }
    }

    /// `q0 = -q2 / ω`
    fn displacement<T: Scalar>(&self, q2: &[T]) -> Vec<T> {
        q2.iter()
            .zip(&self.basis.omega)
            .map(|(q, w)| -*q / T::cst(*w))
            .collect()
    }
}

/// Static residual on `q2` at load step `t`.
pub fn static_residual<S: Scalar>(args: &DqArgs<'_, S>, t: f64, q2: &[S]) -> Vec<S> {
    let basis = args.basis;
    let quad = args.couplings.gamma2.contract_last(q2, q2);
    let mut r: Vec<S> = q2
        .iter()
        .zip(&basis.omega)
        .zip(&quad)
        .map(|((q, w), g)| S::cst(*w) * *q - *g)
        .collect();

    if let Some(loads) = args.loads {
        let mut eta: Vec<S> = loads
            .follower_modal(basis, t)
            .into_iter()
            .map(S::cst)
            .collect();
        if loads.has_dead() {
            let x3 = superpose(&basis.psi2l, q2);
            let k = kinematics(args.tree, basis, &x3, args.rotation_threshold);
            for (e, d) in eta.iter_mut().zip(loads.dead_modal(basis, &k.cab, t)) {
                *e += d;
            }
        }
        for (ri, e) in r.iter_mut().zip(eta) {
            *ri += args.load_factor * e;
        }
    }

    if let Some(aero) = &args.aero {
        aero.a0hat.matvec_add_into(&args.displacement(q2), &mut r);
    }
    r
}

/// Time derivative of `[q1, q2, ql]`.
pub fn dynamic_rhs<S: Scalar>(args: &DqArgs<'_, S>, t: f64, q: &[S]) -> Vec<S> {
    let basis = args.basis;
    let layout = &args.layout;
    let b = layout.split(q);
    let nm = layout.num_modes;

    let g1 = args.couplings.gamma1.contract_last(b.q1, b.q1);
    let g2 = args.couplings.gamma2.contract_last(b.q2, b.q2);
    let g2t = args.couplings.gamma2.contract_first(b.q1, b.q2);

    let mut f1: Vec<S> = (0..nm)
        .map(|k| S::cst(basis.omega[k]) * b.q2[k] - g1[k] - g2[k])
        .collect();
    let f2: Vec<S> = (0..nm)
        .map(|k| -S::cst(basis.omega[k]) * b.q1[k] + g2t[k])
        .collect();

    if let Some(aero) = &args.aero {
        aero.a0hat.matvec_add_into(&args.displacement(b.q2), &mut f1);
        aero.a1hat.matvec_add_into(b.q1, &mut f1);
        for lag in b.ql.chunks(nm) {
            for (f, l) in f1.iter_mut().zip(lag) {
                *f += *l;
            }
        }
    }
    if let Some(gust) = &args.gust {
        for (f, g) in f1.iter_mut().zip(gust.sum_at(t)) {
            *f += g;
        }
    }
    if let Some(loads) = args.loads {
        for (f, e) in f1.iter_mut().zip(loads.follower_modal(basis, t)) {
            *f += args.load_factor * S::cst(e);
        }
    }

    let mut dq = Vec::with_capacity(layout.size());
    match &args.aero {
        Some(aero) => dq.extend(aero.a2hat_inv.matvec(&f1)),
        None => dq.extend(f1),
    }
    dq.extend(f2);

    if let Some(aero) = &args.aero {
        let gust_lag = args.gust.as_ref().map(|g| g.lag_at(t));
        for p in 0..layout.num_poles {
            let mut dl = aero.a3hat[p].matvec(b.q1);
            let rate = aero.lag_rate(p);
            let lag = &q[layout.ql_pole(p)];
            for (d, l) in dl.iter_mut().zip(lag) {
                *d -= rate * *l;
            }
            if let Some(g) = &gust_lag {
                for (d, w) in dl.iter_mut().zip(&g[p * nm..(p + 1) * nm]) {
                    *d += *w;
                }
            }
            dq.extend(dl);
        }
    }
    dq
}

/// Static equilibrium as a root-finding problem over load steps.
pub struct StaticEquation<'a, S: Scalar> {
    args: DqArgs<'a, S>,
    /// Value copy of `args` in dual numbers for the Newton Jacobian.
    tangent: DqArgs<'a, Dual>,
}

impl<'a, S: Scalar> StaticEquation<'a, S> {
    pub fn new(args: DqArgs<'a, S>) -> IntrinsicResult<Self> {
        if args.layout.equation != EquationKind::Static {
            return Err(IntrinsicError::configuration(
                "static equation needs a static state layout",
            ));
        }
        args.check()?;
        let tangent = args.map_scalar(|v| Dual::new(v.value(), 0.0));
        Ok(Self { args, tangent })
    }

    pub fn args(&self) -> &DqArgs<'a, S> {
        &self.args
    }
}

impl<S: Scalar> RootSystem<S> for StaticEquation<'_, S> {
    fn dimension(&self) -> usize {
        self.args.layout.size()
    }

    fn residual(&self, t: f64, q: &[S]) -> SolverResult<Vec<S>> {
        Ok(static_residual(&self.args, t, q))
    }

    fn jacobian(&self, t: f64, q: &[f64]) -> SolverResult<DenseMatrix<f64>> {
        forward_jacobian(q, |x| Ok(static_residual(&self.tangent, t, x)))
    }
}

/// Time-marching form of the dynamic equations.
pub struct DynamicEquation<'a, S: Scalar> {
    args: DqArgs<'a, S>,
}

impl<'a, S: Scalar> DynamicEquation<'a, S> {
    pub fn new(args: DqArgs<'a, S>) -> IntrinsicResult<Self> {
        if args.layout.equation != EquationKind::Dynamic {
            return Err(IntrinsicError::configuration(
                "dynamic equation needs a dynamic state layout",
            ));
        }
        args.check()?;
        Ok(Self { args })
    }

    pub fn args(&self) -> &DqArgs<'a, S> {
        &self.args
    }
}

impl<S: Scalar> OdeSystem<S> for DynamicEquation<'_, S> {
    fn dimension(&self) -> usize {
        self.args.layout.size()
    }

    fn rhs(&self, t: f64, q: &[S]) -> SolverResult<Vec<S>> {
        Ok(dynamic_rhs(&self.args, t, q))
    }
}
