//! One case as a pure function of the physical parameters.
//!
//! `evaluate` chains aero scaling, gust synthesis, the state equation, the
//! solver backend and field recovery. The structure (tree, modes, couplings)
//! is a shared constant; only the parameters carry the scalar type.

use crate::dq::{DqArgs, DynamicEquation, StaticEquation};
use crate::error::{IntrinsicError, IntrinsicResult};
use crate::fields::{Fields, recover_fields};
use crate::objectives::Objective;
use crate::params::Parameters;
use crate::states::{EquationKind, StateLayout};
use crate::xloads::ExternalLoads;
use af_aero::{GustSettings, PanelGeometry, RawAero, build_gust, project_gust, scale_aero, time_grid};
use af_core::Scalar;
use af_core::timing::Timer;
use af_fem::{BeamTree, CouplingTensors, ModalBasis};
use af_solver::{Backend, Problem, SolverSettings, StateMatrix};
use std::sync::Arc;

/// Reduced structural model shared by every case.
#[derive(Debug, Clone)]
pub struct Structure {
    pub tree: BeamTree,
    pub basis: ModalBasis,
    pub couplings: CouplingTensors,
}

#[derive(Debug, Clone)]
pub struct GustCase {
    pub settings: GustSettings,
    pub geometry: PanelGeometry,
}

#[derive(Debug, Clone)]
pub struct AeroCase {
    pub raw: RawAero,
    pub c_ref: f64,
    /// Relative pivot tolerance for `I - A2hat`.
    pub singular_tol: f64,
    pub gust: Option<GustCase>,
}

/// Everything about a case that is not differentiated.
#[derive(Debug, Clone)]
pub struct CaseData {
    pub structure: Arc<Structure>,
    pub equation: EquationKind,
    pub backend: Backend,
    pub settings: SolverSettings,
    /// Output times (dynamic) or load steps (static).
    pub grid: Vec<f64>,
    pub aero: Option<AeroCase>,
    pub loads: Option<ExternalLoads>,
    /// Values that fix the gust time grid.
    pub nominal: Parameters<f64>,
    pub rotation_threshold: f64,
}

impl CaseData {
    pub fn layout(&self) -> StateLayout {
        let nm = self.structure.basis.num_modes();
        match self.equation {
            EquationKind::Static => StateLayout::static_layout(nm),
            EquationKind::Dynamic => {
                StateLayout::dynamic(nm, self.aero.as_ref().map_or(0, |a| a.raw.num_poles()))
            }
        }
    }

    /// Zero state of the right length.
    pub fn zero_state(&self) -> Vec<f64> {
        vec![0.0; self.layout().size()]
    }
}

/// Solved trajectory, recovered fields and objective of one evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation<S> {
    pub states: StateMatrix<S>,
    pub fields: Fields<S>,
    /// Empty without an objective.
    pub objective: Vec<S>,
}

pub fn evaluate<S: Scalar>(
    params: &Parameters<S>,
    q0: &[f64],
    case: &CaseData,
    objective: Option<&Objective>,
) -> IntrinsicResult<Evaluation<S>> {
    let structure = case.structure.as_ref();
    let layout = case.layout();
    if q0.len() != layout.size() {
        return Err(IntrinsicError::configuration(format!(
            "initial state has {} entries, {:?} system with {} modes and {} poles needs {}",
            q0.len(),
            layout.equation,
            layout.num_modes,
            layout.num_poles,
            layout.size()
        )));
    }
    if let Some(obj) = objective {
        obj.check(structure.tree.num_nodes())?;
    }

    let mut aero = None;
    let mut gust = None;
    if let Some(ac) = &case.aero {
        let model = scale_aero(&ac.raw, params.u_inf, params.rho_inf, ac.c_ref, ac.singular_tol)?;
        if let Some(gc) = &ac.gust {
            if case.equation == EquationKind::Dynamic {
                let time = time_grid(
                    &gc.settings,
                    &gc.geometry,
                    case.nominal.gust_length,
                    case.nominal.u_inf,
                )?;
                let g = build_gust(
                    &gc.settings,
                    &gc.geometry,
                    &time,
                    params.gust_intensity,
                    params.gust_length,
                    params.u_inf,
                );
                gust = Some(project_gust(&model, &g)?);
            }
        }
        aero = Some(model);
    }

    let args = DqArgs {
        basis: &structure.basis,
        couplings: &structure.couplings,
        tree: &structure.tree,
        layout,
        aero,
        gust,
        loads: case.loads.as_ref(),
        load_factor: params.load_factor,
        rotation_threshold: case.rotation_threshold,
    };
    let q0: Vec<S> = q0.iter().map(|v| S::cst(*v)).collect();

    let timer = Timer::start("solve");
    let raw = match case.equation {
        EquationKind::Static => {
            let eq = StaticEquation::new(args)?;
            case.backend
                .solve(Problem::Root(&eq), &case.settings, &q0, &case.grid)?
        }
        EquationKind::Dynamic => {
            let eq = DynamicEquation::new(args)?;
            case.backend
                .solve(Problem::Ode(&eq), &case.settings, &q0, &case.grid)?
        }
    };
    timer.stop();
    let states = case.backend.pull_states(raw);

    let fields = recover_fields(
        &structure.tree,
        &structure.basis,
        &layout,
        &states,
        case.rotation_threshold,
    );
    let objective = match objective {
        Some(obj) => obj.evaluate(&fields)?,
        None => Vec::new(),
    };
    Ok(Evaluation {
        states,
        fields,
        objective,
    })
}
