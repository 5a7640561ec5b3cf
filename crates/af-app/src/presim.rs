//! Pre-simulation: modes, couplings and modal aerodynamics.
//!
//! Each stage either computes its containers (and optionally persists them)
//! or loads them from the solution directory. Loaded containers must carry
//! the fingerprint of the current inputs.

use crate::error::{AppError, AppResult, CaseContext};
use crate::inputs::{aero_inputs, fem_inputs};
use crate::stages::Stage;
use af_aero::RawAero;
use af_config::{AeroConfig, Config, DriverConfig};
use af_core::ArrayData;
use af_core::timing::{StageTimings, Timer};
use af_fem::{CouplingTensors, ModalBasis, Tensor3, build_couplings, check_alphas, compute_modes};
use af_intrinsic::Structure;
use af_results::{Container, ContainerKey, ContainerKind, SolutionStore};
use std::sync::Arc;

const FEM_CASE: &str = "fem";

fn commit(
    store: &mut SolutionStore,
    kind: ContainerKind,
    label: &str,
    arrays: Vec<(&'static str, ArrayData)>,
    fingerprint: &str,
) -> AppResult<()> {
    let mut slot = store.claim(kind, label)?;
    slot.extend(arrays);
    slot.set_fingerprint(fingerprint);
    store.commit(slot)?;
    Ok(())
}

/// Loads a saved container after checking its fingerprint.
fn load_checked<'s>(
    store: &'s mut SolutionStore,
    kind: ContainerKind,
    label: &str,
    expected: &str,
) -> AppResult<&'s Container> {
    let manifest = store.load_manifest(kind, label)?;
    if manifest.fingerprint.as_deref() != Some(expected) {
        return Err(AppError::StaleCache {
            key: ContainerKey::new(kind, label),
            stored: manifest.fingerprint.unwrap_or_else(|| "none".to_string()),
            expected: expected.to_string(),
        });
    }
    Ok(store.load(kind, label)?)
}

fn couplings_arrays(c: &CouplingTensors) -> Vec<(&'static str, ArrayData)> {
    vec![("gamma1", c.gamma1.to_array()), ("gamma2", c.gamma2.to_array())]
}

fn couplings_from(container: &Container, num_modes: usize) -> AppResult<CouplingTensors> {
    let tensor = |name: &str| {
        container
            .get(name)
            .and_then(|a| {
                (a.shape == [num_modes; 3])
                    .then(|| Tensor3::from_data(num_modes, a.data.clone()))
                    .flatten()
            })
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "stored coupling '{name}' is missing or not {num_modes}^3"
                ))
            })
    };
    Ok(CouplingTensors {
        gamma1: tensor("gamma1")?,
        gamma2: tensor("gamma2")?,
    })
}

/// Modes and couplings, computed or loaded per `driver.compute_fem`.
pub fn prepare_structure(
    config: &Config,
    store: &mut SolutionStore,
    timings: &mut StageTimings,
) -> AppResult<Arc<Structure>> {
    let fem = &config.fem;
    let driver = &config.driver;
    let inputs = fem_inputs(fem).in_case(FEM_CASE, Stage::ReadingInputs)?;
    let fp = inputs.fingerprint.as_str();

    let (basis, couplings) = if driver.compute_fem {
        let timer = Timer::start("modes");
        let basis = compute_modes(&inputs.input, &inputs.source, fem.num_modes)
            .in_case(FEM_CASE, Stage::Modes)?;
        let report = check_alphas(&basis, fem.alpha_tolerance, fem.tolerate_inconsistency)
            .in_case(FEM_CASE, Stage::Modes)?;
        timings.record("modes", timer.stop());
        tracing::info!(
            num_modes = basis.num_modes(),
            alpha1 = report.alpha1,
            alpha2 = report.alpha2,
            "modes computed"
        );

        let timer = Timer::start("couplings");
        let couplings = build_couplings(&basis);
        timings.record("couplings", timer.stop());

        commit(store, ContainerKind::Modes, "", basis.to_arrays(), fp)
            .in_case(FEM_CASE, Stage::Storing)?;
        commit(store, ContainerKind::Couplings, "", couplings_arrays(&couplings), fp)
            .in_case(FEM_CASE, Stage::Storing)?;
        if driver.save_fem {
            store
                .save(ContainerKind::Modes, "")
                .and_then(|_| store.save(ContainerKind::Couplings, ""))
                .in_case(FEM_CASE, Stage::Storing)?;
        }
        (basis, couplings)
    } else {
        let basis = load_checked(store, ContainerKind::Modes, "", fp)
            .and_then(|c| Ok(ModalBasis::from_arrays(&c.arrays)?))
            .in_case(FEM_CASE, Stage::Modes)?;
        let nodes = inputs.input.tree.num_nodes();
        if basis.num_modes() != fem.num_modes || basis.num_nodes() != nodes {
            return Err(AppError::InvalidInput(format!(
                "stored modes have {} modes on {} nodes, configuration asks for {} on {nodes}",
                basis.num_modes(),
                basis.num_nodes(),
                fem.num_modes
            )))
            .in_case(FEM_CASE, Stage::Modes);
        }
        let couplings = load_checked(store, ContainerKind::Couplings, "", fp)
            .and_then(|c| couplings_from(c, fem.num_modes))
            .in_case(FEM_CASE, Stage::Couplings)?;
        tracing::info!(num_modes = fem.num_modes, "modes and couplings loaded from cache");
        (basis, couplings)
    };

    Ok(Arc::new(Structure {
        tree: inputs.input.tree,
        basis,
        couplings,
    }))
}

/// Raw aerodynamic matrices of one system, computed or loaded per
/// `driver.compute_modalaero`.
pub fn prepare_aero(
    name: &str,
    aero: &AeroConfig,
    num_modes: usize,
    driver: &DriverConfig,
    store: &mut SolutionStore,
    timings: &mut StageTimings,
) -> AppResult<RawAero> {
    let timer = Timer::start("modal_aero");
    let inputs = aero_inputs(aero).in_case(name, Stage::ReadingInputs)?;

    let raw = if driver.compute_modalaero {
        commit(
            store,
            ContainerKind::ModalAero,
            name,
            inputs.raw.to_arrays(),
            &inputs.fingerprint,
        )
        .in_case(name, Stage::Storing)?;
        if driver.save_modalaero {
            store
                .save(ContainerKind::ModalAero, name)
                .in_case(name, Stage::Storing)?;
        }
        inputs.raw
    } else {
        let container = load_checked(store, ContainerKind::ModalAero, name, &inputs.fingerprint)
            .in_case(name, Stage::ModalAero)?;
        let a = container.get("A");
        let poles = container.get("poles");
        match (a, poles) {
            (Some(a), Some(poles)) => {
                RawAero::from_arrays(a, container.get("D"), poles).in_case(name, Stage::ModalAero)?
            }
            _ => {
                return Err(AppError::InvalidInput(
                    "stored modal aerodynamics lack 'A' or 'poles'".to_string(),
                ))
                .in_case(name, Stage::ModalAero);
            }
        }
    };

    if raw.num_modes() != num_modes {
        return Err(AppError::InvalidInput(format!(
            "aerodynamic matrices have {} modes, structure {num_modes}",
            raw.num_modes()
        )))
        .in_case(name, Stage::ModalAero);
    }
    timings.record(format!("modal_aero {name}"), timer.stop());
    tracing::info!(system = name, poles = raw.num_poles(), "modal aerodynamics ready");
    Ok(raw)
}
