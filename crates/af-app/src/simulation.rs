//! Simulation kinds: how the configured systems are scheduled.

use crate::error::{AppError, AppResult};
use crate::systems::{System, SystemKind};
use af_config::SimulationKind;

type Scheduler = fn(&[System]) -> AppResult<Vec<usize>>;

pub const SIMULATIONS: &[(SimulationKind, Scheduler)] = &[
    (SimulationKind::Single, single),
    (SimulationKind::Serial, serial),
    (SimulationKind::Shard, shard),
];

fn single(systems: &[System]) -> AppResult<Vec<usize>> {
    match systems.len() {
        1 => Ok(vec![0]),
        n => Err(AppError::InvalidInput(format!(
            "single simulation runs exactly one system, {n} configured"
        ))),
    }
}

/// Systems in name order; each starts from its own initial state.
fn serial(systems: &[System]) -> AppResult<Vec<usize>> {
    Ok((0..systems.len()).collect())
}

fn shard(systems: &[System]) -> AppResult<Vec<usize>> {
    if let Some(s) = systems.iter().find(|s| s.kind != SystemKind::Shard) {
        return Err(AppError::InvalidInput(format!(
            "shard simulation needs a parameter table on every system, '{}' has none",
            s.name
        )));
    }
    Ok((0..systems.len()).collect())
}

/// Order in which `systems` run.
pub fn schedule(kind: SimulationKind, systems: &[System]) -> AppResult<Vec<usize>> {
    let (_, scheduler) = SIMULATIONS
        .iter()
        .find(|(k, _)| *k == kind)
        .ok_or_else(|| AppError::InvalidInput(format!("no simulation registered for {kind:?}")))?;
    if systems.is_empty() {
        return Err(AppError::InvalidInput("no systems configured".to_string()));
    }
    scheduler(systems)
}
