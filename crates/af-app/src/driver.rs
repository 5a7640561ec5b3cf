//! The driver: a validated configuration walked through its stages.
//!
//! ```text
//! Created --pre_simulate--> PreSimulated --run_cases--> Run --finish--> Done
//! ```
//!
//! `reset` returns to `Created` from any state with a fresh store.

use crate::error::{AppError, AppResult, CaseContext};
use crate::presim::{prepare_aero, prepare_structure};
use crate::simulation::schedule;
use crate::stages::{DriverState, Stage};
use crate::systems::System;
use af_aero::RawAero;
use af_config::Config;
use af_core::timing::{StageTimings, Timer};
use af_intrinsic::Structure;
use af_results::SolutionStore;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct Driver {
    config: Config,
    state: DriverState,
    store: SolutionStore,
    systems: Vec<System>,
    structure: Option<Arc<Structure>>,
    aero: BTreeMap<String, RawAero>,
    timings: StageTimings,
}

fn open_store(config: &Config) -> AppResult<SolutionStore> {
    let store = match &config.driver.sol_path {
        Some(path) => SolutionStore::open(path.clone())?,
        None => SolutionStore::in_memory(),
    };
    if let Some(path) = store.write_config_snapshot(&config.to_yaml_string()?)? {
        tracing::debug!(path = %path.display(), "configuration snapshot written");
    }
    Ok(store)
}

impl Driver {
    /// Validates `config`, opens the solution store and instantiates systems.
    pub fn new(config: Config) -> AppResult<Self> {
        config.validate()?;
        let systems = config
            .systems
            .iter()
            .map(|(name, sys)| System::new(name, sys).in_case(name, Stage::BuildingCase))
            .collect::<AppResult<Vec<_>>>()?;
        let store = open_store(&config)?;
        tracing::info!(
            systems = systems.len(),
            simulation = ?config.simulation.kind,
            "driver created"
        );
        Ok(Self {
            config,
            state: DriverState::Created,
            store,
            systems,
            structure: None,
            aero: BTreeMap::new(),
            timings: StageTimings::default(),
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn systems(&self) -> &[System] {
        &self.systems
    }

    pub fn store(&self) -> &SolutionStore {
        &self.store
    }

    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    fn expect_state(&self, want: DriverState, action: &'static str) -> AppResult<()> {
        if self.state == want {
            Ok(())
        } else {
            Err(AppError::Transition {
                state: self.state,
                action,
            })
        }
    }

    fn transition(&mut self, to: DriverState) {
        tracing::info!(from = %self.state, to = %to, "driver transition");
        self.state = to;
    }

    /// Modes, couplings and the modal aerodynamics of every system.
    pub fn pre_simulate(&mut self) -> AppResult<()> {
        self.expect_state(DriverState::Created, "pre-simulate")?;
        let structure = prepare_structure(&self.config, &mut self.store, &mut self.timings)?;
        let num_modes = structure.basis.num_modes();

        let mut aero = BTreeMap::new();
        for system in &self.systems {
            if let Some(cfg) = &system.config.aero {
                let raw = prepare_aero(
                    &system.name,
                    cfg,
                    num_modes,
                    &self.config.driver,
                    &mut self.store,
                    &mut self.timings,
                )?;
                aero.insert(system.name.clone(), raw);
            }
        }

        self.structure = Some(structure);
        self.aero = aero;
        self.transition(DriverState::PreSimulated);
        Ok(())
    }

    /// Builds and solves every scheduled system.
    pub fn run_cases(&mut self) -> AppResult<()> {
        self.expect_state(DriverState::PreSimulated, "run cases")?;
        let structure = self
            .structure
            .clone()
            .ok_or(AppError::Transition {
                state: self.state,
                action: "run cases without a structure",
            })?;
        let order = schedule(self.config.simulation.kind, &self.systems)?;

        for index in order {
            let system = &self.systems[index];
            let case = system
                .build_case(Arc::clone(&structure), self.aero.get(&system.name).cloned())
                .in_case(&system.name, Stage::BuildingCase)?;
            let timer = Timer::start("system");
            system.run(&case, &mut self.store)?;
            self.timings
                .record(format!("system:{}", system.name), timer.stop());
        }

        self.transition(DriverState::Run);
        Ok(())
    }

    pub fn finish(&mut self) -> AppResult<()> {
        self.expect_state(DriverState::Run, "finish")?;
        tracing::info!(
            containers = self.store.keys().count(),
            "simulation finished"
        );
        self.transition(DriverState::Done);
        Ok(())
    }

    /// Back to `Created` with a reopened store and no prepared inputs.
    pub fn reset(&mut self) -> AppResult<()> {
        self.store = open_store(&self.config)?;
        self.structure = None;
        self.aero.clear();
        self.timings = StageTimings::default();
        self.transition(DriverState::Created);
        Ok(())
    }

    /// Runs every remaining stage.
    pub fn run_to_completion(&mut self) -> AppResult<()> {
        if self.state == DriverState::Created {
            self.pre_simulate()?;
        }
        if self.state == DriverState::PreSimulated {
            self.run_cases()?;
        }
        if self.state == DriverState::Run {
            self.finish()?;
        }
        Ok(())
    }

    pub fn into_store(self) -> AppResult<SolutionStore> {
        self.expect_state(DriverState::Done, "hand over the store")?;
        Ok(self.store)
    }
}
