//! Orchestration for intrinsic modal aeroelastic simulations.
//!
//! A [`Driver`] takes a validated [`Config`] through pre-simulation (modes,
//! couplings, modal aerodynamics), the configured systems and into a
//! [`SolutionStore`]. Stage crates stay free of file and configuration
//! concerns; this crate owns them.

pub mod driver;
pub mod error;
pub mod inputs;
pub mod presim;
pub mod simulation;
pub mod stages;
pub mod systems;

pub use driver::Driver;
pub use error::{AppError, AppResult, CaseContext};
pub use simulation::{SIMULATIONS, schedule};
pub use stages::{DriverState, Stage};
pub use systems::{SYSTEM_KINDS, System, SystemKind};

use af_config::Config;
use af_results::SolutionStore;
use std::path::Path;

/// Runs `config` to completion and hands back its results.
pub fn run(config: Config) -> AppResult<SolutionStore> {
    let mut driver = Driver::new(config)?;
    driver.run_to_completion()?;
    driver.into_store()
}

/// Loads a YAML configuration and runs it.
pub fn run_yaml(path: &Path) -> AppResult<SolutionStore> {
    run(af_config::load_yaml(path)?)
}
