//! Driver states and the pipeline stages errors are reported against.

use std::fmt;

/// `Created → PreSimulated → Run → Done`; `reset` returns to `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    Created,
    PreSimulated,
    Run,
    Done,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Created => "created",
            DriverState::PreSimulated => "pre-simulated",
            DriverState::Run => "run",
            DriverState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ReadingInputs,
    Modes,
    Couplings,
    ModalAero,
    BuildingCase,
    Solving,
    Storing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ReadingInputs => "reading inputs",
            Stage::Modes => "computing modes",
            Stage::Couplings => "building couplings",
            Stage::ModalAero => "preparing modal aerodynamics",
            Stage::BuildingCase => "building the case",
            Stage::Solving => "solving",
            Stage::Storing => "storing results",
        };
        f.write_str(name)
    }
}
