//! Layout of the modal state vector.
//!
//! Dynamic states are `[q1, q2, ql]` with the lag states pole-major
//! (`ql[p * num_modes + k]`); static states are `q2` alone.

use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquationKind {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLayout {
    pub equation: EquationKind,
    pub num_modes: usize,
    /// Lag poles carried as states; zero without unsteady aerodynamics.
    pub num_poles: usize,
}

/// Borrowed views of the blocks of one state vector.
#[derive(Debug, Clone, Copy)]
pub struct StateBlocks<'a, S> {
    /// Empty for static states.
    pub q1: &'a [S],
    pub q2: &'a [S],
    pub ql: &'a [S],
}

impl StateLayout {
    pub fn static_layout(num_modes: usize) -> Self {
        Self {
            equation: EquationKind::Static,
            num_modes,
            num_poles: 0,
        }
    }

    pub fn dynamic(num_modes: usize, num_poles: usize) -> Self {
        Self {
            equation: EquationKind::Dynamic,
            num_modes,
            num_poles,
        }
    }

    pub fn size(&self) -> usize {
        match self.equation {
            EquationKind::Static => self.num_modes,
            EquationKind::Dynamic => self.num_modes * (2 + self.num_poles),
        }
    }

    pub fn q1(&self) -> Range<usize> {
        match self.equation {
            EquationKind::Static => 0..0,
            EquationKind::Dynamic => 0..self.num_modes,
        }
    }

    pub fn q2(&self) -> Range<usize> {
        match self.equation {
            EquationKind::Static => 0..self.num_modes,
            EquationKind::Dynamic => self.num_modes..2 * self.num_modes,
        }
    }

    /// All lag states.
    pub fn ql(&self) -> Range<usize> {
        match self.equation {
            EquationKind::Static => 0..0,
            EquationKind::Dynamic => 2 * self.num_modes..self.size(),
        }
    }

    /// Lag states of pole `p`.
    pub fn ql_pole(&self, p: usize) -> Range<usize> {
        let start = self.ql().start + p * self.num_modes;
        start..start + self.num_modes
    }

    pub fn split<'a, S>(&self, q: &'a [S]) -> StateBlocks<'a, S> {
        StateBlocks {
            q1: &q[self.q1()],
            q2: &q[self.q2()],
            ql: &q[self.ql()],
        }
    }
}
