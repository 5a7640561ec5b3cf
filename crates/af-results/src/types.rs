//! Container schema.

use af_core::ArrayData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Modes,
    Couplings,
    ModalAero,
    StaticSystem,
    DynamicSystem,
    ShardSystem,
}

impl ContainerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerKind::Modes => "Modes",
            ContainerKind::Couplings => "Couplings",
            ContainerKind::ModalAero => "ModalAero",
            ContainerKind::StaticSystem => "StaticSystem",
            ContainerKind::DynamicSystem => "DynamicSystem",
            ContainerKind::ShardSystem => "ShardSystem",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerKey {
    pub kind: ContainerKind,
    pub label: String,
}

impl ContainerKey {
    pub fn new(kind: ContainerKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
        }
    }

    /// Directory name under the solution path, `<Kind><label>`.
    pub fn dir_name(&self) -> String {
        format!("{}{}", self.kind, self.label)
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}[{}]", self.kind, self.label)
        }
    }
}

/// Committed group of arrays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    pub arrays: BTreeMap<String, ArrayData>,
    /// Digest of the inputs the container was computed from.
    pub fingerprint: Option<String>,
}

impl Container {
    pub fn get(&self, name: &str) -> Option<&ArrayData> {
        self.arrays.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayEntry {
    pub file: String,
    pub shape: Vec<usize>,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub key: ContainerKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub timestamp: String,
    pub writer_version: String,
    pub arrays: BTreeMap<String, ArrayEntry>,
}
