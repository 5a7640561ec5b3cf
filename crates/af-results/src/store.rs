//! Solution store API.

use crate::array_io::{read_array, write_array};
use crate::types::{ArrayEntry, Container, ContainerKey, ContainerKind, Manifest};
use crate::{ResultsError, ResultsResult};
use af_core::ArrayData;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST: &str = "manifest.json";
const CONFIG_SNAPSHOT: &str = "config.yaml";

/// Exclusive write access to one container key.
///
/// Obtained from [`SolutionStore::claim`] and handed back through
/// [`SolutionStore::commit`]; until then nobody else can write the key.
#[derive(Debug)]
#[must_use = "a claimed slot must be committed or released"]
pub struct ContainerSlot {
    key: ContainerKey,
    container: Container,
}

impl ContainerSlot {
    pub fn key(&self) -> &ContainerKey {
        &self.key
    }

    pub fn insert(&mut self, name: impl Into<String>, array: ArrayData) -> &mut Self {
        self.container.arrays.insert(name.into(), array);
        self
    }

    pub fn extend<N: Into<String>>(&mut self, arrays: impl IntoIterator<Item = (N, ArrayData)>) {
        for (name, array) in arrays {
            self.insert(name, array);
        }
    }

    pub fn set_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.container.fingerprint = Some(fingerprint.into());
    }
}

/// In-memory containers, optionally backed by a directory.
#[derive(Debug, Default)]
pub struct SolutionStore {
    root_dir: Option<PathBuf>,
    containers: BTreeMap<ContainerKey, Container>,
    claimed: BTreeSet<ContainerKey>,
}

impl SolutionStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens (and creates) the solution directory.
    pub fn open(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self {
            root_dir: Some(root_dir),
            ..Default::default()
        })
    }

    pub fn root_dir(&self) -> Option<&Path> {
        self.root_dir.as_deref()
    }

    /// Reserves `(kind, label)` for a single writer.
    pub fn claim(&mut self, kind: ContainerKind, label: &str) -> ResultsResult<ContainerSlot> {
        check_label(label)?;
        let key = ContainerKey::new(kind, label);
        if self.containers.contains_key(&key) || self.claimed.contains(&key) {
            return Err(ResultsError::AlreadyWritten { key });
        }
        self.claimed.insert(key.clone());
        Ok(ContainerSlot {
            key,
            container: Container::default(),
        })
    }

    pub fn commit(&mut self, slot: ContainerSlot) -> ResultsResult<&Container> {
        let ContainerSlot { key, container } = slot;
        if !self.claimed.remove(&key) || self.containers.contains_key(&key) {
            return Err(ResultsError::AlreadyWritten { key });
        }
        tracing::debug!(container = %key, arrays = container.len(), "committed container");
        Ok(self.containers.entry(key).or_insert(container))
    }

    /// Drops a slot without writing; the key becomes claimable again.
    pub fn release(&mut self, slot: ContainerSlot) {
        self.claimed.remove(&slot.key);
    }

    pub fn contains(&self, kind: ContainerKind, label: &str) -> bool {
        self.containers.contains_key(&ContainerKey::new(kind, label))
    }

    pub fn get(&self, kind: ContainerKind, label: &str) -> ResultsResult<&Container> {
        let key = ContainerKey::new(kind, label);
        self.containers
            .get(&key)
            .ok_or(ResultsError::ContainerNotFound { key })
    }

    pub fn keys(&self) -> impl Iterator<Item = &ContainerKey> {
        self.containers.keys()
    }

    /// Persists a committed container under `<root>/<Kind><label>/`.
    pub fn save(&self, kind: ContainerKind, label: &str) -> ResultsResult<PathBuf> {
        let key = ContainerKey::new(kind, label);
        let container = self.get(kind, label)?;
        let dir = self.container_dir(&key)?;
        fs::create_dir_all(&dir)?;

        let mut arrays = BTreeMap::new();
        for (name, array) in &container.arrays {
            let file = format!("{name}.json");
            let sha256 = write_array(&dir.join(&file), name, array)?;
            arrays.insert(
                name.clone(),
                ArrayEntry {
                    file,
                    shape: array.shape.clone(),
                    sha256,
                },
            );
        }
        let manifest = Manifest {
            key: key.clone(),
            fingerprint: container.fingerprint.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            writer_version: env!("CARGO_PKG_VERSION").to_string(),
            arrays,
        };
        fs::write(dir.join(MANIFEST), serde_json::to_string_pretty(&manifest)?)?;
        tracing::info!(container = %key, dir = %dir.display(), "saved container");
        Ok(dir)
    }

    pub fn has_saved(&self, kind: ContainerKind, label: &str) -> bool {
        self.container_dir(&ContainerKey::new(kind, label))
            .is_ok_and(|dir| dir.join(MANIFEST).exists())
    }

    pub fn load_manifest(&self, kind: ContainerKind, label: &str) -> ResultsResult<Manifest> {
        let key = ContainerKey::new(kind, label);
        let path = self.container_dir(&key)?.join(MANIFEST);
        if !path.exists() {
            return Err(ResultsError::ContainerNotFound { key });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Reads a saved container, verifies every checksum and commits it.
    pub fn load(&mut self, kind: ContainerKind, label: &str) -> ResultsResult<&Container> {
        let manifest = self.load_manifest(kind, label)?;
        let dir = self.container_dir(&manifest.key)?;
        let mut slot = self.claim(kind, label)?;
        for (name, entry) in &manifest.arrays {
            let path = dir.join(&entry.file);
            let read = read_array(&path).and_then(|(array, digest)| {
                if digest != entry.sha256 {
                    return Err(ResultsError::Checksum {
                        path: path.clone(),
                        expected: entry.sha256.clone(),
                        actual: digest,
                    });
                }
                Ok(array)
            });
            match read {
                Ok(array) => {
                    slot.insert(name.clone(), array);
                }
                Err(e) => {
                    self.release(slot);
                    return Err(e);
                }
            }
        }
        if let Some(fp) = manifest.fingerprint {
            slot.set_fingerprint(fp);
        }
        tracing::info!(container = %manifest.key, "loaded container");
        self.commit(slot)
    }

    /// Writes the resolved configuration next to the containers.
    pub fn write_config_snapshot(&self, yaml: &str) -> ResultsResult<Option<PathBuf>> {
        let Some(root) = &self.root_dir else {
            return Ok(None);
        };
        let path = root.join(CONFIG_SNAPSHOT);
        fs::write(&path, yaml)?;
        Ok(Some(path))
    }

    fn container_dir(&self, key: &ContainerKey) -> ResultsResult<PathBuf> {
        let root = self
            .root_dir
            .as_ref()
            .ok_or_else(|| ResultsError::ContainerNotFound { key: key.clone() })?;
        Ok(root.join(key.dir_name()))
    }
}

fn check_label(label: &str) -> ResultsResult<()> {
    let bad = label == "." || label == ".." || label.chars().any(|c| matches!(c, '/' | '\\') || c.is_control());
    if bad {
        return Err(ResultsError::InvalidLabel {
            label: label.to_string(),
        });
    }
    Ok(())
}
