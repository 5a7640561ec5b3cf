//! Content digests for stored arrays and cache fingerprints.

use af_core::ArrayData;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Incremental digest of the inputs a container depends on.
///
/// Every part is length-prefixed so that adjacent parts cannot alias.
#[derive(Clone, Default)]
pub struct Fingerprinter {
    hasher: Sha256,
}

impl Fingerprinter {
    pub fn new(domain: &str) -> Self {
        let mut f = Self::default();
        f.update_str(domain);
        f
    }

    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.update_bytes(s.as_bytes())
    }

    pub fn update_f64s(&mut self, values: &[f64]) -> &mut Self {
        self.hasher.update((values.len() as u64).to_le_bytes());
        for v in values {
            self.hasher.update(v.to_bits().to_le_bytes());
        }
        self
    }

    pub fn update_array(&mut self, array: &ArrayData) -> &mut Self {
        let shape: Vec<u8> = array
            .shape
            .iter()
            .flat_map(|n| (*n as u64).to_le_bytes())
            .collect();
        self.update_bytes(&shape);
        self.update_f64s(&array.data)
    }

    /// Digests the JSON encoding of `value`.
    pub fn update_json<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<&mut Self> {
        let json = serde_json::to_string(value)?;
        Ok(self.update_str(&json))
    }

    pub fn finish(&self) -> String {
        format!("{:x}", self.hasher.clone().finalize())
    }

    fn update_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }
}
