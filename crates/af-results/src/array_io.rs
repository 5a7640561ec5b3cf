//! One array per JSON file.
//!
//! Floats are written in shortest round-trip form and parsed with
//! `float_roundtrip`, so a stored array reads back bit for bit.

use crate::hash::sha256_hex;
use crate::{ResultsError, ResultsResult};
use af_core::ArrayData;
use std::fs;
use std::path::Path;

/// Writes `array` to `path` and returns the SHA-256 of the bytes written.
pub fn write_array(path: &Path, name: &str, array: &ArrayData) -> ResultsResult<String> {
    if !array.all_finite() {
        return Err(ResultsError::NonFinite {
            name: name.to_string(),
        });
    }
    let bytes = serde_json::to_vec(array)?;
    fs::write(path, &bytes)?;
    Ok(sha256_hex(&bytes))
}

/// Reads an array and the SHA-256 of the file content.
pub fn read_array(path: &Path) -> ResultsResult<(ArrayData, String)> {
    let bytes = fs::read(path)?;
    let digest = sha256_hex(&bytes);
    let raw: ArrayData = serde_json::from_slice(&bytes)?;
    // shape and data length must agree
    let array = ArrayData::new(raw.shape, raw.data).map_err(|source| ResultsError::Array {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((array, digest))
}
