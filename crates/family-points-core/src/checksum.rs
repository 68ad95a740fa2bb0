//! Content digest over the serialized local state.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 of the compact JSON text of `state`, as lowercase hex.
///
/// Object keys serialize in sorted order, so equal documents hash equally
/// regardless of how they were built.
pub fn state_checksum(state: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(state.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
