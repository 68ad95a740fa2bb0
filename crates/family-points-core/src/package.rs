//! Versioned package envelope stored in the remote document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::state_checksum;
use crate::util::unix_millis_now;
use crate::version::{format_version, VersionOracle};
use crate::{Error, Result};

/// Device id recorded on packages synthesized from legacy remote data.
pub const MIGRATED_DEVICE_ID: &str = "migrated";

/// One write of the full local document, as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedPackage {
    pub version: String,
    /// Creation time in unix ms. Informational only.
    pub timestamp: i64,
    pub device_id: String,
    pub checksum: String,
    pub data: PackageData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageData {
    pub state: Value,
}

impl VersionedPackage {
    /// Wrap `state` in a fresh package with a newly minted version.
    pub fn build(state: Value, device_id: &str, oracle: &dyn VersionOracle) -> Self {
        Self {
            version: oracle.generate(),
            timestamp: unix_millis_now(),
            device_id: device_id.to_string(),
            checksum: state_checksum(&state),
            data: PackageData { state },
        }
    }

    /// Synthetic package for a bare legacy document.
    pub fn from_legacy(state: Value) -> Self {
        Self {
            version: format_version(chrono::Utc::now()),
            timestamp: unix_millis_now(),
            device_id: MIGRATED_DEVICE_ID.to_string(),
            checksum: String::new(),
            data: PackageData { state },
        }
    }

    pub fn is_migrated(&self) -> bool {
        self.device_id == MIGRATED_DEVICE_ID
    }

    /// Whether `checksum` matches the carried state. Migrated packages carry
    /// no checksum and always verify.
    pub fn verify_checksum(&self) -> bool {
        self.checksum.is_empty() || self.checksum == state_checksum(&self.data.state)
    }

    pub fn to_file_content(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn into_state(self) -> Value {
        self.data.state
    }
}

/// Parse the remote file content into a package.
///
/// A JSON object carrying non-empty `version`, `data` and `checksum` fields is
/// the envelope; any other valid JSON is legacy data and gets wrapped. Text
/// that is not JSON at all is a parse error.
pub fn parse_package_file(content: &str) -> Result<VersionedPackage> {
    let parsed: Value = serde_json::from_str(content)
        .map_err(|error| Error::Parse(format!("remote file is not valid JSON: {error}")))?;

    if looks_like_envelope(&parsed) {
        match serde_json::from_value::<VersionedPackage>(parsed.clone()) {
            Ok(package) => return Ok(package),
            Err(error) => {
                tracing::debug!(
                    "Envelope-shaped remote data did not parse ({error}); treating as legacy"
                );
            }
        }
    }

    Ok(VersionedPackage::from_legacy(parsed))
}

fn looks_like_envelope(value: &Value) -> bool {
    let is_truthy = |field: &str| match value.get(field) {
        None | Some(Value::Null | Value::Bool(false)) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    };
    is_truthy("version") && is_truthy("data") && is_truthy("checksum")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::version::ClockVersionOracle;

    #[test]
    fn build_stamps_checksum_and_device() {
        let oracle = ClockVersionOracle::new();
        let state = json!({ "members": [{ "id": "m1", "name": "Ada", "totalPoints": 3 }] });
        let package = VersionedPackage::build(state.clone(), "device-1", &oracle);

        assert_eq!(package.device_id, "device-1");
        assert_eq!(package.checksum, state_checksum(&state));
        assert_eq!(package.data.state, state);
        assert!(package.verify_checksum());
    }

    #[test]
    fn envelope_round_trips_through_file_content() {
        let oracle = ClockVersionOracle::new();
        let package = VersionedPackage::build(json!({ "logs": [] }), "device-1", &oracle);

        let parsed = parse_package_file(&package.to_file_content().unwrap()).unwrap();
        assert_eq!(parsed, package);
    }

    #[test]
    fn envelope_uses_camel_case_keys() {
        let content = r#"{
          "version": "2024-01-02T00:00:00.000Z",
          "timestamp": 1704153600000,
          "deviceId": "phone",
          "checksum": "abc",
          "data": { "state": { "members": [] } }
        }"#;

        let package = parse_package_file(content).unwrap();
        assert_eq!(package.version, "2024-01-02T00:00:00.000Z");
        assert_eq!(package.device_id, "phone");
        assert_eq!(package.data.state, json!({ "members": [] }));
    }

    #[test]
    fn legacy_document_is_wrapped() {
        let legacy = json!({ "members": [{ "name": "Ada" }], "logs": [] });
        let package = parse_package_file(&legacy.to_string()).unwrap();

        assert_eq!(package.device_id, MIGRATED_DEVICE_ID);
        assert!(package.is_migrated());
        assert_eq!(package.data.state, legacy);
        assert!(package.checksum.is_empty());
        assert!(package.version.ends_with('Z'));
    }

    #[test]
    fn envelope_without_checksum_counts_as_legacy() {
        let content = r#"{ "version": "2024-01-02T00:00:00.000Z", "data": { "state": {} } }"#;
        let package = parse_package_file(content).unwrap();
        assert!(package.is_migrated());
        assert_eq!(
            package.data.state["version"],
            json!("2024-01-02T00:00:00.000Z")
        );
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let error = parse_package_file("{not json").unwrap_err();
        assert!(matches!(error, Error::Parse(_)));
    }

    #[test]
    fn tampered_state_fails_checksum() {
        let oracle = ClockVersionOracle::new();
        let mut package = VersionedPackage::build(json!({ "a": 1 }), "device-1", &oracle);
        package.data.state = json!({ "a": 2 });
        assert!(!package.verify_checksum());
    }
}
