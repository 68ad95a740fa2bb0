//! Persisted sync configuration.
//!
//! `SyncConfig` is user supplied (remote id, credential, auto-sync switch)
//! plus bookkeeping written by every sync attempt. It lives apart from the
//! local document and may be cleared without touching it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::{StatusSnapshot, SyncStatus};
use crate::util::{normalize_text_option, unix_millis_now};
use crate::{Error, Result};

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub auto_sync_enabled: bool,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub local_version: Option<String>,
    #[serde(default)]
    pub remote_version: Option<String>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub last_sync_time: Option<i64>,
    #[serde(default)]
    pub last_sync_error: Option<String>,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("remote_id", &self.remote_id)
            .field(
                "credential",
                &self.credential.as_ref().map(|_| "[REDACTED]"),
            )
            .field("auto_sync_enabled", &self.auto_sync_enabled)
            .field("device_id", &self.device_id)
            .field("local_version", &self.local_version)
            .field("remote_version", &self.remote_version)
            .field("sync_status", &self.sync_status)
            .field("last_sync_time", &self.last_sync_time)
            .field("last_sync_error", &self.last_sync_error)
            .finish()
    }
}

impl SyncConfig {
    /// Remote id and credential are both present.
    pub fn is_complete(&self) -> bool {
        self.remote_id().is_some() && self.credential().is_some()
    }

    /// Automatic flows run only when enabled and complete.
    pub fn is_active(&self) -> bool {
        self.auto_sync_enabled && self.is_complete()
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref().filter(|value| !value.trim().is_empty())
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref().filter(|value| !value.trim().is_empty())
    }

    /// Stable installation id, generated on first use.
    pub fn get_or_create_device_id(&mut self) -> String {
        if let Some(device_id) = normalize_text_option(self.device_id.clone()) {
            return device_id;
        }
        let device_id = Uuid::new_v4().to_string();
        self.device_id = Some(device_id.clone());
        device_id
    }

    pub fn update_status(&mut self, status: SyncStatus, error: Option<String>) {
        self.sync_status = status;
        self.last_sync_error = error;
        if status == SyncStatus::Success {
            self.last_sync_time = Some(unix_millis_now());
        }
    }

    pub fn update_versions(&mut self, local_version: &str, remote_version: &str) {
        self.local_version = Some(local_version.to_string());
        self.remote_version = Some(remote_version.to_string());
    }

    /// Forget credentials and sync bookkeeping. The device id survives.
    pub fn clear(&mut self) {
        *self = Self {
            device_id: self.device_id.take(),
            ..Self::default()
        };
    }

    /// Status view used to seed the status machine after a restart.
    ///
    /// A persisted `syncing` means the process died mid-attempt; it is
    /// reported as `idle`.
    pub fn status_snapshot(&self) -> StatusSnapshot {
        let status = match self.sync_status {
            SyncStatus::Syncing => SyncStatus::Idle,
            other => other,
        };
        StatusSnapshot {
            status,
            message: self.last_sync_error.clone(),
            last_sync_time: self.last_sync_time,
        }
    }

    fn normalize(&mut self) {
        self.remote_id = normalize_text_option(self.remote_id.take());
        self.credential = normalize_text_option(self.credential.take());
        self.device_id = normalize_text_option(self.device_id.take());
        self.local_version = normalize_text_option(self.local_version.take());
        self.remote_version = normalize_text_option(self.remote_version.take());
        self.last_sync_error = normalize_text_option(self.last_sync_error.take());
    }
}

/// JSON file holding a [`SyncConfig`].
#[derive(Debug, Clone)]
pub struct SyncConfigStore {
    path: PathBuf,
}

impl SyncConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config; a missing file yields the default config.
    pub fn load(&self) -> Result<SyncConfig> {
        if !self.path.exists() {
            return Ok(SyncConfig::default());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        let mut config = serde_json::from_str::<SyncConfig>(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse sync config at {}: {}",
                self.path.display(),
                error
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self, config: &SyncConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = config.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(&self.path, serialized)?;
        Ok(())
    }
}
