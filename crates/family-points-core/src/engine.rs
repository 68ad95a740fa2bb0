//! Sync engine: startup download and conflict-checked upload.
//!
//! Flows never return network, conflict or parse failures as `Err`. Each one
//! ends in a status transition plus an outcome value; the calling layer
//! decides what to do with it (reload after a download, offer a pull after a
//! conflict).

use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::checksum::state_checksum;
use crate::config::{SyncConfig, SyncConfigStore};
use crate::local::{LocalDocument, LocalStateStore};
use crate::package::VersionedPackage;
use crate::remote::RemoteDocumentStore;
use crate::status::{StatusSnapshot, SyncStatus, SyncStatusMachine};
use crate::version::{ClockVersionOracle, VersionOracle, OLDEST_VERSION};
use crate::{Error, ErrorKind, Result};

const UNREACHABLE_MESSAGE: &str = "unable to reach the remote document";
const CONFLICT_MESSAGE: &str =
    "The remote copy is newer than this device's data. Pull the remote data before uploading.";

/// Result of a download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Sync disabled or not configured.
    Skipped,
    /// Metadata could not be fetched.
    Unreachable,
    /// Remote document carries no version tag; left alone.
    LegacyRemote,
    /// Local data already matches or is newer than `remote_version`.
    UpToDate { remote_version: String },
    /// The local document was replaced wholesale. In-memory state built
    /// from the previous document must be discarded and reloaded.
    Replaced { version: String },
    Failed { message: String },
}

impl DownloadOutcome {
    pub const fn requires_reload(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }
}

/// Result of an upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Sync disabled or not configured.
    Skipped,
    /// Metadata could not be fetched.
    Unreachable,
    /// Remote is ahead of what this device last observed; nothing uploaded.
    Conflict {
        local_version: String,
        remote_version: String,
    },
    /// Remote already holds exactly this state.
    UpToDate { version: String },
    Uploaded { version: String },
    Failed { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gate {
    /// Automatic flows: enabled and complete.
    Automatic,
    /// User-triggered flows: complete.
    Manual,
}

type ConfigOverlay = Box<dyn Fn(&mut SyncConfig) + Send + Sync>;

pub struct SyncEngine<R, S> {
    remote: R,
    document: LocalDocument<S>,
    config: Mutex<SyncConfig>,
    config_store: Option<SyncConfigStore>,
    /// Applied over every config loaded from the store, never written back.
    config_overlay: Option<ConfigOverlay>,
    status: SyncStatusMachine,
    oracle: Box<dyn VersionOracle>,
    /// Serializes flows so only one attempt touches the documents at a time.
    flow: tokio::sync::Mutex<()>,
    active: watch::Sender<bool>,
}

impl<R, S> SyncEngine<R, S>
where
    R: RemoteDocumentStore,
    S: LocalStateStore,
{
    pub fn new(remote: R, document: LocalDocument<S>, config: SyncConfig) -> Self {
        let status = SyncStatusMachine::new(config.status_snapshot());
        let (active, _) = watch::channel(config.is_active());
        Self {
            remote,
            document,
            config: Mutex::new(config),
            config_store: None,
            config_overlay: None,
            status,
            oracle: Box::new(ClockVersionOracle::new()),
            flow: tokio::sync::Mutex::new(()),
            active,
        }
    }

    /// Persist config changes made by flows to `store`. The stored copy is
    /// re-read at the start of every flow and takes over from the config
    /// passed to `new`.
    #[must_use]
    pub fn with_config_store(mut self, store: SyncConfigStore) -> Self {
        self.config_store = Some(store);
        self
    }

    /// Adjust each config loaded from the store, e.g. with values taken from
    /// the environment. Overlaid values are not persisted.
    #[must_use]
    pub fn with_config_overlay(
        mut self,
        overlay: impl Fn(&mut SyncConfig) + Send + Sync + 'static,
    ) -> Self {
        self.config_overlay = Some(Box::new(overlay));
        self
    }

    #[must_use]
    pub fn with_version_oracle(mut self, oracle: impl VersionOracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    pub const fn document(&self) -> &LocalDocument<S> {
        &self.document
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub fn config(&self) -> SyncConfig {
        self.lock_config().clone()
    }

    /// Mutate and persist the config. With a store attached the update is
    /// applied to the stored copy, so edits made by other processes survive.
    pub fn update_config(&self, update: impl FnOnce(&mut SyncConfig)) -> Result<()> {
        let active = match &self.config_store {
            Some(store) => {
                let mut stored = store.load()?;
                update(&mut stored);
                store.save(&stored)?;
                self.adopt(stored)
            }
            None => {
                let mut config = self.lock_config();
                update(&mut config);
                config.is_active()
            }
        };
        self.active.send_replace(active);
        Ok(())
    }

    /// Whether automatic flows currently run. Flips to `false` when sync is
    /// disabled or the config becomes incomplete.
    pub fn subscribe_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    /// Startup flow: replace local data when the remote copy is newer.
    pub async fn auto_download(&self) -> DownloadOutcome {
        let Some(remote_id) = self.remote_id(Gate::Automatic) else {
            tracing::debug!("Auto-download skipped: sync not enabled or not configured");
            return DownloadOutcome::Skipped;
        };
        let _flow = self.flow.lock().await;
        self.enter_syncing();

        match self.download(&remote_id).await {
            Ok(outcome) => outcome,
            Err(error) => DownloadOutcome::Failed {
                message: self.record_failure(&error),
            },
        }
    }

    /// Mutation flow: upload the current state unless the remote copy is ahead.
    pub async fn auto_upload(&self) -> UploadOutcome {
        let Some(remote_id) = self.remote_id(Gate::Automatic) else {
            tracing::debug!("Auto-upload skipped: sync not enabled or not configured");
            return UploadOutcome::Skipped;
        };
        let _flow = self.flow.lock().await;
        self.enter_syncing();

        match self.upload_checked(&remote_id).await {
            Ok(outcome) => outcome,
            Err(error) => UploadOutcome::Failed {
                message: self.record_failure(&error),
            },
        }
    }

    /// Download the remote document regardless of versions. Resolves a
    /// conflict in favour of the remote copy; legacy documents are accepted.
    pub async fn pull_remote(&self) -> DownloadOutcome {
        let Some(remote_id) = self.remote_id(Gate::Manual) else {
            return DownloadOutcome::Skipped;
        };
        let _flow = self.flow.lock().await;
        self.enter_syncing();

        match self.replace_local(&remote_id).await {
            Ok(version) => DownloadOutcome::Replaced { version },
            Err(error) => DownloadOutcome::Failed {
                message: self.record_failure(&error),
            },
        }
    }

    /// Upload the current state without the conflict check.
    pub async fn push_local(&self) -> UploadOutcome {
        let Some(remote_id) = self.remote_id(Gate::Manual) else {
            return UploadOutcome::Skipped;
        };
        let _flow = self.flow.lock().await;
        self.enter_syncing();

        match self.upload(&remote_id).await {
            Ok(version) => UploadOutcome::Uploaded { version },
            Err(error) => UploadOutcome::Failed {
                message: self.record_failure(&error),
            },
        }
    }

    /// Create a new remote document from the current local state and make it
    /// the configured remote.
    pub async fn create_remote(&self) -> Result<String> {
        let state = self.document.app_state()?;
        let _flow = self.flow.lock().await;
        let remote_id = self.remote.create(&state).await?;
        self.update_config(|config| {
            config.remote_id = Some(remote_id.clone());
            config.local_version = None;
            config.remote_version = None;
        })?;
        Ok(remote_id)
    }

    /// Whether the configured remote answers with the current credential.
    pub async fn validate_remote(&self) -> Result<bool> {
        self.reload_config();
        let remote_id = self
            .lock_config()
            .remote_id()
            .map(ToString::to_string)
            .ok_or_else(|| Error::Config("remote id is not configured".to_string()))?;
        Ok(self.remote.validate(&remote_id).await)
    }

    async fn download(&self, remote_id: &str) -> Result<DownloadOutcome> {
        let Some(metadata) = self.remote.fetch_metadata(remote_id).await else {
            self.record(SyncStatus::Error, Some(UNREACHABLE_MESSAGE.to_string()));
            return Ok(DownloadOutcome::Unreachable);
        };

        let Some(remote_version) = metadata.version else {
            tracing::info!("Remote document has no version tag; skipping auto-download");
            self.record(SyncStatus::Idle, None);
            return Ok(DownloadOutcome::LegacyRemote);
        };

        let local_version = self.local_version();
        let download_needed = local_version.as_deref().map_or(true, |local| {
            self.oracle.compare(&remote_version, local) == Ordering::Greater
        });

        if download_needed {
            tracing::info!(
                "Remote version {remote_version} is newer than local {}; downloading",
                local_version.as_deref().unwrap_or("<none>")
            );
            let version = self.replace_local(remote_id).await?;
            return Ok(DownloadOutcome::Replaced { version });
        }

        let local_version = local_version.unwrap_or_else(|| remote_version.clone());
        self.track_versions(&local_version, &remote_version);
        self.record(SyncStatus::Success, None);
        Ok(DownloadOutcome::UpToDate { remote_version })
    }

    async fn replace_local(&self, remote_id: &str) -> Result<String> {
        let package = self.remote.fetch_full(remote_id).await?;
        if !package.verify_checksum() {
            tracing::warn!(
                "Checksum mismatch on remote version {}; applying anyway",
                package.version
            );
        }

        let version = package.version.clone();
        self.document.replace_from_remote(package.into_state(), &version)?;
        self.track_versions(&version, &version);
        self.record(SyncStatus::Success, None);
        tracing::info!("Local document replaced with remote version {version}");
        Ok(version)
    }

    async fn upload_checked(&self, remote_id: &str) -> Result<UploadOutcome> {
        let Some(metadata) = self.remote.fetch_metadata(remote_id).await else {
            self.record(SyncStatus::Error, Some(UNREACHABLE_MESSAGE.to_string()));
            return Ok(UploadOutcome::Unreachable);
        };

        let local_version = self
            .local_version()
            .unwrap_or_else(|| OLDEST_VERSION.to_string());
        let remote_version = metadata
            .version
            .clone()
            .unwrap_or_else(|| OLDEST_VERSION.to_string());

        if metadata.version.is_some()
            && self.oracle.compare(&remote_version, &local_version) == Ordering::Greater
        {
            tracing::warn!(
                "Upload blocked: remote version {remote_version} is ahead of local {local_version}"
            );
            self.record(SyncStatus::Conflict, Some(CONFLICT_MESSAGE.to_string()));
            return Ok(UploadOutcome::Conflict {
                local_version,
                remote_version,
            });
        }

        if metadata.version.as_deref() == Some(local_version.as_str()) {
            let state = self.document.app_state()?;
            if metadata.checksum.as_deref() == Some(state_checksum(&state).as_str()) {
                tracing::debug!("Remote already holds version {local_version}; nothing to upload");
                self.track_versions(&local_version, &local_version);
                self.record(SyncStatus::Success, None);
                return Ok(UploadOutcome::UpToDate {
                    version: local_version,
                });
            }
        }

        let version = self.upload(remote_id).await?;
        Ok(UploadOutcome::Uploaded { version })
    }

    async fn upload(&self, remote_id: &str) -> Result<String> {
        let state = self.document.app_state()?;
        let (device_id, minted) = {
            let mut config = self.lock_config();
            let minted = config.device_id.is_none();
            (config.get_or_create_device_id(), minted)
        };
        if minted {
            self.persist_owned(|config| {
                if config.device_id.is_none() {
                    config.device_id = Some(device_id.clone());
                }
            });
        }

        let package = VersionedPackage::build(state, &device_id, self.oracle.as_ref());
        self.remote.replace(remote_id, &package).await?;

        if let Err(error) = self.document.stamp_version(&package.version) {
            tracing::warn!(
                "Uploaded {} but failed to stamp local document: {error}",
                package.version
            );
        }
        self.track_versions(&package.version, &package.version);
        self.record(SyncStatus::Success, None);
        tracing::info!("Uploaded version {}", package.version);
        Ok(package.version)
    }

    /// Embedded tag first, then the cached tracker.
    fn local_version(&self) -> Option<String> {
        self.document
            .embedded_version()
            .or_else(|| self.lock_config().local_version.clone())
    }

    fn remote_id(&self, gate: Gate) -> Option<String> {
        self.reload_config();
        let config = self.lock_config();
        let ready = match gate {
            Gate::Automatic => config.is_active(),
            Gate::Manual => config.is_complete(),
        };
        if ready {
            config.remote_id().map(ToString::to_string)
        } else {
            None
        }
    }

    /// Pick up edits made to the stored config since the last flow, such as
    /// sync being disabled or the credential cleared from another process.
    fn reload_config(&self) {
        let Some(store) = &self.config_store else {
            return;
        };
        let stored = match store.load() {
            Ok(stored) => stored,
            Err(error) => {
                tracing::warn!("Failed to reload sync config: {error}");
                return;
            }
        };
        let active = self.adopt(stored);
        self.active.send_if_modified(|current| {
            let changed = *current != active;
            *current = active;
            changed
        });
    }

    /// Replace the cached config with `stored` plus the overlay. Returns
    /// whether automatic flows should run under it.
    fn adopt(&self, mut stored: SyncConfig) -> bool {
        if let Some(overlay) = &self.config_overlay {
            overlay(&mut stored);
        }
        let active = stored.is_active();
        *self.lock_config() = stored;
        active
    }

    fn enter_syncing(&self) {
        self.record(SyncStatus::Syncing, None);
    }

    fn record_failure(&self, error: &Error) -> String {
        let message = error.status_message();
        match error.kind() {
            ErrorKind::Network => tracing::warn!("Sync attempt failed to reach remote: {error}"),
            ErrorKind::Parse => tracing::warn!("Sync attempt got an unreadable payload: {error}"),
            ErrorKind::Config | ErrorKind::Local => tracing::error!("Sync attempt failed: {error}"),
        }
        self.record(SyncStatus::Error, Some(message.clone()));
        message
    }

    fn record(&self, status: SyncStatus, message: Option<String>) {
        let transition = match status {
            SyncStatus::Syncing => self.status.begin(),
            SyncStatus::Idle => self.status.settle_idle(),
            SyncStatus::Success => self.status.succeed(),
            SyncStatus::Error => self.status.fail(message.clone().unwrap_or_default()),
            SyncStatus::Conflict => self.status.conflict(message.clone().unwrap_or_default()),
        };
        if let Err(error) = transition {
            tracing::warn!("{error}");
        }

        self.persist_owned(|config| config.update_status(status, message.clone()));
    }

    fn track_versions(&self, local_version: &str, remote_version: &str) {
        self.persist_owned(|config| config.update_versions(local_version, remote_version));
    }

    /// Apply a flow-owned change (status, versions, device id) to the cached
    /// config and to a freshly loaded stored copy. Remote id, credential and
    /// the auto-sync flag are only ever written by `update_config`.
    fn persist_owned(&self, apply: impl Fn(&mut SyncConfig)) {
        apply(&mut *self.lock_config());
        let Some(store) = &self.config_store else {
            return;
        };
        let result = store.load().and_then(|mut stored| {
            apply(&mut stored);
            store.save(&stored)
        });
        if let Err(error) = result {
            tracing::warn!("Failed to persist sync config: {error}");
        }
    }

    fn lock_config(&self) -> MutexGuard<'_, SyncConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Delete the local document. Remote id, credential and device id are kept;
/// the cached local version is forgotten so the next download restores the
/// remote copy. Works without a credential, so no engine is needed.
pub fn reset_local<S: LocalStateStore>(
    document: &LocalDocument<S>,
    config_store: &SyncConfigStore,
) -> Result<()> {
    document.reset()?;
    let mut config = config_store.load()?;
    if config.local_version.take().is_some() {
        config_store.save(&config)?;
    }
    tracing::info!("Local document reset");
    Ok(())
}
