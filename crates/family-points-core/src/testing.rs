//! In-process doubles shared by the engine and debouncer tests.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::package::VersionedPackage;
use crate::remote::{RemoteDocumentStore, RemoteMetadata};
use crate::version::ClockVersionOracle;
use crate::{Error, Result};

/// Oracle frozen at `instant`; successive tags step by 1 ms.
pub fn fixed_oracle(instant: &str) -> ClockVersionOracle {
    let instant = DateTime::parse_from_rfc3339(instant)
        .expect("valid test instant")
        .with_timezone(&Utc);
    ClockVersionOracle::with_clock(move || instant)
}

#[derive(Default)]
struct FakeState {
    package: Option<VersionedPackage>,
    unreachable: bool,
    full_error: Option<String>,
    replace_error: Option<String>,
    replace_delay: Option<Duration>,
    replaced: Vec<VersionedPackage>,
    created: Vec<Value>,
    metadata_calls: usize,
    full_calls: usize,
}

/// Remote document held in memory.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn with_package(package: VersionedPackage) -> Self {
        let remote = Self::default();
        remote.lock().package = Some(package);
        remote
    }

    pub fn with_legacy(state: Value) -> Self {
        Self::with_package(VersionedPackage::from_legacy(state))
    }

    pub fn unreachable() -> Self {
        let remote = Self::default();
        remote.lock().unreachable = true;
        remote
    }

    pub fn fail_full_downloads(&self, message: &str) {
        self.lock().full_error = Some(message.to_string());
    }

    pub fn reject_replace(&self, message: &str) {
        self.lock().replace_error = Some(message.to_string());
    }

    pub fn delay_replace(&self, delay: Duration) {
        self.lock().replace_delay = Some(delay);
    }

    pub fn replaced(&self) -> Vec<VersionedPackage> {
        self.lock().replaced.clone()
    }

    pub fn created(&self) -> Vec<Value> {
        self.lock().created.clone()
    }

    pub fn metadata_calls(&self) -> usize {
        self.lock().metadata_calls
    }

    pub fn full_calls(&self) -> usize {
        self.lock().full_calls
    }

    pub fn current_version(&self) -> Option<String> {
        self.lock()
            .package
            .as_ref()
            .filter(|package| !package.is_migrated())
            .map(|package| package.version.clone())
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteDocumentStore for FakeRemote {
    async fn fetch_metadata(&self, _remote_id: &str) -> Option<RemoteMetadata> {
        let mut state = self.lock();
        state.metadata_calls += 1;
        if state.unreachable {
            return None;
        }
        let package = state
            .package
            .as_ref()
            .filter(|package| !package.is_migrated());
        Some(RemoteMetadata {
            version: package.map(|package| package.version.clone()),
            checksum: package.map(|package| package.checksum.clone()),
            updated_at: None,
        })
    }

    async fn fetch_full(&self, _remote_id: &str) -> Result<VersionedPackage> {
        let mut state = self.lock();
        state.full_calls += 1;
        if let Some(message) = &state.full_error {
            return Err(Error::Network(message.clone()));
        }
        state
            .package
            .clone()
            .ok_or_else(|| Error::Parse("remote document has no data file".to_string()))
    }

    async fn create(&self, seed: &Value) -> Result<String> {
        let mut state = self.lock();
        state.created.push(seed.clone());
        Ok(format!("gist-{}", state.created.len()))
    }

    async fn replace(&self, _remote_id: &str, package: &VersionedPackage) -> Result<()> {
        let delay = self.lock().replace_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(message) = &state.replace_error {
            return Err(Error::Network(message.clone()));
        }
        state.replaced.push(package.clone());
        state.package = Some(package.clone());
        Ok(())
    }

    async fn validate(&self, _remote_id: &str) -> bool {
        !self.lock().unreachable
    }
}
