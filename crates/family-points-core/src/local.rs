//! Local application document and its persistence.
//!
//! The document is one JSON object. The last remote version this replica
//! observed is embedded in it under [`EMBEDDED_VERSION_KEY`] so it survives
//! independently of the sync configuration.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::util::unix_millis_now;
use crate::{Error, Result};

/// Key holding the embedded version tag inside the local document.
pub const EMBEDDED_VERSION_KEY: &str = "_syncVersion";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Blob storage for the single local document.
pub trait LocalStateStore: Send + Sync {
    /// Load the document, `None` when nothing has been stored yet.
    fn get_local(&self) -> Result<Option<Value>>;

    fn set_local(&self, document: &Value) -> Result<()>;

    fn clear_local(&self) -> Result<()>;
}

/// Document stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalStateStore for FileStateStore {
    fn get_local(&self) -> Result<Option<Value>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let document = serde_json::from_str(&raw).map_err(|error| {
            Error::LocalState(format!(
                "Failed to parse local document at {}: {}",
                self.path.display(),
                error
            ))
        })?;
        Ok(Some(document))
    }

    fn set_local(&self, document: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(document)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, serialized)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn clear_local(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(error) if error.kind() != std::io::ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }
}

/// In-process document store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    document: Mutex<Option<Value>>,
}

impl MemoryStateStore {
    pub fn new(document: Option<Value>) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }
}

impl LocalStateStore for MemoryStateStore {
    fn get_local(&self) -> Result<Option<Value>> {
        Ok(self
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set_local(&self, document: &Value) -> Result<()> {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(document.clone());
        Ok(())
    }

    fn clear_local(&self) -> Result<()> {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Notification that the local document was mutated by its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub at: i64,
}

/// Owner of the local document.
///
/// Mutations made through [`LocalDocument::update`] or announced with
/// [`LocalDocument::notify_changed`] are published to subscribers. Writes done
/// on behalf of sync (replacing from remote, stamping a version) are not.
pub struct LocalDocument<S> {
    store: S,
    changes: broadcast::Sender<ChangeEvent>,
}

impl<S: LocalStateStore> LocalDocument<S> {
    pub fn new(store: S) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { store, changes }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Subscribe to mutation notifications. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Raw document including the embedded version tag.
    pub fn document(&self) -> Result<Option<Value>> {
        self.store.get_local()
    }

    /// Embedded version tag, if the document exists and carries one.
    pub fn embedded_version(&self) -> Option<String> {
        match self.store.get_local() {
            Ok(document) => document
                .as_ref()
                .and_then(|document| document.get(EMBEDDED_VERSION_KEY))
                .and_then(Value::as_str)
                .map(ToString::to_string),
            Err(error) => {
                tracing::debug!("Local document unreadable while looking up version: {error}");
                None
            }
        }
    }

    /// Application state with the embedded version tag stripped.
    pub fn app_state(&self) -> Result<Value> {
        let document = self
            .store
            .get_local()?
            .ok_or_else(|| Error::LocalState("no local data found".to_string()))?;
        Ok(strip_version(document))
    }

    /// Apply a mutation, persist it and notify subscribers.
    pub fn update(&self, mutate: impl FnOnce(&mut Value)) -> Result<()> {
        let mut document = self
            .store
            .get_local()?
            .unwrap_or_else(|| Value::Object(Map::new()));
        mutate(&mut document);
        self.store.set_local(&document)?;
        self.notify_changed();
        Ok(())
    }

    /// Announce a mutation that was persisted by someone else.
    pub fn notify_changed(&self) {
        // No subscribers is fine: sync may be disabled.
        let _ = self.changes.send(ChangeEvent {
            at: unix_millis_now(),
        });
    }

    /// Overwrite the whole document with remote state tagged with `version`.
    ///
    /// Any in-memory view of the previous document is stale afterwards; the
    /// caller must reload instead of merging.
    pub fn replace_from_remote(&self, state: Value, version: &str) -> Result<()> {
        let document = embed_version(state, version)?;
        self.store.set_local(&document)
    }

    /// Record `version` as the last remote version this document matches.
    pub fn stamp_version(&self, version: &str) -> Result<()> {
        let Some(document) = self.store.get_local()? else {
            return Ok(());
        };
        let document = embed_version(document, version)?;
        self.store.set_local(&document)
    }

    /// Drop the local document entirely.
    pub fn reset(&self) -> Result<()> {
        self.store.clear_local()
    }
}

fn strip_version(document: Value) -> Value {
    match document {
        Value::Object(mut map) => {
            map.remove(EMBEDDED_VERSION_KEY);
            Value::Object(map)
        }
        other => other,
    }
}

fn embed_version(state: Value, version: &str) -> Result<Value> {
    match state {
        Value::Object(mut map) => {
            map.insert(
                EMBEDDED_VERSION_KEY.to_string(),
                Value::String(version.to_string()),
            );
            Ok(Value::Object(map))
        }
        _ => Err(Error::LocalState(
            "local document must be a JSON object".to_string(),
        )),
    }
}
