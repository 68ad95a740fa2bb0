//! family-points-core - Sync engine for the family point tracker
//!
//! The tracker keeps all of its state in one JSON document. This crate keeps
//! that document in step with a single remote copy hosted as a private Gist:
//! optimistic replication, last writer wins, with a version check that blocks
//! uploads from a device that has not seen the latest remote write.

pub mod checksum;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod local;
pub mod package;
pub mod remote;
pub mod status;
pub mod util;
pub mod version;

#[cfg(test)]
mod testing;

pub use config::{SyncConfig, SyncConfigStore};
pub use debounce::{ChangeDebouncer, DEFAULT_DEBOUNCE_WINDOW};
pub use engine::{DownloadOutcome, SyncEngine, UploadOutcome};
pub use error::{Error, ErrorKind, Result};
pub use local::{ChangeEvent, FileStateStore, LocalDocument, LocalStateStore, MemoryStateStore};
pub use package::VersionedPackage;
pub use remote::{GistClient, RemoteDocumentStore, RemoteMetadata};
pub use status::{StatusSnapshot, SyncStatus};
pub use version::{ClockVersionOracle, VersionOracle};
