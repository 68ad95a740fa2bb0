//! Remote single-document store.

mod gist;

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::package::VersionedPackage;
use crate::Result;

pub use gist::{GistClient, DEFAULT_API_BASE, GIST_FILENAME};

/// Cheap view of the remote document used for conflict checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    /// `None` for legacy documents and for documents without the data file.
    pub version: Option<String>,
    /// Checksum recorded in the package, when there is one.
    pub checksum: Option<String>,
    /// Host-level last update time.
    pub updated_at: Option<String>,
}

/// Adapter over the host holding the single remote document.
///
/// Implementations never retry; retry policy belongs to the caller.
pub trait RemoteDocumentStore: Send + Sync {
    /// Version tag and host update time, or `None` when the host could not be
    /// reached or answered with a non-success status.
    fn fetch_metadata(
        &self,
        remote_id: &str,
    ) -> impl Future<Output = Option<RemoteMetadata>> + Send;

    /// Download and parse the full document. Legacy documents come back
    /// wrapped in a synthetic package.
    fn fetch_full(&self, remote_id: &str) -> impl Future<Output = Result<VersionedPackage>> + Send;

    /// Create a new document seeded with a plain snapshot of `seed`.
    /// Returns the host-assigned id.
    fn create(&self, seed: &Value) -> impl Future<Output = Result<String>> + Send;

    /// Overwrite the document with `package`.
    fn replace(
        &self,
        remote_id: &str,
        package: &VersionedPackage,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Whether the document is reachable with the current credential.
    fn validate(&self, remote_id: &str) -> impl Future<Output = bool> + Send;
}

impl<T: RemoteDocumentStore> RemoteDocumentStore for Arc<T> {
    fn fetch_metadata(
        &self,
        remote_id: &str,
    ) -> impl Future<Output = Option<RemoteMetadata>> + Send {
        (**self).fetch_metadata(remote_id)
    }

    fn fetch_full(&self, remote_id: &str) -> impl Future<Output = Result<VersionedPackage>> + Send {
        (**self).fetch_full(remote_id)
    }

    fn create(&self, seed: &Value) -> impl Future<Output = Result<String>> + Send {
        (**self).create(seed)
    }

    fn replace(
        &self,
        remote_id: &str,
        package: &VersionedPackage,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).replace(remote_id, package)
    }

    fn validate(&self, remote_id: &str) -> impl Future<Output = bool> + Send {
        (**self).validate(remote_id)
    }
}
