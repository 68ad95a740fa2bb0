use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] family_points_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Run `fpoints config init --remote-id <ID> --token <TOKEN>`, or set FPOINTS_GIST_ID and FPOINTS_GIST_TOKEN."
    )]
    SyncNotConfigured,
    #[error("Remote document {0} is not reachable with the configured token")]
    RemoteUnreachable(String),
    #[error(
        "Remote version {remote_version} is newer than local version {local_version}. Run `fpoints sync pull` to take the remote data, or `fpoints sync push` to overwrite it."
    )]
    Conflict {
        local_version: String,
        remote_version: String,
    },
    #[error("Sync failed: {0}")]
    SyncFailed(String),
}
