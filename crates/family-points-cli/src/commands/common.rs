use std::env;
use std::path::PathBuf;

use chrono::DateTime;
use family_points_core::remote::DEFAULT_API_BASE;
use family_points_core::util::normalize_text_option;
use family_points_core::{
    FileStateStore, GistClient, LocalDocument, SyncConfig, SyncConfigStore, SyncEngine, SyncStatus,
};
use serde::Serialize;

use crate::error::CliError;

pub type CliEngine = SyncEngine<GistClient, FileStateStore>;

const APP_DIR_NAME: &str = "family-points";
const DATA_FILE_NAME: &str = "family-points-data.json";
const CONFIG_FILE_NAME: &str = "sync-config.json";

pub const ENV_DATA_PATH: &str = "FPOINTS_DATA_PATH";
pub const ENV_GIST_TOKEN: &str = "FPOINTS_GIST_TOKEN";
pub const ENV_GIST_ID: &str = "FPOINTS_GIST_ID";
pub const ENV_API_BASE: &str = "FPOINTS_API_BASE";

/// Files the CLI operates on.
#[derive(Clone, Debug)]
pub struct Paths {
    pub data: PathBuf,
    pub config: PathBuf,
}

impl Paths {
    pub fn resolve(data: Option<PathBuf>, config: Option<PathBuf>) -> Result<Self, CliError> {
        Ok(Self {
            data: resolve_data_path(data)?,
            config: resolve_config_path(config)?,
        })
    }

    pub fn config_store(&self) -> SyncConfigStore {
        SyncConfigStore::new(&self.config)
    }

    pub fn document(&self) -> LocalDocument<FileStateStore> {
        LocalDocument::new(FileStateStore::new(&self.data))
    }
}

pub fn resolve_data_path(cli_data_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_data_path.or_else(|| env::var_os(ENV_DATA_PATH).map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_data_path(),
    }
}

pub fn default_data_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(DATA_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_config_path {
        Some(path) => Ok(path),
        None => default_config_path(),
    }
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".to_string()))
}

/// Stored config with `FPOINTS_GIST_ID` / `FPOINTS_GIST_TOKEN` applied on top.
pub fn load_config(store: &SyncConfigStore) -> Result<SyncConfig, CliError> {
    let mut config = store.load()?;
    apply_env_overrides(&mut config, |key| env::var(key).ok());
    Ok(config)
}

pub fn apply_env_overrides(config: &mut SyncConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(remote_id) = normalize_text_option(lookup(ENV_GIST_ID)) {
        config.remote_id = Some(remote_id);
    }
    if let Some(token) = normalize_text_option(lookup(ENV_GIST_TOKEN)) {
        config.credential = Some(token);
    }
}

pub fn api_base_url() -> String {
    normalize_text_option(env::var(ENV_API_BASE).ok())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}

pub fn gist_client(credential: &str) -> Result<GistClient, CliError> {
    Ok(GistClient::with_base_url(api_base_url(), credential)?)
}

/// Engine over the local document file and the configured Gist. The config
/// file is re-read before every flow with the environment applied on top.
pub fn open_engine(paths: &Paths) -> Result<CliEngine, CliError> {
    let store = paths.config_store();
    let config = load_config(&store)?;
    let credential = config
        .credential()
        .ok_or(CliError::SyncNotConfigured)?
        .to_string();
    let client = gist_client(&credential)?;
    Ok(SyncEngine::new(client, paths.document(), config)
        .with_config_store(store)
        .with_config_overlay(|config| apply_env_overrides(config, |key| env::var(key).ok())))
}

/// Why automatic flows skip under `config`, `None` when they would run.
pub fn inactive_reason(config: &SyncConfig) -> Option<&'static str> {
    if config.remote_id().is_none() {
        Some("no remote id is configured")
    } else if config.credential().is_none() {
        Some("no token is configured")
    } else if !config.auto_sync_enabled {
        Some("auto-sync is disabled")
    } else {
        None
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub status: SyncStatus,
    pub message: Option<String>,
    pub pull_available: bool,
    pub auto_sync_enabled: bool,
    pub configured: bool,
    pub remote_id: Option<String>,
    pub device_id: Option<String>,
    pub local_version: Option<String>,
    pub remote_version: Option<String>,
    pub last_sync_time: Option<i64>,
    pub last_sync_relative: Option<String>,
}

pub fn status_report(
    config: &SyncConfig,
    embedded_version: Option<String>,
    now_ms: i64,
) -> StatusReport {
    let snapshot = config.status_snapshot();
    StatusReport {
        status: snapshot.status,
        pull_available: snapshot.pull_available(),
        message: snapshot.message,
        auto_sync_enabled: config.auto_sync_enabled,
        configured: config.is_complete(),
        remote_id: config.remote_id().map(ToString::to_string),
        device_id: config.device_id.clone(),
        local_version: embedded_version.or_else(|| config.local_version.clone()),
        remote_version: config.remote_version.clone(),
        last_sync_time: snapshot.last_sync_time,
        last_sync_relative: snapshot
            .last_sync_time
            .map(|timestamp| format_relative_time(timestamp, now_ms)),
    }
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let mut lines = Vec::new();
    let last_sync = match (&report.last_sync_relative, report.last_sync_time) {
        (Some(relative), Some(timestamp)) => {
            format!("synced {relative} ({})", format_sync_timestamp(timestamp))
        }
        _ => "never synced".to_string(),
    };
    lines.push(format!("Status:       {} ({last_sync})", report.status));
    if let Some(message) = &report.message {
        lines.push(format!("Message:      {message}"));
    }
    if report.pull_available {
        lines.push("Hint:         run `fpoints sync pull` to take the remote data".to_string());
    }
    lines.push(format!(
        "Auto-sync:    {}",
        if report.auto_sync_enabled {
            "enabled"
        } else {
            "disabled"
        }
    ));
    lines.push(format!(
        "Remote:       {}",
        report.remote_id.as_deref().unwrap_or("<not configured>")
    ));
    lines.push(format!(
        "Local:        {}",
        report.local_version.as_deref().unwrap_or("<none>")
    ));
    lines.push(format!(
        "Last remote:  {}",
        report.remote_version.as_deref().unwrap_or("<none>")
    ));
    lines
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

pub fn redact_token(token: Option<&str>) -> String {
    match token {
        Some(token) if token.chars().count() > 8 => {
            format!("{}...[REDACTED]", token.chars().take(4).collect::<String>())
        }
        Some(_) => "[REDACTED]".to_string(),
        None => "<not set>".to_string(),
    }
}
