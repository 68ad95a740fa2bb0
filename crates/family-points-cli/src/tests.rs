use std::collections::HashMap;

use clap::Parser;
use family_points_core::local::EMBEDDED_VERSION_KEY;
use family_points_core::{DownloadOutcome, LocalStateStore, SyncConfig, SyncStatus, UploadOutcome};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use crate::cli::{Cli, Commands, CompletionShell, SyncCommands};
use crate::commands::common::{
    apply_env_overrides, format_relative_time, format_status_lines, format_sync_timestamp,
    inactive_reason, redact_token, status_report, Paths, ENV_GIST_ID, ENV_GIST_TOKEN,
};
use crate::commands::completions::render_completions;
use crate::commands::config::{format_config_lines, run_config_clear, run_config_init};
use crate::commands::reset::run_reset;
use crate::commands::sync::{report_download, report_upload};
use crate::commands::watch::{document_fingerprint, format_status_change, poll_for_change};
use crate::error::CliError;

fn temp_paths() -> (TempDir, Paths) {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths {
        data: dir.path().join("data").join("family-points-data.json"),
        config: dir.path().join("config").join("sync-config.json"),
    };
    (dir, paths)
}

#[test]
fn cli_parses_global_paths_after_subcommand() {
    let cli = Cli::try_parse_from([
        "fpoints",
        "sync",
        "status",
        "--json",
        "--data",
        "/tmp/points.json",
    ])
    .unwrap();

    assert_eq!(
        cli.data.as_deref(),
        Some(std::path::Path::new("/tmp/points.json"))
    );
    assert!(matches!(
        cli.command,
        Commands::Sync {
            command: SyncCommands::Status { json: true }
        }
    ));
}

#[test]
fn watch_defaults_to_debounce_window() {
    let cli = Cli::try_parse_from(["fpoints", "watch"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Watch {
            debounce_ms: 2500,
            poll_ms: 1000
        }
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn env_overrides_replace_stored_values_and_ignore_blanks() {
    let env = HashMap::from([
        (ENV_GIST_ID, "from-env".to_string()),
        (ENV_GIST_TOKEN, "   ".to_string()),
    ]);
    let mut config = SyncConfig {
        remote_id: Some("stored".to_string()),
        credential: Some("stored-token".to_string()),
        ..SyncConfig::default()
    };

    apply_env_overrides(&mut config, |key| env.get(key).cloned());

    assert_eq!(config.remote_id.as_deref(), Some("from-env"));
    assert_eq!(config.credential.as_deref(), Some("stored-token"));
}

#[test]
fn status_report_prefers_embedded_version_and_flags_conflict() {
    let config = SyncConfig {
        remote_id: Some("gist-1".to_string()),
        credential: Some("token".to_string()),
        auto_sync_enabled: true,
        local_version: Some("2024-01-01T00:00:00.000Z".to_string()),
        remote_version: Some("2024-01-02T00:00:00.000Z".to_string()),
        sync_status: SyncStatus::Conflict,
        last_sync_time: Some(1_000),
        last_sync_error: Some("remote is newer".to_string()),
        ..SyncConfig::default()
    };

    let report = status_report(
        &config,
        Some("2024-01-03T00:00:00.000Z".to_string()),
        1_000 + 5 * 60_000,
    );

    assert!(report.pull_available);
    assert!(report.configured);
    assert_eq!(
        report.local_version.as_deref(),
        Some("2024-01-03T00:00:00.000Z")
    );
    assert_eq!(report.last_sync_relative.as_deref(), Some("5m ago"));

    let lines = format_status_lines(&report);
    assert!(lines[0].starts_with("Status:       conflict (synced 5m ago"));
    assert!(lines.iter().any(|line| line.contains("fpoints sync pull")));
}

#[test]
fn status_lines_report_never_synced() {
    let report = status_report(&SyncConfig::default(), None, 0);
    let lines = format_status_lines(&report);
    assert_eq!(lines[0], "Status:       idle (never synced)");
    assert!(lines.iter().any(|line| line.contains("<not configured>")));
    assert!(!report.configured);
}

#[test]
fn status_report_serializes_lowercase_status() {
    let config = SyncConfig {
        sync_status: SyncStatus::Syncing,
        ..SyncConfig::default()
    };
    let json = serde_json::to_value(status_report(&config, None, 0)).unwrap();
    assert_eq!(json["status"], "idle");
    assert_eq!(json["pull_available"], false);
}

#[test]
fn config_lines_never_print_token() {
    let config = SyncConfig {
        remote_id: Some("gist-1".to_string()),
        credential: Some("ghp_supersecretvalue".to_string()),
        ..SyncConfig::default()
    };
    let rendered = format_config_lines(&config).join("\n");
    assert!(!rendered.contains("supersecret"));
    assert!(rendered.contains("ghp_...[REDACTED]"));
    assert_eq!(redact_token(Some("short")), "[REDACTED]");
    assert_eq!(redact_token(None), "<not set>");
}

#[test]
fn completions_use_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("fpoints"));
}

#[test]
fn conflict_upload_maps_to_conflict_error() {
    let error = report_upload(
        UploadOutcome::Conflict {
            local_version: "a".to_string(),
            remote_version: "b".to_string(),
        },
        &SyncConfig::default(),
        false,
    )
    .unwrap_err();
    assert!(matches!(error, CliError::Conflict { .. }));
    assert!(error.to_string().contains("fpoints sync pull"));
}

#[test]
fn skipped_manual_flows_require_configuration() {
    let config = SyncConfig::default();
    assert!(matches!(
        report_download(DownloadOutcome::Skipped, &config, true),
        Err(CliError::SyncNotConfigured)
    ));
    assert!(report_download(DownloadOutcome::Skipped, &config, false).is_ok());
    assert!(report_upload(UploadOutcome::Skipped, &config, false).is_ok());
    assert!(matches!(
        report_upload(
            UploadOutcome::Failed {
                message: "Upload failed: HTTP 500".to_string()
            },
            &config,
            false
        ),
        Err(CliError::SyncFailed(message)) if message == "Upload failed: HTTP 500"
    ));
}

#[test]
fn inactive_reason_names_the_missing_piece() {
    let mut config = SyncConfig {
        credential: Some("token".to_string()),
        auto_sync_enabled: true,
        ..SyncConfig::default()
    };
    assert_eq!(inactive_reason(&config), Some("no remote id is configured"));

    config.remote_id = Some("gist-1".to_string());
    config.credential = None;
    assert_eq!(inactive_reason(&config), Some("no token is configured"));

    config.credential = Some("token".to_string());
    config.auto_sync_enabled = false;
    assert_eq!(inactive_reason(&config), Some("auto-sync is disabled"));

    config.auto_sync_enabled = true;
    assert_eq!(inactive_reason(&config), None);
}

#[test]
fn fingerprint_ignores_embedded_version() {
    let (_dir, paths) = temp_paths();
    let document = paths.document();
    assert_eq!(document_fingerprint(&document), None);

    document
        .store()
        .set_local(&json!({ "members": [], EMBEDDED_VERSION_KEY: "2024-01-01T00:00:00.000Z" }))
        .unwrap();
    let before = document_fingerprint(&document);
    document.stamp_version("2024-01-02T00:00:00.000Z").unwrap();
    assert_eq!(document_fingerprint(&document), before);

    document.update(|state| state["members"] = json!(["Ada"])).unwrap();
    assert_ne!(document_fingerprint(&document), before);
}

#[test]
fn poll_raises_change_event_for_edits_made_on_disk() {
    let (_dir, paths) = temp_paths();
    let watched = paths.document();
    let mut events = watched.subscribe();
    let mut fingerprint = document_fingerprint(&watched);

    assert!(!poll_for_change(&watched, &mut fingerprint));

    paths
        .document()
        .update(|state| state["members"] = json!(["Ada"]))
        .unwrap();
    assert!(poll_for_change(&watched, &mut fingerprint));
    assert!(events.try_recv().is_ok());

    paths
        .document()
        .stamp_version("2024-01-02T00:00:00.000Z")
        .unwrap();
    assert!(!poll_for_change(&watched, &mut fingerprint));
    assert!(events.try_recv().is_err());

    paths.document().reset().unwrap();
    assert!(!poll_for_change(&watched, &mut fingerprint));
    assert_eq!(fingerprint, None);
}

#[test]
fn status_changes_only_print_settled_states() {
    let mut snapshot = family_points_core::StatusSnapshot::default();
    assert_eq!(format_status_change(&snapshot), None);

    snapshot.status = SyncStatus::Conflict;
    snapshot.message = Some("remote is newer".to_string());
    let line = format_status_change(&snapshot).unwrap();
    assert!(line.starts_with("[conflict] remote is newer"));
}

#[tokio::test(flavor = "current_thread")]
async fn config_init_without_validation_persists_config() {
    let (_dir, paths) = temp_paths();

    run_config_init(
        Some(" gist-42 ".to_string()),
        Some("ghp_token".to_string()),
        true,
        true,
        &paths,
    )
    .await
    .unwrap();

    let config = paths.config_store().load().unwrap();
    assert_eq!(config.remote_id.as_deref(), Some("gist-42"));
    assert_eq!(config.credential.as_deref(), Some("ghp_token"));
    assert!(config.auto_sync_enabled);
    assert!(config.device_id.is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn config_init_switching_remote_forgets_versions() {
    let (_dir, paths) = temp_paths();
    let store = paths.config_store();
    store
        .save(&SyncConfig {
            remote_id: Some("old".to_string()),
            credential: Some("token".to_string()),
            local_version: Some("2024-01-01T00:00:00.000Z".to_string()),
            remote_version: Some("2024-01-01T00:00:00.000Z".to_string()),
            ..SyncConfig::default()
        })
        .unwrap();

    run_config_init(Some("new".to_string()), None, false, true, &paths)
        .await
        .unwrap();

    let config = store.load().unwrap();
    assert_eq!(config.remote_id.as_deref(), Some("new"));
    assert_eq!(config.credential.as_deref(), Some("token"));
    assert_eq!(config.local_version, None);
    assert_eq!(config.remote_version, None);
}

#[test]
fn config_clear_keeps_device_id_and_local_data() {
    let (_dir, paths) = temp_paths();
    let store = paths.config_store();
    store
        .save(&SyncConfig {
            remote_id: Some("gist-1".to_string()),
            credential: Some("token".to_string()),
            device_id: Some("device-1".to_string()),
            ..SyncConfig::default()
        })
        .unwrap();
    paths
        .document()
        .update(|state| state["logs"] = json!([]))
        .unwrap();

    run_config_clear(&paths).unwrap();

    let config = store.load().unwrap();
    assert_eq!(config.remote_id, None);
    assert_eq!(config.credential, None);
    assert_eq!(config.device_id.as_deref(), Some("device-1"));
    assert!(paths.data.exists());
}

#[test]
fn reset_removes_document_but_keeps_remote_config() {
    let (_dir, paths) = temp_paths();
    let store = paths.config_store();
    store
        .save(&SyncConfig {
            remote_id: Some("gist-1".to_string()),
            credential: Some("token".to_string()),
            local_version: Some("2024-01-01T00:00:00.000Z".to_string()),
            ..SyncConfig::default()
        })
        .unwrap();
    paths
        .document()
        .update(|state| state["logs"] = json!([1]))
        .unwrap();

    run_reset(&paths).unwrap();
    run_reset(&paths).unwrap();

    assert!(!paths.data.exists());
    let config = store.load().unwrap();
    assert_eq!(config.remote_id.as_deref(), Some("gist-1"));
    assert_eq!(config.local_version, None);
}
