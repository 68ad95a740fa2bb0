use std::sync::Arc;
use std::time::Duration;

use family_points_core::checksum::state_checksum;
use family_points_core::{
    ChangeDebouncer, LocalDocument, LocalStateStore, StatusSnapshot, SyncStatus,
};
use tokio::time::MissedTickBehavior;

use crate::commands::common::{inactive_reason, load_config, open_engine, Paths};
use crate::commands::sync::report_download;
use crate::error::CliError;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub async fn run_watch(debounce_ms: u64, poll_ms: u64, paths: &Paths) -> Result<(), CliError> {
    if let Some(reason) = inactive_reason(&load_config(&paths.config_store())?) {
        return Err(CliError::Config(format!(
            "cannot watch: {reason}. Run `fpoints config init --auto-sync` first"
        )));
    }
    let engine = Arc::new(open_engine(paths)?);

    let outcome = engine.auto_download().await;
    if let Err(error) = report_download(outcome, &engine.config(), false) {
        eprintln!("Warning: startup download did not complete: {error}");
    }

    let debouncer =
        ChangeDebouncer::spawn(Arc::clone(&engine), Duration::from_millis(debounce_ms))
            .ok_or_else(|| CliError::Config("auto-sync was disabled during startup".to_string()))?;

    let mut status = engine.subscribe_status();
    let mut active = engine.subscribe_active();
    let mut fingerprint = document_fingerprint(engine.document());
    let mut ticker = tokio::time::interval(Duration::from_millis(poll_ms).max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    println!("Watching {} (Ctrl+C to stop)", paths.data.display());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poll_for_change(engine.document(), &mut fingerprint);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                if let Some(line) = format_status_change(&snapshot) {
                    println!("{line}");
                }
            }
            changed = active.changed() => {
                if changed.is_err() || !*active.borrow_and_update() {
                    let config = engine.config();
                    println!(
                        "Sync stopped: {}.",
                        inactive_reason(&config).unwrap_or("sync is not active")
                    );
                    break;
                }
            }
            result = &mut shutdown => {
                result?;
                break;
            }
        }
    }

    debouncer.cancel();
    println!("Stopped watching.");
    Ok(())
}

/// Raise a change event when the document's state no longer matches
/// `fingerprint`, which is updated in place. Returns whether an event fired.
pub fn poll_for_change<S: LocalStateStore>(
    document: &LocalDocument<S>,
    fingerprint: &mut Option<String>,
) -> bool {
    let current = document_fingerprint(document);
    if current == *fingerprint {
        return false;
    }
    *fingerprint = current;
    if fingerprint.is_none() {
        return false;
    }
    tracing::debug!("Local document changed on disk");
    document.notify_changed();
    true
}

/// Checksum of the application state, ignoring the embedded version tag so
/// that stamping after an upload is not mistaken for an edit. `None` while
/// the document is missing or unreadable.
pub fn document_fingerprint<S: LocalStateStore>(document: &LocalDocument<S>) -> Option<String> {
    document
        .app_state()
        .ok()
        .map(|state| state_checksum(&state))
}

pub fn format_status_change(snapshot: &StatusSnapshot) -> Option<String> {
    match snapshot.status {
        SyncStatus::Syncing | SyncStatus::Idle => None,
        SyncStatus::Success => Some("[success] in sync".to_string()),
        SyncStatus::Error => Some(format!(
            "[error] {}",
            snapshot.message.as_deref().unwrap_or("sync failed")
        )),
        SyncStatus::Conflict => Some(format!(
            "[conflict] {} (run `fpoints sync pull` in another shell)",
            snapshot.message.as_deref().unwrap_or("remote is newer")
        )),
    }
}
