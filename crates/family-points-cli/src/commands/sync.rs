use family_points_core::util::unix_millis_now;
use family_points_core::{DownloadOutcome, SyncConfig, UploadOutcome};

use crate::cli::SyncCommands;
use crate::commands::common::{
    format_status_lines, inactive_reason, load_config, open_engine, status_report, CliEngine,
    Paths,
};
use crate::error::CliError;

pub async fn run_sync(command: SyncCommands, paths: &Paths) -> Result<(), CliError> {
    match command {
        SyncCommands::Status { json } => run_sync_status(json, paths),
        SyncCommands::Download => {
            let Some(engine) = open_automatic_engine(paths, "downloaded")? else {
                return Ok(());
            };
            let outcome = engine.auto_download().await;
            report_download(outcome, &engine.config(), false)
        }
        SyncCommands::Upload => {
            let Some(engine) = open_automatic_engine(paths, "uploaded")? else {
                return Ok(());
            };
            let outcome = engine.auto_upload().await;
            report_upload(outcome, &engine.config(), false)
        }
        SyncCommands::Pull => {
            let engine = open_engine(paths)?;
            let outcome = engine.pull_remote().await;
            report_download(outcome, &engine.config(), true)
        }
        SyncCommands::Push => {
            let engine = open_engine(paths)?;
            let outcome = engine.push_local().await;
            report_upload(outcome, &engine.config(), true)
        }
    }
}

/// `None` after printing why, when automatic sync would not run.
fn open_automatic_engine(paths: &Paths, action: &str) -> Result<Option<CliEngine>, CliError> {
    let config = load_config(&paths.config_store())?;
    if let Some(reason) = inactive_reason(&config) {
        println!("Nothing {action}: {reason}.");
        return Ok(None);
    }
    open_engine(paths).map(Some)
}

fn skip_reason(config: &SyncConfig) -> &'static str {
    inactive_reason(config).unwrap_or("sync is not active")
}

pub fn run_sync_status(as_json: bool, paths: &Paths) -> Result<(), CliError> {
    let config = load_config(&paths.config_store())?;
    let report = status_report(
        &config,
        paths.document().embedded_version(),
        unix_millis_now(),
    );

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_status_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

/// Print a download outcome; `manual` flows treat a skip as misconfiguration.
/// `config` is the engine's config after the flow and explains a skip.
pub fn report_download(
    outcome: DownloadOutcome,
    config: &SyncConfig,
    manual: bool,
) -> Result<(), CliError> {
    match outcome {
        DownloadOutcome::Skipped if manual => Err(CliError::SyncNotConfigured),
        DownloadOutcome::Skipped => {
            println!("Nothing downloaded: {}.", skip_reason(config));
            Ok(())
        }
        DownloadOutcome::Unreachable => Err(CliError::SyncFailed(
            "unable to reach the remote document".to_string(),
        )),
        DownloadOutcome::LegacyRemote => {
            println!(
                "Remote document has no version yet; local data kept. \
                 Run `fpoints sync pull` to take it anyway."
            );
            Ok(())
        }
        DownloadOutcome::UpToDate { remote_version } => {
            println!("Local data is up to date (remote version {remote_version}).");
            Ok(())
        }
        DownloadOutcome::Replaced { version } => {
            println!("Local data replaced with remote version {version}. Reload any open views.");
            Ok(())
        }
        DownloadOutcome::Failed { message } => Err(CliError::SyncFailed(message)),
    }
}

pub fn report_upload(
    outcome: UploadOutcome,
    config: &SyncConfig,
    manual: bool,
) -> Result<(), CliError> {
    match outcome {
        UploadOutcome::Skipped if manual => Err(CliError::SyncNotConfigured),
        UploadOutcome::Skipped => {
            println!("Nothing uploaded: {}.", skip_reason(config));
            Ok(())
        }
        UploadOutcome::Unreachable => Err(CliError::SyncFailed(
            "unable to reach the remote document".to_string(),
        )),
        UploadOutcome::Conflict {
            local_version,
            remote_version,
        } => Err(CliError::Conflict {
            local_version,
            remote_version,
        }),
        UploadOutcome::UpToDate { version } => {
            println!("Remote already holds this data (version {version}).");
            Ok(())
        }
        UploadOutcome::Uploaded { version } => {
            println!("Uploaded version {version}.");
            Ok(())
        }
        UploadOutcome::Failed { message } => Err(CliError::SyncFailed(message)),
    }
}
