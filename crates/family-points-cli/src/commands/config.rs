use family_points_core::util::normalize_text_option;
use family_points_core::{RemoteDocumentStore, SyncConfig};

use crate::cli::ConfigCommands;
use crate::commands::common::{gist_client, redact_token, Paths, ENV_GIST_ID, ENV_GIST_TOKEN};
use crate::error::CliError;

pub async fn run_config(command: ConfigCommands, paths: &Paths) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            remote_id,
            token,
            auto_sync,
            skip_validate,
        } => run_config_init(remote_id, token, auto_sync, skip_validate, paths).await,
        ConfigCommands::Show => run_config_show(paths),
        ConfigCommands::Clear => run_config_clear(paths),
    }
}

pub async fn run_config_init(
    remote_id: Option<String>,
    token: Option<String>,
    auto_sync: bool,
    skip_validate: bool,
    paths: &Paths,
) -> Result<(), CliError> {
    let store = paths.config_store();
    let mut config = store.load()?;

    let merged_remote_id = normalize_text_option(remote_id)
        .or_else(|| normalize_text_option(std::env::var(ENV_GIST_ID).ok()))
        .or_else(|| config.remote_id().map(ToString::to_string));
    let merged_token = normalize_text_option(token)
        .or_else(|| normalize_text_option(std::env::var(ENV_GIST_TOKEN).ok()))
        .or_else(|| config.credential().map(ToString::to_string))
        .ok_or_else(|| CliError::Config("a token is required (--token)".to_string()))?;

    if let Some(remote_id) = merged_remote_id.as_deref() {
        if !skip_validate {
            let client = gist_client(&merged_token)?;
            if !client.validate(remote_id).await {
                return Err(CliError::RemoteUnreachable(remote_id.to_string()));
            }
        }
    }

    let changed_remote = merged_remote_id.as_deref() != config.remote_id();
    config.remote_id = merged_remote_id;
    config.credential = Some(merged_token);
    config.auto_sync_enabled = auto_sync;
    if changed_remote {
        config.local_version = None;
        config.remote_version = None;
    }
    config.get_or_create_device_id();
    store.save(&config)?;

    println!("Sync config saved to {}", store.path().display());
    if config.remote_id().is_none() {
        println!("No remote id yet. Run `fpoints remote create` to create one from local data.");
    } else if auto_sync {
        println!("Auto-sync is enabled. Run `fpoints watch` to keep this device in sync.");
    }
    Ok(())
}

pub fn run_config_show(paths: &Paths) -> Result<(), CliError> {
    let store = paths.config_store();
    let config = store.load()?;
    for line in format_config_lines(&config) {
        println!("{line}");
    }
    println!("Config file:  {}", store.path().display());
    println!("Data file:    {}", paths.data.display());
    Ok(())
}

pub fn run_config_clear(paths: &Paths) -> Result<(), CliError> {
    let store = paths.config_store();
    let mut config = store.load()?;
    config.clear();
    store.save(&config)?;
    println!("Sync config cleared; local data was left untouched.");
    Ok(())
}

pub fn format_config_lines(config: &SyncConfig) -> Vec<String> {
    vec![
        format!(
            "Remote id:    {}",
            config.remote_id().unwrap_or("<not set>")
        ),
        format!("Token:        {}", redact_token(config.credential())),
        format!(
            "Auto-sync:    {}",
            if config.auto_sync_enabled {
                "enabled"
            } else {
                "disabled"
            }
        ),
        format!(
            "Device id:    {}",
            config.device_id.as_deref().unwrap_or("<not assigned>")
        ),
    ]
}
