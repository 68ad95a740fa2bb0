use crate::cli::RemoteCommands;
use crate::commands::common::{open_engine, Paths};
use crate::error::CliError;

pub async fn run_remote(command: RemoteCommands, paths: &Paths) -> Result<(), CliError> {
    let engine = open_engine(paths)?;
    match command {
        RemoteCommands::Create => {
            let remote_id = engine.create_remote().await?;
            println!("Created remote document {remote_id}");
            println!("Run `fpoints sync push` to upload the first versioned copy.");
        }
        RemoteCommands::Validate => {
            let remote_id = engine
                .config()
                .remote_id()
                .map(ToString::to_string)
                .ok_or(CliError::SyncNotConfigured)?;
            if !engine.validate_remote().await? {
                return Err(CliError::RemoteUnreachable(remote_id));
            }
            println!("Remote document {remote_id} is reachable");
        }
    }
    Ok(())
}
