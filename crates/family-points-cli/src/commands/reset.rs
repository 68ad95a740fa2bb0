use family_points_core::engine::reset_local;

use crate::commands::common::Paths;
use crate::error::CliError;

pub fn run_reset(paths: &Paths) -> Result<(), CliError> {
    reset_local(&paths.document(), &paths.config_store())?;
    println!(
        "Local data removed from {}. Sync config was kept.",
        paths.data.display()
    );
    Ok(())
}
