//! Uninstall command for the zigp CLI.
//!
//! Removes the managed install directory. Succeeds when nothing is
//! installed.

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::toolchain::provision;

/// Executes the uninstall command.
///
/// Works on any host, including ones zigp cannot install for.
///
/// # Errors
///
/// Returns an error if the directory cannot be removed or the install
/// lock cannot be taken.
pub async fn execute() -> Result<()> {
    let settings = Settings::load()?;
    let dir = &settings.install_dir;

    let removed = provision::uninstall(dir, settings.lock_timeout)
        .await
        .with_context(|| format!("Failed to uninstall zig from {}", dir.display()))?;

    if removed {
        println!("Removed {}", dir.display());
    } else {
        println!("zig is not installed at {}", dir.display());
    }
    Ok(())
}
