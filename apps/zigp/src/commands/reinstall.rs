//! Reinstall command for the zigp CLI.
//!
//! Removes the managed toolchain and downloads it again. Never links a
//! system toolchain.

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::toolchain::InstallMode;

/// Executes the reinstall command.
///
/// # Errors
///
/// Returns an error if removal or the subsequent install fails.
pub async fn execute() -> Result<()> {
    let settings = Settings::load()?;
    let provisioner = super::provisioner(&settings)?;

    if provisioner
        .uninstall()
        .await
        .context("Failed to remove the existing toolchain")?
    {
        println!(
            "Removed {}",
            provisioner.paths().install_dir.display()
        );
    }

    super::install_and_report(&settings, InstallMode::Forced).await
}
