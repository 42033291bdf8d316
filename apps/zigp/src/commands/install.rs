//! Install command for the zigp CLI.
//!
//! Makes the managed toolchain available. An existing local install is
//! kept; a link to a system toolchain is replaced by a local copy.
//!
//! ## Usage
//!
//! ```bash
//! zigp install           # Install unless already installed
//! zigp install --force   # Download again whatever is present
//! ```

use anyhow::Result;
use clap::Args;

use crate::config::Settings;
use crate::toolchain::InstallMode;

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Download and unpack the toolchain even if one is already present.
    #[clap(long, short = 'f', action = clap::ArgAction::SetTrue)]
    pub force: bool,
}

/// Executes the install command.
///
/// # Errors
///
/// Returns an error if configuration, version resolution, download,
/// extraction, or the install lock fails.
pub async fn execute(args: &InstallArgs) -> Result<()> {
    let settings = Settings::load()?;
    let mode = if args.force {
        InstallMode::Forced
    } else {
        InstallMode::Explicit
    };
    super::install_and_report(&settings, mode).await
}
