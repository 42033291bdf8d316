//! Command modules for the zigp CLI.
//!
//! ## Toolchain Management Commands
//!
//! - [`install`] - Install the toolchain on request
//! - [`postinstall`] - Package-manager hook
//! - [`reinstall`] - Remove and install again
//! - [`uninstall`] - Remove the managed toolchain
//! - [`status`] - Show what is installed
//!
//! ## Delegation
//!
//! - [`run`] - Run the managed toolchain

pub mod install;
pub mod postinstall;
pub mod reinstall;
pub mod run;
pub mod status;
pub mod uninstall;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::toolchain::{
    HttpTransport, InstallMode, InstallOutcome, InstallStep, PlatformKey, Provisioner,
};

/// Builds a provisioner for the current project that prints its progress.
fn provisioner(settings: &Settings) -> Result<Provisioner<HttpTransport>> {
    let platform = PlatformKey::detect()?;
    let transport =
        HttpTransport::new(settings.request_timeout).context("Failed to set up downloads")?;
    Ok(Provisioner::new(settings, platform, transport).with_step_callback(Arc::new(print_step)))
}

fn print_step(step: InstallStep) {
    match step {
        InstallStep::SearchingSystem => println!("Looking for an installed zig..."),
        InstallStep::Resolved { version } => println!("Installing zig {version}..."),
        InstallStep::Downloading { url } => println!("Downloading from {url}..."),
        InstallStep::Extracting => println!("Extracting..."),
        InstallStep::Linking { target } => {
            println!("Using system zig at {}", target.display());
        }
    }
}

/// Runs an install in `mode` and reports the outcome.
async fn install_and_report(settings: &Settings, mode: InstallMode) -> Result<()> {
    let provisioner = provisioner(settings)?;
    let outcome = provisioner.install(mode).await.with_context(|| {
        format!(
            "Failed to install zig into {}",
            provisioner.paths().install_dir.display()
        )
    })?;
    let binary = &provisioner.paths().binary;

    match outcome {
        InstallOutcome::AlreadyInstalled => {
            println!("zig is already installed at {}", binary.display());
        }
        InstallOutcome::KeptSymlink => {
            println!("zig is linked to a system installation at {}", binary.display());
        }
        InstallOutcome::Linked { target, version } => {
            println!(
                "Linked {} -> {} (zig {version})",
                binary.display(),
                target.display()
            );
        }
        InstallOutcome::Provisioned { version, .. } => {
            println!("zig {} installed at {}", version.version, binary.display());
        }
    }
    Ok(())
}
