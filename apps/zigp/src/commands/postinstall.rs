//! Postinstall hook for package managers.
//!
//! Run after the package is added to a project. Keeps whatever toolchain
//! is already in place (local copy or system link); otherwise links a zig
//! found on PATH, falling back to downloading one.
//!
//! ## Usage
//!
//! ```json
//! { "scripts": { "postinstall": "zigp postinstall" } }
//! ```

use anyhow::Result;

use crate::config::Settings;
use crate::toolchain::InstallMode;

/// Executes the postinstall hook.
///
/// # Errors
///
/// Same as `install`.
pub async fn execute() -> Result<()> {
    let settings = Settings::load()?;
    super::install_and_report(&settings, InstallMode::Hook).await
}
