//! Run command for the zigp CLI.
//!
//! Executes the managed zig with the given arguments. Standard streams
//! are shared with the child, and zigp exits with the child's exit code.
//!
//! ## Usage
//!
//! ```bash
//! zigp run version
//! zigp run build -Doptimize=ReleaseSafe
//! zigp run --help            # zig's help, not zigp's
//! ```

use std::ffi::OsString;

use anyhow::Result;
use clap::Args;

use crate::config::Settings;
use crate::toolchain::paths::ManagedPaths;
use crate::toolchain::{PlatformKey, ProcessDelegator};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Arguments passed to zig unchanged.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<OsString>,
}

/// Executes the run command.
///
/// # Errors
///
/// Returns `NotInstalled` when there is no usable binary, `SpawnError`
/// when it cannot be started, `ProcessExitCode` for a non-zero exit, and
/// `AbnormalTermination` when zig is killed by a signal.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let settings = Settings::load()?;
    let platform = PlatformKey::detect()?;
    let paths = ManagedPaths::new(&settings.install_dir, platform);

    let result = ProcessDelegator::new(&paths.binary).run(&args.args).await?;
    result.into_result()?;
    Ok(())
}
