#![warn(clippy::pedantic)]

//! # zigp
//!
//! Provisions a project-local Zig toolchain and runs it.
//!
//! A project depends on zigp instead of on a globally installed zig. The
//! package manager's postinstall hook links a zig already on PATH or
//! downloads the configured version into the project, and `zigp run`
//! forwards every invocation to that toolchain with its exit code intact.
//!
//! ## Subcommands
//!
//! - `install` - Install the toolchain (`--force` to download again)
//! - `postinstall` - Package-manager hook; reuses a system zig if present
//! - `reinstall` - Remove and download again
//! - `run` - Run the managed zig
//! - `uninstall` - Remove the managed toolchain
//! - `status` - Show what is installed
//!
//! ## Examples
//!
//! ```bash
//! zigp install
//! zigp run build test
//! ```

mod commands;
mod config;
mod errors;
mod toolchain;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{install, postinstall, reinstall, run, status, uninstall};
use errors::ZigpError;

/// Project-local Zig toolchain manager.
#[derive(Parser)]
#[command(
    name = "zigp",
    author,
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("ZIGP_GIT_COMMIT"), ")"),
    about = "Provisions a project-local Zig toolchain and runs it",
    after_help = "\
CONFIGURATION:
    Settings are read from zigp.toml in the project root. Environment
    variables take precedence over the file.

ENVIRONMENT VARIABLES:
    ZIGP_PROJECT_ROOT       Project root (default: current directory)
    ZIGP_INSTALL_DIR        Managed install directory (default: <root>/.zig)
    ZIGP_DIST_SERVER        Distribution server (default: https://ziglang.org)
    ZIGP_LOCK_TIMEOUT_SECS  Wait for a concurrent install (default: 120)
    ZIGP_LOG                Log filter, e.g. zigp=debug"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). Goes before the
    /// subcommand, so `zigp run -v` still passes `-v` to zig.
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the zigp CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install the managed toolchain.
    ///
    /// Links a zig found on PATH when nothing is installed, otherwise
    /// downloads the configured version. An existing system link is
    /// replaced with a local copy.
    Install(install::InstallArgs),

    /// Package-manager postinstall hook.
    ///
    /// Keeps any existing toolchain, including a system link.
    Postinstall,

    /// Remove the managed toolchain and download it again.
    Reinstall,

    /// Run the managed zig with the given arguments.
    ///
    /// All arguments, including flags such as --help, go to zig.
    #[command(disable_help_flag = true)]
    Run(run::RunArgs),

    /// Remove the managed toolchain.
    Uninstall,

    /// Show the managed toolchain's state.
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Handles an error and returns the appropriate exit code.
///
/// `ProcessExitCode` exits silently with the child's code, since zig has
/// already reported its own diagnostics. A child killed by signal `S`
/// exits with `128 + S`. Everything else prints the error chain and exits
/// with 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<ZigpError>() {
        Some(ZigpError::ProcessExitCode { code }) => *code,
        Some(ZigpError::AbnormalTermination { signal }) => {
            eprintln!("Error: {e}");
            128 + signal
        }
        _ => {
            eprintln!("Error: {e:?}");
            1
        }
    }
}

/// Sets up stderr logging from `ZIGP_LOG`, or from `-v` when it is unset.
fn init_tracing(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("ZIGP_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("zigp={level}")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Install(args) => install::execute(&args).await,
        Commands::Postinstall => postinstall::execute().await,
        Commands::Reinstall => reinstall::execute().await,
        Commands::Run(args) => run::execute(&args).await,
        Commands::Uninstall => uninstall::execute().await,
        Commands::Status => status::execute(),
    }
}
