//! Status command for the zigp CLI.
//!
//! Shows the managed binary path, how it is classified, and the install
//! record when there is one. Read-only.

use anyhow::Result;

use crate::config::Settings;
use crate::toolchain::paths::ManagedPaths;
use crate::toolchain::{InstallRecord, InstallationState, PlatformKey, RecordSource};

/// Executes the status command.
///
/// # Errors
///
/// Returns an error if configuration loading or platform detection fails.
pub fn execute() -> Result<()> {
    let settings = Settings::load()?;
    let platform = PlatformKey::detect()?;
    let paths = ManagedPaths::new(&settings.install_dir, platform);
    let state = InstallationState::detect(&paths.binary);

    for line in status_lines(&paths, state, InstallRecord::read(&paths.record).as_ref()) {
        println!("{line}");
    }
    Ok(())
}

fn status_lines(
    paths: &ManagedPaths,
    state: InstallationState,
    record: Option<&InstallRecord>,
) -> Vec<String> {
    let mut lines = vec![
        format!("Binary:    {}", paths.binary.display()),
        format!("State:     {state}"),
    ];

    if state == InstallationState::SymlinkToSystem
        && let Ok(target) = std::fs::read_link(&paths.binary)
    {
        lines.push(format!("Target:    {}", target.display()));
    }

    match record {
        Some(record) => {
            lines.push(format!("Version:   {}", record.version));
            lines.push(format!("Installed: {}", record.installed_at));
            lines.push(format!("Platform:  {}", record.platform));
            lines.push(match &record.source {
                RecordSource::Local { url } => format!("Source:    {url}"),
                RecordSource::System { target } => {
                    format!("Source:    system ({})", target.display())
                }
            });
        }
        None if state != InstallationState::Absent => {
            lines.push("Version:   unknown (no install record)".to_string());
        }
        None => {}
    }

    lines
}
