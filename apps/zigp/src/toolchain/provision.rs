//! Installing, linking, and removing the managed toolchain.
//!
//! Every request starts from a fresh [`InstallationState`] and follows the
//! transition table in [`plan`]. Mutations happen only under the
//! [`InstallLock`], and the state is classified again once the lock is
//! held, so an install that another process completed in the meantime
//! becomes a no-op.
//!
//! A local install never exposes a partial directory: the archive is
//! unpacked into a staging directory beside the install directory, and
//! the finished tree is moved into place with a single rename.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::archive;
use super::artifact::RemoteArtifact;
use super::locator::{SystemBinary, SystemBinaryLocator};
use super::lock::InstallLock;
use super::paths::{self, ManagedPaths, create_link};
use super::platform::PlatformKey;
use super::record::{InstallRecord, RecordSource};
use super::state::{InstallAction, InstallMode, InstallationState, plan};
use super::transport::Transport;
use super::version::{VersionResolver, VersionSpec};
use crate::config::Settings;
use crate::errors::{Result, ZigpError};

/// Step reported while an install is in progress.
#[derive(Debug, Clone)]
pub enum InstallStep {
    /// Looking for a usable system toolchain.
    SearchingSystem,
    /// The version to install is known.
    Resolved { version: VersionSpec },
    /// Fetching the archive.
    Downloading { url: String },
    /// Unpacking the archive.
    Extracting,
    /// Linking a system toolchain into the install directory.
    Linking { target: PathBuf },
}

/// Callback receiving [`InstallStep`]s.
pub type StepCallback = Arc<dyn Fn(InstallStep) + Send + Sync>;

/// What an install request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// A local toolchain was already present; nothing was touched.
    AlreadyInstalled,
    /// A system symlink was already present and kept.
    KeptSymlink,
    /// A system toolchain was linked.
    Linked { target: PathBuf, version: String },
    /// A toolchain was downloaded and unpacked.
    Provisioned { version: VersionSpec, url: String },
}

/// Drives installs of one managed directory.
pub struct Provisioner<T> {
    platform: PlatformKey,
    paths: ManagedPaths,
    resolver: VersionResolver,
    dist_server: String,
    lock_timeout: Duration,
    transport: T,
    path_var: Option<OsString>,
    on_step: StepCallback,
}

impl<T: Transport> Provisioner<T> {
    /// Creates a provisioner for the install described by `settings`.
    ///
    /// The system search uses the current `PATH`.
    #[must_use]
    pub fn new(settings: &Settings, platform: PlatformKey, transport: T) -> Self {
        Self {
            platform,
            paths: ManagedPaths::new(&settings.install_dir, platform),
            resolver: VersionResolver::from_settings(settings),
            dist_server: settings.dist_server.clone(),
            lock_timeout: settings.lock_timeout,
            transport,
            path_var: std::env::var_os("PATH"),
            on_step: Arc::new(|_| {}),
        }
    }

    /// Replaces the `PATH` value searched for a system toolchain.
    #[must_use]
    pub fn with_path_var(mut self, path_var: Option<OsString>) -> Self {
        self.path_var = path_var;
        self
    }

    /// Registers a callback for progress steps.
    #[must_use]
    pub fn with_step_callback(mut self, on_step: StepCallback) -> Self {
        self.on_step = on_step;
        self
    }

    #[must_use]
    pub fn paths(&self) -> &ManagedPaths {
        &self.paths
    }

    /// Classifies the managed binary.
    #[must_use]
    pub fn state(&self) -> InstallationState {
        InstallationState::detect(&self.paths.binary)
    }

    /// Brings the managed install to the state `mode` asks for.
    ///
    /// # Errors
    ///
    /// Returns version-resolution errors, `NetworkError`,
    /// `ExtractionError`, `FilesystemError`, or `LockTimeout`. On any
    /// error the install directory is either untouched or absent.
    pub async fn install(&self, mode: InstallMode) -> Result<InstallOutcome> {
        let action = plan(self.state(), mode);
        if let Some(outcome) = noop_outcome(action) {
            return Ok(outcome);
        }

        self.paths.ensure_parent()?;
        let _lock = InstallLock::acquire(&self.paths.lock, self.lock_timeout).await?;

        let state = self.state();
        let action = plan(state, mode);
        tracing::debug!(%state, ?mode, ?action, "install planned");

        match action {
            InstallAction::AlreadyInstalled | InstallAction::KeepSymlink => {
                Ok(noop_outcome(action).unwrap_or(InstallOutcome::AlreadyInstalled))
            }
            InstallAction::LinkOrProvision => {
                (self.on_step)(InstallStep::SearchingSystem);
                let locator = SystemBinaryLocator::new(
                    &self.paths.install_dir,
                    self.platform.binary_name(),
                );
                match locator.locate(self.path_var.as_deref()).await {
                    SystemBinary::Found { path, version } => self.link(path, version),
                    SystemBinary::NotFound => self.provision().await,
                }
            }
            InstallAction::Provision => self.provision().await,
        }
    }

    /// Makes the managed binary a symlink to a system toolchain.
    fn link(&self, target: PathBuf, version: String) -> Result<InstallOutcome> {
        (self.on_step)(InstallStep::Linking {
            target: target.clone(),
        });

        self.paths.remove_install_dir()?;
        let dir = &self.paths.install_dir;
        std::fs::create_dir_all(dir).map_err(|e| ZigpError::fs("failed to create", dir, e))?;
        create_link(&target, &self.paths.binary)?;

        InstallRecord::now(
            version.clone(),
            self.platform.to_string(),
            RecordSource::System {
                target: target.clone(),
            },
        )
        .write(&self.paths.record)?;

        tracing::info!(target = %target.display(), %version, "linked system toolchain");
        Ok(InstallOutcome::Linked { target, version })
    }

    /// Downloads and unpacks a local toolchain.
    async fn provision(&self) -> Result<InstallOutcome> {
        let version = self.resolver.resolve(&self.transport, self.platform).await?;
        let artifact = RemoteArtifact::locate(&self.dist_server, &version, self.platform);
        (self.on_step)(InstallStep::Resolved {
            version: version.clone(),
        });

        self.paths.remove_install_dir()?;
        let parent = self.paths.parent();

        let download = tempfile::Builder::new()
            .prefix(".zig-download-")
            .suffix(&format!(".{}", artifact.format.extension()))
            .tempfile_in(parent)
            .map_err(|e| ZigpError::fs("failed to create download file in", parent, e))?;

        (self.on_step)(InstallStep::Downloading {
            url: artifact.url.clone(),
        });
        tracing::info!(url = %artifact.url, "downloading toolchain");
        self.transport
            .fetch_to_file(&artifact.url, download.path())
            .await?;

        (self.on_step)(InstallStep::Extracting);
        let staging = tempfile::Builder::new()
            .prefix(".zig-staging-")
            .tempdir_in(parent)
            .map_err(|e| ZigpError::fs("failed to create staging directory in", parent, e))?;
        archive::extract(
            download.path(),
            artifact.format,
            staging.path(),
            artifact.strip_components,
        )?;

        let staged_binary = staging.path().join(self.platform.binary_name());
        if !staged_binary.is_file() {
            return Err(ZigpError::extraction(
                download.path(),
                format!(
                    "archive from {} has no {} at its top level",
                    artifact.url,
                    self.platform.binary_name()
                ),
            ));
        }
        archive::set_executable(&staged_binary)?;

        InstallRecord::now(
            version.version.clone(),
            self.platform.to_string(),
            RecordSource::Local {
                url: artifact.url.clone(),
            },
        )
        .write(&staging.path().join(super::paths::RECORD_FILE))?;

        let staged = staging.keep();
        let install_dir = &self.paths.install_dir;
        if let Err(e) = std::fs::rename(&staged, install_dir) {
            let _ = std::fs::remove_dir_all(&staged);
            return Err(ZigpError::fs("failed to move toolchain into", install_dir, e));
        }

        tracing::info!(version = %version.version, dir = %install_dir.display(), "toolchain installed");
        Ok(InstallOutcome::Provisioned {
            version,
            url: artifact.url,
        })
    }

    /// Removes the install directory.
    ///
    /// Returns whether anything was removed. Removing an absent install
    /// succeeds without taking the lock.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` or `LockTimeout`.
    pub async fn uninstall(&self) -> Result<bool> {
        uninstall(&self.paths.install_dir, self.lock_timeout).await
    }
}

/// Removes the managed install at `install_dir` under the install lock.
///
/// Needs neither the host platform nor network access. Returns whether
/// anything was removed; an absent install succeeds without taking the
/// lock.
///
/// # Errors
///
/// Returns `FilesystemError` or `LockTimeout`.
pub async fn uninstall(install_dir: &Path, lock_timeout: Duration) -> Result<bool> {
    if std::fs::symlink_metadata(install_dir).is_err() {
        return Ok(false);
    }

    paths::ensure_parent(install_dir)?;
    let _lock = InstallLock::acquire(&paths::lock_path(install_dir), lock_timeout).await?;
    let existed = std::fs::symlink_metadata(install_dir).is_ok();
    paths::remove_install_dir(install_dir)?;
    tracing::info!(dir = %install_dir.display(), "toolchain removed");
    Ok(existed)
}

fn noop_outcome(action: InstallAction) -> Option<InstallOutcome> {
    match action {
        InstallAction::AlreadyInstalled => Some(InstallOutcome::AlreadyInstalled),
        InstallAction::KeepSymlink => Some(InstallOutcome::KeptSymlink),
        InstallAction::LinkOrProvision | InstallAction::Provision => None,
    }
}
