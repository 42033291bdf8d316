//! Filesystem layout of the managed install.
//!
//! ```text
//! <project>/
//! ├── .zig/                     # install directory
//! │   ├── zig                   # toolchain binary (or a symlink to a system zig)
//! │   ├── lib/                  # rest of the unpacked archive
//! │   └── .zigp-install.json    # install record
//! └── .zig.lock                 # advisory install lock
//! ```
//!
//! The lock sits next to the install directory so that removing the
//! directory never removes a lock another process is holding.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::platform::PlatformKey;
use crate::errors::{Result, ZigpError};

/// File name of the install record inside the install directory.
pub const RECORD_FILE: &str = ".zigp-install.json";

/// Paths of one managed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedPaths {
    /// The install directory.
    pub install_dir: PathBuf,
    /// The toolchain binary `run` delegates to.
    pub binary: PathBuf,
    /// The install record.
    pub record: PathBuf,
    /// The advisory lock file.
    pub lock: PathBuf,
}

impl ManagedPaths {
    /// Lays out the managed install rooted at `install_dir`.
    #[must_use]
    pub fn new(install_dir: &Path, platform: PlatformKey) -> Self {
        Self {
            binary: install_dir.join(platform.binary_name()),
            record: install_dir.join(RECORD_FILE),
            lock: lock_path(install_dir),
            install_dir: install_dir.to_path_buf(),
        }
    }

    /// Directory that holds the install directory, its lock, and staging
    /// areas.
    #[must_use]
    pub fn parent(&self) -> &Path {
        self.install_dir.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Creates the parent of the install directory.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` if the directory cannot be created.
    pub fn ensure_parent(&self) -> Result<()> {
        ensure_parent(&self.install_dir)
    }

    /// Removes the install directory and everything in it.
    ///
    /// A missing directory is not an error. The lock file is left alone.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` if removal fails.
    pub fn remove_install_dir(&self) -> Result<()> {
        remove_install_dir(&self.install_dir)
    }
}

/// The advisory lock file guarding `install_dir`: a sibling named
/// `<install dir name>.lock`.
#[must_use]
pub fn lock_path(install_dir: &Path) -> PathBuf {
    let mut lock_name = install_dir
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("zig"));
    lock_name.push(".lock");
    install_dir.with_file_name(lock_name)
}

/// Creates the directory that holds `install_dir`.
///
/// # Errors
///
/// Returns `FilesystemError` if the directory cannot be created.
pub fn ensure_parent(install_dir: &Path) -> Result<()> {
    let parent = install_dir.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| ZigpError::fs("failed to create", parent, e))
}

/// Removes `dir`, or the file or symlink at that path, without following
/// links. A missing path is not an error.
///
/// # Errors
///
/// Returns `FilesystemError` if removal fails.
pub fn remove_install_dir(dir: &Path) -> Result<()> {
    match std::fs::symlink_metadata(dir) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(dir),
        Ok(_) => std::fs::remove_file(dir),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ZigpError::fs("failed to inspect", dir, e)),
    }
    .map_err(|e| ZigpError::fs("failed to remove", dir, e))
}

/// Creates `target` as a link to `source`.
///
/// On Windows, falls back to a hard link and then a copy when symbolic links
/// are not permitted.
///
/// # Errors
///
/// Returns `FilesystemError` if no kind of link can be created.
pub fn create_link(source: &Path, target: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(source, target)
            .map_err(|e| ZigpError::fs("failed to create symlink", target, e))?;
    }

    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(source, target)
            .or_else(|_| std::fs::hard_link(source, target))
            .or_else(|_| std::fs::copy(source, target).map(|_| ()))
            .map_err(|e| ZigpError::fs("failed to create link", target, e))?;
    }

    Ok(())
}
