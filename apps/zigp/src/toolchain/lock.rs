//! Advisory lock serializing installs of one managed directory.
//!
//! Concurrent `install`/`reinstall`/`uninstall` invocations contend for an
//! exclusive OS file lock on the lock file beside the install directory.
//! The lock is released when the [`InstallLock`] is dropped, including when
//! the holding process dies. The lock file itself is never deleted.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::FileExt;

use crate::errors::{Result, ZigpError};

/// Delay between acquisition attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A held install lock.
#[derive(Debug)]
pub struct InstallLock {
    _file: File,
    path: PathBuf,
}

impl InstallLock {
    /// Takes the lock at `path` without waiting.
    ///
    /// Returns `None` if another holder has it.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` if the lock file cannot be opened or the
    /// lock call fails for a reason other than contention.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ZigpError::fs("failed to open lock", path, e))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self {
                _file: file,
                path: path.to_path_buf(),
            })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(ZigpError::fs("failed to lock", path, e)),
        }
    }

    /// Takes the lock at `path`, waiting up to `timeout` for the current
    /// holder to release it.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` if the lock is still held after `timeout`.
    pub async fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        let started = Instant::now();
        let mut announced = false;

        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                tracing::debug!(lock = %path.display(), "install lock acquired");
                return Ok(lock);
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(ZigpError::LockTimeout {
                    path: path.to_path_buf(),
                    waited_secs: waited.as_secs(),
                });
            }
            if !announced {
                tracing::info!(lock = %path.display(), "waiting for another install to finish");
                announced = true;
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout - waited)).await;
        }
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        tracing::debug!(lock = %self.path.display(), "install lock released");
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs4::lock_contended_error().raw_os_error()
}
