//! Finding a usable toolchain already installed on the system.
//!
//! The search must never resolve to zigp's own output. PATH entries that
//! lead into the managed install directory are dropped before searching,
//! as are `node_modules/.bin` directories, whose package-manager shims
//! point back at the managed binary.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

/// Upper bound on the `zig version` probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a system search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemBinary {
    Found { path: PathBuf, version: String },
    NotFound,
}

/// Searches PATH for a system toolchain, excluding the managed install.
#[derive(Debug, Clone)]
pub struct SystemBinaryLocator {
    managed_dir: PathBuf,
    managed_dir_canonical: Option<PathBuf>,
    binary_name: &'static str,
    probe_timeout: Duration,
}

impl SystemBinaryLocator {
    #[must_use]
    pub fn new(managed_dir: &Path, binary_name: &'static str) -> Self {
        Self {
            managed_dir: managed_dir.to_path_buf(),
            managed_dir_canonical: managed_dir.canonicalize().ok(),
            binary_name,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Returns `path_var` without the entries that could resolve to the
    /// managed binary.
    #[must_use]
    pub fn sanitize_path(&self, path_var: &OsStr) -> OsString {
        let kept: Vec<PathBuf> = std::env::split_paths(path_var)
            .filter(|entry| {
                let excluded = self.is_excluded(entry);
                if excluded {
                    tracing::debug!(entry = %entry.display(), "excluding PATH entry");
                }
                !excluded
            })
            .collect();
        std::env::join_paths(kept).unwrap_or_default()
    }

    fn is_excluded(&self, entry: &Path) -> bool {
        if entry.as_os_str().is_empty() || entry.ends_with("node_modules/.bin") {
            return true;
        }
        if entry == self.managed_dir {
            return true;
        }
        match (&self.managed_dir_canonical, entry.canonicalize()) {
            (Some(managed), Ok(canonical)) => canonical == *managed,
            _ => false,
        }
    }

    fn is_inside_managed_dir(&self, candidate: &Path) -> bool {
        if candidate.starts_with(&self.managed_dir) {
            return true;
        }
        match (&self.managed_dir_canonical, candidate.canonicalize()) {
            (Some(managed), Ok(canonical)) => canonical.starts_with(managed),
            _ => false,
        }
    }

    /// Looks up the toolchain on `path_var` and asks it for its version.
    ///
    /// Every failure along the way (nothing on PATH, a candidate inside
    /// the managed directory, a probe that fails, prints nothing, or times
    /// out) yields `NotFound`.
    pub async fn locate(&self, path_var: Option<&OsStr>) -> SystemBinary {
        let Some(path_var) = path_var else {
            return SystemBinary::NotFound;
        };
        let search_path = self.sanitize_path(path_var);
        if search_path.is_empty() {
            return SystemBinary::NotFound;
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| self.managed_dir.clone());

        let candidate = match which::which_in(self.binary_name, Some(&search_path), &cwd) {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::debug!(error = %e, "no system toolchain on PATH");
                return SystemBinary::NotFound;
            }
        };

        if self.is_inside_managed_dir(&candidate) {
            tracing::debug!(candidate = %candidate.display(), "ignoring candidate inside the managed directory");
            return SystemBinary::NotFound;
        }

        match self.probe_version(&candidate).await {
            Some(version) => {
                tracing::debug!(path = %candidate.display(), %version, "found system toolchain");
                SystemBinary::Found {
                    path: candidate,
                    version,
                }
            }
            None => SystemBinary::NotFound,
        }
    }

    async fn probe_version(&self, candidate: &Path) -> Option<String> {
        let mut command = tokio::process::Command::new(candidate);
        command
            .arg("version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.probe_timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(candidate = %candidate.display(), error = %e, "cannot run system toolchain");
                return None;
            }
            Err(_) => {
                tracing::warn!(candidate = %candidate.display(), "system toolchain version probe timed out");
                return None;
            }
        };

        if !output.status.success() {
            tracing::debug!(candidate = %candidate.display(), status = %output.status, "version probe failed");
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(str::trim)
            .filter(|version| !version.is_empty())
            .map(str::to_string)
    }
}
