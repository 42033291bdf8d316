//! The install record: a JSON sidecar describing what occupies the
//! install directory.
//!
//! ```json
//! {
//!   "version": "0.13.0",
//!   "installed_at": "2024-06-07T12:00:00Z",
//!   "platform": "linux-x86_64",
//!   "source": { "kind": "local", "url": "https://ziglang.org/download/0.13.0/zig-linux-x86_64-0.13.0.tar.xz" }
//! }
//! ```
//!
//! The record is informational. Installation state is always classified
//! from the filesystem, and a missing or unreadable record never blocks
//! `run` or `install`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::{Result, ZigpError};

/// How the toolchain in the install directory got there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordSource {
    /// Downloaded and unpacked from `url`.
    Local { url: String },
    /// A link to a toolchain already on the system.
    System { target: PathBuf },
}

/// Contents of the install record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Toolchain version, as resolved or as reported by the system binary.
    pub version: String,
    /// RFC 3339 timestamp of the install.
    pub installed_at: String,
    /// Platform identifier, e.g. `linux-x86_64`.
    pub platform: String,
    pub source: RecordSource,
}

impl InstallRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn now(version: impl Into<String>, platform: impl Into<String>, source: RecordSource) -> Self {
        Self {
            version: version.into(),
            installed_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            platform: platform.into(),
            source,
        }
    }

    /// Reads the record at `path`.
    ///
    /// Returns `None` if the file is missing or cannot be parsed.
    #[must_use]
    pub fn read(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(record = %path.display(), error = %e, "cannot read install record");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(record = %path.display(), error = %e, "ignoring malformed install record");
                None
            }
        }
    }

    /// Writes the record to `path`.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            ZigpError::fs("failed to serialize", path, std::io::Error::other(e))
        })?;
        std::fs::write(path, json + "\n").map_err(|e| ZigpError::fs("failed to write", path, e))
    }
}
