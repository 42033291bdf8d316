//! Error types for zigp.
//!
//! `ZigpError` is the taxonomy every toolchain operation reports through.
//! Command handlers wrap it in `anyhow::Error`; `main` downcasts it back to
//! pick the process exit code.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias for the toolchain core.
pub type Result<T, E = ZigpError> = std::result::Result<T, E>;

/// Consolidated error type for provisioning and delegation.
#[derive(Debug, Error)]
pub enum ZigpError {
    /// The host OS or CPU architecture has no published toolchain build.
    #[error(
        "unsupported platform: {os} on {arch} (supported: macos, linux, windows, freebsd on x86_64 or aarch64)"
    )]
    UnsupportedPlatform {
        /// Host operating system identifier.
        os: String,
        /// Host CPU architecture identifier.
        arch: String,
    },

    /// The project metadata does not declare a usable toolchain version.
    #[error("missing version declaration in {}: {reason}", .path.display())]
    MissingVersionDeclaration {
        /// The metadata file that was consulted.
        path: PathBuf,
        /// Why the declaration was rejected.
        reason: String,
    },

    /// The remote release index could not be fetched or parsed.
    #[error("release index unavailable at {url}: {message}")]
    RemoteIndexUnavailable {
        /// Index URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The release index has no build for this platform.
    #[error("no {platform} artifact published for zig {version}")]
    NoArtifactForPlatform {
        /// Index key of the platform (e.g. `x86_64-linux`).
        platform: String,
        /// The selected release.
        version: String,
    },

    /// Download failed or was interrupted.
    #[error("download of {url} failed: {message}")]
    NetworkError {
        /// The artifact URL.
        url: String,
        /// Description of the failure.
        message: String,
        /// The underlying error, when there is one.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The archive is corrupt or has an unexpected layout.
    #[error("cannot extract {}: {message}", .archive.display())]
    ExtractionError {
        /// The archive being extracted.
        archive: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A filesystem operation on the managed install failed.
    #[error("{action} {}: {source}", .path.display())]
    FilesystemError {
        /// What was being attempted (e.g. "failed to remove").
        action: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("invalid configuration in {}: {message}", .path.display())]
    Config {
        /// The configuration file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Another invocation held the install lock for too long.
    #[error("timed out after {waited_secs}s waiting for install lock {}", .path.display())]
    LockTimeout {
        /// The lock file.
        path: PathBuf,
        /// How long this invocation waited.
        waited_secs: u64,
    },

    /// `run` was requested before a toolchain was installed.
    #[error("zig is not installed at {}; run `zigp install` first", .binary.display())]
    NotInstalled {
        /// The managed binary path.
        binary: PathBuf,
    },

    /// The toolchain process could not be started at all.
    #[error("failed to start {}: {source}", .binary.display())]
    SpawnError {
        /// The binary that failed to start.
        binary: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The toolchain process was killed by a signal.
    #[error("zig terminated by signal {signal}")]
    AbnormalTermination {
        /// Signal number.
        signal: i32,
    },

    /// The toolchain process exited with a non-zero code.
    ///
    /// The child already reported its own diagnostics, so this variant is
    /// never printed; `main` exits with `code` directly.
    #[error("process exited with code {code}")]
    ProcessExitCode {
        /// The child's exit code.
        code: i32,
    },
}

impl ZigpError {
    /// Creates a `FilesystemError` for `path`.
    #[must_use]
    pub fn fs(action: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::FilesystemError {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a `NetworkError` without an underlying source.
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NetworkError {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a `NetworkError` wrapping `source`.
    #[must_use]
    pub fn network_with_source(
        url: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::NetworkError {
            url: url.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an `ExtractionError`.
    #[must_use]
    pub fn extraction(archive: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::ExtractionError {
            archive: archive.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates a `RemoteIndexUnavailable` error.
    #[must_use]
    pub fn index_unavailable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteIndexUnavailable {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a `MissingVersionDeclaration` error.
    #[must_use]
    pub fn missing_declaration(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::MissingVersionDeclaration {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Creates a `ProcessExitCode` error.
    #[must_use]
    pub const fn process_exit_code(code: i32) -> Self {
        Self::ProcessExitCode { code }
    }
}
