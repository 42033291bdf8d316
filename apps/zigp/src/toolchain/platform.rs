//! Platform detection for the managed toolchain.
//!
//! Maps the host operating system and CPU architecture onto the identifiers
//! used in Zig artifact names (`zig-{os}-{arch}-{version}`) and in the keys
//! of the release index (`{arch}-{os}`).
//!
//! ## Supported Platforms
//!
//! Every combination of `macos`, `linux`, `windows`, `freebsd` with
//! `x86_64`, `aarch64`.

use std::fmt;

use crate::errors::{Result, ZigpError};

/// Operating systems with published toolchain builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Macos,
    Linux,
    Windows,
    Freebsd,
}

/// CPU architectures with published toolchain builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Os {
    /// Canonical identifier used in artifact URLs.
    #[must_use = "returns the OS string without side effects"]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Freebsd => "freebsd",
        }
    }

    /// Parses a Rust `target_os` value (`std::env::consts::OS`).
    fn from_host(os: &str) -> Option<Self> {
        match os {
            "macos" => Some(Self::Macos),
            "linux" => Some(Self::Linux),
            "windows" => Some(Self::Windows),
            "freebsd" => Some(Self::Freebsd),
            _ => None,
        }
    }
}

impl Arch {
    /// Canonical identifier used in artifact URLs.
    #[must_use = "returns the architecture string without side effects"]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }

    /// Parses a Rust `target_arch` value (`std::env::consts::ARCH`).
    fn from_host(arch: &str) -> Option<Self> {
        match arch {
            "x86_64" => Some(Self::X86_64),
            "aarch64" => Some(Self::Aarch64),
            _ => None,
        }
    }
}

/// The (OS, architecture) pair a toolchain build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformKey {
    pub os: Os,
    pub arch: Arch,
}

impl PlatformKey {
    /// Detects the platform this binary was compiled for.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPlatform` when the host OS or architecture has no
    /// published toolchain build.
    pub fn detect() -> Result<Self> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Resolves a platform from raw OS and architecture identifiers.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPlatform` if either identifier is outside the
    /// supported set. A partially supported pair is still an error.
    pub fn from_parts(os: &str, arch: &str) -> Result<Self> {
        match (Os::from_host(os), Arch::from_host(arch)) {
            (Some(os), Some(arch)) => Ok(Self { os, arch }),
            _ => Err(ZigpError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    /// Key of this platform in the release index (e.g. `x86_64-linux`).
    #[must_use = "returns the index key without side effects"]
    pub fn index_key(self) -> String {
        format!("{}-{}", self.arch.as_str(), self.os.as_str())
    }

    /// Returns whether this platform is Windows.
    #[must_use = "returns platform check result without side effects"]
    pub fn is_windows(self) -> bool {
        self.os == Os::Windows
    }

    /// File name of the toolchain executable on this platform.
    #[must_use = "returns the binary name without side effects"]
    pub fn binary_name(self) -> &'static str {
        if self.is_windows() { "zig.exe" } else { "zig" }
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}
