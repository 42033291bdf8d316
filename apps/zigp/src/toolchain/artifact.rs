//! Download locations for toolchain archives.
//!
//! Tagged releases live under `{server}/download/{version}/`, development
//! builds under `{server}/builds/`. Both use the file name
//! `zig-{os}-{arch}-{version}.{ext}`, where `ext` is `zip` on Windows and
//! `tar.xz` everywhere else. Every archive wraps its contents in a single
//! top-level directory.

use std::fmt;

use super::platform::PlatformKey;
use super::version::{VersionSource, VersionSpec};

/// Leading path components dropped when unpacking an archive.
pub const STRIP_COMPONENTS: usize = 1;

/// Container format of a toolchain archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarXz,
    Zip,
}

impl ArchiveFormat {
    /// The format published for `platform`.
    #[must_use]
    pub fn for_platform(platform: PlatformKey) -> Self {
        if platform.is_windows() {
            Self::Zip
        } else {
            Self::TarXz
        }
    }

    /// Infers the format from an artifact URL or file name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.ends_with(".tar.xz") {
            Some(Self::TarXz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// File extension without the leading dot.
    #[must_use = "returns the extension without side effects"]
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarXz => "tar.xz",
            Self::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A downloadable toolchain archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    pub url: String,
    pub format: ArchiveFormat,
    pub strip_components: usize,
}

impl RemoteArtifact {
    /// Locates the archive for `version` on `platform`.
    ///
    /// Versions resolved from the release index carry their own URL; all
    /// others are derived from `server`.
    #[must_use]
    pub fn locate(server: &str, version: &VersionSpec, platform: PlatformKey) -> Self {
        if let VersionSource::Latest { tarball_url } = &version.source {
            return Self {
                format: ArchiveFormat::from_name(tarball_url)
                    .unwrap_or_else(|| ArchiveFormat::for_platform(platform)),
                url: tarball_url.clone(),
                strip_components: STRIP_COMPONENTS,
            };
        }

        let format = ArchiveFormat::for_platform(platform);
        let file_name = format!(
            "zig-{}-{}-{}.{}",
            platform.os.as_str(),
            platform.arch.as_str(),
            version.version,
            format.extension()
        );
        let url = if is_dev_build(&version.version) {
            format!("{server}/builds/{file_name}")
        } else {
            format!("{server}/download/{}/{file_name}", version.version)
        };

        Self {
            url,
            format,
            strip_components: STRIP_COMPONENTS,
        }
    }
}

/// Development builds carry a `-dev.N+commit` pre-release tag.
fn is_dev_build(version: &str) -> bool {
    semver::Version::parse(version)
        .map(|v| v.pre.as_str().starts_with("dev"))
        .unwrap_or(false)
}
