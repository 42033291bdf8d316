//! Toolchain version resolution.
//!
//! Exactly one strategy is active per project configuration:
//!
//! - `pinned`: the version compiled into zigp ([`PINNED_VERSION`])
//! - `declared`: the `zig_version` field of the project's `package.json`
//! - `latest`: the newest release in the distribution server's index
//!
//! ## Release Index Format
//!
//! `{server}/download/index.json` is an object keyed by release name. Each
//! release lists one entry per target, keyed `{arch}-{os}`:
//!
//! ```json
//! {
//!   "master": {
//!     "version": "0.14.0-dev.2+0123abcd",
//!     "x86_64-linux": { "tarball": "https://.../zig-linux-x86_64-0.14.0-dev.2+0123abcd.tar.xz" }
//!   },
//!   "0.13.0": {
//!     "date": "2024-06-07",
//!     "x86_64-linux": { "tarball": "https://.../zig-linux-x86_64-0.13.0.tar.xz" }
//!   }
//! }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::platform::PlatformKey;
use super::transport::Transport;
use crate::errors::{Result, ZigpError};

/// Version installed by the `pinned` strategy.
pub const PINNED_VERSION: &str = "0.13.0";

/// Field of `package.json` read by the `declared` strategy.
pub const DECLARED_VERSION_FIELD: &str = "zig_version";

/// Release key of the development channel in the index.
const MASTER_KEY: &str = "master";

/// How the toolchain version is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    #[default]
    Pinned,
    Declared,
    Latest,
}

/// Which index entry the `latest` strategy follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Highest tagged release.
    #[default]
    Stable,
    /// The `master` development build.
    Master,
}

/// Where a resolved version came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    Pinned,
    Declared { file: PathBuf },
    /// Resolved from the release index, which also names the artifact.
    Latest { tarball_url: String },
}

/// A resolved toolchain version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    pub version: String,
    pub source: VersionSource,
}

impl VersionSpec {
    /// The compiled-in version.
    #[must_use]
    pub fn pinned() -> Self {
        Self {
            version: PINNED_VERSION.to_string(),
            source: VersionSource::Pinned,
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match &self.source {
            VersionSource::Pinned => "pinned",
            VersionSource::Declared { .. } => "declared",
            VersionSource::Latest { .. } => "latest",
        };
        write!(f, "{} ({origin})", self.version)
    }
}

/// Reads the declared toolchain version from a `package.json` file.
///
/// # Errors
///
/// Returns `MissingVersionDeclaration` if the file is missing or unreadable,
/// is not JSON, lacks the field, or the field is not a valid version string.
pub fn read_declared_version(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ZigpError::missing_declaration(path, format!("cannot read file: {e}")))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| ZigpError::missing_declaration(path, format!("invalid JSON: {e}")))?;

    let Some(field) = json.get(DECLARED_VERSION_FIELD) else {
        return Err(ZigpError::missing_declaration(
            path,
            format!("no '{DECLARED_VERSION_FIELD}' field"),
        ));
    };
    let Some(version) = field.as_str().map(str::trim).filter(|v| !v.is_empty()) else {
        return Err(ZigpError::missing_declaration(
            path,
            format!("'{DECLARED_VERSION_FIELD}' must be a non-empty string"),
        ));
    };
    semver::Version::parse(version).map_err(|e| {
        ZigpError::missing_declaration(
            path,
            format!("'{DECLARED_VERSION_FIELD}' is not a valid version ('{version}'): {e}"),
        )
    })?;

    Ok(version.to_string())
}

/// One release in the index.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexRelease {
    /// Present on `master`; tagged releases are named by their key.
    #[serde(default)]
    pub version: Option<String>,
    /// Targets plus auxiliary entries (`src`, `docs`, `notes`, ...).
    #[serde(flatten)]
    pub entries: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IndexTarget {
    tarball: String,
}

impl IndexRelease {
    /// Artifact URL for `platform`, if this release has one.
    #[must_use]
    pub fn tarball_for(&self, platform: PlatformKey) -> Option<String> {
        let entry = self.entries.get(&platform.index_key())?;
        serde_json::from_value::<IndexTarget>(entry.clone())
            .ok()
            .map(|target| target.tarball)
    }
}

/// The release index, keyed by release name.
pub type ReleaseIndex = BTreeMap<String, IndexRelease>;

/// Parses the release index document.
///
/// # Errors
///
/// Returns `RemoteIndexUnavailable` if the document is not a valid index.
pub fn parse_index(url: &str, text: &str) -> Result<ReleaseIndex> {
    serde_json::from_str(text).map_err(|e| ZigpError::index_unavailable(url, e.to_string()))
}

/// Picks the release the `latest` strategy installs and its artifact.
///
/// # Errors
///
/// Returns `RemoteIndexUnavailable` if the index has no release on the
/// requested channel, and `NoArtifactForPlatform` if the chosen release has
/// no build for `platform`.
pub fn select_latest(
    index: &ReleaseIndex,
    channel: Channel,
    platform: PlatformKey,
    url: &str,
) -> Result<VersionSpec> {
    let (version, release) = match channel {
        Channel::Master => {
            let release = index
                .get(MASTER_KEY)
                .ok_or_else(|| ZigpError::index_unavailable(url, "index has no master entry"))?;
            let version = release.version.clone().ok_or_else(|| {
                ZigpError::index_unavailable(url, "master entry has no version field")
            })?;
            (version, release)
        }
        Channel::Stable => index
            .iter()
            .filter(|(key, _)| key.as_str() != MASTER_KEY)
            .filter_map(|(key, release)| {
                semver::Version::parse(key)
                    .ok()
                    .filter(|v| v.pre.is_empty())
                    .map(|v| (v, key, release))
            })
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, key, release)| (key.clone(), release))
            .ok_or_else(|| ZigpError::index_unavailable(url, "index lists no stable releases"))?,
    };

    let tarball_url =
        release
            .tarball_for(platform)
            .ok_or_else(|| ZigpError::NoArtifactForPlatform {
                platform: platform.index_key(),
                version: version.clone(),
            })?;

    Ok(VersionSpec {
        version,
        source: VersionSource::Latest { tarball_url },
    })
}

/// Resolves the toolchain version for the active strategy.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    pub strategy: VersionStrategy,
    pub metadata_file: PathBuf,
    pub channel: Channel,
    pub index_url: String,
}

impl VersionResolver {
    /// Builds a resolver for the configured strategy.
    #[must_use]
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self {
            strategy: settings.strategy,
            metadata_file: settings.metadata_file.clone(),
            channel: settings.channel,
            index_url: format!("{}/download/index.json", settings.dist_server),
        }
    }

    /// Produces the version to install.
    ///
    /// Only the `latest` strategy touches the network.
    ///
    /// # Errors
    ///
    /// See [`read_declared_version`] and [`select_latest`]; a failed index
    /// fetch is reported as `RemoteIndexUnavailable`.
    pub async fn resolve<T: Transport>(
        &self,
        transport: &T,
        platform: PlatformKey,
    ) -> Result<VersionSpec> {
        match self.strategy {
            VersionStrategy::Pinned => Ok(VersionSpec::pinned()),
            VersionStrategy::Declared => Ok(VersionSpec {
                version: read_declared_version(&self.metadata_file)?,
                source: VersionSource::Declared {
                    file: self.metadata_file.clone(),
                },
            }),
            VersionStrategy::Latest => {
                tracing::debug!(url = %self.index_url, "fetching release index");
                let text = transport
                    .fetch_text(&self.index_url)
                    .await
                    .map_err(|e| ZigpError::index_unavailable(&self.index_url, e.to_string()))?;
                let index = parse_index(&self.index_url, &text)?;
                select_latest(&index, self.channel, platform, &self.index_url)
            }
        }
    }
}
