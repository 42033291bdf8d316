//! Settings for a zigp invocation.
//!
//! Settings are resolved once, with precedence environment > `zigp.toml` in
//! the project root > built-in defaults, and are immutable afterwards.
//!
//! ## Configuration File
//!
//! ```toml
//! install_dir = ".zig"                  # relative to the project root
//! dist_server = "https://ziglang.org"
//! lock_timeout_secs = 120
//! request_timeout_secs = 300
//!
//! [version]
//! strategy = "declared"                 # pinned | declared | latest
//! metadata_file = "package.json"        # read by the declared strategy
//! channel = "stable"                    # stable | master, for latest
//! ```
//!
//! ## Environment Variables
//!
//! - `ZIGP_PROJECT_ROOT`: project root (default: current directory)
//! - `ZIGP_INSTALL_DIR`: managed install directory
//! - `ZIGP_DIST_SERVER`: distribution server or `file://` mirror
//! - `ZIGP_LOCK_TIMEOUT_SECS`: how long to wait for a concurrent install

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{Result, ZigpError};
use crate::toolchain::version::{Channel, VersionStrategy};

/// Name of the configuration file in the project root.
pub const CONFIG_FILE: &str = "zigp.toml";

/// Environment variable overriding the project root.
pub const PROJECT_ROOT_ENV: &str = "ZIGP_PROJECT_ROOT";

/// Environment variable overriding the managed install directory.
pub const INSTALL_DIR_ENV: &str = "ZIGP_INSTALL_DIR";

/// Environment variable overriding the distribution server.
pub const DIST_SERVER_ENV: &str = "ZIGP_DIST_SERVER";

/// Environment variable overriding the lock timeout.
pub const LOCK_TIMEOUT_ENV: &str = "ZIGP_LOCK_TIMEOUT_SECS";

const DEFAULT_DIST_SERVER: &str = "https://ziglang.org";
const DEFAULT_INSTALL_DIR: &str = ".zig";
const DEFAULT_METADATA_FILE: &str = "package.json";
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Contents of `zigp.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    install_dir: Option<PathBuf>,
    dist_server: Option<String>,
    lock_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    version: VersionSection,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct VersionSection {
    strategy: Option<VersionStrategy>,
    metadata_file: Option<PathBuf>,
    channel: Option<Channel>,
}

impl FileConfig {
    /// Reads the configuration file, treating a missing file as empty.
    fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ZigpError::fs("failed to read", path, e)),
        };
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ZigpError::Config {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }
}

/// Environment overrides, captured once so resolution stays pure.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub project_root: Option<String>,
    pub install_dir: Option<String>,
    pub dist_server: Option<String>,
    pub lock_timeout_secs: Option<String>,
}

impl EnvOverrides {
    /// Captures the `ZIGP_*` variables. Empty or whitespace-only values
    /// count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
        };
        Self {
            project_root: read(PROJECT_ROOT_ENV),
            install_dir: read(INSTALL_DIR_ENV),
            dist_server: read(DIST_SERVER_ENV),
            lock_timeout_secs: read(LOCK_TIMEOUT_ENV),
        }
    }
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `zigp.toml` and the project metadata.
    pub project_root: PathBuf,
    /// The managed install directory. Always absolute.
    pub install_dir: PathBuf,
    /// Distribution server base URL, without a trailing slash.
    pub dist_server: String,
    /// Maximum wait for the install lock.
    pub lock_timeout: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// How the toolchain version is chosen.
    pub strategy: VersionStrategy,
    /// Project metadata consulted by the declared strategy.
    pub metadata_file: PathBuf,
    /// Release channel consulted by the latest strategy.
    pub channel: Channel,
}

impl Settings {
    /// Loads settings from the environment and the project's `zigp.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined, the
    /// configuration file cannot be read or parsed, or an environment
    /// override is malformed.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let root = match &env.project_root {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir()
                .map_err(|e| ZigpError::fs("failed to read current directory", ".", e))?,
        };
        let root = std::path::absolute(&root)
            .map_err(|e| ZigpError::fs("failed to resolve", &root, e))?;
        let file = FileConfig::load(&root.join(CONFIG_FILE))?;
        Self::resolve(root, file, &env)
    }

    /// Settings rooted at `project_root` with every default applied.
    #[cfg(test)]
    pub fn for_root(project_root: &Path) -> Self {
        Self::resolve(
            project_root.to_path_buf(),
            FileConfig::default(),
            &EnvOverrides::default(),
        )
        .expect("defaults always resolve")
    }

    fn resolve(project_root: PathBuf, file: FileConfig, env: &EnvOverrides) -> Result<Self> {
        let install_dir = env
            .install_dir
            .as_deref()
            .map(PathBuf::from)
            .or(file.install_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INSTALL_DIR));

        let dist_server = env
            .dist_server
            .clone()
            .or(file.dist_server)
            .unwrap_or_else(|| DEFAULT_DIST_SERVER.to_string());

        let lock_timeout_secs = match &env.lock_timeout_secs {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| ZigpError::Config {
                path: PathBuf::from(LOCK_TIMEOUT_ENV),
                message: format!("expected a number of seconds, got '{raw}': {e}"),
            })?,
            None => file.lock_timeout_secs.unwrap_or(DEFAULT_LOCK_TIMEOUT_SECS),
        };

        let metadata_file = file
            .version
            .metadata_file
            .unwrap_or_else(|| PathBuf::from(DEFAULT_METADATA_FILE));

        Ok(Self {
            install_dir: absolutize(&project_root, install_dir),
            metadata_file: absolutize(&project_root, metadata_file),
            dist_server: dist_server.trim().trim_end_matches('/').to_string(),
            lock_timeout: Duration::from_secs(lock_timeout_secs),
            request_timeout: Duration::from_secs(
                file.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            strategy: file.version.strategy.unwrap_or_default(),
            channel: file.version.channel.unwrap_or_default(),
            project_root,
        })
    }
}

fn absolutize(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}
