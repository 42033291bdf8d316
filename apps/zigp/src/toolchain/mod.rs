//! Provisioning and delegation engine for the managed Zig toolchain.
//!
//! ## Module Structure
//!
//! - [`platform`] - OS and architecture detection
//! - [`version`] - Version strategies and the release index
//! - [`artifact`] - Archive URLs and formats
//! - [`paths`] - Layout of the managed install
//! - [`state`] - Installation state and the install transition table
//! - [`locator`] - Search for a system toolchain on PATH
//! - [`lock`] - Advisory lock serializing installs
//! - [`record`] - Install record sidecar
//! - [`transport`] - HTTP and `file://` fetching
//! - [`archive`] - `tar.xz` and `zip` extraction
//! - [`provision`] - Install, link, and uninstall
//! - [`delegate`] - Running the toolchain as a child process

pub mod archive;
pub mod artifact;
pub mod delegate;
pub mod locator;
pub mod lock;
pub mod paths;
pub mod platform;
pub mod provision;
pub mod record;
pub mod state;
pub mod transport;
pub mod version;

pub use delegate::ProcessDelegator;
pub use platform::PlatformKey;
pub use provision::{InstallOutcome, InstallStep, Provisioner};
pub use record::{InstallRecord, RecordSource};
pub use state::{InstallMode, InstallationState};
pub use transport::HttpTransport;
