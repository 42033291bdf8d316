//! Installation state of the managed binary, and the transitions that
//! install requests take from each state.

use std::fmt;
use std::path::Path;

/// What currently occupies the managed binary path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationState {
    /// Nothing at the path.
    Absent,
    /// A zero-byte stub created by a package manager.
    Placeholder,
    /// A symbolic link, whatever it points at.
    SymlinkToSystem,
    /// A non-empty regular file.
    LocalBinaryPresent,
}

impl InstallationState {
    /// Classifies `binary` from link-aware metadata.
    ///
    /// Never follows a symlink and never writes. Errors reading metadata,
    /// including permission denied, classify as `Absent`.
    #[must_use]
    pub fn detect(binary: &Path) -> Self {
        let meta = match std::fs::symlink_metadata(binary) {
            Ok(meta) => meta,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        binary = %binary.display(),
                        error = %e,
                        "cannot inspect managed binary, treating as absent"
                    );
                }
                return Self::Absent;
            }
        };

        let file_type = meta.file_type();
        let state = if file_type.is_symlink() {
            Self::SymlinkToSystem
        } else if !file_type.is_file() {
            tracing::warn!(binary = %binary.display(), "managed binary path is not a file");
            Self::Absent
        } else if meta.len() == 0 {
            Self::Placeholder
        } else {
            Self::LocalBinaryPresent
        };
        tracing::debug!(binary = %binary.display(), %state, "classified installation");
        state
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Placeholder => "placeholder",
            Self::SymlinkToSystem => "symlink to system toolchain",
            Self::LocalBinaryPresent => "installed",
        }
    }
}

impl fmt::Display for InstallationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking for an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// The package-manager hook, run after the package is added.
    Hook,
    /// `zigp install`.
    Explicit,
    /// `zigp install --force` and `zigp reinstall`.
    Forced,
}

/// What an install request does from a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    /// A local toolchain is already present.
    AlreadyInstalled,
    /// Leave the existing system symlink in place.
    KeepSymlink,
    /// Link a system toolchain if one is usable, otherwise provision.
    LinkOrProvision,
    /// Download and unpack a local toolchain.
    Provision,
}

impl InstallAction {
    /// Whether the action leaves the filesystem untouched.
    #[must_use]
    pub fn is_noop(self) -> bool {
        matches!(self, Self::AlreadyInstalled | Self::KeepSymlink)
    }
}

/// The install transition table.
#[must_use]
pub fn plan(state: InstallationState, mode: InstallMode) -> InstallAction {
    use InstallAction::{AlreadyInstalled, KeepSymlink, LinkOrProvision, Provision};
    use InstallationState::{Absent, LocalBinaryPresent, Placeholder, SymlinkToSystem};

    match (state, mode) {
        (_, InstallMode::Forced) => Provision,
        (Absent | Placeholder, _) => LinkOrProvision,
        (SymlinkToSystem, InstallMode::Hook) => KeepSymlink,
        (SymlinkToSystem, InstallMode::Explicit) => Provision,
        (LocalBinaryPresent, _) => AlreadyInstalled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_absent() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(
            InstallationState::detect(&temp.path().join("zig")),
            InstallationState::Absent
        );
    }

    #[test]
    fn empty_file_is_placeholder() {
        let temp = tempfile::tempdir().unwrap();
        let binary = temp.path().join("zig");
        std::fs::write(&binary, b"").unwrap();
        assert_eq!(
            InstallationState::detect(&binary),
            InstallationState::Placeholder
        );
    }

    #[test]
    fn non_empty_file_is_local_binary() {
        let temp = tempfile::tempdir().unwrap();
        let binary = temp.path().join("zig");
        std::fs::write(&binary, b"\x7fELF").unwrap();
        assert_eq!(
            InstallationState::detect(&binary),
            InstallationState::LocalBinaryPresent
        );
    }

    #[test]
    fn directory_at_binary_path_is_absent() {
        let temp = tempfile::tempdir().unwrap();
        let binary = temp.path().join("zig");
        std::fs::create_dir(&binary).unwrap();
        assert_eq!(InstallationState::detect(&binary), InstallationState::Absent);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_empty_file_is_symlink_not_placeholder() {
        let temp = tempfile::tempdir().unwrap();
        let stub = temp.path().join("stub");
        let binary = temp.path().join("zig");
        std::fs::write(&stub, b"").unwrap();
        std::os::unix::fs::symlink(&stub, &binary).unwrap();

        assert_eq!(
            InstallationState::detect(&binary),
            InstallationState::SymlinkToSystem
        );
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_symlink() {
        let temp = tempfile::tempdir().unwrap();
        let binary = temp.path().join("zig");
        std::os::unix::fs::symlink(temp.path().join("gone"), &binary).unwrap();

        assert_eq!(
            InstallationState::detect(&binary),
            InstallationState::SymlinkToSystem
        );
    }

    #[test]
    fn forced_always_provisions() {
        for state in [
            InstallationState::Absent,
            InstallationState::Placeholder,
            InstallationState::SymlinkToSystem,
            InstallationState::LocalBinaryPresent,
        ] {
            assert_eq!(plan(state, InstallMode::Forced), InstallAction::Provision);
        }
    }

    #[test]
    fn hook_keeps_symlink_but_explicit_replaces_it() {
        assert_eq!(
            plan(InstallationState::SymlinkToSystem, InstallMode::Hook),
            InstallAction::KeepSymlink
        );
        assert_eq!(
            plan(InstallationState::SymlinkToSystem, InstallMode::Explicit),
            InstallAction::Provision
        );
    }

    #[test]
    fn empty_states_link_or_provision_unless_forced() {
        for mode in [InstallMode::Hook, InstallMode::Explicit] {
            for state in [InstallationState::Absent, InstallationState::Placeholder] {
                assert_eq!(plan(state, mode), InstallAction::LinkOrProvision);
            }
        }
    }

    #[test]
    fn local_binary_is_left_alone_unless_forced() {
        for mode in [InstallMode::Hook, InstallMode::Explicit] {
            let action = plan(InstallationState::LocalBinaryPresent, mode);
            assert_eq!(action, InstallAction::AlreadyInstalled);
            assert!(action.is_noop());
        }
    }
}
