#![warn(clippy::pedantic)]

//! Integration tests for the zigp CLI.
//!
//! These tests spawn the compiled `zigp` binary against a throwaway project
//! and check its behavior through stdout, stderr, exit codes, and the
//! resulting install directory.
//!
//! ## Test Strategy
//!
//! 1. **Help and version**: CLI metadata display
//! 2. **Run without install**: `NotInstalled` is reported and nothing is spawned
//! 3. **Fresh install**: download from a `file://` mirror, then delegate
//! 4. **Exit codes**: the child's exit code becomes zigp's exit code
//! 5. **Postinstall hook**: a system zig on PATH is linked, not downloaded
//! 6. **Self-exclusion**: the managed directory on PATH is never linked to itself
//! 7. **Uninstall and status**: idempotent removal, read-only reporting
//! 8. **Signals**: SIGTERM sent to zigp reaches the child
//!
//! ## Test Infrastructure
//!
//! - Uses `assert_cmd` for spawning and asserting on command execution
//! - Uses `assert_fs` for temporary project directories
//! - Uses `predicates` for flexible output matching
//! - Toolchain archives are generated per test with `tar` and `xz2`
//!
//! The fake toolchain is a shell script, so the install scenarios run on
//! unix only.

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Stand-in for the zig binary. Prints a version for `version`, otherwise
/// echoes its arguments and exits with `ZIG_FAKE_EXIT`.
#[cfg(unix)]
const FAKE_ZIG: &str = "#!/bin/sh\n\
    if [ \"$1\" = \"version\" ]; then echo \"${ZIG_FAKE_VERSION:-0.13.0}\"; exit 0; fi\n\
    echo \"zig $*\"\n\
    exit ${ZIG_FAKE_EXIT:-0}\n";

/// A zigp command rooted at `project`, isolated from the caller's
/// `ZIGP_*` settings and searching only `path` for a system zig.
fn zigp(project: &Path, path: &str) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("zigp"));
    for var in [
        "ZIGP_INSTALL_DIR",
        "ZIGP_DIST_SERVER",
        "ZIGP_LOCK_TIMEOUT_SECS",
        "ZIGP_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("ZIGP_PROJECT_ROOT", project).env("PATH", path);
    cmd
}

/// The platform segment of distribution file names for this host.
#[cfg(unix)]
fn host_platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Publishes a zig 0.13.0 archive for this host under `mirror`, laid out
/// the way the distribution server lays out releases.
#[cfg(unix)]
fn publish_toolchain(mirror: &Path) -> PathBuf {
    let name = format!("zig-{}-0.13.0", host_platform());
    let dir = mirror.join("download").join("0.13.0");
    std::fs::create_dir_all(&dir).unwrap();
    let archive = dir.join(format!("{name}.tar.xz"));

    let file = std::fs::File::create(&archive).unwrap();
    let mut builder = tar::Builder::new(xz2::write::XzEncoder::new(file, 1));
    let files: [(&str, &[u8], u32); 2] = [
        ("zig", FAKE_ZIG.as_bytes(), 0o755),
        ("lib/std/std.zig", b"pub const x = 1;\n", 0o644),
    ];
    for (path, data, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        builder
            .append_data(&mut header, format!("{name}/{path}"), data)
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
    archive
}

#[cfg(unix)]
fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Writes an executable fake zig into `dir`.
#[cfg(unix)]
fn system_zig(dir: &Path, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).unwrap();
    let zig = dir.join("zig");
    std::fs::write(&zig, script).unwrap();
    std::fs::set_permissions(&zig, std::fs::Permissions::from_mode(0o755)).unwrap();
    zig
}

// ============================================================================
// Help and version
// ============================================================================

#[test]
fn help_lists_subcommands() {
    let project = assert_fs::TempDir::new().unwrap();

    zigp(project.path(), "")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("postinstall"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("ZIGP_DIST_SERVER"));
}

#[test]
fn version_flag_prints_package_version() {
    let project = assert_fs::TempDir::new().unwrap();

    zigp(project.path(), "")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let project = assert_fs::TempDir::new().unwrap();

    zigp(project.path(), "").assert().failure();
}

// ============================================================================
// Run without an install
// ============================================================================

#[test]
fn run_without_install_reports_not_installed() {
    let project = assert_fs::TempDir::new().unwrap();

    zigp(project.path(), "")
        .args(["run", "version"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not installed"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn run_with_placeholder_reports_not_installed() {
    let project = assert_fs::TempDir::new().unwrap();
    project.child(".zig/zig").touch().unwrap();

    zigp(project.path(), "")
        .args(["run", "version"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn malformed_config_is_reported() {
    let project = assert_fs::TempDir::new().unwrap();
    project.child("zigp.toml").write_str("install_dir = [").unwrap();

    zigp(project.path(), "")
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("zigp.toml"));
}

// ============================================================================
// Fresh install from a mirror
// ============================================================================

#[cfg(unix)]
#[test]
fn install_downloads_and_run_delegates() {
    let project = assert_fs::TempDir::new().unwrap();
    let mirror = assert_fs::TempDir::new().unwrap();
    publish_toolchain(mirror.path());

    zigp(project.path(), "")
        .env("ZIGP_DIST_SERVER", file_url(mirror.path()))
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("zig 0.13.0 installed"));

    project.child(".zig/zig").assert(predicate::path::is_file());
    project
        .child(".zig/lib/std/std.zig")
        .assert(predicate::path::is_file());
    project
        .child(".zig/.zigp-install.json")
        .assert(predicate::str::contains("\"local\""));

    zigp(project.path(), "")
        .args(["run", "version"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("0.13.0"));
}

#[cfg(unix)]
#[test]
fn second_install_is_a_noop() {
    let project = assert_fs::TempDir::new().unwrap();
    let mirror = assert_fs::TempDir::new().unwrap();
    let archive = publish_toolchain(mirror.path());

    zigp(project.path(), "")
        .env("ZIGP_DIST_SERVER", file_url(mirror.path()))
        .arg("install")
        .assert()
        .success();

    std::fs::remove_file(archive).unwrap();

    zigp(project.path(), "")
        .env("ZIGP_DIST_SERVER", file_url(mirror.path()))
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("already installed"));
}

#[cfg(unix)]
#[test]
fn failed_download_leaves_nothing_behind() {
    let project = assert_fs::TempDir::new().unwrap();
    let mirror = assert_fs::TempDir::new().unwrap();

    zigp(project.path(), "")
        .env("ZIGP_DIST_SERVER", file_url(mirror.path()))
        .arg("install")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("download"));

    project.child(".zig").assert(predicate::path::missing());
    let debris: Vec<_> = std::fs::read_dir(project.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".zig-"))
        .collect();
    assert!(debris.is_empty(), "leftover staging files: {debris:?}");
}

#[cfg(unix)]
#[test]
fn run_passes_arguments_and_exit_code_through() {
    let project = assert_fs::TempDir::new().unwrap();
    let mirror = assert_fs::TempDir::new().unwrap();
    publish_toolchain(mirror.path());

    zigp(project.path(), "")
        .env("ZIGP_DIST_SERVER", file_url(mirror.path()))
        .arg("install")
        .assert()
        .success();

    zigp(project.path(), "")
        .env("ZIG_FAKE_EXIT", "42")
        .args(["run", "build", "-Doptimize=ReleaseSafe", "--help"])
        .assert()
        .code(42)
        .stdout(predicate::str::contains(
            "zig build -Doptimize=ReleaseSafe --help",
        ))
        .stderr(predicate::str::is_empty());
}

// ============================================================================
// Postinstall hook and system toolchains
// ============================================================================

#[cfg(unix)]
#[test]
fn postinstall_links_system_zig_without_downloading() {
    let project = assert_fs::TempDir::new().unwrap();
    let system = assert_fs::TempDir::new().unwrap();
    let zig = system_zig(system.path(), FAKE_ZIG);
    project.child(".zig/zig").touch().unwrap();

    zigp(project.path(), &system.path().display().to_string())
        .env("ZIGP_DIST_SERVER", "file:///nonexistent/zigp-mirror")
        .env("ZIG_FAKE_VERSION", "0.12.1")
        .arg("postinstall")
        .assert()
        .success()
        .stdout(predicate::str::contains("Using system zig"));

    let link = std::fs::read_link(project.child(".zig/zig").path()).unwrap();
    assert_eq!(link, zig);
    project
        .child(".zig/.zigp-install.json")
        .assert(predicate::str::contains("0.12.1"));

    zigp(project.path(), "")
        .arg("postinstall")
        .assert()
        .success()
        .stdout(predicate::str::contains("linked to a system installation"));

    zigp(project.path(), "")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("symlink to system toolchain"));
}

#[cfg(unix)]
#[test]
fn explicit_install_replaces_system_link() {
    let project = assert_fs::TempDir::new().unwrap();
    let system = assert_fs::TempDir::new().unwrap();
    let mirror = assert_fs::TempDir::new().unwrap();
    system_zig(system.path(), FAKE_ZIG);
    publish_toolchain(mirror.path());

    zigp(project.path(), &system.path().display().to_string())
        .arg("postinstall")
        .assert()
        .success();

    zigp(project.path(), "")
        .env("ZIGP_DIST_SERVER", file_url(mirror.path()))
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloading"));

    let meta = std::fs::symlink_metadata(project.child(".zig/zig").path()).unwrap();
    assert!(meta.file_type().is_file());
}

#[cfg(unix)]
#[test]
fn managed_directory_on_path_is_not_linked_to_itself() {
    use std::os::unix::fs::PermissionsExt;

    let project = assert_fs::TempDir::new().unwrap();
    let mirror = assert_fs::TempDir::new().unwrap();
    publish_toolchain(mirror.path());

    let managed = project.child(".zig");
    managed.child("zig").touch().unwrap();
    std::fs::set_permissions(
        managed.child("zig").path(),
        std::fs::Permissions::from_mode(0o755),
    )
    .unwrap();

    zigp(project.path(), &managed.path().display().to_string())
        .env("ZIGP_DIST_SERVER", file_url(mirror.path()))
        .arg("postinstall")
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloading"));

    let meta = std::fs::symlink_metadata(managed.child("zig").path()).unwrap();
    assert!(meta.file_type().is_file());
    assert!(meta.len() > 0);
}

// ============================================================================
// Uninstall and status
// ============================================================================

#[test]
fn uninstall_is_idempotent() {
    let project = assert_fs::TempDir::new().unwrap();
    project.child(".zig/zig").write_str("binary").unwrap();

    zigp(project.path(), "")
        .arg("uninstall")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));
    project.child(".zig").assert(predicate::path::missing());

    zigp(project.path(), "")
        .arg("uninstall")
        .assert()
        .success()
        .stdout(predicate::str::contains("not installed"));
}

#[test]
fn status_reports_absent_install() {
    let project = assert_fs::TempDir::new().unwrap();

    zigp(project.path(), "")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("State:     absent"));
}

#[test]
fn install_dir_override_is_honored() {
    let project = assert_fs::TempDir::new().unwrap();
    let elsewhere = assert_fs::TempDir::new().unwrap();
    let binary = elsewhere.path().join("toolchain");

    zigp(project.path(), "")
        .env("ZIGP_INSTALL_DIR", &binary)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains(binary.display().to_string()));
}

// ============================================================================
// Signals
// ============================================================================

#[cfg(unix)]
#[test]
fn sigterm_is_forwarded_to_zig() {
    use std::time::{Duration, Instant};

    let project = assert_fs::TempDir::new().unwrap();
    let started = project.path().join("started");
    system_zig(
        &project.path().join(".zig"),
        &format!(
            "#!/bin/sh\n\
             trap 'exit 7' TERM\n\
             touch '{}'\n\
             while true; do sleep 0.1; done\n",
            started.display()
        ),
    );

    let mut child = zigp(project.path(), "/usr/bin:/bin")
        .args(["run", "build"])
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !started.exists() {
        assert!(Instant::now() < deadline, "zig never started");
        std::thread::sleep(Duration::from_millis(50));
    }

    let pid = libc::pid_t::try_from(child.id()).unwrap();
    // SAFETY: `pid` is a child of this process that has not been reaped.
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(7));
}
