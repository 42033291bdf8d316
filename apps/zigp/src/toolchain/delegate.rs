//! Running the managed toolchain as a child process.
//!
//! The child inherits stdin, stdout, and stderr untouched. While it runs,
//! termination signals aimed at zigp are passed on to it, and zigp waits
//! for the child to finish instead of dying first.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use crate::errors::{Result, ZigpError};

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    Exited { code: i32 },
    Signaled { signal: i32 },
}

impl ProcessResult {
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited { code };
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt as _;
            if let Some(signal) = status.signal() {
                return Self::Signaled { signal };
            }
        }
        tracing::warn!(?status, "child reported neither an exit code nor a signal; using 1");
        Self::Exited { code: 1 }
    }

    /// Converts the outcome into the caller's result: `Ok` for exit code 0,
    /// `ProcessExitCode` for other codes, `AbnormalTermination` for signals.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Exited { code: 0 } => Ok(()),
            Self::Exited { code } => Err(ZigpError::process_exit_code(code)),
            Self::Signaled { signal } => Err(ZigpError::AbnormalTermination { signal }),
        }
    }
}

/// Forwards invocations to the managed toolchain binary.
#[derive(Debug, Clone)]
pub struct ProcessDelegator {
    binary: PathBuf,
}

impl ProcessDelegator {
    #[must_use]
    pub fn new(binary: &Path) -> Self {
        Self {
            binary: binary.to_path_buf(),
        }
    }

    /// Verifies that the binary exists, is non-empty, and is executable.
    /// Symlinks are followed.
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled` otherwise.
    pub fn ensure_installed(&self) -> Result<()> {
        let not_installed = || ZigpError::NotInstalled {
            binary: self.binary.clone(),
        };
        let meta = std::fs::metadata(&self.binary).map_err(|_| not_installed())?;
        if !meta.is_file() || meta.len() == 0 {
            return Err(not_installed());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if meta.permissions().mode() & 0o111 == 0 {
                return Err(not_installed());
            }
        }
        Ok(())
    }

    /// Runs the binary with `args` and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled` if the binary is missing and `SpawnError` if
    /// the process cannot be started or waited on. A non-zero exit is not
    /// an error here; it is reported through [`ProcessResult`].
    pub async fn run<I, S>(&self, args: I) -> Result<ProcessResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.ensure_installed()?;
        let spawn_error = |source| ZigpError::SpawnError {
            binary: self.binary.clone(),
            source,
        };

        let mut signals = ForwardedSignals::register().map_err(spawn_error)?;

        let mut child = tokio::process::Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;
        tracing::debug!(binary = %self.binary.display(), pid = ?child.id(), "spawned toolchain");

        let status = signals.wait(&mut child).await.map_err(spawn_error)?;
        let result = ProcessResult::from_status(status);
        tracing::debug!(?result, "toolchain finished");
        Ok(result)
    }
}

#[cfg(unix)]
struct ForwardedSignals {
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
    interactive: bool,
}

#[cfg(unix)]
impl ForwardedSignals {
    fn register() -> std::io::Result<Self> {
        use std::io::IsTerminal;
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            interactive: std::io::stdin().is_terminal(),
        })
    }

    /// Waits for `child`, relaying signals to it meanwhile.
    ///
    /// Terminal-generated SIGINT and SIGQUIT already reach the child's
    /// process group, so they are relayed only when stdin is not a
    /// terminal.
    async fn wait(&mut self, child: &mut tokio::process::Child) -> std::io::Result<ExitStatus> {
        let pid = child.id().and_then(|pid| libc::pid_t::try_from(pid).ok());
        loop {
            tokio::select! {
                status = child.wait() => return status,
                _ = self.terminate.recv() => relay(pid, libc::SIGTERM),
                _ = self.hangup.recv() => relay(pid, libc::SIGHUP),
                _ = self.interrupt.recv() => {
                    if !self.interactive {
                        relay(pid, libc::SIGINT);
                    }
                }
                _ = self.quit.recv() => {
                    if !self.interactive {
                        relay(pid, libc::SIGQUIT);
                    }
                }
            }
        }
    }
}

#[cfg(unix)]
fn relay(pid: Option<libc::pid_t>, signal: libc::c_int) {
    let Some(pid) = pid else {
        return;
    };
    tracing::debug!(pid, signal, "forwarding signal to toolchain");
    // SAFETY: kill has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, signal) };
    if rc != 0 {
        tracing::debug!(error = %std::io::Error::last_os_error(), "signal forward failed");
    }
}

#[cfg(not(unix))]
struct ForwardedSignals;

#[cfg(not(unix))]
impl ForwardedSignals {
    #[allow(clippy::unnecessary_wraps)]
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Waits for `child`. Ctrl-C reaches the child through the shared
    /// console, so zigp only swallows it.
    async fn wait(&mut self, child: &mut tokio::process::Child) -> std::io::Result<ExitStatus> {
        loop {
            tokio::select! {
                status = child.wait() => return status,
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str, mode: u32) -> PathBuf {
        let path = dir.join("zig");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[tokio::test]
    async fn exit_code_passes_through() {
        let temp = tempfile::tempdir().unwrap();
        let binary = script(temp.path(), "#!/bin/sh\nexit 42\n", 0o755);

        let result = ProcessDelegator::new(&binary).run(["build"]).await.unwrap();

        assert_eq!(result, ProcessResult::Exited { code: 42 });
        assert!(matches!(
            result.into_result(),
            Err(ZigpError::ProcessExitCode { code: 42 })
        ));
    }

    #[test]
    fn status_without_code_or_signal_maps_to_one() {
        use std::os::unix::process::ExitStatusExt;

        // A stopped child: WIFSTOPPED with SIGSTOP.
        let stopped = ExitStatus::from_raw(0x137f);
        assert_eq!(stopped.code(), None);
        assert_eq!(stopped.signal(), None);

        assert_eq!(
            ProcessResult::from_status(stopped),
            ProcessResult::Exited { code: 1 }
        );
    }

    #[tokio::test]
    async fn arguments_are_passed_verbatim() {
        let temp = tempfile::tempdir().unwrap();
        let out = temp.path().join("args");
        let binary = script(
            temp.path(),
            &format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", out.display()),
            0o755,
        );

        let result = ProcessDelegator::new(&binary)
            .run(["build-exe", "--name", "a b", "-O", "ReleaseFast"])
            .await
            .unwrap();

        assert_eq!(result, ProcessResult::Exited { code: 0 });
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "build-exe\n--name\na b\n-O\nReleaseFast\n"
        );
    }

    #[tokio::test]
    async fn killed_child_is_signaled_not_success() {
        let temp = tempfile::tempdir().unwrap();
        let binary = script(temp.path(), "#!/bin/sh\nkill -9 $$\n", 0o755);

        let result = ProcessDelegator::new(&binary)
            .run(std::iter::empty::<&str>())
            .await
            .unwrap();

        assert_eq!(result, ProcessResult::Signaled { signal: 9 });
        assert!(matches!(
            result.into_result(),
            Err(ZigpError::AbnormalTermination { signal: 9 })
        ));
    }

    #[tokio::test]
    async fn missing_placeholder_or_non_executable_is_not_installed() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("absent");
        assert!(matches!(
            ProcessDelegator::new(&missing).run(["version"]).await,
            Err(ZigpError::NotInstalled { .. })
        ));

        let placeholder = script(temp.path(), "", 0o755);
        assert!(matches!(
            ProcessDelegator::new(&placeholder).run(["version"]).await,
            Err(ZigpError::NotInstalled { .. })
        ));

        let not_exec = script(temp.path(), "#!/bin/sh\n", 0o644);
        assert!(matches!(
            ProcessDelegator::new(&not_exec).run(["version"]).await,
            Err(ZigpError::NotInstalled { .. })
        ));
    }

    #[tokio::test]
    async fn dangling_symlink_is_not_installed() {
        let temp = tempfile::tempdir().unwrap();
        let link = temp.path().join("zig");
        std::os::unix::fs::symlink(temp.path().join("gone"), &link).unwrap();

        let err = ProcessDelegator::new(&link).run(["version"]).await.unwrap_err();
        assert!(matches!(err, ZigpError::NotInstalled { .. }));
    }

    #[tokio::test]
    async fn unrunnable_binary_is_spawn_error() {
        let temp = tempfile::tempdir().unwrap();
        let binary = script(temp.path(), "\x00\x01garbage", 0o755);

        let err = ProcessDelegator::new(&binary).run(["version"]).await.unwrap_err();
        assert!(matches!(err, ZigpError::SpawnError { .. }), "{err}");
    }

    #[test]
    fn zero_exit_is_ok() {
        assert!(ProcessResult::Exited { code: 0 }.into_result().is_ok());
    }
}
