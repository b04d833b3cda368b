//! Child process spawning and control.

use std::fmt;
use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd};
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::config::PtyCommand;
use crate::error::{PtyError, Result};

/// Exit status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process exited normally with the given exit code.
    Exited(i32),
    /// The process was terminated by a signal.
    Signaled(i32),
}

impl ExitStatus {
    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code, if the process exited normally.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited(code),
            (None, Some(signal)) => Self::Signaled(signal),
            (None, None) => Self::Exited(-1),
        }
    }
}

/// Handle for a process running on the slave side of a PTY.
///
/// The process is killed if the handle is dropped while it is still running.
pub struct PtyChild {
    child: Child,
    pid: u32,
    status: Option<ExitStatus>,
}

impl fmt::Debug for PtyChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtyChild")
            .field("pid", &self.pid)
            .field("status", &self.status)
            .finish()
    }
}

impl PtyChild {
    /// Get the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status, if the process has already been reaped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Check whether the process is still running without blocking.
    pub fn is_running(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    /// Reap the process if it has exited, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }

        let status = self.child.try_wait().map_err(PtyError::Wait)?.map(ExitStatus::from);
        self.status = status;
        Ok(status)
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        let status = ExitStatus::from(self.child.wait().await.map_err(PtyError::Wait)?);
        self.status = Some(status);
        Ok(status)
    }

    /// Kill the process with `SIGKILL`. A no-op once it has been reaped.
    pub fn kill(&mut self) -> Result<()> {
        if self.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.start_kill().map_err(PtyError::Signal)
    }
}

/// Start `command` with `slave` as its stdin, stdout, stderr and
/// controlling terminal.
///
/// The child gets a new session so terminal job control and `SIGHUP`
/// behave as they would under a real terminal emulator.
pub fn spawn_child(slave: OwnedFd, command: &PtyCommand) -> Result<PtyChild> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args);
    for key in &command.env_remove {
        cmd.env_remove(key);
    }
    cmd.envs(&command.env_add);
    if let Some(dir) = &command.working_directory {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::from(slave.try_clone().map_err(PtyError::Spawn)?));
    cmd.stdout(Stdio::from(slave.try_clone().map_err(PtyError::Spawn)?));
    cmd.stderr(Stdio::from(slave.try_clone().map_err(PtyError::Spawn)?));
    cmd.kill_on_drop(true);

    let slave_raw = slave.as_raw_fd();

    // SAFETY: setsid and ioctl are async-signal-safe; slave_raw stays open
    // until exec because `slave` outlives the spawn call.
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(move || {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            if libc::ioctl(slave_raw, libc::TIOCSCTTY, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd.spawn().map_err(PtyError::Spawn)?;
    drop(slave);

    let pid = child.id().ok_or_else(|| {
        PtyError::Spawn(io::Error::other("child was reaped before its pid was read"))
    })?;
    tracing::debug!(pid, command = %command.display(), "spawned child on pty");

    Ok(PtyChild {
        child,
        pid,
        status: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_success() {
        let status = ExitStatus::Exited(0);
        assert!(status.success());
        assert_eq!(status.code(), Some(0));
    }

    #[test]
    fn exit_status_signaled() {
        let status = ExitStatus::Signaled(9);
        assert!(!status.success());
        assert_eq!(status.code(), None);
        assert_eq!(status.to_string(), "terminated by signal 9");
    }
}
