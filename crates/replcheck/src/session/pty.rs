//! Session backed by a real process on a pseudo-terminal.

use std::io;
use std::time::Duration;

use replcheck_pty::{ExitStatus, PtyChild, PtyCommand, PtyMaster};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use super::{Session, Shutdown};
use crate::config::{LineEnding, SessionConfig, ShutdownConfig};
use crate::error::{ExpectError, Result, SpawnError};
use crate::expect::{Expectation, ExpectationMatcher, MatchResult, OutputBuffer, OutputSource};

/// Read size for one chunk of terminal output.
const READ_CHUNK: usize = 4096;

/// How long to wait for a killed process to be reaped.
const KILL_WAIT: Duration = Duration::from_secs(1);

impl OutputSource for PtyMaster {
    async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.read(&mut chunk).await?;
        Ok((n > 0).then(|| chunk[..n].to_vec()))
    }
}

/// A program running behind a pseudo-terminal.
#[derive(Debug)]
pub struct PtySession {
    master: PtyMaster,
    child: PtyChild,
    buffer: OutputBuffer,
    line_ending: LineEnding,
    shutdown: ShutdownConfig,
    command: String,
    eof: bool,
    terminated: bool,
}

impl PtySession {
    /// Start the program described by `config`.
    ///
    /// This only starts the process; use
    /// [`wait_ready`](super::wait_ready) to wait for its first prompt.
    pub async fn spawn(config: &SessionConfig) -> Result<Self> {
        let command = config.command_line();

        let mut pty = PtyCommand::new(&config.program)
            .args(&config.args)
            .window_size(config.dimensions.0, config.dimensions.1)
            .echo(config.echo);
        for (key, value) in &config.env {
            pty = pty.env(key, value);
        }
        if let Some(dir) = &config.working_dir {
            pty = pty.working_directory(dir);
        }

        let (master, child) = replcheck_pty::spawn(&pty)
            .await
            .map_err(|e| SpawnError::from_pty(e, &config.program))?;
        tracing::info!(pid = child.pid(), command = %command, "started program under test");

        Ok(Self {
            master,
            child,
            buffer: OutputBuffer::new(config.max_buffer),
            line_ending: config.line_ending,
            shutdown: config.shutdown.clone(),
            command,
            eof: false,
            terminated: false,
        })
    }

    /// Get the process ID of the program.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.child.pid()
    }

    /// Keep reading output until the process exits.
    async fn wait_for_exit(&mut self) -> replcheck_pty::Result<ExitStatus> {
        loop {
            tokio::select! {
                status = self.child.wait() => return status,
                chunk = self.master.next_chunk(), if !self.eof => match chunk {
                    Ok(Some(bytes)) => self.buffer.append(&bytes),
                    Ok(None) | Err(_) => self.eof = true,
                },
            }
        }
    }

    async fn force_kill(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::warn!(error = %e, pid = self.child.pid(), "failed to kill program");
            return;
        }
        match timeout(KILL_WAIT, self.child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "killed program reaped"),
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to reap killed program"),
            Err(_) => tracing::warn!(pid = self.child.pid(), "killed program not reaped"),
        }
    }
}

impl Session for PtySession {
    fn label(&self) -> &str {
        &self.command
    }

    async fn write_line(&mut self, text: &str) -> Result<()> {
        if self.terminated || self.eof {
            return Err(ExpectError::SessionClosed);
        }

        let mut line = Vec::with_capacity(text.len() + 2);
        line.extend_from_slice(text.as_bytes());
        line.extend_from_slice(self.line_ending.as_bytes());

        let written = match self.master.write_all(&line).await {
            Ok(()) => self.master.flush().await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => {
                tracing::debug!(input = text, "sent line");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                self.eof = true;
                Err(ExpectError::SessionClosed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_until(&mut self, expectation: &Expectation, timeout: Duration) -> Result<MatchResult> {
        if self.terminated {
            return Err(ExpectError::SessionClosed);
        }

        let result = ExpectationMatcher::new(expectation, timeout)
            .run(&mut self.master, &mut self.buffer)
            .await;
        if matches!(result, Err(ExpectError::Eof { .. })) {
            self.eof = true;
        }
        result
    }

    async fn terminate(&mut self) -> Shutdown {
        if self.terminated {
            return Shutdown::AlreadyTerminated;
        }
        self.terminated = true;

        let outcome = if let Ok(Some(status)) = self.child.try_wait() {
            tracing::debug!(%status, "program had already exited");
            Shutdown::Graceful
        } else {
            if !self.eof {
                let mut quit = self.shutdown.quit_command.clone().into_bytes();
                quit.extend_from_slice(self.line_ending.as_bytes());
                if let Err(e) = self.master.write_all(&quit).await {
                    tracing::debug!(error = %e, "could not send quit command");
                }
            }

            match timeout(self.shutdown.grace, self.wait_for_exit()).await {
                Ok(Ok(status)) => {
                    tracing::info!(%status, "program exited");
                    Shutdown::Graceful
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "failed waiting for program");
                    self.force_kill().await;
                    Shutdown::Forced
                }
                Err(_) => {
                    tracing::warn!(grace = ?self.shutdown.grace, "program ignored quit command");
                    self.force_kill().await;
                    Shutdown::Forced
                }
            }
        };

        self.master.close();
        outcome
    }

    fn is_alive(&mut self) -> bool {
        !self.terminated && !self.eof && self.child.is_running()
    }

    fn pending_output(&self) -> String {
        self.buffer.as_str_lossy()
    }
}
