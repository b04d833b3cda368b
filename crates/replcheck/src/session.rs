//! Sessions with the program under test.
//!
//! A [`Session`] is the only way the harness talks to the program: it writes
//! lines, waits for expectations to resolve against buffered output, and
//! shuts the program down. [`PtySession`] drives a real process behind a
//! pseudo-terminal; [`ScriptedSession`] replays canned output on a virtual
//! clock.

#[cfg(unix)]
mod pty;
mod scripted;

use std::fmt;
use std::future::Future;
use std::time::Duration;

#[cfg(unix)]
pub use pty::PtySession;
pub use scripted::{Reply, ScriptedSession, ScriptedSessionBuilder};

use crate::error::{ExpectError, Result, SpawnError};
use crate::expect::{Expectation, MatchResult, OutputBuffer, OutputSource, PatternSpec};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The program exited within the grace period.
    Graceful,
    /// The program had to be killed.
    Forced,
    /// The session had already been terminated.
    AlreadyTerminated,
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graceful => f.write_str("exited gracefully"),
            Self::Forced => f.write_str("killed after grace period"),
            Self::AlreadyTerminated => f.write_str("already terminated"),
        }
    }
}

/// An interactive conversation with one program.
///
/// At most one wait is outstanding at a time; every method takes `&mut self`.
pub trait Session: Send {
    /// Short description of the program, for messages.
    fn label(&self) -> &str;

    /// Send `text` followed by the configured line ending.
    ///
    /// Fails with [`ExpectError::SessionClosed`] once the session has been
    /// terminated or the program has closed the terminal.
    fn write_line(&mut self, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Wait until one of `expectation`'s candidates resolves.
    ///
    /// Fails with [`ExpectError::Eof`] if the program closes the terminal
    /// first.
    fn read_until(
        &mut self,
        expectation: &Expectation,
        timeout: Duration,
    ) -> impl Future<Output = Result<MatchResult>> + Send;

    /// Ask the program to quit, then kill it if it lingers.
    ///
    /// Safe to call repeatedly; later calls report
    /// [`Shutdown::AlreadyTerminated`].
    fn terminate(&mut self) -> impl Future<Output = Shutdown> + Send;

    /// Check whether the program is still running and reachable.
    fn is_alive(&mut self) -> bool;

    /// Output received but not yet consumed by any wait.
    fn pending_output(&self) -> String;
}

/// Wait for the program's first prompt.
///
/// End of file before the prompt means the program exited immediately; no
/// prompt before `timeout` means it never became ready.
pub async fn wait_ready<S: Session>(
    session: &mut S,
    prompt: &PatternSpec,
    timeout: Duration,
) -> Result<()> {
    let expectation = Expectation::new().with(prompt.compile()?).or_timeout();

    match session.read_until(&expectation, timeout).await {
        Ok(MatchResult::Matched(_)) => {
            tracing::info!(program = session.label(), "program is ready");
            Ok(())
        }
        Ok(MatchResult::Expired { .. }) => Err(SpawnError::NotReady {
            prompt: prompt.to_string(),
            timeout,
            output: session.pending_output(),
        }
        .into()),
        Err(ExpectError::Eof { buffer }) => Err(SpawnError::ExitedImmediately {
            command: session.label().to_string(),
            output: buffer,
        }
        .into()),
        Err(e) => Err(e),
    }
}

/// Read from `source` into `buffer` until end of file.
pub(crate) async fn drain_to_eof<S>(source: &mut S, buffer: &mut OutputBuffer)
where
    S: OutputSource + Send,
{
    loop {
        match source.next_chunk().await {
            Ok(Some(bytes)) => buffer.append(&bytes),
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(error = %e, "read failed while draining");
                return;
            }
        }
    }
}
