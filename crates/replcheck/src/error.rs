//! Error types for replcheck.
//!
//! Timeouts the caller asked to race against are not errors: they come back
//! as [`MatchResult::Expired`](crate::expect::MatchResult::Expired). The
//! errors here describe sessions that went away, programs that never
//! started, and configuration that could not be loaded.

use std::time::Duration;

use thiserror::Error;

/// Longest buffer excerpt shown in an error message.
const MAX_BUFFER_DISPLAY: usize = 400;

/// Lines kept from the end of a long buffer.
const TAIL_LINES: usize = 6;

/// Render the tail of the session output for a diagnostic.
fn buffer_excerpt(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(no output)".to_string();
    }

    if buffer.len() <= MAX_BUFFER_DISPLAY {
        return format!("output:\n| {}", buffer.lines().collect::<Vec<_>>().join("\n| "));
    }

    let lines: Vec<&str> = buffer.lines().collect();
    let tail = &lines[lines.len().saturating_sub(TAIL_LINES)..];
    format!(
        "output ({} bytes, last {} lines):\n| {}",
        buffer.len(),
        tail.len(),
        tail.join("\n| ")
    )
}

/// The main error type for harness operations.
#[derive(Debug, Error)]
pub enum ExpectError {
    /// The program under test could not be started.
    #[error("failed to start program: {0}")]
    Spawn(#[from] SpawnError),

    /// An I/O error on the terminal channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was used after it terminated.
    #[error("session is closed")]
    SessionClosed,

    /// A wait with no timeout candidate reached its deadline.
    #[error("timeout after {duration:?} waiting for {pattern}\n{}", buffer_excerpt(buffer))]
    Timeout {
        /// How long the wait lasted.
        duration: Duration,
        /// The candidates being waited for.
        pattern: String,
        /// Unconsumed output at the deadline.
        buffer: String,
    },

    /// The program closed its terminal while a wait was outstanding.
    #[error("program closed the terminal\n{}", buffer_excerpt(buffer))]
    Eof {
        /// Unconsumed output when the terminal closed.
        buffer: String,
    },

    /// A regular expression failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Configuration or suite file problem.
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong.
        message: String,
    },
}

/// Errors raised while starting the program under test.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The executable does not exist.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The program that was looked up.
        command: String,
    },

    /// The executable exists but cannot be run.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The program path.
        path: String,
    },

    /// No pseudo-terminal could be allocated.
    #[error("failed to allocate PTY: {reason}")]
    PtyAllocation {
        /// Why allocation failed.
        reason: String,
    },

    /// The program exited before showing its first prompt.
    #[error("{command} exited before showing a prompt\n{}", buffer_excerpt(output))]
    ExitedImmediately {
        /// The command line that was run.
        command: String,
        /// Everything the program printed.
        output: String,
    },

    /// The first prompt did not appear within the startup timeout.
    #[error("no prompt {prompt} within {timeout:?}\n{}", buffer_excerpt(output))]
    NotReady {
        /// The prompt that was expected.
        prompt: String,
        /// The startup timeout.
        timeout: Duration,
        /// Everything the program printed so far.
        output: String,
    },

    /// Other I/O failure while spawning.
    #[error("I/O error during spawn: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, ExpectError>;

impl ExpectError {
    /// Create a timeout error.
    pub fn timeout(
        duration: Duration,
        pattern: impl Into<String>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::Timeout {
            duration,
            pattern: pattern.into(),
            buffer: buffer.into(),
        }
    }

    /// Create an EOF error.
    pub fn eof(buffer: impl Into<String>) -> Self {
        Self::Eof {
            buffer: buffer.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is an EOF error.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Whether the session can no longer be used after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Spawn(_) | Self::SessionClosed | Self::Eof { .. })
    }

    /// Get the buffer contents if this error carries them.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::Eof { buffer } => Some(buffer),
            _ => None,
        }
    }

    /// Short one-line form for ledger details.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Timeout { duration, pattern, .. } => {
                format!("timeout after {duration:?} waiting for {pattern}")
            }
            Self::Eof { .. } => "program closed the terminal".to_string(),
            other => other.to_string().lines().next().unwrap_or_default().to_string(),
        }
    }
}

impl From<replcheck_pty::PtyError> for ExpectError {
    fn from(err: replcheck_pty::PtyError) -> Self {
        use replcheck_pty::PtyError;

        match err {
            PtyError::Closed => Self::SessionClosed,
            PtyError::Create(e) => Self::Spawn(SpawnError::pty_allocation(e.to_string())),
            PtyError::Io(e)
            | PtyError::Spawn(e)
            | PtyError::SetAttributes(e)
            | PtyError::Resize(e)
            | PtyError::Signal(e)
            | PtyError::Wait(e) => Self::Io(e),
        }
    }
}

impl SpawnError {
    /// Create a command not found error.
    pub fn command_not_found(command: impl Into<String>) -> Self {
        Self::CommandNotFound {
            command: command.into(),
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied { path: path.into() }
    }

    /// Create a PTY allocation error.
    pub fn pty_allocation(reason: impl Into<String>) -> Self {
        Self::PtyAllocation {
            reason: reason.into(),
        }
    }

    /// Classify a failure from the PTY layer during start-up.
    #[must_use]
    pub fn from_pty(err: replcheck_pty::PtyError, command: &str) -> Self {
        use replcheck_pty::PtyError;

        match err {
            PtyError::Create(e) => Self::pty_allocation(e.to_string()),
            PtyError::Spawn(e) => match e.kind() {
                std::io::ErrorKind::NotFound => Self::command_not_found(command),
                std::io::ErrorKind::PermissionDenied => Self::permission_denied(command),
                _ => Self::Io(e),
            },
            PtyError::Closed => Self::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "PTY closed during spawn",
            )),
            PtyError::Io(e)
            | PtyError::SetAttributes(e)
            | PtyError::Resize(e)
            | PtyError::Signal(e)
            | PtyError::Wait(e) => Self::Io(e),
        }
    }
}
