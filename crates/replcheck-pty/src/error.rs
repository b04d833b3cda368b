//! Error types for the replcheck-pty crate.

use std::io;

/// The error type for PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// Failed to allocate or configure a new PTY pair.
    #[error("failed to create PTY: {0}")]
    Create(#[source] io::Error),

    /// Failed to spawn the child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// An I/O error occurred during PTY operations.
    #[error("PTY I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to set terminal attributes.
    #[error("failed to set terminal attributes: {0}")]
    SetAttributes(#[source] io::Error),

    /// Failed to resize the PTY.
    #[error("failed to resize PTY: {0}")]
    Resize(#[source] io::Error),

    /// The PTY has been closed.
    #[error("PTY has been closed")]
    Closed,

    /// Failed to send a signal to the child process.
    #[error("failed to send signal: {0}")]
    Signal(#[source] io::Error),

    /// Failed to wait for the child process.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),
}

/// A specialized Result type for PTY operations.
pub type Result<T> = std::result::Result<T, PtyError>;

#[cfg(unix)]
pub(crate) fn errno(e: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(e.raw_os_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(PtyError::Closed.to_string(), "PTY has been closed");
    }

    #[test]
    fn spawn_error_keeps_kind() {
        let err = PtyError::Spawn(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        match err {
            PtyError::Spawn(source) => assert_eq!(source.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }
}
