//! replcheck-pty: async Unix PTY spawning
//!
//! This crate runs a program on the slave side of a freshly allocated
//! pseudo-terminal so the program believes it is talking to an interactive
//! terminal, and hands back the master side as a Tokio `AsyncRead` +
//! `AsyncWrite` together with a handle to the child process.
//!
//! # Quick Start
//!
//! ```ignore
//! use replcheck_pty::{PtyCommand, spawn};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let command = PtyCommand::new("/bin/sh").arg("-i");
//!     let (mut master, mut child) = spawn(&command).await?;
//!
//!     master.write_all(b"echo hello\n").await?;
//!
//!     let mut buf = [0u8; 1024];
//!     let n = master.read(&mut buf).await?;
//!     println!("{}", String::from_utf8_lossy(&buf[..n]));
//!
//!     child.kill()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

#[cfg(unix)]
mod child;
#[cfg(unix)]
mod master;

pub use config::{DEFAULT_TERM, PtyCommand, WindowSize};
pub use error::{PtyError, Result};

#[cfg(unix)]
pub use child::{ExitStatus, PtyChild, spawn_child};
#[cfg(unix)]
pub use master::{PtyMaster, open_slave, set_echo};

/// Allocate a PTY and start `command` on it.
///
/// Must be called from within a Tokio runtime.
#[cfg(unix)]
#[allow(clippy::unused_async)]
pub async fn spawn(command: &PtyCommand) -> Result<(PtyMaster, PtyChild)> {
    let (master, slave_path) = PtyMaster::open()?;
    master.resize(command.window_size)?;

    let slave = open_slave(&slave_path)?;
    if !command.echo {
        set_echo(&slave, false)?;
    }

    let child = spawn_child(slave, command)?;
    Ok((master, child))
}
