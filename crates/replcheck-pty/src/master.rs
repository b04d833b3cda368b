//! The controller side of a Unix pseudo-terminal.

use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{LocalModes, OptionalActions, Winsize, tcgetattr, tcsetattr, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::WindowSize;
use crate::error::{PtyError, Result, errno};

/// Master side of a PTY pair, readable and writable through Tokio.
///
/// Reads report end-of-file once the child side is gone. Linux signals that
/// with `EIO` rather than a zero-length read, so both are treated as EOF.
pub struct PtyMaster {
    async_fd: AsyncFd<OwnedFd>,
    open: bool,
}

impl std::fmt::Debug for PtyMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyMaster")
            .field("fd", &self.async_fd.as_raw_fd())
            .field("open", &self.open)
            .finish()
    }
}

impl PtyMaster {
    /// Allocate a new PTY pair and return the master with the slave's path.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open() -> Result<(Self, String)> {
        let master_fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY)
            .map_err(|e| PtyError::Create(errno(e)))?;
        grantpt(&master_fd).map_err(|e| PtyError::Create(errno(e)))?;
        unlockpt(&master_fd).map_err(|e| PtyError::Create(errno(e)))?;

        let slave_name =
            ptsname(&master_fd, Vec::new()).map_err(|e| PtyError::Create(errno(e)))?;
        let slave_path = slave_name
            .to_str()
            .map_err(|_| {
                PtyError::Create(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid slave path encoding",
                ))
            })?
            .to_string();

        fcntl_setfl(&master_fd, OFlags::NONBLOCK).map_err(|e| PtyError::Create(errno(e)))?;
        let async_fd = AsyncFd::new(master_fd).map_err(PtyError::Create)?;

        Ok((
            Self {
                async_fd,
                open: true,
            },
            slave_path,
        ))
    }

    /// Check if the PTY is still open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Set the window size; the child receives `SIGWINCH`.
    pub fn resize(&self, size: WindowSize) -> Result<()> {
        if !self.open {
            return Err(PtyError::Closed);
        }

        let winsize = Winsize {
            ws_col: size.cols,
            ws_row: size.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        tcsetwinsize(self.async_fd.get_ref(), winsize).map_err(|e| PtyError::Resize(errno(e)))
    }

    /// Mark the master closed; later reads report EOF and writes fail.
    pub const fn close(&mut self) {
        self.open = false;
    }
}

impl AsRawFd for PtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_raw_fd()
    }
}

impl AsyncRead for PtyMaster {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.open {
            return Poll::Ready(Ok(()));
        }

        loop {
            let mut guard = match self.async_fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.async_fd.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                // Every slave descriptor is closed: the child has gone away.
                Err(rustix::io::Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(errno(e))),
            }
        }
    }
}

impl AsyncWrite for PtyMaster {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if !self.open {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "PTY closed")));
        }

        loop {
            let mut guard = match self.async_fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(self.async_fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(rustix::io::Errno::IO) => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "PTY slave closed",
                    )));
                }
                Err(e) => return Poll::Ready(Err(errno(e))),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.open = false;
        Poll::Ready(Ok(()))
    }
}

/// Open the slave side of a PTY for handing to a child process.
pub fn open_slave(path: &str) -> Result<OwnedFd> {
    open(
        Path::new(path),
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(|e| PtyError::Create(errno(e)))
}

/// Turn echo on or off on an open slave descriptor.
pub fn set_echo(slave: &OwnedFd, echo: bool) -> Result<()> {
    let mut termios = tcgetattr(slave).map_err(|e| PtyError::SetAttributes(errno(e)))?;
    if echo {
        termios.local_modes.insert(LocalModes::ECHO);
    } else {
        termios.local_modes.remove(LocalModes::ECHO);
    }
    tcsetattr(slave, OptionalActions::Now, &termios).map_err(|e| PtyError::SetAttributes(errno(e)))
}
