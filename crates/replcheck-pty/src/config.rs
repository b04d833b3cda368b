//! Spawn configuration for a program running behind a pseudo-terminal.
//!
//! [`PtyCommand`] describes what to run and how the terminal it sees should
//! behave.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Default `TERM` value exported to the child.
pub const DEFAULT_TERM: &str = "xterm-256color";

/// A program to run inside a new pseudo-terminal.
///
/// # Example
///
/// ```
/// use replcheck_pty::PtyCommand;
///
/// let command = PtyCommand::new("/bin/sh")
///     .arg("-i")
///     .env("PS1", "rshell> ")
///     .window_size(100, 30)
///     .echo(false);
///
/// assert_eq!(command.args.len(), 1);
/// assert!(!command.echo);
/// ```
#[derive(Debug, Clone)]
pub struct PtyCommand {
    /// The executable to run, resolved through `PATH` when relative.
    pub program: OsString,

    /// Arguments, not including the program name.
    pub args: Vec<OsString>,

    /// Variables added to (or overriding) the inherited environment.
    pub env_add: HashMap<OsString, OsString>,

    /// Variables removed from the inherited environment.
    pub env_remove: Vec<OsString>,

    /// Working directory for the child process.
    pub working_directory: Option<PathBuf>,

    /// Initial window size.
    pub window_size: WindowSize,

    /// Whether the terminal echoes input back, as an interactive terminal does.
    pub echo: bool,
}

impl PtyCommand {
    /// Create a command for `program` with the default terminal settings.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        let mut env_add = HashMap::new();
        env_add.insert(OsString::from("TERM"), OsString::from(DEFAULT_TERM));

        Self {
            program: program.into(),
            args: Vec::new(),
            env_add,
            env_remove: Vec::new(),
            working_directory: None,
            window_size: WindowSize::default(),
            echo: true,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env_add.insert(key.into(), value.into());
        self
    }

    /// Remove an inherited environment variable.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<OsString>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(path.into());
        self
    }

    /// Set the initial window size.
    #[must_use]
    pub const fn window_size(mut self, cols: u16, rows: u16) -> Self {
        self.window_size = WindowSize::new(cols, rows);
        self
    }

    /// Turn terminal echo on or off.
    #[must_use]
    pub const fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Program and arguments joined for log and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Window size for the PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of columns (characters per line).
    pub cols: u16,
    /// Number of rows (lines).
    pub rows: u16,
}

impl WindowSize {
    /// Create a new window size with the given dimensions.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl From<(u16, u16)> for WindowSize {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self::new(cols, rows)
    }
}
