//! Configuration types for replcheck.
//!
//! A [`HarnessConfig`] is assembled in layers, later layers winning:
//! built-in defaults, an optional TOML file ([`file`]), `REPLCHECK_*`
//! environment variables ([`env`]), and finally command-line flags.

pub mod env;
pub mod file;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::expect::PatternSpec;

/// Default program under test.
pub const DEFAULT_PROGRAM: &str = "mix";

/// Default arguments for [`DEFAULT_PROGRAM`].
pub const DEFAULT_ARGS: [&str; 3] = ["run", "-e", "RShell.CLI.main([])"];

/// Default primary prompt marker.
pub const DEFAULT_PROMPT: &str = "rshell>";

/// Default continuation prompt marker.
pub const DEFAULT_CONTINUATION: &str = "quote>";

/// Default "operation incomplete" marker (a regular expression).
pub const DEFAULT_INCOMPLETE: &str = "TIMEOUT.*not complete";

/// Default command sent to ask the program to exit.
pub const DEFAULT_QUIT_COMMAND: &str = ".quit";

/// Default limit on unconsumed output (1 MiB).
pub const DEFAULT_MAX_BUFFER: usize = 1024 * 1024;

/// Default terminal width.
pub const DEFAULT_TERMINAL_WIDTH: u16 = 80;

/// Default terminal height.
pub const DEFAULT_TERMINAL_HEIGHT: u16 = 24;

/// Complete harness configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// How to start and stop the program under test.
    pub session: SessionConfig,

    /// Prompt and error markers.
    pub markers: MarkerConfig,

    /// Wait limits.
    pub timeouts: TimeoutConfig,
}

impl HarnessConfig {
    /// Check that every marker compiles.
    pub fn validate(&self) -> Result<()> {
        self.markers.prompt.compile()?;
        self.markers.continuation.compile()?;
        self.markers.incomplete.compile()?;
        if self.session.program.is_empty() {
            return Err(crate::error::ExpectError::config("no program to run"));
        }
        Ok(())
    }
}

/// Configuration for the program under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// The program to execute.
    pub program: String,

    /// Program arguments.
    pub args: Vec<String>,

    /// Extra environment variables.
    pub env: BTreeMap<String, String>,

    /// Working directory for the process.
    pub working_dir: Option<PathBuf>,

    /// Terminal dimensions (width, height).
    pub dimensions: (u16, u16),

    /// Whether the terminal echoes input.
    pub echo: bool,

    /// Line ending appended by `write_line`.
    pub line_ending: LineEnding,

    /// Maximum unconsumed output kept in memory.
    pub max_buffer: usize,

    /// How the program is asked to exit.
    pub shutdown: ShutdownConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(ToString::to_string).collect(),
            env: BTreeMap::new(),
            working_dir: None,
            dimensions: (DEFAULT_TERMINAL_WIDTH, DEFAULT_TERMINAL_HEIGHT),
            echo: true,
            line_ending: LineEnding::default(),
            max_buffer: DEFAULT_MAX_BUFFER,
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a session configuration for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            ..Default::default()
        }
    }

    /// Set the program arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Set the terminal dimensions.
    #[must_use]
    pub const fn dimensions(mut self, width: u16, height: u16) -> Self {
        self.dimensions = (width, height);
        self
    }

    /// Turn terminal echo on or off.
    #[must_use]
    pub const fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Set the quit command.
    #[must_use]
    pub fn quit_command(mut self, command: impl Into<String>) -> Self {
        self.shutdown.quit_command = command.into();
        self
    }

    /// Set the grace period after the quit command.
    #[must_use]
    pub const fn grace(mut self, grace: Duration) -> Self {
        self.shutdown.grace = grace;
        self
    }

    /// Program and arguments joined for display.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Graceful shutdown settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShutdownConfig {
    /// Line sent to ask the program to exit.
    pub quit_command: String,

    /// How long to wait for exit before killing the program.
    #[serde(rename = "grace_ms", with = "millis")]
    pub grace: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            quit_command: DEFAULT_QUIT_COMMAND.to_string(),
            grace: Duration::from_secs(2),
        }
    }
}

/// Prompt and error markers recognized in the program's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerConfig {
    /// The primary prompt, shown when the program is ready for input.
    pub prompt: PatternSpec,

    /// The continuation prompt, shown while input is incomplete.
    pub continuation: PatternSpec,

    /// The "operation incomplete" error marker.
    pub incomplete: PatternSpec,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            prompt: PatternSpec::literal(DEFAULT_PROMPT),
            continuation: PatternSpec::literal(DEFAULT_CONTINUATION),
            incomplete: PatternSpec::regex(DEFAULT_INCOMPLETE),
        }
    }
}

/// Configuration for timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Wait for the first prompt after spawning.
    #[serde(rename = "startup_ms", with = "millis")]
    pub startup: Duration,

    /// Default wait for a step's expected output.
    #[serde(rename = "step_ms", with = "millis")]
    pub step: Duration,

    /// Wait for the prompt after a step.
    #[serde(rename = "resync_ms", with = "millis")]
    pub resync: Duration,

    /// Wait for the continuation prompt and the combined output of a
    /// multi-turn step.
    #[serde(rename = "continuation_ms", with = "millis")]
    pub continuation: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            startup: Duration::from_secs(10),
            step: Duration::from_secs(5),
            resync: Duration::from_secs(2),
            continuation: Duration::from_secs(2),
        }
    }
}

/// Line ending styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    #[default]
    Lf,

    /// Windows-style line ending (CRLF).
    CrLf,

    /// Classic Mac line ending (CR).
    Cr,
}

impl LineEnding {
    /// Get the line ending as bytes.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
            Self::Cr => b"\r",
        }
    }
}

/// Durations stored as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
