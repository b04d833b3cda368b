//! Pattern types for expect operations.
//!
//! [`PatternSpec`] is the serializable form written in configuration and
//! suite files. [`Candidate`] is the compiled form raced by the matcher,
//! and [`Expectation`] is the ordered list of candidates for one wait.

use std::fmt;
use std::ops::Range;

use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A pattern as written by a user.
///
/// In TOML a plain string is a literal and `{ regex = "..." }` is a regular
/// expression:
///
/// ```toml
/// expect = "Parser state reset"
/// expect = { regex = "(Full Accumulated AST|No AST yet)" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    /// Exact text.
    Literal(String),
    /// A regular expression in `regex` crate syntax.
    Regex {
        /// The expression source.
        regex: String,
    },
}

impl PatternSpec {
    /// A literal pattern.
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// A regular expression pattern.
    #[must_use]
    pub fn regex(source: impl Into<String>) -> Self {
        Self::Regex {
            regex: source.into(),
        }
    }

    /// The pattern text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Regex { regex } => regex,
        }
    }

    /// Compile into a match candidate.
    pub fn compile(&self) -> Result<Candidate> {
        match self {
            Self::Literal(text) => Ok(Candidate::literal(text.clone())),
            Self::Regex { regex } => Candidate::regex(regex),
        }
    }
}

impl fmt::Display for PatternSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for PatternSpec {
    fn from(text: &str) -> Self {
        Self::literal(text)
    }
}

/// One member of an expectation race.
#[derive(Debug, Clone)]
pub enum Candidate {
    /// Match an exact byte sequence.
    Literal(String),
    /// Match a regular expression over raw bytes.
    Regex(Regex),
    /// Resolves when the wait's deadline passes with nothing else matched.
    Timeout,
}

impl Candidate {
    /// Create a literal candidate.
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Compile a regular expression candidate.
    ///
    /// `.` also matches line breaks, so a marker split across output lines
    /// still matches; write `(?-s)` to keep a match on one line.
    pub fn regex(source: &str) -> Result<Self> {
        let regex = RegexBuilder::new(source).dot_matches_new_line(true).build()?;
        Ok(Self::Regex(regex))
    }

    /// Check if this is the timeout sentinel.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Find the leftmost occurrence in `haystack`.
    ///
    /// The timeout sentinel never matches text.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<Range<usize>> {
        match self {
            Self::Literal(text) => find_bytes(haystack, text.as_bytes()),
            Self::Regex(regex) => regex.find(haystack).map(|m| m.range()),
            Self::Timeout => None,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "'{text}'"),
            Self::Regex(regex) => write!(f, "/{}/", regex.as_str()),
            Self::Timeout => f.write_str("TIMEOUT"),
        }
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<Range<usize>> {
    if needle.is_empty() {
        return Some(0..0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|start| start..start + needle.len())
}

/// Ordered candidates for a single wait.
///
/// Order matters only to break ties between candidates that match at the
/// same offset.
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    candidates: Vec<Candidate>,
}

impl Expectation {
    /// Create an empty expectation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// Append a candidate.
    #[must_use]
    pub fn with(mut self, candidate: Candidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    /// Append the timeout sentinel.
    #[must_use]
    pub fn or_timeout(self) -> Self {
        self.with(Candidate::Timeout)
    }

    /// Get the candidates in order.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Get the number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Check if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Index of the first timeout sentinel.
    #[must_use]
    pub fn timeout_index(&self) -> Option<usize> {
        self.candidates.iter().position(Candidate::is_timeout)
    }

    /// Text candidates joined for messages.
    #[must_use]
    pub fn describe(&self) -> String {
        self.candidates
            .iter()
            .filter(|c| !c.is_timeout())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl From<Vec<Candidate>> for Expectation {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }
}
