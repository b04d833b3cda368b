//! The expectation race.
//!
//! An [`ExpectationMatcher`] scans a session's unconsumed output for every
//! candidate at once. The candidate whose match starts earliest wins, ties go
//! to the candidate listed first, and the timeout sentinel only wins when
//! the deadline passes with nothing else present in the buffer.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

use super::buffer::OutputBuffer;
use super::pattern::Expectation;
use crate::error::{ExpectError, Result};

/// A resolved text candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Index of the winning candidate.
    pub candidate: usize,
    /// The matched text.
    pub matched: String,
    /// Unconsumed text that preceded the match.
    pub before: String,
    /// Absolute stream offset where the match starts.
    pub start: usize,
    /// Absolute stream offset just past the match.
    pub end: usize,
}

/// Outcome of a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// A text candidate matched.
    Matched(Match),
    /// The deadline passed; `candidate` is the timeout sentinel's index.
    Expired {
        /// Index of the timeout sentinel.
        candidate: usize,
    },
}

impl MatchResult {
    /// Index of the candidate that resolved the wait.
    #[must_use]
    pub const fn candidate(&self) -> usize {
        match self {
            Self::Matched(m) => m.candidate,
            Self::Expired { candidate } => *candidate,
        }
    }

    /// Check if a text candidate matched.
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Check if the wait expired.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }

    /// Get the match, if there was one.
    #[must_use]
    pub const fn as_match(&self) -> Option<&Match> {
        match self {
            Self::Matched(m) => Some(m),
            Self::Expired { .. } => None,
        }
    }
}

/// A stream of program output.
///
/// Implementations must be cancel safe: if the returned future is dropped
/// before completing, no output may be lost.
pub trait OutputSource {
    /// Wait for the next chunk of output. `Ok(None)` means end of file.
    fn next_chunk(&mut self) -> impl Future<Output = io::Result<Option<Vec<u8>>>> + Send;
}

/// Position of the winning candidate within the unconsumed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Index of the winning candidate.
    pub candidate: usize,
    /// Start, relative to the first unconsumed byte.
    pub start: usize,
    /// End, relative to the first unconsumed byte.
    pub end: usize,
}

/// Races an expectation's candidates against a session's output.
#[derive(Debug, Clone, Copy)]
pub struct ExpectationMatcher<'a> {
    expectation: &'a Expectation,
    timeout: Duration,
}

impl<'a> ExpectationMatcher<'a> {
    /// Create a matcher that gives up after `timeout`.
    #[must_use]
    pub const fn new(expectation: &'a Expectation, timeout: Duration) -> Self {
        Self {
            expectation,
            timeout,
        }
    }

    /// Find the winning candidate in `haystack`, if any matches yet.
    #[must_use]
    pub fn scan(&self, haystack: &[u8]) -> Option<Hit> {
        let mut best: Option<Hit> = None;

        for (index, candidate) in self.expectation.candidates().iter().enumerate() {
            let Some(range) = candidate.find(haystack) else {
                continue;
            };
            // Strictly earlier only: equal offsets keep the earlier-listed one.
            if best.is_none_or(|b| range.start < b.start) {
                best = Some(Hit {
                    candidate: index,
                    start: range.start,
                    end: range.end,
                });
            }
        }

        best
    }

    /// Scan `buffer` and, on a hit, consume through the end of the match.
    pub fn resolve(&self, buffer: &mut OutputBuffer) -> Option<Match> {
        let hit = self.scan(buffer.unconsumed())?;
        let base = buffer.offset();
        let before = buffer.consume(hit.start);
        let matched = buffer.consume(hit.end - hit.start);

        Some(Match {
            candidate: hit.candidate,
            matched: String::from_utf8_lossy(&matched).into_owned(),
            before: String::from_utf8_lossy(&before).into_owned(),
            start: base + hit.start,
            end: base + hit.end,
        })
    }

    /// Read from `source` into `buffer` until a candidate resolves.
    ///
    /// Without a timeout sentinel in the expectation, reaching the deadline
    /// is an [`ExpectError::Timeout`]. End of file with nothing matched is
    /// an [`ExpectError::Eof`].
    pub async fn run<S>(&self, source: &mut S, buffer: &mut OutputBuffer) -> Result<MatchResult>
    where
        S: OutputSource + Send,
    {
        let deadline = Instant::now() + self.timeout;

        loop {
            if let Some(found) = self.resolve(buffer) {
                tracing::trace!(candidate = found.candidate, start = found.start, "candidate matched");
                return Ok(MatchResult::Matched(found));
            }
            if Instant::now() >= deadline {
                return self.expire(buffer);
            }

            tokio::select! {
                biased;
                chunk = source.next_chunk() => match chunk? {
                    Some(bytes) => buffer.append(&bytes),
                    None => {
                        tracing::debug!(pending = buffer.len(), "end of file while waiting");
                        return Err(ExpectError::eof(buffer.as_str_lossy()));
                    }
                },
                () = sleep_until(deadline) => {
                    if let Some(found) = self.resolve(buffer) {
                        return Ok(MatchResult::Matched(found));
                    }
                    return self.expire(buffer);
                }
            }
        }
    }

    fn expire(&self, buffer: &OutputBuffer) -> Result<MatchResult> {
        match self.expectation.timeout_index() {
            Some(candidate) => {
                tracing::debug!(timeout = ?self.timeout, waiting_for = %self.expectation.describe(), "wait expired");
                Ok(MatchResult::Expired { candidate })
            }
            None => Err(ExpectError::timeout(
                self.timeout,
                self.expectation.describe(),
                buffer.as_str_lossy(),
            )),
        }
    }
}
