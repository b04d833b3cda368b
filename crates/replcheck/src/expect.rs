//! Expectation matching.
//!
//! This module provides the pattern types, the unconsumed-output buffer and
//! the race that decides which candidate resolves a wait.

mod buffer;
mod matcher;
mod pattern;

pub use buffer::{DEFAULT_CAPACITY, OutputBuffer};
pub use matcher::{ExpectationMatcher, Hit, Match, MatchResult, OutputSource};
pub use pattern::{Candidate, Expectation, PatternSpec};
