//! Convenient re-exports for writing harness programs.
//!
//! ```ignore
//! use replcheck::prelude::*;
//! ```

// Configuration
pub use crate::config::{HarnessConfig, MarkerConfig, SessionConfig, TimeoutConfig};

// Error handling
pub use crate::error::{ExpectError, Result, SpawnError};

// Patterns and matching
pub use crate::expect::{Candidate, Expectation, MatchResult, PatternSpec};

// Outcomes
pub use crate::ledger::{Status, TestLedger};

// Running steps and suites
pub use crate::runner::{IncompleteCheck, Markers, MultiTurn, ScenarioRunner, Step};
pub use crate::suite::{Group, Scenario, Suite, run_suite};

// Sessions
#[cfg(unix)]
pub use crate::session::PtySession;
pub use crate::session::{Reply, ScriptedSession, Session, Shutdown};
