//! replcheck: PTY-driven acceptance harness for interactive REPLs
//!
//! This crate starts an interactive program behind a pseudo-terminal, sends
//! it commands, waits for expected output, and keeps a ledger of PASS, FAIL
//! and SKIP outcomes.
//!
//! # Features
//!
//! - **Async sessions** on the Tokio runtime via `replcheck-pty`
//! - **Racing expectations**: literal or regex candidates plus a timeout
//!   sentinel, earliest match wins
//! - **Resync on the prompt** after every step
//! - **Declarative suites** in code or TOML
//! - **Scripted sessions** on a virtual clock for testing
//!
//! # Example
//!
//! ```ignore
//! use replcheck::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = HarnessConfig::default();
//!     let session = PtySession::spawn(&config.session).await?;
//!     let markers = Markers::compile(&config.markers)?;
//!     let mut runner = ScenarioRunner::new(session, markers, config.timeouts);
//!     runner.await_ready().await?;
//!
//!     let mut ledger = TestLedger::new();
//!     runner
//!         .run_step(&mut ledger, &Step::new("echo hello", "hello", "echo command"))
//!         .await?;
//!     runner.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod expect;
pub mod ledger;
pub mod prelude;
pub mod report;
pub mod runner;
pub mod session;
pub mod suite;

pub use config::{
    HarnessConfig, LineEnding, MarkerConfig, SessionConfig, ShutdownConfig, TimeoutConfig,
};
pub use error::{ExpectError, Result, SpawnError};
pub use expect::{Candidate, Expectation, ExpectationMatcher, Match, MatchResult, PatternSpec};
pub use ledger::{Outcome, Status, Summary, TestLedger};
pub use runner::{
    IncompleteCheck, Markers, MultiTurn, Phase, Resolution, Resync, ScenarioRunner, Step,
    StepReport,
};
#[cfg(unix)]
pub use session::PtySession;
pub use session::{Reply, ScriptedSession, Session, Shutdown};
pub use suite::{Group, Reporter, Scenario, Suite, SuiteReport, run_suite};
