//! Scenario execution.
//!
//! A [`ScenarioRunner`] owns the session and turns each scenario into one
//! exchange: send input, race the expected output against the incomplete
//! marker and the step timeout, record the outcome, then wait for the prompt
//! again so the next step starts from a known state.
//!
//! Per step the runner moves through these phases:
//!
//! ```text
//! Ready -> AwaitingMatch -> MatchedPrimary   -> Resynced | Unresynced
//!                        -> MatchedSecondary -> Resynced | Unresynced
//!                        -> Expired         [-> Resynced | Unresynced]
//! ```

use std::time::Duration;

use crate::config::{MarkerConfig, TimeoutConfig};
use crate::error::{ExpectError, Result};
use crate::expect::{Candidate, Expectation, MatchResult, PatternSpec};
use crate::ledger::TestLedger;
use crate::session::{Session, Shutdown, wait_ready};

/// Suffix added to the name of a pass won by the incomplete marker.
pub const INCOMPLETE_SHOWN: &str = "timeout error shown";

/// Default failure detail for an incomplete check that saw no marker.
pub const NO_INCOMPLETE_MESSAGE: &str = "No timeout message";

/// Where the runner is in the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The program is at its prompt and no step has run since.
    Ready,
    /// Input was sent; waiting for a candidate to resolve.
    AwaitingMatch,
    /// The expected output appeared.
    MatchedPrimary,
    /// The incomplete marker appeared.
    MatchedSecondary,
    /// Nothing appeared before the deadline.
    Expired,
    /// The prompt was seen after the step.
    Resynced,
    /// The prompt was not seen after the step.
    Unresynced,
    /// The session can no longer be used.
    Closed,
}

/// Which candidate decided a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The expected output.
    Primary,
    /// The incomplete marker.
    Secondary,
    /// The deadline.
    Expired,
    /// The step was skipped without running.
    Skipped,
}

/// Whether the prompt was found again after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    /// The prompt appeared.
    Resynced,
    /// The prompt did not appear in time, or the wait failed.
    Unresynced,
    /// No resync was attempted.
    NotAttempted,
}

/// What happened during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// The deciding candidate.
    pub resolution: Resolution,
    /// The resync result.
    pub resync: Resync,
}

impl StepReport {
    const fn new(resolution: Resolution, resync: Resync) -> Self {
        Self { resolution, resync }
    }
}

/// Compiled prompt and error markers.
#[derive(Debug, Clone)]
pub struct Markers {
    specs: MarkerConfig,
    prompt: Candidate,
    continuation: Candidate,
    incomplete: Candidate,
}

impl Markers {
    /// Compile every marker.
    pub fn compile(specs: &MarkerConfig) -> Result<Self> {
        Ok(Self {
            prompt: specs.prompt.compile()?,
            continuation: specs.continuation.compile()?,
            incomplete: specs.incomplete.compile()?,
            specs: specs.clone(),
        })
    }

    /// The marker patterns as written.
    #[must_use]
    pub const fn specs(&self) -> &MarkerConfig {
        &self.specs
    }
}

/// Send a command and check its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Line sent to the program.
    pub command: String,
    /// Output that makes the step pass.
    pub expect: PatternSpec,
    /// Test name.
    pub name: String,
    /// Overrides the default step timeout.
    pub timeout: Option<Duration>,
    /// When set, the step is recorded as skipped with this reason.
    pub skip: Option<String>,
}

impl Step {
    /// Create a step.
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        expect: impl Into<PatternSpec>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            expect: expect.into(),
            name: name.into(),
            timeout: None,
            skip: None,
        }
    }

    /// Set the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Mark the step skipped.
    #[must_use]
    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.skip = Some(reason.into());
        self
    }
}

/// Input split across a continuation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiTurn {
    /// Test name.
    pub name: String,
    /// First line, which leaves the input incomplete.
    pub first: String,
    /// Line sent after the continuation prompt.
    pub rest: String,
    /// Output expected once the input is complete.
    pub expect: PatternSpec,
    /// Overrides the continuation timeout for the continuation prompt.
    pub continuation_timeout: Option<Duration>,
    /// Overrides the continuation timeout for the final output.
    pub output_timeout: Option<Duration>,
}

impl MultiTurn {
    /// Create a multi-turn step.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        first: impl Into<String>,
        rest: impl Into<String>,
        expect: impl Into<PatternSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            first: first.into(),
            rest: rest.into(),
            expect: expect.into(),
            continuation_timeout: None,
            output_timeout: None,
        }
    }

    /// Use `timeout` for both waits.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.continuation_timeout = Some(timeout);
        self.output_timeout = Some(timeout);
        self
    }
}

/// Send a command that should report itself incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteCheck {
    /// Line sent to the program.
    pub command: String,
    /// Name recorded on pass.
    pub name: String,
    /// Name recorded on failure, when different.
    pub fail_name: Option<String>,
    /// Detail recorded on failure.
    pub fail_detail: Option<String>,
    /// Overrides the default step timeout.
    pub timeout: Option<Duration>,
}

impl IncompleteCheck {
    /// Create an incomplete check.
    #[must_use]
    pub fn new(command: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            name: name.into(),
            fail_name: None,
            fail_detail: None,
            timeout: None,
        }
    }
}

/// Drives scenarios against one session.
#[derive(Debug)]
pub struct ScenarioRunner<S> {
    session: S,
    markers: Markers,
    timeouts: TimeoutConfig,
    phase: Phase,
}

impl<S: Session> ScenarioRunner<S> {
    /// Create a runner over `session`.
    #[must_use]
    pub const fn new(session: S, markers: Markers, timeouts: TimeoutConfig) -> Self {
        Self {
            session,
            markers,
            timeouts,
            phase: Phase::Ready,
        }
    }

    /// Get the current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Get the session.
    #[must_use]
    pub const fn session(&self) -> &S {
        &self.session
    }

    /// Get the session mutably.
    pub const fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Give back the session.
    #[must_use]
    pub fn into_session(self) -> S {
        self.session
    }

    /// Wait for the program's first prompt within the startup timeout.
    pub async fn await_ready(&mut self) -> Result<()> {
        let result = wait_ready(&mut self.session, &self.markers.specs.prompt, self.timeouts.startup).await;
        self.phase = if result.is_ok() { Phase::Ready } else { Phase::Closed };
        result
    }

    /// Run one command and record its outcome.
    ///
    /// The expected output passes the step. The incomplete marker passes it
    /// under the name suffixed with [`INCOMPLETE_SHOWN`]. The deadline fails
    /// it. A pass is followed by a resync on the prompt. Session errors are
    /// recorded as a failure and returned.
    pub async fn run_step(&mut self, ledger: &mut TestLedger, step: &Step) -> Result<StepReport> {
        if let Some(reason) = &step.skip {
            ledger.skip(&step.name, reason);
            return Ok(StepReport::new(Resolution::Skipped, Resync::NotAttempted));
        }

        let primary = match step.expect.compile() {
            Ok(candidate) => candidate,
            Err(e) => return Err(self.fail_step(ledger, &step.name, e)),
        };
        let expectation = Expectation::new()
            .with(primary)
            .with(self.markers.incomplete.clone())
            .or_timeout();
        let timeout = step.timeout.unwrap_or(self.timeouts.step);

        tracing::debug!(name = %step.name, command = %step.command, "running step");
        let result = match self.exchange(&step.command, &expectation, timeout).await {
            Ok(result) => result,
            Err(e) => return Err(self.fail_step(ledger, &step.name, e)),
        };

        match result {
            MatchResult::Matched(found) if found.candidate == 0 => {
                self.phase = Phase::MatchedPrimary;
                ledger.pass(&step.name);
                let resync = self.resync().await;
                Ok(StepReport::new(Resolution::Primary, resync))
            }
            MatchResult::Matched(_) => {
                self.phase = Phase::MatchedSecondary;
                ledger.pass(format!("{} ({INCOMPLETE_SHOWN})", step.name));
                let resync = self.resync().await;
                Ok(StepReport::new(Resolution::Secondary, resync))
            }
            MatchResult::Expired { .. } => {
                self.phase = Phase::Expired;
                ledger.fail(&step.name, format!("Timeout waiting for: {}", step.expect));
                Ok(StepReport::new(Resolution::Expired, Resync::NotAttempted))
            }
        }
    }

    /// Run input that spans a continuation prompt.
    ///
    /// The second line is only sent once the continuation prompt appears.
    /// A missing prompt or missing output fails the step; either way the
    /// runner then resyncs on the main prompt.
    pub async fn run_multi_turn(&mut self, ledger: &mut TestLedger, step: &MultiTurn) -> Result<StepReport> {
        let expected = match step.expect.compile() {
            Ok(candidate) => Expectation::new().with(candidate).or_timeout(),
            Err(e) => return Err(self.fail_step(ledger, &step.name, e)),
        };
        let continuation = Expectation::new()
            .with(self.markers.continuation.clone())
            .or_timeout();
        let prompt_timeout = step.continuation_timeout.unwrap_or(self.timeouts.continuation);
        let output_timeout = step.output_timeout.unwrap_or(self.timeouts.continuation);

        tracing::debug!(name = %step.name, first = %step.first, rest = %step.rest, "running multi-turn step");
        let prompted = match self.exchange(&step.first, &continuation, prompt_timeout).await {
            Ok(result) => result,
            Err(e) => return Err(self.fail_step(ledger, &step.name, e)),
        };

        let resolution = if prompted.is_expired() {
            self.phase = Phase::Expired;
            ledger.fail(
                &step.name,
                format!("Timeout waiting for: {}", self.markers.specs.continuation),
            );
            Resolution::Expired
        } else {
            let result = match self.exchange(&step.rest, &expected, output_timeout).await {
                Ok(result) => result,
                Err(e) => return Err(self.fail_step(ledger, &step.name, e)),
            };
            if result.is_matched() {
                self.phase = Phase::MatchedPrimary;
                ledger.pass(&step.name);
                Resolution::Primary
            } else {
                self.phase = Phase::Expired;
                ledger.fail(&step.name, "Output not found");
                Resolution::Expired
            }
        };

        let resync = self.resync().await;
        Ok(StepReport::new(resolution, resync))
    }

    /// Run a command that should show the incomplete marker.
    ///
    /// The marker passes the step, the deadline fails it; the runner resyncs
    /// afterwards in both cases.
    pub async fn run_incomplete(&mut self, ledger: &mut TestLedger, check: &IncompleteCheck) -> Result<StepReport> {
        let expectation = Expectation::new()
            .with(self.markers.incomplete.clone())
            .or_timeout();
        let timeout = check.timeout.unwrap_or(self.timeouts.step);
        let fail_name = check.fail_name.as_deref().unwrap_or(&check.name);

        tracing::debug!(name = %check.name, command = %check.command, "running incomplete check");
        let result = match self.exchange(&check.command, &expectation, timeout).await {
            Ok(result) => result,
            Err(e) => return Err(self.fail_step(ledger, fail_name, e)),
        };

        let resolution = if result.is_matched() {
            self.phase = Phase::MatchedSecondary;
            ledger.pass(&check.name);
            Resolution::Secondary
        } else {
            self.phase = Phase::Expired;
            ledger.fail(
                fail_name,
                check.fail_detail.as_deref().unwrap_or(NO_INCOMPLETE_MESSAGE),
            );
            Resolution::Expired
        };

        let resync = self.resync().await;
        Ok(StepReport::new(resolution, resync))
    }

    /// Record a skipped test without touching the session.
    pub fn skip(&self, ledger: &mut TestLedger, name: &str, reason: &str) -> StepReport {
        ledger.skip(name, reason);
        StepReport::new(Resolution::Skipped, Resync::NotAttempted)
    }

    /// Wait for the prompt within the resync timeout.
    ///
    /// Failure is logged and reported, never raised.
    pub async fn resync(&mut self) -> Resync {
        let expectation = Expectation::new()
            .with(self.markers.prompt.clone())
            .or_timeout();

        match self.session.read_until(&expectation, self.timeouts.resync).await {
            Ok(MatchResult::Matched(_)) => {
                self.phase = Phase::Resynced;
                Resync::Resynced
            }
            Ok(MatchResult::Expired { .. }) => {
                tracing::warn!(
                    prompt = %self.markers.specs.prompt,
                    timeout = ?self.timeouts.resync,
                    pending = %self.session.pending_output(),
                    "prompt did not reappear"
                );
                self.phase = Phase::Unresynced;
                Resync::Unresynced
            }
            Err(e) => {
                tracing::warn!(error = %e.summary(), "resync failed");
                self.phase = if e.is_fatal() { Phase::Closed } else { Phase::Unresynced };
                Resync::Unresynced
            }
        }
    }

    /// Terminate the session.
    pub async fn shutdown(&mut self) -> Shutdown {
        let outcome = self.session.terminate().await;
        self.phase = Phase::Closed;
        tracing::info!(%outcome, "session shut down");
        outcome
    }

    async fn exchange(&mut self, input: &str, expectation: &Expectation, timeout: Duration) -> Result<MatchResult> {
        self.phase = Phase::AwaitingMatch;
        self.session.write_line(input).await?;
        self.session.read_until(expectation, timeout).await
    }

    fn fail_step(&mut self, ledger: &mut TestLedger, name: &str, error: ExpectError) -> ExpectError {
        tracing::warn!(name, error = %error.summary(), "step failed with error");
        ledger.fail(name, error.summary());
        self.phase = if error.is_fatal() { Phase::Closed } else { Phase::Unresynced };
        error
    }
}
