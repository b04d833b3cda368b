//! Declarative scenarios.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::expect::PatternSpec;
use crate::ledger::TestLedger;
use crate::runner::{IncompleteCheck, MultiTurn, ScenarioRunner, Step, StepReport};
use crate::session::Session;

/// One test in a suite, tagged by `kind` in suite files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scenario {
    /// Send a command and expect output.
    Step {
        /// Test name.
        name: String,
        /// Line sent to the program.
        command: String,
        /// Output that makes the test pass.
        expect: PatternSpec,
        /// Overrides the default step timeout.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        /// Record as skipped with this reason instead of running.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skip: Option<String>,
    },
    /// Send input that spans a continuation prompt.
    MultiTurn {
        /// Test name.
        name: String,
        /// First line.
        first: String,
        /// Line sent after the continuation prompt.
        rest: String,
        /// Output expected once the input is complete.
        expect: PatternSpec,
        /// Overrides the continuation timeout for the continuation prompt.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        continuation_timeout_ms: Option<u64>,
        /// Overrides the continuation timeout for the final output.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_timeout_ms: Option<u64>,
    },
    /// Send a command that should show the incomplete marker.
    ExpectIncomplete {
        /// Name recorded on pass.
        name: String,
        /// Line sent to the program.
        command: String,
        /// Name recorded on failure, when different.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fail_name: Option<String>,
        /// Detail recorded on failure.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fail_detail: Option<String>,
        /// Overrides the default step timeout.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Record a skip without running anything.
    Skip {
        /// Test name.
        name: String,
        /// Why the test is skipped.
        reason: String,
    },
}

impl Scenario {
    /// A command with expected output.
    #[must_use]
    pub fn step(
        name: impl Into<String>,
        command: impl Into<String>,
        expect: impl Into<PatternSpec>,
    ) -> Self {
        Self::Step {
            name: name.into(),
            command: command.into(),
            expect: expect.into(),
            timeout_ms: None,
            skip: None,
        }
    }

    /// Input that spans a continuation prompt.
    #[must_use]
    pub fn multi_turn(
        name: impl Into<String>,
        first: impl Into<String>,
        rest: impl Into<String>,
        expect: impl Into<PatternSpec>,
    ) -> Self {
        Self::MultiTurn {
            name: name.into(),
            first: first.into(),
            rest: rest.into(),
            expect: expect.into(),
            continuation_timeout_ms: None,
            output_timeout_ms: None,
        }
    }

    /// A command expected to show the incomplete marker.
    #[must_use]
    pub fn expect_incomplete(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::ExpectIncomplete {
            name: name.into(),
            command: command.into(),
            fail_name: None,
            fail_detail: None,
            timeout_ms: None,
        }
    }

    /// A skipped test.
    #[must_use]
    pub fn skip(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Skip {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Set the timeout override. Multi-turn scenarios use it for both waits.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = Some(timeout.as_millis() as u64);
        match &mut self {
            Self::Step { timeout_ms, .. } | Self::ExpectIncomplete { timeout_ms, .. } => {
                *timeout_ms = millis;
            }
            Self::MultiTurn {
                continuation_timeout_ms,
                output_timeout_ms,
                ..
            } => {
                *continuation_timeout_ms = millis;
                *output_timeout_ms = millis;
            }
            Self::Skip { .. } => {}
        }
        self
    }

    /// Set the name and detail recorded when an incomplete check fails.
    #[must_use]
    pub fn on_failure(mut self, name: impl Into<String>, detail: impl Into<String>) -> Self {
        if let Self::ExpectIncomplete {
            fail_name,
            fail_detail,
            ..
        } = &mut self
        {
            *fail_name = Some(name.into());
            *fail_detail = Some(detail.into());
        }
        self
    }

    /// The test name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Step { name, .. }
            | Self::MultiTurn { name, .. }
            | Self::ExpectIncomplete { name, .. }
            | Self::Skip { name, .. } => name,
        }
    }

    /// Check that every pattern compiles.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Step { expect, .. } | Self::MultiTurn { expect, .. } => {
                expect.compile()?;
            }
            Self::ExpectIncomplete { .. } | Self::Skip { .. } => {}
        }
        Ok(())
    }

    /// Execute the scenario, recording into `ledger`.
    pub async fn run<S: Session>(
        &self,
        runner: &mut ScenarioRunner<S>,
        ledger: &mut TestLedger,
    ) -> Result<StepReport> {
        match self {
            Self::Step {
                name,
                command,
                expect,
                timeout_ms,
                skip,
            } => {
                let step = Step {
                    command: command.clone(),
                    expect: expect.clone(),
                    name: name.clone(),
                    timeout: timeout_ms.map(Duration::from_millis),
                    skip: skip.clone(),
                };
                runner.run_step(ledger, &step).await
            }
            Self::MultiTurn {
                name,
                first,
                rest,
                expect,
                continuation_timeout_ms,
                output_timeout_ms,
            } => {
                let step = MultiTurn {
                    name: name.clone(),
                    first: first.clone(),
                    rest: rest.clone(),
                    expect: expect.clone(),
                    continuation_timeout: continuation_timeout_ms.map(Duration::from_millis),
                    output_timeout: output_timeout_ms.map(Duration::from_millis),
                };
                runner.run_multi_turn(ledger, &step).await
            }
            Self::ExpectIncomplete {
                name,
                command,
                fail_name,
                fail_detail,
                timeout_ms,
            } => {
                let check = IncompleteCheck {
                    command: command.clone(),
                    name: name.clone(),
                    fail_name: fail_name.clone(),
                    fail_detail: fail_detail.clone(),
                    timeout: timeout_ms.map(Duration::from_millis),
                };
                runner.run_incomplete(ledger, &check).await
            }
            Self::Skip { name, reason } => Ok(runner.skip(ledger, name, reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::parse_toml;

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        scenario: Vec<Scenario>,
    }

    #[test]
    fn kinds_parse_from_toml() {
        let parsed: Wrapper = parse_toml(
            r#"
            [[scenario]]
            kind = "step"
            name = ".ast command"
            command = ".ast"
            expect = { regex = "(Full Accumulated AST|No AST yet)" }

            [[scenario]]
            kind = "multi_turn"
            name = "multiline quote continuation"
            first = 'echo "hello'
            rest = 'world"'
            expect = { regex = "hello.*world" }
            continuation_timeout_ms = 500
            output_timeout_ms = 8000

            [[scenario]]
            kind = "expect_incomplete"
            name = "variable declaration shows red timeout error"
            command = "A=12"
            timeout_ms = 6000

            [[scenario]]
            kind = "skip"
            name = "for loop"
            reason = "Control flow in development"
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(parsed.scenario.len(), 4);
        assert_eq!(
            parsed.scenario[0],
            Scenario::step(
                ".ast command",
                ".ast",
                PatternSpec::regex("(Full Accumulated AST|No AST yet)")
            )
        );
        assert!(matches!(
            parsed.scenario[1],
            Scenario::MultiTurn {
                continuation_timeout_ms: Some(500),
                output_timeout_ms: Some(8000),
                ..
            }
        ));
        assert_eq!(
            parsed.scenario[2],
            Scenario::expect_incomplete("variable declaration shows red timeout error", "A=12")
                .with_timeout(Duration::from_secs(6))
        );
        assert_eq!(parsed.scenario[3].name(), "for loop");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = parse_toml::<Wrapper>(
            "[[scenario]]\nkind = \"loop\"\nname = \"x\"\n",
            "inline",
        );
        assert!(err.is_err());
    }

    #[test]
    fn validate_catches_bad_regex() {
        let scenario = Scenario::step("bad", "x", PatternSpec::regex("[z-a]"));
        assert!(scenario.validate().is_err());
        assert!(Scenario::skip("later", "not yet").validate().is_ok());
    }

    #[test]
    fn with_timeout_ignores_skips() {
        let scenario = Scenario::skip("a", "b").with_timeout(Duration::from_secs(1));
        assert_eq!(scenario, Scenario::skip("a", "b"));
    }
}
