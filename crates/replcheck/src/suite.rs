//! Test suites: named groups of scenarios.
//!
//! A [`Suite`] is either built in code ([`rshell`]) or loaded from a TOML
//! file:
//!
//! ```toml
//! title = "Smoke"
//!
//! [[group]]
//! name = "Basics"
//! icon = "📦"
//!
//! [[group.scenario]]
//! kind = "step"
//! name = "echo command"
//! command = "echo hello"
//! expect = "hello"
//! ```
//!
//! [`run_suite`] executes groups in order. An error escaping a scenario
//! abandons the rest of its group; an error that leaves the session
//! unusable abandons every remaining group as well.

mod builtin;
mod scenario;

use std::path::Path;

pub use builtin::rshell;
pub use scenario::Scenario;
use serde::{Deserialize, Serialize};

use crate::config::file::load_toml;
use crate::error::{ExpectError, Result};
use crate::ledger::{Outcome, TestLedger};
use crate::runner::ScenarioRunner;
use crate::session::Session;

/// An ordered list of groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    /// Shown in the banner.
    pub title: String,
    /// Groups in execution order.
    #[serde(default, rename = "group")]
    pub groups: Vec<Group>,
}

impl Suite {
    /// Load a suite from a TOML file and check its patterns.
    pub fn load(path: &Path) -> Result<Self> {
        let suite: Self = load_toml(path)?;
        suite.validate()?;
        tracing::debug!(path = %path.display(), groups = suite.groups.len(), "loaded suite");
        Ok(suite)
    }

    /// Check that every scenario's pattern compiles.
    pub fn validate(&self) -> Result<()> {
        for group in &self.groups {
            for scenario in &group.scenarios {
                scenario.validate().map_err(|e| {
                    ExpectError::config(format!(
                        "{} / {}: {}",
                        group.name,
                        scenario.name(),
                        e.summary()
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Total number of scenarios.
    #[must_use]
    pub fn scenario_count(&self) -> usize {
        self.groups.iter().map(|g| g.scenarios.len()).sum()
    }
}

/// A named list of scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Shown before the name in the group header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Scenarios in execution order.
    #[serde(default, rename = "scenario")]
    pub scenarios: Vec<Scenario>,
}

impl Group {
    /// Create an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            scenarios: Vec::new(),
        }
    }

    /// Set the icon.
    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Append a scenario.
    #[must_use]
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }
}

/// Receives progress while a suite runs.
///
/// Every method has an empty default, so `()` reports nothing.
pub trait Reporter {
    /// A group is about to run.
    fn group_started(&mut self, _group: &Group) {}

    /// An outcome was recorded.
    fn outcome(&mut self, _outcome: &Outcome) {}

    /// An error ended a group early.
    fn group_aborted(&mut self, _group: &Group, _error: &ExpectError) {}

    /// Groups left unrun because the session became unusable.
    fn groups_skipped(&mut self, _groups: &[Group]) {}
}

impl Reporter for () {}

/// A group that ended early.
#[derive(Debug)]
pub struct GroupAbort {
    /// The group name.
    pub group: String,
    /// The error that ended it.
    pub error: ExpectError,
}

/// What happened at group level during a run.
#[derive(Debug, Default)]
pub struct SuiteReport {
    /// Groups that ended early, in order.
    pub aborted: Vec<GroupAbort>,
    /// Names of groups that never ran.
    pub skipped: Vec<String>,
}

impl SuiteReport {
    /// Check whether every group ran to completion.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.aborted.is_empty() && self.skipped.is_empty()
    }
}

/// Run every group of `suite`, recording into `ledger`.
pub async fn run_suite<S, R>(
    runner: &mut ScenarioRunner<S>,
    suite: &Suite,
    ledger: &mut TestLedger,
    reporter: &mut R,
) -> SuiteReport
where
    S: Session,
    R: Reporter + ?Sized,
{
    let mut report = SuiteReport::default();

    for (index, group) in suite.groups.iter().enumerate() {
        reporter.group_started(group);
        tracing::info!(group = %group.name, scenarios = group.scenarios.len(), "running group");

        let Err(error) = run_group(runner, group, ledger, reporter).await else {
            continue;
        };

        tracing::warn!(group = %group.name, error = %error.summary(), "group aborted");
        reporter.group_aborted(group, &error);
        let fatal = error.is_fatal();
        report.aborted.push(GroupAbort {
            group: group.name.clone(),
            error,
        });

        if fatal {
            let rest = &suite.groups[index + 1..];
            if !rest.is_empty() {
                reporter.groups_skipped(rest);
                report.skipped = rest.iter().map(|g| g.name.clone()).collect();
            }
            break;
        }
    }

    report
}

async fn run_group<S, R>(
    runner: &mut ScenarioRunner<S>,
    group: &Group,
    ledger: &mut TestLedger,
    reporter: &mut R,
) -> Result<()>
where
    S: Session,
    R: Reporter + ?Sized,
{
    for scenario in &group.scenarios {
        let seen = ledger.len();
        let result = scenario.run(runner, ledger).await;
        for outcome in &ledger.outcomes()[seen..] {
            reporter.outcome(outcome);
        }
        result?;
    }
    Ok(())
}
