//! Test outcome ledger.
//!
//! Outcomes are appended as steps finish and never changed afterwards; every
//! count in a [`Summary`] is derived from the recorded sequence.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// The expected output appeared.
    Pass,
    /// The expected output did not appear, or the session failed.
    Fail,
    /// The test was not run.
    Skip,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
        })
    }
}

/// One recorded test result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// The result.
    pub status: Status,
    /// The test name.
    pub name: String,
    /// Failure or skip reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Counts derived from a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of outcomes.
    pub total: usize,
    /// Number of passes.
    pub passed: usize,
    /// Number of failures.
    pub failed: usize,
    /// Number of skips.
    pub skipped: usize,
    /// `floor(100 * passed / total)`; absent when nothing was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<u8>,
}

impl Summary {
    /// Check whether no test failed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Append-only list of outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestLedger {
    outcomes: Vec<Outcome>,
}

impl TestLedger {
    /// Create an empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }

    /// Append an outcome.
    pub fn record(&mut self, status: Status, name: impl Into<String>, detail: Option<String>) -> &Outcome {
        let outcome = Outcome {
            status,
            name: name.into(),
            detail,
        };
        tracing::debug!(%status, name = %outcome.name, detail = ?outcome.detail, "recorded outcome");
        self.outcomes.push(outcome);
        &self.outcomes[self.outcomes.len() - 1]
    }

    /// Record a pass.
    pub fn pass(&mut self, name: impl Into<String>) -> &Outcome {
        self.record(Status::Pass, name, None)
    }

    /// Record a failure with its reason.
    pub fn fail(&mut self, name: impl Into<String>, detail: impl Into<String>) -> &Outcome {
        self.record(Status::Fail, name, Some(detail.into()))
    }

    /// Record a skip with its reason.
    pub fn skip(&mut self, name: impl Into<String>, detail: impl Into<String>) -> &Outcome {
        self.record(Status::Skip, name, Some(detail.into()))
    }

    /// Get the outcomes in recording order.
    #[must_use]
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Get the number of outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Check if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Count outcomes with `status`.
    #[must_use]
    pub fn count(&self, status: Status) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Derive the summary counts.
    #[must_use]
    pub fn summary(&self) -> Summary {
        let total = self.outcomes.len();
        let passed = self.count(Status::Pass);

        Summary {
            total,
            passed,
            failed: self.count(Status::Fail),
            skipped: self.count(Status::Skip),
            success_rate: (total > 0).then(|| (passed * 100 / total) as u8),
        }
    }
}
