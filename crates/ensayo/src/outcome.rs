//! Scenario outcomes.
//!
//! An [`Outcome`] is computed once, at the end of a run, and never changes
//! afterwards. It records the verdict, per-step timings and what teardown
//! did, so a failed run can be diagnosed from the report alone.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::TeardownReport;

/// Why a scenario failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Browser or session could not be created
    Setup,
    /// A required step timed out or errored
    Step,
    /// An expectation was not met
    Assertion,
    /// The overall scenario deadline elapsed
    Deadline,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Step => "step",
            Self::Assertion => "assertion",
            Self::Deadline => "deadline",
        };
        f.write_str(name)
    }
}

/// Failure details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable reason (the author's message for assertion failures)
    pub reason: String,
    /// Zero-based index of the failing step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    /// Zero-based index of the failing terminal expectation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation: Option<usize>,
    /// Underlying error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Failure {
    /// Create a failure
    #[must_use]
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            step: None,
            expectation: None,
            detail: None,
        }
    }

    /// Attach the failing step index
    #[must_use]
    pub const fn at_step(mut self, index: usize) -> Self {
        self.step = Some(index);
        self
    }

    /// Attach the failing expectation index
    #[must_use]
    pub const fn at_expectation(mut self, index: usize) -> Self {
        self.expectation = Some(index);
        self
    }

    /// Attach the underlying error
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(step) = self.step {
            write!(f, " step {}:", step + 1)?;
        }
        if let Some(expectation) = self.expectation {
            write!(f, " expectation {}:", expectation + 1)?;
        }
        write!(f, " {}", self.reason)
    }
}

/// Pass or fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    /// Every step and expectation succeeded
    Pass,
    /// The run failed
    Fail(Failure),
}

/// How a single step went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Completed
    Passed,
    /// Failed (the run stopped here)
    Failed,
    /// Interrupted by the scenario deadline
    Interrupted,
}

/// Timing record for one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Zero-based step index
    pub index: usize,
    /// Step description
    pub description: String,
    /// Result
    pub status: StepStatus,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

/// Final result of one scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Scenario name
    pub scenario: String,
    /// Verdict
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Executed steps, in order
    pub steps: Vec<StepRecord>,
    /// Total wall time in milliseconds, teardown included
    pub duration_ms: u64,
    /// Teardown result
    pub teardown: TeardownReport,
}

impl Outcome {
    /// Whether the scenario passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Pass)
    }

    /// Failure details, if the scenario failed
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match &self.verdict {
            Verdict::Pass => None,
            Verdict::Fail(failure) => Some(failure),
        }
    }

    /// Failure reason, if the scenario failed
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.failure().map(|f| f.reason.as_str())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.verdict {
            Verdict::Pass => write!(f, "PASS {} ({}ms)", self.scenario, self.duration_ms),
            Verdict::Fail(failure) => write!(
                f,
                "FAIL {} ({}ms) {}",
                self.scenario, self.duration_ms, failure
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn failed() -> Outcome {
        Outcome {
            scenario: "password_policy".to_string(),
            verdict: Verdict::Fail(
                Failure::new(FailureKind::Assertion, "Policy not enforced")
                    .at_expectation(0)
                    .with_detail("Timed out after 1000ms waiting for text=Password accepted"),
            ),
            steps: vec![StepRecord {
                index: 0,
                description: "navigate /".to_string(),
                status: StepStatus::Passed,
                duration_ms: 12,
            }],
            duration_ms: 1040,
            teardown: TeardownReport::default(),
        }
    }

    #[test]
    fn test_failure_accessors() {
        let outcome = failed();
        assert!(!outcome.passed());
        assert_eq!(outcome.reason(), Some("Policy not enforced"));
        assert_eq!(outcome.failure().unwrap().kind, FailureKind::Assertion);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            failed().to_string(),
            "FAIL password_policy (1040ms) [assertion] expectation 1: Policy not enforced"
        );
        let failure = Failure::new(FailureKind::Step, "boom").at_step(2);
        assert_eq!(failure.to_string(), "[step] step 3: boom");
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(failed()).unwrap();
        assert_eq!(json["status"], "fail");
        assert_eq!(json["scenario"], "password_policy");

        let pass = Outcome {
            verdict: Verdict::Pass,
            ..failed()
        };
        let json = serde_json::to_value(&pass).unwrap();
        assert_eq!(json["status"], "pass");
    }
}
