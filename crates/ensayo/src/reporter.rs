//! Suite reporting with Andon Cord support.
//!
//! ```text
//! ┌────────────────────────────┐     ┌─────────────────────────────┐
//! │  FailureMode::AndonCord    │     │  FailureMode::CollectAll    │
//! │  stop scheduling after the │     │  run every scenario and     │
//! │  first failing scenario    │     │  report all failures        │
//! └────────────────────────────┘     └─────────────────────────────┘
//!                    │                              │
//!                    └──────────► Reporter ◄────────┘
//!                                   │
//!                      text / json / junit rendering
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::outcome::{FailureKind, Outcome};
use crate::result::{EnsayoError, EnsayoResult};

/// Failure mode for suite execution
///
/// Andon Cord: stop the line on first failure
/// CollectAll: run everything and gather all failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop on first failure
    AndonCord,
    /// Collect all failures
    #[default]
    CollectAll,
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON document
    Json,
    /// JUnit XML for CI
    Junit,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Junit => "junit",
        })
    }
}

impl FromStr for ReportFormat {
    type Err = EnsayoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "junit" | "xml" => Ok(Self::Junit),
            other => Err(EnsayoError::ConfigError {
                message: format!("unknown report format '{other}' (expected text, json or junit)"),
            }),
        }
    }
}

/// Collects scenario outcomes for a suite
///
/// ```ignore
/// let mut reporter = Reporter::andon().with_name("smoke");
/// reporter.record(outcome)?; // Err once a scenario has failed
/// println!("{}", reporter.summary());
/// ```
#[derive(Debug, Clone)]
pub struct Reporter {
    outcomes: Vec<Outcome>,
    failure_mode: FailureMode,
    suite_name: String,
    started_at: DateTime<Utc>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialized form of a finished suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite: String,
    /// When the suite started
    pub started_at: DateTime<Utc>,
    /// Scenarios run
    pub total: usize,
    /// Scenarios passed
    pub passed: usize,
    /// Scenarios failed
    pub failed: usize,
    /// Sum of scenario durations in milliseconds
    pub duration_ms: u64,
    /// Per-scenario outcomes, in input order
    pub outcomes: Vec<Outcome>,
}

impl Reporter {
    /// Create a reporter in CollectAll mode
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcomes: Vec::new(),
            failure_mode: FailureMode::CollectAll,
            suite_name: "ensayo".to_string(),
            started_at: Utc::now(),
        }
    }

    /// Create a reporter in AndonCord mode
    #[must_use]
    pub fn andon() -> Self {
        Self::new().with_mode(FailureMode::AndonCord)
    }

    /// Set the failure mode
    #[must_use]
    pub fn with_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Set the suite name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.suite_name = name.into();
        self
    }

    /// Failure mode in use
    #[must_use]
    pub const fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Record an outcome
    ///
    /// # Errors
    ///
    /// In AndonCord mode, returns an error once the recorded scenario failed.
    /// The outcome is recorded either way.
    pub fn record(&mut self, outcome: Outcome) -> EnsayoResult<()> {
        let failure = outcome
            .failure()
            .map(|f| (outcome.scenario.clone(), f.to_string()));
        self.outcomes.push(outcome);

        if self.failure_mode == FailureMode::AndonCord {
            if let Some((name, failure)) = failure {
                return Err(EnsayoError::AssertionFailed {
                    message: format!("ANDON CORD PULLED: scenario '{name}' failed: {failure}"),
                });
            }
        }
        Ok(())
    }

    /// Recorded outcomes
    #[must_use]
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Number of passed scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Number of failed scenarios
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }

    /// Number of recorded scenarios
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Pass rate (0.0 to 1.0); an empty suite counts as passing
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        self.passed_count() as f64 / self.outcomes.len() as f64
    }

    /// Whether every recorded scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Sum of scenario durations
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.outcomes
            .iter()
            .map(|o| Duration::from_millis(o.duration_ms))
            .sum()
    }

    /// Failing outcomes
    #[must_use]
    pub fn failures(&self) -> Vec<&Outcome> {
        self.outcomes.iter().filter(|o| !o.passed()).collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} passed ({:.1}%)",
            self.suite_name,
            self.passed_count(),
            self.total_count(),
            self.pass_rate() * 100.0
        )
    }

    /// Snapshot for serialization
    #[must_use]
    pub fn report(&self) -> SuiteReport {
        SuiteReport {
            suite: self.suite_name.clone(),
            started_at: self.started_at,
            total: self.total_count(),
            passed: self.passed_count(),
            failed: self.failed_count(),
            duration_ms: self.total_duration().as_millis() as u64,
            outcomes: self.outcomes.clone(),
        }
    }

    /// Render in `format`
    pub fn render(&self, format: ReportFormat) -> EnsayoResult<String> {
        match format {
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Json => self.render_json(),
            ReportFormat::Junit => Ok(self.render_junit()),
        }
    }

    /// Render and write to `path`
    pub fn write(&self, format: ReportFormat, path: &Path) -> EnsayoResult<()> {
        std::fs::write(path, self.render(format)?)?;
        Ok(())
    }

    /// Human-readable report: one line per scenario, step detail for
    /// failures, then the summary
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            out.push_str(&outcome.to_string());
            out.push('\n');
            if let Some(failure) = outcome.failure() {
                if let Some(detail) = &failure.detail {
                    out.push_str(&format!("    {detail}\n"));
                }
                for step in &outcome.steps {
                    out.push_str(&format!(
                        "    {:>2}. {:<11} {} ({}ms)\n",
                        step.index + 1,
                        format!("{:?}", step.status).to_lowercase(),
                        step.description,
                        step.duration_ms
                    ));
                }
            }
            for error in &outcome.teardown.errors {
                out.push_str(&format!("    teardown: {error}\n"));
            }
        }
        out.push_str(&self.summary());
        out.push('\n');
        out
    }

    /// Render the suite as pretty JSON
    pub fn render_json(&self) -> EnsayoResult<String> {
        Ok(serde_json::to_string_pretty(&self.report())?)
    }

    /// Render JUnit XML content
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuite name="{}" tests="{}" failures="{}" errors="{}" time="{:.3}" timestamp="{}">"#,
            escape_xml(&self.suite_name),
            self.total_count(),
            self.count_kind(|k| k != FailureKind::Setup),
            self.count_kind(|k| k == FailureKind::Setup),
            self.total_duration().as_secs_f64(),
            self.started_at.format("%Y-%m-%dT%H:%M:%S"),
        ));
        xml.push('\n');

        for outcome in &self.outcomes {
            xml.push_str(&format!(
                r#"  <testcase name="{}" classname="{}" time="{:.3}">"#,
                escape_xml(&outcome.scenario),
                escape_xml(&self.suite_name),
                Duration::from_millis(outcome.duration_ms).as_secs_f64()
            ));
            xml.push('\n');

            if let Some(failure) = outcome.failure() {
                let element = if failure.kind == FailureKind::Setup {
                    "error"
                } else {
                    "failure"
                };
                xml.push_str(&format!(
                    r#"    <{element} type="{}" message="{}">{}</{element}>"#,
                    failure.kind,
                    escape_xml(&failure.reason),
                    escape_xml(failure.detail.as_deref().unwrap_or(&failure.reason))
                ));
                xml.push('\n');
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    fn count_kind(&self, pred: impl Fn(FailureKind) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter_map(Outcome::failure)
            .filter(|f| pred(f.kind))
            .count()
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
