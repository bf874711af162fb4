//! Scenario runner: one generic interpreter for every scenario.
//!
//! ```text
//! open session ──► steps (in order) ──► expectations ──► linger ──► close
//!      │                │                     │                      ▲
//!      │ setup fail     │ step fail           │ assertion fail       │
//!      └────────────────┴─────────────────────┴──── deadline ────────┘
//! ```
//!
//! The scenario deadline starts when the run starts and covers session setup,
//! the body and the linger. Every path that opened a session ends in
//! [`Session::close`], including an elapsed deadline: the timed-out body is
//! dropped, which cancels whatever wait was in flight, and teardown runs
//! afterwards with each stage bounded by the teardown timeout.

use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::RunConfig;
use crate::driver::Driver;
use crate::outcome::{Failure, FailureKind, Outcome, StepRecord, StepStatus, Verdict};
use crate::reporter::FailureMode;
use crate::result::EnsayoError;
use crate::scenario::{ElementState, Scenario, Step};
use crate::session::{Session, SessionBuilder, SetupFailure, TeardownReport};

/// Step bookkeeping that survives cancellation of the scenario body
#[derive(Debug, Default)]
struct Progress {
    records: Vec<StepRecord>,
    current: Option<(usize, String, Instant)>,
}

impl Progress {
    fn begin(&mut self, index: usize, description: String) {
        self.current = Some((index, description, Instant::now()));
    }

    fn finish(&mut self, status: StepStatus) {
        if let Some((index, description, started)) = self.current.take() {
            self.records.push(StepRecord {
                index,
                description,
                status,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
    }

    fn current_index(&self) -> Option<usize> {
        self.current.as_ref().map(|(index, _, _)| *index)
    }
}

/// Runs scenarios against a driver
#[derive(Clone)]
pub struct ScenarioRunner {
    builder: SessionBuilder,
    config: Arc<RunConfig>,
}

impl std::fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

impl ScenarioRunner {
    /// Create a runner; the configuration is read-only from here on
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, config: RunConfig) -> Self {
        let config = Arc::new(config);
        Self {
            builder: SessionBuilder::new(driver, Arc::clone(&config)),
            config,
        }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run one scenario in a fresh session
    pub async fn run(&self, scenario: &Scenario) -> Outcome {
        let span = tracing::info_span!("scenario", name = %scenario.name);
        self.run_inner(scenario).instrument(span).await
    }

    async fn run_inner(&self, scenario: &Scenario) -> Outcome {
        let started = Instant::now();
        let finish = |verdict: Verdict, steps: Vec<StepRecord>, teardown: TeardownReport| {
            let outcome = Outcome {
                scenario: scenario.name.clone(),
                verdict,
                steps,
                duration_ms: started.elapsed().as_millis() as u64,
                teardown,
            };
            match outcome.failure() {
                None => tracing::info!(duration_ms = outcome.duration_ms, "Scenario passed"),
                Some(failure) => {
                    tracing::info!(duration_ms = outcome.duration_ms, %failure, "Scenario failed");
                }
            }
            outcome
        };

        if let Err(e) = scenario.validate() {
            let failure = Failure::new(FailureKind::Setup, e.to_string());
            return finish(Verdict::Fail(failure), Vec::new(), TeardownReport::default());
        }

        let budget = self.config.scenario_timeout();
        let deadline = started + budget;
        let overran = || {
            Failure::new(
                FailureKind::Deadline,
                format!("Scenario exceeded its {}ms deadline", budget.as_millis()),
            )
        };

        tracing::info!(steps = scenario.steps.len(), "Starting scenario");
        let mut session = match self.builder.open_by(deadline).await {
            Ok(session) => session,
            Err(SetupFailure { error, teardown }) => {
                let failure = if matches!(error, EnsayoError::DeadlineExceeded { .. }) {
                    tracing::warn!(
                        deadline_ms = budget.as_millis() as u64,
                        "Scenario deadline exceeded during setup"
                    );
                    overran().with_detail(error.to_string())
                } else {
                    Failure::new(FailureKind::Setup, error.to_string())
                };
                return finish(Verdict::Fail(failure), Vec::new(), teardown);
            }
        };

        let mut progress = Progress::default();
        let body = execute(&mut session, scenario, &self.config, &mut progress);
        let result = tokio::time::timeout_at(deadline, body).await;
        let verdict = match result {
            Ok(Ok(())) => Verdict::Pass,
            Ok(Err(failure)) => Verdict::Fail(failure),
            Err(_) => {
                let step = progress.current_index();
                progress.finish(StepStatus::Interrupted);
                tracing::warn!(deadline_ms = budget.as_millis() as u64, ?step, "Scenario deadline exceeded");
                let mut failure = overran();
                failure.step = step;
                Verdict::Fail(failure)
            }
        };

        let linger = self.config.linger();
        if !linger.is_zero() {
            // cut short at the deadline
            let _ = tokio::time::timeout_at(deadline, session.pause(linger)).await;
        }

        let teardown = session.close().await;
        finish(verdict, progress.records, teardown)
    }

    /// Run scenarios concurrently (up to the configured concurrency),
    /// returning outcomes in input order
    pub async fn run_all(&self, scenarios: &[Scenario]) -> Vec<Outcome> {
        self.run_all_with(scenarios, FailureMode::CollectAll, |_| {})
            .await
    }

    /// Run scenarios concurrently, reporting each outcome as it becomes
    /// available (in input order).
    ///
    /// With [`FailureMode::AndonCord`] no new scenario starts after the first
    /// failure; scenarios already running finish and are reported.
    pub async fn run_all_with(
        &self,
        scenarios: &[Scenario],
        mode: FailureMode,
        mut on_outcome: impl FnMut(&Outcome),
    ) -> Vec<Outcome> {
        let stop = AtomicBool::new(false);
        let stop = &stop;
        let mut outcomes = Vec::with_capacity(scenarios.len());

        let mut stream = futures::stream::iter(scenarios)
            .map(|scenario| async move {
                if stop.load(Ordering::SeqCst) {
                    tracing::debug!(name = %scenario.name, "Skipped after earlier failure");
                    return None;
                }
                let outcome = self.run(scenario).await;
                if !outcome.passed() && mode == FailureMode::AndonCord {
                    stop.store(true, Ordering::SeqCst);
                }
                Some(outcome)
            })
            .buffered(self.config.concurrency.max(1));

        while let Some(result) = stream.next().await {
            if let Some(outcome) = result {
                on_outcome(&outcome);
                outcomes.push(outcome);
            }
        }
        outcomes
    }
}

/// Run one scenario with a driver and configuration
pub async fn run(driver: Arc<dyn Driver>, scenario: &Scenario, config: RunConfig) -> Outcome {
    ScenarioRunner::new(driver, config).run(scenario).await
}

async fn execute(
    session: &mut Session,
    scenario: &Scenario,
    config: &RunConfig,
    progress: &mut Progress,
) -> Result<(), Failure> {
    for (index, step) in scenario.steps.iter().enumerate() {
        let description = step.describe();
        tracing::debug!(step = index + 1, %description, "Executing step");
        progress.begin(index, description);

        if step.is_interaction() {
            session.pause(config.action_delay()).await;
        }

        match perform(session, step).await {
            Ok(()) => progress.finish(StepStatus::Passed),
            Err(error) => {
                progress.finish(StepStatus::Failed);
                return Err(step_failure(index, step, &error));
            }
        }
    }

    for (index, expectation) in scenario.expect.iter().enumerate() {
        let timeout = expectation
            .timeout_ms
            .map_or_else(|| config.expect_timeout(), Duration::from_millis);
        let locator = expectation.target.locator();

        if let Err(error) = session.wait_visible(&locator, Some(timeout)).await {
            let failure = if error.is_timeout() {
                let reason = scenario.failure_reason.clone().unwrap_or_else(|| {
                    format!(
                        "Expected '{}' to be visible within {}ms",
                        expectation.target,
                        timeout.as_millis()
                    )
                });
                Failure::new(FailureKind::Assertion, reason)
            } else {
                Failure::new(FailureKind::Step, error.to_string())
            };
            return Err(failure
                .at_expectation(index)
                .with_detail(error.to_string()));
        }
        tracing::debug!(expectation = index + 1, target = %expectation.target, "Expectation met");
    }

    Ok(())
}

fn step_failure(index: usize, step: &Step, error: &EnsayoError) -> Failure {
    match step {
        Step::AssertVisible {
            message: Some(message),
            ..
        } if error.is_timeout() => Failure::new(FailureKind::Assertion, message.clone())
            .at_step(index)
            .with_detail(error.to_string()),
        _ => Failure::new(FailureKind::Step, error.to_string())
            .at_step(index)
            .with_detail(step.describe()),
    }
}

async fn perform(session: &mut Session, step: &Step) -> Result<(), EnsayoError> {
    let timeout = step.timeout();
    match step {
        Step::Navigate {
            url, wait_until, ..
        } => session.goto(url, *wait_until, timeout).await,
        Step::Click { locator, .. } => session.click(locator, timeout).await,
        Step::Fill { locator, value, .. } => session.fill(locator, value, timeout).await,
        Step::Wait { ms } => {
            session.pause(Duration::from_millis(*ms)).await;
            Ok(())
        }
        Step::WaitFor { locator, state, .. } => match state {
            ElementState::Visible => session.wait_visible(locator, timeout).await.map(|_| ()),
            ElementState::Hidden => session.wait_hidden(locator, timeout).await,
        },
        Step::WaitForLoad { state, .. } => session.wait_for_load_state(*state, timeout).await,
        Step::AssertVisible { target, .. } => session
            .wait_visible(&target.locator(), timeout)
            .await
            .map(|_| ()),
        Step::Scroll { pixels } => session.scroll(*pixels).await,
    }
}
