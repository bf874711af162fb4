//! Browser sessions with guaranteed, ordered teardown.
//!
//! A [`Session`] owns one engine, one browser process and one isolated
//! browser context. [`SessionBuilder::open`] acquires them in that order and
//! releases whatever was acquired if a later stage fails or the run deadline
//! passes first;
//! [`Session::close`] releases them in reverse (context, browser, engine)
//! exactly once. A teardown stage that fails or exceeds the configured
//! teardown timeout is logged and recorded, and the remaining stages still
//! run.
//!
//! The session is also where waiting happens: element lookups, actionability
//! retries and load-state waits are all polled here against the live
//! document, so a locator is resolved afresh on every attempt.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RunConfig;
use crate::driver::{
    ActionStatus, BrowserProcess, BrowserSession, Driver, ElementInfo, Engine, FrameId, PageId,
};
use crate::locator::Locator;
use crate::result::{EnsayoError, EnsayoResult};
use crate::wait::{LoadState, Poller};

// =============================================================================
// TEARDOWN
// =============================================================================

/// What happened while releasing a session's resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    /// Browser context closed
    pub session_closed: bool,
    /// Browser process closed
    pub browser_closed: bool,
    /// Engine shut down
    pub engine_stopped: bool,
    /// Errors from stages that failed, in teardown order
    pub errors: Vec<String>,
}

impl TeardownReport {
    /// Every stage that was reached completed without error
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run one teardown stage, bounded by `limit`. Returns whether it completed.
async fn teardown_stage(
    stage: &str,
    limit: Duration,
    close: impl Future<Output = EnsayoResult<()>>,
    report: &mut TeardownReport,
) -> bool {
    match tokio::time::timeout(limit, close).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(stage, error = %e, "Teardown stage failed");
            report.errors.push(format!("{stage}: {e}"));
            false
        }
        Err(_) => {
            let ms = limit.as_millis();
            tracing::warn!(stage, timeout_ms = ms as u64, "Teardown stage timed out");
            report.errors.push(format!("{stage}: timed out after {ms}ms"));
            false
        }
    }
}

/// Release resources in order: context, browser, engine.
async fn release(
    context: Option<Box<dyn BrowserSession>>,
    browser: Option<Box<dyn BrowserProcess>>,
    engine: Option<Box<dyn Engine>>,
    limit: Duration,
) -> TeardownReport {
    let mut report = TeardownReport::default();

    if let Some(mut context) = context {
        report.session_closed =
            teardown_stage("session", limit, context.close(), &mut report).await;
    }
    if let Some(mut browser) = browser {
        report.browser_closed =
            teardown_stage("browser", limit, browser.close(), &mut report).await;
    }
    if let Some(mut engine) = engine {
        report.engine_stopped =
            teardown_stage("engine", limit, engine.shutdown(), &mut report).await;
    }

    report
}

/// Await one setup stage, giving up once `deadline` passes
async fn before<T>(
    deadline: Option<Instant>,
    stage: &str,
    step: impl Future<Output = EnsayoResult<T>>,
) -> EnsayoResult<T> {
    match deadline {
        None => step.await,
        Some(at) => tokio::time::timeout_at(at, step).await.unwrap_or_else(|_| {
            Err(EnsayoError::DeadlineExceeded {
                stage: stage.to_string(),
            })
        }),
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Session setup failed; whatever was acquired has been released
#[derive(Debug)]
pub struct SetupFailure {
    /// The error that stopped setup
    pub error: EnsayoError,
    /// Release of the partially acquired resources
    pub teardown: TeardownReport,
}

/// Creates sessions from a driver and a configuration
#[derive(Clone)]
pub struct SessionBuilder {
    driver: Arc<dyn Driver>,
    config: Arc<RunConfig>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("driver", &self.driver.name())
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl SessionBuilder {
    /// Create a builder
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, config: Arc<RunConfig>) -> Self {
        Self { driver, config }
    }

    /// Start the engine, launch the browser, open a context and its first page
    pub async fn open(&self) -> Result<Session, SetupFailure> {
        self.acquire(None).await
    }

    /// Like [`open`](Self::open), but a stage still running at `deadline` is
    /// abandoned with [`EnsayoError::DeadlineExceeded`] and everything acquired
    /// before it is released.
    pub async fn open_by(&self, deadline: Instant) -> Result<Session, SetupFailure> {
        self.acquire(Some(deadline)).await
    }

    #[tracing::instrument(skip(self), fields(driver = self.driver.name()))]
    async fn acquire(&self, deadline: Option<Instant>) -> Result<Session, SetupFailure> {
        let limit = self.config.teardown_timeout();
        let fail = |error: EnsayoError, teardown: TeardownReport| {
            tracing::warn!(error = %error, "Session setup failed");
            SetupFailure { error, teardown }
        };

        let mut engine = match before(deadline, "engine start", self.driver.start()).await {
            Ok(engine) => engine,
            Err(e) => return Err(fail(e, TeardownReport::default())),
        };

        let launch = engine.launch(&self.config.launch);
        let mut browser = match before(deadline, "browser launch", launch).await {
            Ok(browser) => browser,
            Err(e) => return Err(fail(e, release(None, None, Some(engine), limit).await)),
        };

        let opened = before(deadline, "context creation", browser.new_session()).await;
        let mut context = match opened {
            Ok(context) => context,
            Err(e) => {
                return Err(fail(
                    e,
                    release(None, Some(browser), Some(engine), limit).await,
                ))
            }
        };

        if let Err(e) = before(deadline, "first page", context.new_page()).await {
            return Err(fail(
                e,
                release(Some(context), Some(browser), Some(engine), limit).await,
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(session = %id, context = context.id(), "Session opened");

        Ok(Session {
            id,
            config: Arc::clone(&self.config),
            context: Some(context),
            browser: Some(browser),
            engine: Some(engine),
        })
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// An open browser session
pub struct Session {
    id: String,
    config: Arc<RunConfig>,
    context: Option<Box<dyn BrowserSession>>,
    browser: Option<Box<dyn BrowserProcess>>,
    engine: Option<Box<dyn Engine>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("open", &self.context.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Configuration this session runs with
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn context(&mut self) -> EnsayoResult<&mut Box<dyn BrowserSession>> {
        self.context.as_mut().ok_or_else(|| EnsayoError::InvalidState {
            message: "session is closed".to_string(),
        })
    }

    /// The most recently opened page
    pub async fn current_page(&mut self) -> EnsayoResult<PageId> {
        self.context()?
            .pages()
            .await?
            .last()
            .copied()
            .ok_or_else(|| EnsayoError::PageError {
                message: "no open page".to_string(),
            })
    }

    /// URL of the current page
    pub async fn current_url(&mut self) -> EnsayoResult<String> {
        let page = self.current_page().await?;
        self.context()?.current_url(page).await
    }

    /// Navigate the current page, then settle its frames.
    ///
    /// `url` may be relative to the configured base URL. The navigation itself
    /// is bounded by `timeout` (default: the navigation timeout); the settle
    /// afterwards never fails.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn goto(
        &mut self,
        url: &str,
        wait_until: LoadState,
        timeout: Option<Duration>,
    ) -> EnsayoResult<()> {
        let resolved = self.config.resolve_url(url);
        let timeout = timeout.unwrap_or_else(|| self.config.navigation_timeout());
        let page = self.current_page().await?;

        tracing::debug!(url = %resolved, %wait_until, "Navigating");
        let context = self.context()?;
        match tokio::time::timeout(timeout, context.goto(page, &resolved, wait_until)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EnsayoError::NavigationError {
                    url: resolved,
                    message: format!(
                        "timed out after {}ms waiting for {wait_until}",
                        timeout.as_millis()
                    ),
                })
            }
        }

        self.settle(page).await;
        Ok(())
    }

    /// Best-effort wait for `domcontentloaded` on the page and each of its
    /// frames. Returns the frames that did not get there; never fails.
    pub async fn settle(&mut self, page: PageId) -> Vec<FrameId> {
        let timeout = self.config.frame_load_timeout();
        let frames = match self.context() {
            Ok(context) => match context.frames(page).await {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::debug!(error = %e, "Could not enumerate frames");
                    return Vec::new();
                }
            },
            Err(_) => return Vec::new(),
        };

        let mut unsettled = Vec::new();
        for frame in frames {
            if let Err(e) = self
                .poll_load_state(page, &frame, LoadState::DomContentLoaded, timeout)
                .await
            {
                tracing::debug!(%frame, error = %e, "Frame did not reach domcontentloaded");
                unsettled.push(frame);
            }
        }
        if !unsettled.is_empty() {
            tracing::warn!(
                count = unsettled.len(),
                "Continuing with frames that did not finish loading"
            );
        }
        unsettled
    }

    /// Wait until the current page's main document reaches `state`
    pub async fn wait_for_load_state(
        &mut self,
        state: LoadState,
        timeout: Option<Duration>,
    ) -> EnsayoResult<()> {
        let timeout = timeout.unwrap_or_else(|| self.config.navigation_timeout());
        let page = self.current_page().await?;
        self.poll_load_state(page, &FrameId::main(), state, timeout)
            .await
    }

    async fn poll_load_state(
        &mut self,
        page: PageId,
        frame: &FrameId,
        state: LoadState,
        timeout: Duration,
    ) -> EnsayoResult<()> {
        let mut poller = Poller::new(timeout, self.config.poll_interval());
        loop {
            match self.context()?.load_state(page, frame).await? {
                Some(current) if current.satisfies(state) => return Ok(()),
                Some(_) => {}
                None => {
                    return Err(EnsayoError::PageError {
                        message: format!("load state of {frame} is not observable"),
                    })
                }
            }
            if !poller.tick().await {
                return Err(EnsayoError::Timeout {
                    ms: timeout.as_millis() as u64,
                });
            }
        }
    }

    /// Resolve `locator` on the current page, polling until the candidate at
    /// its index exists
    pub async fn locate(
        &mut self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> EnsayoResult<ElementInfo> {
        let timeout = timeout.unwrap_or_else(|| self.config.action_timeout());
        let mut poller = Poller::new(timeout, self.config.poll_interval());
        loop {
            let page = self.current_page().await?;
            let candidates = self.context()?.query(page, locator).await?;
            if let Some(found) = candidates.into_iter().nth(locator.index()) {
                return Ok(found);
            }
            if !poller.tick().await {
                return Err(EnsayoError::LocateTimeout {
                    locator: locator.to_string(),
                    timeout,
                });
            }
        }
    }

    /// Click once the element is actionable
    #[tracing::instrument(skip(self, locator), fields(session = %self.id, locator = %locator))]
    pub async fn click(&mut self, locator: &Locator, timeout: Option<Duration>) -> EnsayoResult<()> {
        self.act("click", locator, timeout, None).await
    }

    /// Replace the element's value; `""` clears it
    #[tracing::instrument(skip(self, locator, value), fields(session = %self.id, locator = %locator))]
    pub async fn fill(
        &mut self,
        locator: &Locator,
        value: &str,
        timeout: Option<Duration>,
    ) -> EnsayoResult<()> {
        self.act("fill", locator, timeout, Some(value)).await
    }

    async fn act(
        &mut self,
        action: &str,
        locator: &Locator,
        timeout: Option<Duration>,
        value: Option<&str>,
    ) -> EnsayoResult<()> {
        let timeout = timeout.unwrap_or_else(|| self.config.action_timeout());
        let mut poller = Poller::new(timeout, self.config.poll_interval());
        let mut blocked: Option<String> = None;

        loop {
            let page = self.current_page().await?;
            let context = self.context()?;
            let status = match value {
                Some(value) => context.fill(page, locator, value).await?,
                None => context.click(page, locator).await?,
            };
            match status {
                ActionStatus::Done => {
                    tracing::debug!(action, attempts = poller.attempts(), "Action performed");
                    return Ok(());
                }
                ActionStatus::NotFound => {}
                ActionStatus::NotActionable(reason) => blocked = Some(reason),
            }
            if !poller.tick().await {
                break;
            }
        }

        Err(match blocked {
            Some(reason) => EnsayoError::ActionTimeout {
                action: action.to_string(),
                locator: locator.to_string(),
                timeout,
                reason,
            },
            None => EnsayoError::LocateTimeout {
                locator: locator.to_string(),
                timeout,
            },
        })
    }

    /// Wait until the candidate at the locator's index is present and visible
    pub async fn wait_visible(
        &mut self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> EnsayoResult<ElementInfo> {
        let timeout = timeout.unwrap_or_else(|| self.config.expect_timeout());
        let mut poller = Poller::new(timeout, self.config.poll_interval());
        loop {
            let page = self.current_page().await?;
            let candidates = self.context()?.query(page, locator).await?;
            if let Some(found) = candidates
                .into_iter()
                .nth(locator.index())
                .filter(|e| e.visible)
            {
                return Ok(found);
            }
            if !poller.tick().await {
                return Err(EnsayoError::LocateTimeout {
                    locator: format!("{locator} to be visible"),
                    timeout,
                });
            }
        }
    }

    /// Wait until the candidate at the locator's index is absent or hidden
    pub async fn wait_hidden(
        &mut self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> EnsayoResult<()> {
        let timeout = timeout.unwrap_or_else(|| self.config.expect_timeout());
        let mut poller = Poller::new(timeout, self.config.poll_interval());
        loop {
            let page = self.current_page().await?;
            let candidates = self.context()?.query(page, locator).await?;
            if candidates
                .get(locator.index())
                .map_or(true, |e| !e.visible)
            {
                return Ok(());
            }
            if !poller.tick().await {
                return Err(EnsayoError::LocateTimeout {
                    locator: format!("{locator} to be hidden"),
                    timeout,
                });
            }
        }
    }

    /// Unconditional pause
    pub async fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Scroll the current page
    pub async fn scroll(&mut self, pixels: Option<i64>) -> EnsayoResult<()> {
        let page = self.current_page().await?;
        self.context()?.scroll(page, pixels).await
    }

    /// Release the context, browser and engine, in that order
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn close(mut self) -> TeardownReport {
        let report = release(
            self.context.take(),
            self.browser.take(),
            self.engine.take(),
            self.config.teardown_timeout(),
        )
        .await;
        tracing::debug!(clean = report.is_clean(), "Session closed");
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.context.is_some() || self.browser.is_some() || self.engine.is_some() {
            tracing::warn!(session = %self.id, "Session dropped without close(); browser resources may leak");
        }
    }
}
