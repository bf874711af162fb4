//! Scripted in-memory driver.
//!
//! `MockDriver` serves a [`MockApp`]: a table of routes, each producing a fresh
//! [`MockDocument`] for every navigation. Documents hold a flat list of
//! [`MockElement`]s (each tagged with the frame it lives in) and click
//! handlers that mutate the document, navigate, or open a popup. Every
//! session builds its own documents, so concurrent sessions never share form
//! state.
//!
//! All lifecycle calls are recorded in [`MockStats`] for verification.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::{
    ActionStatus, BrowserProcess, BrowserSession, Driver, ElementInfo, Engine, FrameId, PageId,
};
use crate::config::LaunchOptions;
use crate::locator::{Locator, Selector};
use crate::result::{EnsayoError, EnsayoResult};
use crate::wait::LoadState;

/// Builds a fresh document for one navigation
pub type DocumentFactory = Arc<dyn Fn() -> MockDocument + Send + Sync>;

/// Click behaviour attached to an element
pub type ClickHandler = Arc<dyn Fn(&mut MockDocument) -> MockEffect + Send + Sync>;

/// What a click does beyond mutating the document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MockEffect {
    /// Stay on the page
    #[default]
    None,
    /// Navigate the current page
    Navigate(String),
    /// Open a new page (popup / new tab)
    Popup(String),
}

// =============================================================================
// ELEMENTS
// =============================================================================

/// One element in a mock document
#[derive(Clone)]
pub struct MockElement {
    /// Unique handle within the document
    pub handle: String,
    /// Lowercase tag name
    pub tag: String,
    /// Text content
    pub text: String,
    /// Explicit ARIA role (otherwise derived from the tag)
    pub role: Option<String>,
    /// Associated label text
    pub label: Option<String>,
    /// Placeholder attribute
    pub placeholder: Option<String>,
    /// `data-testid` attribute
    pub test_id: Option<String>,
    /// CSS / XPath strings this element answers to
    pub selectors: Vec<String>,
    /// Current value; `None` for elements that cannot be filled
    pub value: Option<String>,
    /// Rendered
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Frame the element lives in
    pub frame: FrameId,
    /// Becomes visible this long after the document was loaded
    pub visible_after: Option<Duration>,
    /// Click behaviour
    pub on_click: Option<ClickHandler>,
}

impl fmt::Debug for MockElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockElement")
            .field("handle", &self.handle)
            .field("tag", &self.tag)
            .field("text", &self.text)
            .field("role", &self.role)
            .field("label", &self.label)
            .field("value", &self.value)
            .field("visible", &self.visible)
            .field("enabled", &self.enabled)
            .field("frame", &self.frame)
            .field("on_click", &self.on_click.is_some())
            .finish_non_exhaustive()
    }
}

impl MockElement {
    /// Create an element with a tag and text
    #[must_use]
    pub fn new(handle: impl Into<String>, tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            tag: tag.into(),
            text: text.into(),
            role: None,
            label: None,
            placeholder: None,
            test_id: None,
            selectors: Vec::new(),
            value: None,
            visible: true,
            enabled: true,
            frame: FrameId::main(),
            visible_after: None,
            on_click: None,
        }
    }

    /// `<button>` with text
    #[must_use]
    pub fn button(handle: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(handle, "button", text)
    }

    /// `<a>` with text
    #[must_use]
    pub fn link(handle: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(handle, "a", text)
    }

    /// Empty `<input>` with a label
    #[must_use]
    pub fn input(handle: impl Into<String>, label: impl Into<String>) -> Self {
        let mut element = Self::new(handle, "input", "");
        element.label = Some(label.into());
        element.value = Some(String::new());
        element
    }

    /// Text block (`<p>`)
    #[must_use]
    pub fn text(handle: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(handle, "p", text)
    }

    /// Heading (`<h1>`)
    #[must_use]
    pub fn heading(handle: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(handle, "h1", text)
    }

    /// Set an explicit role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the placeholder
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Set the test id
    #[must_use]
    pub fn with_test_id(mut self, id: impl Into<String>) -> Self {
        self.test_id = Some(id.into());
        self
    }

    /// Answer to a CSS selector or XPath expression
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    /// Preset value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Start hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Start disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Place in a frame
    #[must_use]
    pub fn in_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = FrameId(frame.into());
        self
    }

    /// Appear `delay` after load
    #[must_use]
    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.visible_after = Some(delay);
        self
    }

    /// Attach click behaviour
    #[must_use]
    pub fn on_click(
        mut self,
        handler: impl Fn(&mut MockDocument) -> MockEffect + Send + Sync + 'static,
    ) -> Self {
        self.on_click = Some(Arc::new(handler));
        self
    }

    /// Role: explicit, else implied by the tag
    #[must_use]
    pub fn effective_role(&self) -> &str {
        if let Some(role) = &self.role {
            return role;
        }
        match self.tag.as_str() {
            "button" => "button",
            "a" => "link",
            "input" | "textarea" => "textbox",
            "select" => "combobox",
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
            "img" => "img",
            _ => "generic",
        }
    }

    /// Accessible name: label, else text, else placeholder
    #[must_use]
    pub fn accessible_name(&self) -> &str {
        self.label
            .as_deref()
            .filter(|l| !l.is_empty())
            .or_else(|| Some(self.text.as_str()).filter(|t| !t.is_empty()))
            .or(self.placeholder.as_deref())
            .unwrap_or_default()
    }

    fn is_visible_at(&self, loaded_at: Instant, now: Instant) -> bool {
        self.visible && self.visible_after.map_or(true, |delay| now >= loaded_at + delay)
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Css { selector } => self.tag == *selector || self.selectors.contains(selector),
            Selector::XPath { expression } => self.selectors.contains(expression),
            Selector::Text { text, exact } => text_matches(&self.text, text, *exact),
            Selector::Role { role, name, exact } => {
                self.effective_role() == role
                    && name
                        .as_ref()
                        .map_or(true, |n| text_matches(self.accessible_name(), n, *exact))
            }
            Selector::Label { text, exact } => self
                .label
                .as_deref()
                .is_some_and(|l| text_matches(l, text, *exact)),
            Selector::Placeholder { text } => self
                .placeholder
                .as_deref()
                .is_some_and(|p| text_matches(p, text, false)),
            Selector::TestId { id } => self.test_id.as_deref() == Some(id.as_str()),
        }
    }
}

fn text_matches(haystack: &str, needle: &str, exact: bool) -> bool {
    if exact {
        haystack.trim() == needle
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// How a document loads after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBehavior {
    /// Reaches `load` immediately
    #[default]
    Immediate,
    /// Reaches `load` after a delay
    Delayed(Duration),
    /// Commits but never reaches `domcontentloaded`
    Never,
}

#[derive(Debug, Clone)]
struct MockFrame {
    id: FrameId,
    stalled: bool,
}

/// A mock page document
#[derive(Debug, Clone, Default)]
pub struct MockDocument {
    elements: Vec<MockElement>,
    frames: Vec<MockFrame>,
    load: LoadBehavior,
}

impl MockDocument {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element (builder form)
    #[must_use]
    pub fn with(mut self, element: MockElement) -> Self {
        self.add(element);
        self
    }

    /// Declare a frame that loads normally
    #[must_use]
    pub fn with_frame(mut self, id: impl Into<String>) -> Self {
        self.frames.push(MockFrame {
            id: FrameId(id.into()),
            stalled: false,
        });
        self
    }

    /// Declare a frame that never finishes loading
    #[must_use]
    pub fn with_stalled_frame(mut self, id: impl Into<String>) -> Self {
        self.frames.push(MockFrame {
            id: FrameId(id.into()),
            stalled: true,
        });
        self
    }

    /// Set the load behaviour
    #[must_use]
    pub fn with_load(mut self, load: LoadBehavior) -> Self {
        self.load = load;
        self
    }

    /// Append an element
    pub fn add(&mut self, element: MockElement) {
        self.elements.push(element);
    }

    /// Element by handle
    #[must_use]
    pub fn find(&self, handle: &str) -> Option<&MockElement> {
        self.elements.iter().find(|e| e.handle == handle)
    }

    /// Mutable element by handle
    pub fn find_mut(&mut self, handle: &str) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.handle == handle)
    }

    /// Current value of an input
    #[must_use]
    pub fn value_of(&self, handle: &str) -> Option<&str> {
        self.find(handle).and_then(|e| e.value.as_deref())
    }

    /// Make an element visible
    pub fn show(&mut self, handle: &str) {
        if let Some(element) = self.find_mut(handle) {
            element.visible = true;
        }
    }

    /// Hide an element
    pub fn hide(&mut self, handle: &str) {
        if let Some(element) = self.find_mut(handle) {
            element.visible = false;
        }
    }

    /// Set an element's text
    pub fn set_text(&mut self, handle: &str, text: impl Into<String>) {
        if let Some(element) = self.find_mut(handle) {
            element.text = text.into();
        }
    }

    /// Remove an element
    pub fn remove(&mut self, handle: &str) {
        self.elements.retain(|e| e.handle != handle);
    }

    fn frame_ids(&self) -> Vec<FrameId> {
        std::iter::once(FrameId::main())
            .chain(self.frames.iter().map(|f| f.id.clone()))
            .collect()
    }
}

// =============================================================================
// APP
// =============================================================================

/// Route table served by the mock driver
#[derive(Clone, Default)]
pub struct MockApp {
    routes: HashMap<String, DocumentFactory>,
}

impl fmt::Debug for MockApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<_> = self.routes.keys().collect();
        paths.sort();
        f.debug_struct("MockApp").field("routes", &paths).finish()
    }
}

impl MockApp {
    /// Create an app with no routes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `path` with documents built by `factory`
    #[must_use]
    pub fn route(
        mut self,
        path: impl Into<String>,
        factory: impl Fn() -> MockDocument + Send + Sync + 'static,
    ) -> Self {
        self.routes.insert(path.into(), Arc::new(factory));
        self
    }

    fn document_for(&self, url: &str) -> Option<MockDocument> {
        if url == "about:blank" {
            return Some(MockDocument::new());
        }
        self.routes.get(path_of(url)).map(|factory| factory())
    }
}

/// Path component of an absolute or root-relative URL, without query/fragment
fn path_of(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(pos) => {
            let after = &url[pos + 3..];
            after.find('/').map_or("/", |slash| &after[slash..])
        }
        None => url,
    };
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = &rest[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Origin (`scheme://host[:port]`) of an absolute URL
fn origin_of(url: &str) -> Option<&str> {
    let pos = url.find("://")?;
    let after = &url[pos + 3..];
    let end = after.find('/').map_or(url.len(), |slash| pos + 3 + slash);
    Some(&url[..end])
}

// =============================================================================
// STATS
// =============================================================================

/// Recorded driver activity
#[derive(Debug, Clone, Default)]
pub struct MockStats {
    /// Lifecycle events in order (`engine.start`, `browser.launch`, ...)
    pub lifecycle: Vec<String>,
    /// Navigated URLs
    pub navigations: Vec<String>,
    /// Number of element queries (including those inside click/fill)
    pub queries: usize,
    /// Clicked element handles
    pub clicks: Vec<String>,
    /// `(handle, value)` for every completed fill
    pub fills: Vec<(String, String)>,
    /// Scroll deltas
    pub scrolls: Vec<i64>,
}

impl MockStats {
    /// Count of one lifecycle event
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.lifecycle.iter().filter(|e| *e == event).count()
    }
}

/// Failure injection points
#[derive(Debug, Clone, Copy, Default)]
struct MockFailures {
    launch: bool,
    launch_hangs: bool,
    new_session: bool,
    session_close: bool,
    session_close_hangs: bool,
}

type SharedStats = Arc<Mutex<MockStats>>;

fn record(stats: &SharedStats, event: &str) {
    stats
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .lifecycle
        .push(event.to_string());
}

fn with_stats(stats: &SharedStats, f: impl FnOnce(&mut MockStats)) {
    f(&mut stats.lock().unwrap_or_else(PoisonError::into_inner));
}

// =============================================================================
// DRIVER
// =============================================================================

/// Mock driver for unit testing
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    app: MockApp,
    stats: SharedStats,
    failures: MockFailures,
}

impl MockDriver {
    /// Create a driver serving `app`
    #[must_use]
    pub fn new(app: MockApp) -> Self {
        Self {
            app,
            stats: Arc::default(),
            failures: MockFailures::default(),
        }
    }

    /// Browser launch fails
    #[must_use]
    pub fn failing_launch(mut self) -> Self {
        self.failures.launch = true;
        self
    }

    /// Browser launch never completes
    #[must_use]
    pub fn hanging_launch(mut self) -> Self {
        self.failures.launch_hangs = true;
        self
    }

    /// Context creation fails
    #[must_use]
    pub fn failing_session(mut self) -> Self {
        self.failures.new_session = true;
        self
    }

    /// Context disposal fails
    #[must_use]
    pub fn failing_session_close(mut self) -> Self {
        self.failures.session_close = true;
        self
    }

    /// Context disposal never completes
    #[must_use]
    pub fn hanging_session_close(mut self) -> Self {
        self.failures.session_close_hangs = true;
        self
    }

    /// Snapshot of recorded activity
    #[must_use]
    pub fn stats(&self) -> MockStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn start(&self) -> EnsayoResult<Box<dyn Engine>> {
        record(&self.stats, "engine.start");
        Ok(Box::new(MockEngine {
            app: self.app.clone(),
            stats: Arc::clone(&self.stats),
            failures: self.failures,
        }))
    }
}

struct MockEngine {
    app: MockApp,
    stats: SharedStats,
    failures: MockFailures,
}

#[async_trait]
impl Engine for MockEngine {
    async fn launch(&mut self, options: &LaunchOptions) -> EnsayoResult<Box<dyn BrowserProcess>> {
        if self.failures.launch {
            return Err(EnsayoError::BrowserLaunchError {
                message: "mock launch failure".to_string(),
            });
        }
        if self.failures.launch_hangs {
            std::future::pending::<()>().await;
        }
        record(&self.stats, "browser.launch");
        Ok(Box::new(MockBrowser {
            app: self.app.clone(),
            stats: Arc::clone(&self.stats),
            failures: self.failures,
            viewport_height: options.viewport_height,
            next_context: 0,
        }))
    }

    async fn shutdown(&mut self) -> EnsayoResult<()> {
        record(&self.stats, "engine.shutdown");
        Ok(())
    }
}

struct MockBrowser {
    app: MockApp,
    stats: SharedStats,
    failures: MockFailures,
    viewport_height: u32,
    next_context: u32,
}

#[async_trait]
impl BrowserProcess for MockBrowser {
    async fn new_session(&mut self) -> EnsayoResult<Box<dyn BrowserSession>> {
        if self.failures.new_session {
            return Err(EnsayoError::SessionError {
                message: "mock context failure".to_string(),
            });
        }
        record(&self.stats, "session.open");
        self.next_context += 1;
        Ok(Box::new(MockSession {
            id: format!("mock-context-{}", self.next_context),
            app: self.app.clone(),
            stats: Arc::clone(&self.stats),
            fail_close: self.failures.session_close,
            hang_close: self.failures.session_close_hangs,
            viewport_height: self.viewport_height,
            pages: Vec::new(),
        }))
    }

    async fn close(&mut self) -> EnsayoResult<()> {
        record(&self.stats, "browser.close");
        Ok(())
    }
}

struct MockPage {
    id: PageId,
    url: String,
    document: MockDocument,
    loaded_at: Instant,
    scroll_y: i64,
}

struct MockSession {
    id: String,
    app: MockApp,
    stats: SharedStats,
    fail_close: bool,
    hang_close: bool,
    viewport_height: u32,
    pages: Vec<MockPage>,
}

impl MockSession {
    fn page_mut(&mut self, page: PageId) -> EnsayoResult<&mut MockPage> {
        self.pages
            .iter_mut()
            .find(|p| p.id == page)
            .ok_or_else(|| EnsayoError::PageError {
                message: format!("{page} is not open"),
            })
    }

    fn open_page(&mut self, url: String, document: MockDocument) -> PageId {
        let id = PageId(self.pages.len() as u32);
        self.pages.push(MockPage {
            id,
            url,
            document,
            loaded_at: Instant::now(),
            scroll_y: 0,
        });
        record(&self.stats, "page.new");
        id
    }

    /// Candidates in document order, with visibility evaluated now
    fn candidates(&mut self, page: PageId, locator: &Locator) -> EnsayoResult<Vec<ElementInfo>> {
        with_stats(&self.stats, |s| s.queries += 1);
        let page = self.page_mut(page)?;
        let now = Instant::now();
        let loaded_at = page.loaded_at;
        Ok(page
            .document
            .elements
            .iter()
            .filter(|e| e.matches(locator.selector()))
            .map(|e| ElementInfo {
                frame: e.frame.clone(),
                tag: e.tag.clone(),
                text: e.text.trim().to_string(),
                visible: e.is_visible_at(loaded_at, now),
                enabled: e.enabled,
                handle: e.handle.clone(),
            })
            .collect())
    }

    fn resolve(&self, from: &str, target: &str) -> String {
        if target.contains("://") || target.starts_with("about:") {
            return target.to_string();
        }
        match origin_of(from) {
            Some(origin) if target.starts_with('/') => format!("{origin}{target}"),
            Some(origin) => format!("{origin}/{target}"),
            None => target.to_string(),
        }
    }

    fn load(&self, url: &str) -> EnsayoResult<MockDocument> {
        self.app
            .document_for(url)
            .ok_or_else(|| EnsayoError::NavigationError {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            })
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn new_page(&mut self) -> EnsayoResult<PageId> {
        Ok(self.open_page("about:blank".to_string(), MockDocument::new()))
    }

    async fn pages(&mut self) -> EnsayoResult<Vec<PageId>> {
        Ok(self.pages.iter().map(|p| p.id).collect())
    }

    async fn goto(&mut self, page: PageId, url: &str, wait_until: LoadState) -> EnsayoResult<()> {
        with_stats(&self.stats, |s| s.navigations.push(url.to_string()));
        let document = self.load(url)?;
        let load = document.load;
        {
            let target = self.page_mut(page)?;
            target.url = url.to_string();
            target.document = document;
            target.loaded_at = Instant::now();
            target.scroll_y = 0;
        }
        if wait_until > LoadState::Commit {
            match load {
                LoadBehavior::Immediate => {}
                LoadBehavior::Delayed(delay) => tokio::time::sleep(delay).await,
                LoadBehavior::Never => std::future::pending::<()>().await,
            }
        }
        Ok(())
    }

    async fn current_url(&mut self, page: PageId) -> EnsayoResult<String> {
        Ok(self.page_mut(page)?.url.clone())
    }

    async fn frames(&mut self, page: PageId) -> EnsayoResult<Vec<FrameId>> {
        Ok(self.page_mut(page)?.document.frame_ids())
    }

    async fn load_state(
        &mut self,
        page: PageId,
        frame: &FrameId,
    ) -> EnsayoResult<Option<LoadState>> {
        let page = self.page_mut(page)?;
        if frame.is_main() {
            let state = match page.document.load {
                LoadBehavior::Never => LoadState::Commit,
                LoadBehavior::Delayed(delay) if Instant::now() < page.loaded_at + delay => {
                    LoadState::Commit
                }
                _ => LoadState::Load,
            };
            return Ok(Some(state));
        }
        Ok(page
            .document
            .frames
            .iter()
            .find(|f| &f.id == frame)
            .map(|f| {
                if f.stalled {
                    LoadState::Commit
                } else {
                    LoadState::Load
                }
            }))
    }

    async fn query(&mut self, page: PageId, locator: &Locator) -> EnsayoResult<Vec<ElementInfo>> {
        self.candidates(page, locator)
    }

    async fn click(&mut self, page: PageId, locator: &Locator) -> EnsayoResult<ActionStatus> {
        let Some(target) = self.candidates(page, locator)?.into_iter().nth(locator.index()) else {
            return Ok(ActionStatus::NotFound);
        };
        if !target.visible {
            return Ok(ActionStatus::NotActionable("element is not visible".to_string()));
        }
        if !target.enabled {
            return Ok(ActionStatus::NotActionable("element is disabled".to_string()));
        }

        with_stats(&self.stats, |s| s.clicks.push(target.handle.clone()));
        let current = self.page_mut(page)?;
        let handler = current
            .document
            .find(&target.handle)
            .and_then(|e| e.on_click.clone());
        let effect = handler.map_or(MockEffect::None, |h| h(&mut current.document));
        let from = current.url.clone();

        match effect {
            MockEffect::None => {}
            MockEffect::Navigate(url) => {
                let url = self.resolve(&from, &url);
                with_stats(&self.stats, |s| s.navigations.push(url.clone()));
                let document = self.load(&url)?;
                let current = self.page_mut(page)?;
                current.url = url;
                current.document = document;
                current.loaded_at = Instant::now();
                current.scroll_y = 0;
            }
            MockEffect::Popup(url) => {
                let url = self.resolve(&from, &url);
                let document = self.load(&url)?;
                self.open_page(url, document);
            }
        }
        Ok(ActionStatus::Done)
    }

    async fn fill(
        &mut self,
        page: PageId,
        locator: &Locator,
        value: &str,
    ) -> EnsayoResult<ActionStatus> {
        let Some(target) = self.candidates(page, locator)?.into_iter().nth(locator.index()) else {
            return Ok(ActionStatus::NotFound);
        };
        if !target.visible {
            return Ok(ActionStatus::NotActionable("element is not visible".to_string()));
        }
        if !target.enabled {
            return Ok(ActionStatus::NotActionable("element is disabled".to_string()));
        }

        let current = self.page_mut(page)?;
        match current.document.find_mut(&target.handle) {
            Some(element) if element.value.is_some() => {
                element.value = Some(value.to_string());
            }
            _ => {
                return Ok(ActionStatus::NotActionable(
                    "element is not an <input>, <textarea> or [contenteditable] element"
                        .to_string(),
                ))
            }
        }
        with_stats(&self.stats, |s| {
            s.fills.push((target.handle.clone(), value.to_string()));
        });
        Ok(ActionStatus::Done)
    }

    async fn scroll(&mut self, page: PageId, pixels: Option<i64>) -> EnsayoResult<()> {
        let delta = pixels.unwrap_or_else(|| i64::from(self.viewport_height));
        self.page_mut(page)?.scroll_y += delta;
        with_stats(&self.stats, |s| s.scrolls.push(delta));
        Ok(())
    }

    async fn close(&mut self) -> EnsayoResult<()> {
        record(&self.stats, "session.close");
        self.pages.clear();
        if self.hang_close {
            std::future::pending::<()>().await;
        }
        if self.fail_close {
            return Err(EnsayoError::SessionError {
                message: "mock context disposal failure".to_string(),
            });
        }
        Ok(())
    }
}
