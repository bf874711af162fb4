//! Engine drivers: the browser-automation contract.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Driver (shared factory, Send + Sync)                               │
//! │    └── start() ──► Engine (one per scenario run)                    │
//! │                      └── launch() ──► BrowserProcess                │
//! │                                         └── new_session() ──►       │
//! │                                               BrowserSession        │
//! │                                                 pages, frames,      │
//! │                                                 query, click, fill  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ChromiumDriver (feature "browser")   │  MockDriver (scripted app)  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Engine operations are single attempts: they report what the document looks
//! like *now*. Polling, timeouts and actionability retries live in
//! [`Session`](crate::session::Session), so every driver gets identical
//! wait semantics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::LaunchOptions;
use crate::locator::Locator;
use crate::result::EnsayoResult;
use crate::wait::LoadState;

#[cfg(feature = "browser")]
pub mod chromium;
pub mod mock;

#[cfg(feature = "browser")]
pub use chromium::ChromiumDriver;
pub use mock::{
    LoadBehavior, MockApp, MockDocument, MockDriver, MockEffect, MockElement, MockStats,
};

/// Page handle within a session, in opening order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

/// Frame path within a page; the empty path is the main document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameId(pub String);

impl FrameId {
    /// The page's main document
    #[must_use]
    pub fn main() -> Self {
        Self(String::new())
    }

    /// Whether this is the main document
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_main() {
            write!(f, "main")
        } else {
            write!(f, "frame[{}]", self.0)
        }
    }
}

/// Snapshot of one element candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Frame containing the element
    pub frame: FrameId,
    /// Lowercase tag name
    pub tag: String,
    /// Trimmed text content
    pub text: String,
    /// Rendered with a non-empty box and not hidden by style
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Driver-specific handle for diagnostics
    pub handle: String,
}

/// Result of one action attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    /// The action was performed
    Done,
    /// No candidate at the locator's index
    NotFound,
    /// Candidate exists but cannot receive input yet
    NotActionable(String),
}

/// Shared driver: starts one engine per scenario run
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short driver name for logs
    fn name(&self) -> &'static str;

    /// Start (or connect to) the automation engine
    async fn start(&self) -> EnsayoResult<Box<dyn Engine>>;
}

/// A started automation engine
#[async_trait]
pub trait Engine: Send {
    /// Launch a browser process
    async fn launch(&mut self, options: &LaunchOptions) -> EnsayoResult<Box<dyn BrowserProcess>>;

    /// Stop the engine and release its resources
    async fn shutdown(&mut self) -> EnsayoResult<()>;
}

/// A running browser process
#[async_trait]
pub trait BrowserProcess: Send {
    /// Open an isolated browser context (no shared cookies or storage)
    async fn new_session(&mut self) -> EnsayoResult<Box<dyn BrowserSession>>;

    /// Close the browser process
    async fn close(&mut self) -> EnsayoResult<()>;
}

/// An isolated browser context
#[async_trait]
pub trait BrowserSession: Send {
    /// Context identifier
    fn id(&self) -> &str;

    /// Open a new blank page
    async fn new_page(&mut self) -> EnsayoResult<PageId>;

    /// Open pages in opening order; popups appear at the end
    async fn pages(&mut self) -> EnsayoResult<Vec<PageId>>;

    /// Navigate `page` and return once `wait_until` is reached.
    /// Callers bound this with their own timeout.
    async fn goto(&mut self, page: PageId, url: &str, wait_until: LoadState) -> EnsayoResult<()>;

    /// Current document URL of `page`
    async fn current_url(&mut self, page: PageId) -> EnsayoResult<String>;

    /// Frames of `page`, main document first
    async fn frames(&mut self, page: PageId) -> EnsayoResult<Vec<FrameId>>;

    /// Current load state of one frame, `None` when it cannot be observed
    async fn load_state(&mut self, page: PageId, frame: &FrameId)
        -> EnsayoResult<Option<LoadState>>;

    /// All candidates for `locator` across the page and its frames, in
    /// document order (index selection is applied by the caller)
    async fn query(&mut self, page: PageId, locator: &Locator) -> EnsayoResult<Vec<ElementInfo>>;

    /// One click attempt on the candidate at `locator.index()`
    async fn click(&mut self, page: PageId, locator: &Locator) -> EnsayoResult<ActionStatus>;

    /// One attempt to replace the value of the candidate at `locator.index()`
    async fn fill(
        &mut self,
        page: PageId,
        locator: &Locator,
        value: &str,
    ) -> EnsayoResult<ActionStatus>;

    /// Scroll by `pixels`, or one viewport height when `None`
    async fn scroll(&mut self, page: PageId, pixels: Option<i64>) -> EnsayoResult<()>;

    /// Close every page and dispose the context
    async fn close(&mut self) -> EnsayoResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_main() {
        assert!(FrameId::main().is_main());
        assert!(!FrameId("0".to_string()).is_main());
        assert_eq!(FrameId::main().to_string(), "main");
        assert_eq!(FrameId("0.1".to_string()).to_string(), "frame[0.1]");
    }

    #[test]
    fn test_page_id_order() {
        let mut pages = vec![PageId(2), PageId(0), PageId(1)];
        pages.sort();
        assert_eq!(pages.last(), Some(&PageId(2)));
        assert_eq!(PageId(3).to_string(), "page#3");
    }
}
