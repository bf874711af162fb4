//! Chromium driver over the Chrome DevTools Protocol.
//!
//! Every scenario run gets its own browser process. Each session is a CDP
//! browser context (`Target.createBrowserContext`), so cookies and storage
//! never leak between concurrent scenarios. Element resolution runs as an
//! in-page script across the main document and every same-origin frame;
//! cross-origin frames are listed but cannot be searched.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
    GetTargetsParams, TargetId,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{
    ActionStatus, BrowserProcess, BrowserSession, Driver, ElementInfo, Engine, FrameId, PageId,
};
use crate::config::LaunchOptions;
use crate::locator::Locator;
use crate::result::{EnsayoError, EnsayoResult};
use crate::wait::LoadState;

const READY_STATE_POLL: Duration = Duration::from_millis(50);

/// Drives a locally installed Chromium
#[derive(Debug, Clone, Default)]
pub struct ChromiumDriver;

impl ChromiumDriver {
    /// Create a driver; launch options come from the run configuration
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for ChromiumDriver {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn start(&self) -> EnsayoResult<Box<dyn Engine>> {
        Ok(Box::new(ChromiumEngine { handler: None }))
    }
}

/// Browser configuration; every command-line flag comes from `LaunchOptions::args`
fn cdp_config(options: &LaunchOptions) -> EnsayoResult<CdpConfig> {
    let mut builder = CdpConfig::builder().args(options.args()).viewport(None);

    if !options.headless {
        builder = builder.with_head();
    }
    if let Some(ref path) = options.chromium_path {
        builder = builder.chrome_executable(path);
    }

    builder
        .build()
        .map_err(|message| EnsayoError::BrowserLaunchError { message })
}

/// Owns the CDP event loop of the browser it launched
struct ChromiumEngine {
    handler: Option<tokio::task::JoinHandle<()>>,
}

#[async_trait]
impl Engine for ChromiumEngine {
    async fn launch(&mut self, options: &LaunchOptions) -> EnsayoResult<Box<dyn BrowserProcess>> {
        let (browser, mut handler) = CdpBrowser::launch(cdp_config(options)?).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("No such file") || message.contains("Could not auto detect") {
                EnsayoError::BrowserNotFound
            } else {
                EnsayoError::BrowserLaunchError { message }
            }
        })?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::debug!("CDP handler event loop ended");
                    break;
                }
            }
        }));

        tracing::debug!(headless = options.headless, "Chromium launched");
        Ok(Box::new(ChromiumBrowser {
            inner: Arc::new(Mutex::new(browser)),
            viewport: (options.viewport_width, options.viewport_height),
        }))
    }

    async fn shutdown(&mut self) -> EnsayoResult<()> {
        if let Some(handler) = self.handler.take() {
            handler.abort();
            // cancellation is the expected outcome here
            let _ = handler.await;
        }
        Ok(())
    }
}

struct ChromiumBrowser {
    inner: Arc<Mutex<CdpBrowser>>,
    viewport: (u32, u32),
}

#[async_trait]
impl BrowserProcess for ChromiumBrowser {
    async fn new_session(&mut self) -> EnsayoResult<Box<dyn BrowserSession>> {
        let browser = self.inner.lock().await;
        let created = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| EnsayoError::SessionError {
                message: e.to_string(),
            })?;
        let context_id = created.result.browser_context_id;
        tracing::debug!(context = %context_id.inner(), "Browser context created");

        Ok(Box::new(ChromiumSession {
            id: context_id.inner().clone(),
            context_id,
            browser: Arc::clone(&self.inner),
            viewport: self.viewport,
            pages: Vec::new(),
            next_page: 0,
        }))
    }

    async fn close(&mut self) -> EnsayoResult<()> {
        let mut browser = self.inner.lock().await;
        browser
            .close()
            .await
            .map_err(|e| EnsayoError::BrowserLaunchError {
                message: e.to_string(),
            })?;
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "Browser process did not exit cleanly");
        }
        Ok(())
    }
}

struct TrackedPage {
    id: PageId,
    page: CdpPage,
}

struct ChromiumSession {
    id: String,
    context_id: BrowserContextId,
    browser: Arc<Mutex<CdpBrowser>>,
    viewport: (u32, u32),
    pages: Vec<TrackedPage>,
    next_page: u32,
}

impl ChromiumSession {
    fn track(&mut self, page: CdpPage) -> PageId {
        let id = PageId(self.next_page);
        self.next_page += 1;
        self.pages.push(TrackedPage { id, page });
        id
    }

    fn page(&self, id: PageId) -> EnsayoResult<&CdpPage> {
        self.pages
            .iter()
            .find(|p| p.id == id)
            .map(|p| &p.page)
            .ok_or_else(|| EnsayoError::PageError {
                message: format!("{id} is not open"),
            })
    }

    /// Pick up popups opened in this context and forget closed pages
    async fn refresh_pages(&mut self) -> EnsayoResult<()> {
        let browser = self.browser.lock().await;
        let targets = browser
            .execute(GetTargetsParams::default())
            .await
            .map_err(|e| EnsayoError::SessionError {
                message: e.to_string(),
            })?
            .result
            .target_infos;

        let ours: Vec<TargetId> = targets
            .into_iter()
            .filter(|t| t.r#type == "page" && t.browser_context_id.as_ref() == Some(&self.context_id))
            .map(|t| t.target_id)
            .collect();

        self.pages.retain(|p| ours.contains(p.page.target_id()));

        let untracked: Vec<&TargetId> = ours
            .iter()
            .filter(|id| !self.pages.iter().any(|p| p.page.target_id() == *id))
            .collect();
        if untracked.is_empty() {
            return Ok(());
        }

        let open = browser.pages().await.map_err(|e| EnsayoError::PageError {
            message: e.to_string(),
        })?;
        drop(browser);

        for target in untracked {
            if let Some(page) = open.iter().find(|p| p.target_id() == target) {
                let id = self.track(page.clone());
                tracing::debug!(page = %id, "Popup attached");
            }
        }
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, page: PageId, call: &str) -> EnsayoResult<T> {
        let page = self.page(page)?;
        let params = EvaluateParams::builder()
            .expression(page_script(call))
            .return_by_value(true)
            .build()
            .map_err(|message| EnsayoError::ScriptError { message })?;
        page.evaluate_expression(params)
            .await
            .map_err(|e| EnsayoError::ScriptError {
                message: e.to_string(),
            })?
            .into_value()
            .map_err(|e| EnsayoError::ScriptError {
                message: e.to_string(),
            })
    }

    async fn ready_state(&self, page: PageId, frame: &FrameId) -> EnsayoResult<Option<LoadState>> {
        let path = serde_json::to_string(&frame.0)?;
        // an empty state means the frame's document is not reachable
        let state: String = self.eval(page, &format!("ensayo.readyState({path})")).await?;
        Ok((!state.is_empty()).then(|| LoadState::from_ready_state(&state)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ScriptStatus {
    Done,
    Ready { x: f64, y: f64 },
    NotFound,
    NotActionable { reason: String },
}

#[derive(Debug, Deserialize)]
struct Candidate {
    frame: String,
    tag: String,
    text: String,
    visible: bool,
    enabled: bool,
    handle: String,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn new_page(&mut self) -> EnsayoResult<PageId> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.context_id.clone())
            .build()
            .map_err(|message| EnsayoError::PageError { message })?;
        let page = self
            .browser
            .lock()
            .await
            .new_page(params)
            .await
            .map_err(|e| EnsayoError::PageError {
                message: e.to_string(),
            })?;
        Ok(self.track(page))
    }

    async fn pages(&mut self) -> EnsayoResult<Vec<PageId>> {
        self.refresh_pages().await?;
        Ok(self.pages.iter().map(|p| p.id).collect())
    }

    async fn goto(&mut self, page: PageId, url: &str, wait_until: LoadState) -> EnsayoResult<()> {
        let navigation_error = |message: String| EnsayoError::NavigationError {
            url: url.to_string(),
            message,
        };

        // Page.navigate returns once the new document has committed
        let response = self
            .page(page)?
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| navigation_error(e.to_string()))?;
        if let Some(error) = response.result.error_text.clone() {
            return Err(navigation_error(error));
        }

        if wait_until == LoadState::Commit {
            return Ok(());
        }
        loop {
            // the old document may still answer right after commit
            if let Ok(Some(state)) = self.ready_state(page, &FrameId::main()).await {
                if state.satisfies(wait_until) {
                    return Ok(());
                }
            }
            tokio::time::sleep(READY_STATE_POLL).await;
        }
    }

    async fn current_url(&mut self, page: PageId) -> EnsayoResult<String> {
        let url = self
            .page(page)?
            .url()
            .await
            .map_err(|e| EnsayoError::PageError {
                message: e.to_string(),
            })?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn frames(&mut self, page: PageId) -> EnsayoResult<Vec<FrameId>> {
        let paths: Vec<String> = self.eval(page, "ensayo.frames()").await?;
        Ok(paths.into_iter().map(FrameId).collect())
    }

    async fn load_state(
        &mut self,
        page: PageId,
        frame: &FrameId,
    ) -> EnsayoResult<Option<LoadState>> {
        self.ready_state(page, frame).await
    }

    async fn query(&mut self, page: PageId, locator: &Locator) -> EnsayoResult<Vec<ElementInfo>> {
        let spec = serde_json::to_string(&locator.to_query_spec())?;
        let found: Vec<Candidate> = self.eval(page, &format!("ensayo.query({spec})")).await?;
        Ok(found
            .into_iter()
            .map(|c| ElementInfo {
                frame: FrameId(c.frame),
                tag: c.tag,
                text: c.text,
                visible: c.visible,
                enabled: c.enabled,
                handle: c.handle,
            })
            .collect())
    }

    async fn click(&mut self, page: PageId, locator: &Locator) -> EnsayoResult<ActionStatus> {
        let spec = serde_json::to_string(&locator.to_query_spec())?;
        let status: ScriptStatus = self
            .eval(page, &format!("ensayo.prepareClick({spec})"))
            .await?;
        match status {
            ScriptStatus::Ready { x, y } => {
                self.page(page)?
                    .click(Point { x, y })
                    .await
                    .map_err(|e| EnsayoError::InputError {
                        message: e.to_string(),
                    })?;
                Ok(ActionStatus::Done)
            }
            other => Ok(other.into()),
        }
    }

    async fn fill(
        &mut self,
        page: PageId,
        locator: &Locator,
        value: &str,
    ) -> EnsayoResult<ActionStatus> {
        let spec = serde_json::to_string(&locator.to_query_spec())?;
        let value = serde_json::to_string(value)?;
        let status: ScriptStatus = self
            .eval(page, &format!("ensayo.fill({spec}, {value})"))
            .await?;
        Ok(status.into())
    }

    async fn scroll(&mut self, page: PageId, pixels: Option<i64>) -> EnsayoResult<()> {
        let (width, height) = self.viewport;
        let delta = pixels.unwrap_or_else(|| i64::from(height));
        let wheel = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(f64::from(width) / 2.0)
            .y(f64::from(height) / 2.0)
            .delta_x(0.0)
            .delta_y(delta as f64)
            .build()
            .map_err(|message| EnsayoError::InputError { message })?;
        self.page(page)?
            .execute(wheel)
            .await
            .map_err(|e| EnsayoError::InputError {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn close(&mut self) -> EnsayoResult<()> {
        for tracked in self.pages.drain(..) {
            if let Err(e) = tracked.page.close().await {
                tracing::debug!(page = %tracked.id, error = %e, "Page already gone");
            }
        }
        self.browser
            .lock()
            .await
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
            .map_err(|e| EnsayoError::SessionError {
                message: e.to_string(),
            })?;
        tracing::debug!(context = %self.id, "Browser context disposed");
        Ok(())
    }
}

impl From<ScriptStatus> for ActionStatus {
    fn from(status: ScriptStatus) -> Self {
        match status {
            ScriptStatus::Done | ScriptStatus::Ready { .. } => Self::Done,
            ScriptStatus::NotFound => Self::NotFound,
            ScriptStatus::NotActionable { reason } => Self::NotActionable(reason),
        }
    }
}

fn page_script(call: &str) -> String {
    format!("(() => {{\n{PAGE_SCRIPT}\nreturn {call};\n}})()")
}

/// In-page element resolution. Candidates are returned in document order,
/// main document first, then frames depth-first.
const PAGE_SCRIPT: &str = r#"
const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
const matches = (hay, needle, exact) =>
  exact ? norm(hay) === needle : norm(hay).toLowerCase().includes(needle.toLowerCase());

const documents = () => {
  const out = [];
  const walk = (doc, path) => {
    out.push({ doc, path });
    doc.querySelectorAll('iframe, frame').forEach((el, i) => {
      const child = path === '' ? String(i) : `${path}.${i}`;
      let inner = null;
      try { inner = el.contentDocument; } catch (e) { inner = null; }
      if (inner) { walk(inner, child); } else { out.push({ doc: null, path: child }); }
    });
  };
  walk(document, '');
  return out;
};

const implicitRole = (el) => {
  const tag = el.tagName.toLowerCase();
  const type = (el.getAttribute('type') || 'text').toLowerCase();
  switch (tag) {
    case 'button': return 'button';
    case 'a': return el.hasAttribute('href') ? 'link' : 'generic';
    case 'input':
      if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
      if (type === 'checkbox') return 'checkbox';
      if (type === 'radio') return 'radio';
      if (type === 'range') return 'slider';
      if (type === 'search') return 'searchbox';
      return 'textbox';
    case 'textarea': return 'textbox';
    case 'select': return el.multiple ? 'listbox' : 'combobox';
    case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
    case 'img': return 'img';
    case 'nav': return 'navigation';
    case 'ul': case 'ol': return 'list';
    case 'li': return 'listitem';
    case 'dialog': return 'dialog';
    default: return 'generic';
  }
};
const roleOf = (el) => (el.getAttribute('role') || '').split(/\s+/)[0] || implicitRole(el);

const labelOf = (el) => {
  const doc = el.ownerDocument;
  const aria = el.getAttribute('aria-label');
  if (aria) return aria;
  const by = el.getAttribute('aria-labelledby');
  if (by) {
    return by.split(/\s+/).map((id) => {
      const node = doc.getElementById(id);
      return node ? node.textContent : '';
    }).join(' ');
  }
  if (el.labels && el.labels.length) {
    return Array.from(el.labels).map((l) => l.textContent).join(' ');
  }
  return null;
};

const nameOf = (el) => {
  const label = norm(labelOf(el));
  if (label) return label;
  if (el.tagName === 'INPUT' && ['button', 'submit', 'reset'].includes((el.type || '').toLowerCase())) {
    return norm(el.value);
  }
  const text = norm(el.textContent);
  if (text) return text;
  return norm(el.getAttribute('alt') || el.getAttribute('title') || el.getAttribute('placeholder'));
};

const isVisible = (el) => {
  const style = el.ownerDocument.defaultView.getComputedStyle(el);
  if (style.display === 'none' || style.visibility === 'hidden') return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
};
const isEnabled = (el) => !el.disabled && el.getAttribute('aria-disabled') !== 'true';

const SKIP = ['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'HEAD', 'TITLE'];
const all = (doc) => Array.from(doc.querySelectorAll('*')).filter((el) => !SKIP.includes(el.tagName));

const find = (doc, s) => {
  switch (s.kind) {
    case 'css': return Array.from(doc.querySelectorAll(s.selector));
    case 'xpath': {
      const snap = doc.evaluate(s.expression, doc, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
      const out = [];
      for (let i = 0; i < snap.snapshotLength; i++) {
        const node = snap.snapshotItem(i);
        if (node.nodeType === 1) out.push(node);
      }
      return out;
    }
    case 'text':
      return all(doc).filter((el) => el.tagName !== 'HTML' && el.tagName !== 'BODY'
        && matches(el.textContent, s.text, s.exact)
        && !Array.from(el.children).some((c) => matches(c.textContent, s.text, s.exact)));
    case 'role':
      return all(doc).filter((el) => roleOf(el) === s.role
        && (s.name == null || matches(nameOf(el), s.name, s.exact)));
    case 'label':
      return all(doc).filter((el) => {
        const label = labelOf(el);
        return label != null && matches(label, s.text, s.exact);
      });
    case 'placeholder':
      return Array.from(doc.querySelectorAll('[placeholder]'))
        .filter((el) => matches(el.getAttribute('placeholder'), s.text, false));
    case 'test_id':
      return Array.from(doc.querySelectorAll('[data-testid]'))
        .filter((el) => el.getAttribute('data-testid') === s.id);
    default:
      throw new Error(`unknown selector kind ${s.kind}`);
  }
};

const resolve = (spec) => {
  const out = [];
  for (const { doc, path } of documents()) {
    if (!doc) continue;
    for (const el of find(doc, spec.selector)) out.push({ el, path });
  }
  return out;
};

const check = (spec) => {
  const found = resolve(spec)[spec.nth];
  if (!found) return { status: 'not_found' };
  if (!isVisible(found.el)) return { status: 'not_actionable', reason: 'element is not visible' };
  if (!isEnabled(found.el)) return { status: 'not_actionable', reason: 'element is disabled' };
  return { status: 'ok', el: found.el };
};

const ensayo = {
  frames: () => documents().map((d) => d.path),
  readyState: (path) => {
    const entry = documents().find((d) => d.path === path);
    return entry && entry.doc ? entry.doc.readyState : '';
  },
  query: (spec) => resolve(spec).map(({ el, path }, i) => ({
    frame: path,
    tag: el.tagName.toLowerCase(),
    text: norm(el.textContent).slice(0, 200),
    visible: isVisible(el),
    enabled: isEnabled(el),
    handle: `${path || 'main'}#${i}`,
  })),
  prepareClick: (spec) => {
    const checked = check(spec);
    if (checked.status !== 'ok') return checked;
    const el = checked.el;
    el.scrollIntoView({ block: 'center', inline: 'center' });
    const rect = el.getBoundingClientRect();
    let x = rect.left + rect.width / 2;
    let y = rect.top + rect.height / 2;
    const hit = el.ownerDocument.elementFromPoint(x, y);
    if (hit && hit !== el && !el.contains(hit)) {
      return { status: 'not_actionable', reason: 'element is obscured by another element' };
    }
    let win = el.ownerDocument.defaultView;
    while (win && win.frameElement) {
      const frame = win.frameElement.getBoundingClientRect();
      x += frame.left;
      y += frame.top;
      win = win.parent;
    }
    return { status: 'ready', x, y };
  },
  fill: (spec, value) => {
    const checked = check(spec);
    if (checked.status !== 'ok') return checked;
    const el = checked.el;
    if (el.isContentEditable) {
      el.focus();
      el.textContent = value;
      el.dispatchEvent(new Event('input', { bubbles: true }));
      return { status: 'done' };
    }
    if (el.tagName !== 'INPUT' && el.tagName !== 'TEXTAREA') {
      return { status: 'not_actionable', reason: 'element is not an <input>, <textarea> or [contenteditable] element' };
    }
    if (el.readOnly) return { status: 'not_actionable', reason: 'element is readonly' };
    el.focus();
    const win = el.ownerDocument.defaultView;
    const proto = el.tagName === 'INPUT' ? win.HTMLInputElement.prototype : win.HTMLTextAreaElement.prototype;
    Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, value);
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return { status: 'done' };
  },
};
"#;
