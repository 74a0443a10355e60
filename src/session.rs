//! Browser session capability
//!
//! The pipeline never talks to Chrome directly; it consumes the
//! [`PageSession`] trait, which keeps the extractors testable against a mock
//! session. [`ChromeSession`] is the production implementation over
//! `headless_chrome`. DOM access failures return `None`/empty rather than
//! errors: a missing element is an expected steady-state outcome of scraping
//! a shifting site, per the crate's error taxonomy.

use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use headless_chrome::browser::tab::element::Element;
use headless_chrome::browser::tab::Tab;
use headless_chrome::{Browser, LaunchOptions};
use serde_json::Value;
use tracing::{debug, warn};

use crate::capture::CaptureLog;
use crate::scrape::ScraperConfig;
use crate::FlightError;

/// Opaque reference to a DOM node within one page session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomHandle(pub u32);

/// Page navigation and DOM/query access, as consumed by the extraction
/// pipeline. Response capture must be wired up before `navigate` is called;
/// a listener registered later may miss early responses.
pub trait PageSession {
    /// Navigate and block until load completion or timeout. A timeout is a
    /// degraded continuation, not an error; only a dead session errors.
    fn navigate(&self, url: &str) -> Result<(), FlightError>;

    fn query_all(&self, selector: &str) -> Vec<DomHandle>;

    fn query_within(&self, handle: DomHandle, selector: &str) -> Vec<DomHandle>;

    fn text(&self, handle: DomHandle) -> Option<String>;

    fn attribute(&self, handle: DomHandle, name: &str) -> Option<String>;

    /// Run a JS function (`function() { ... }`) with `this` bound to the
    /// element, returning its JSON result. Used where an in-page walk is
    /// cheaper than repeated round-trips.
    fn eval_on(&self, handle: DomHandle, function: &str) -> Option<Value>;

    /// Evaluate an expression in page context.
    fn evaluate(&self, expression: &str) -> Option<Value>;

    fn page_source(&self) -> Option<String>;
}

/// Production session over a headless Chrome tab.
pub struct ChromeSession {
    // Held so the browser process outlives the tab.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    /// Launch a fresh browser and tab. Launches are retried a bounded number
    /// of times; giving up is a session-level (terminal) failure.
    pub fn launch(config: &ScraperConfig) -> Result<Self, FlightError> {
        let mut last_error = String::new();
        for attempt in 1..=config.launch_attempts {
            match Self::launch_once(config) {
                Ok(session) => {
                    debug!(attempt, "browser session ready");
                    return Ok(session);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "browser launch failed");
                    last_error = e.to_string();
                    thread::sleep(Duration::from_secs(3));
                }
            }
        }
        Err(FlightError::SessionError(format!(
            "failed to open browser after {} attempts: {}",
            config.launch_attempts, last_error
        )))
    }

    fn launch_once(config: &ScraperConfig) -> Result<Self, FlightError> {
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .idle_browser_timeout(Duration::from_secs(config.idle_timeout_secs))
            .window_size(Some((1366, 900)))
            .args(vec![OsStr::new("--disable-blink-features=AutomationControlled")])
            .build()
            .map_err(|e| FlightError::SessionError(format!("launch options: {e}")))?;

        let browser = Browser::new(options)
            .map_err(|e| FlightError::SessionError(format!("browser launch: {e}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| FlightError::SessionError(format!("new tab: {e}")))?;
        tab.set_default_timeout(Duration::from_secs(config.nav_timeout_secs));
        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| FlightError::SessionError(format!("set user agent: {e}")))?;

        Ok(Self { _browser: browser, tab })
    }

    /// Subscribe the capture log to every network response on this tab.
    /// Must be called before the first `navigate`.
    pub fn on_response(&self, log: Arc<Mutex<CaptureLog>>) -> Result<(), FlightError> {
        let hint = log
            .lock()
            .map(|l| l.domain_hint().to_string())
            .unwrap_or_default();

        self.tab
            .register_response_handling(
                "flypoints-capture",
                Box::new(move |params, fetch_body| {
                    let url = params.response.url.clone();
                    let lowered = url.to_lowercase();
                    // Cheap prefilter before pulling the body over the wire.
                    if !(lowered.contains(&hint) && lowered.contains("api")) {
                        return;
                    }
                    let status = params.response.status as u16;
                    if status != 200 {
                        return;
                    }
                    let body = match fetch_body() {
                        Ok(body) if !body.base_64_encoded => body.body,
                        // Binary bodies cannot be flight JSON.
                        _ => return,
                    };
                    if let Ok(mut log) = log.lock() {
                        log.observe(&url, status, body.as_bytes());
                    }
                }),
            )
            .map_err(|e| FlightError::SessionError(format!("response listener: {e}")))?;
        Ok(())
    }

    fn element(&self, handle: DomHandle) -> Option<Element<'_>> {
        Element::new(&self.tab, handle.0).ok()
    }
}

impl PageSession for ChromeSession {
    fn navigate(&self, url: &str) -> Result<(), FlightError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| FlightError::SessionError(format!("navigate: {e}")))?;
        // Load timeout is not fatal: work with whatever rendered.
        if let Err(e) = self.tab.wait_until_navigated() {
            warn!(error = %e, "page load did not settle, continuing");
        }
        Ok(())
    }

    fn query_all(&self, selector: &str) -> Vec<DomHandle> {
        match self.tab.find_elements(selector) {
            Ok(elements) => elements.iter().map(|e| DomHandle(e.node_id)).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn query_within(&self, handle: DomHandle, selector: &str) -> Vec<DomHandle> {
        let Some(element) = self.element(handle) else {
            return Vec::new();
        };
        match element.find_elements(selector) {
            Ok(elements) => elements.iter().map(|e| DomHandle(e.node_id)).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn text(&self, handle: DomHandle) -> Option<String> {
        self.element(handle)?.get_inner_text().ok()
    }

    fn attribute(&self, handle: DomHandle, name: &str) -> Option<String> {
        let element = self.element(handle)?;
        let function = format!(
            "function() {{ return this.getAttribute({}); }}",
            serde_json::to_string(name).ok()?
        );
        match element.call_js_fn(&function, vec![], false).ok()?.value {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    fn eval_on(&self, handle: DomHandle, function: &str) -> Option<Value> {
        self.element(handle)?
            .call_js_fn(function, vec![], false)
            .ok()?
            .value
    }

    fn evaluate(&self, expression: &str) -> Option<Value> {
        self.tab.evaluate(expression, false).ok()?.value
    }

    fn page_source(&self) -> Option<String> {
        self.tab.get_content().ok()
    }
}
