//! Top-level scrape pipeline
//!
//! One `FlightScraper::scrape` call owns one browser session, one capture
//! log and one result list; nothing is shared across searches. The blocking
//! browser drive runs off the async runtime on a dedicated thread.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::capture::CaptureLog;
use crate::dom::DomExtractor;
use crate::finder::find_flight_records;
use crate::html::PageSourceExtractor;
use crate::normalize::{record_from_json, TextPatterns};
use crate::profile::{Airline, AirlineProfile};
use crate::reconcile::reconcile;
use crate::session::{ChromeSession, PageSession};
use crate::{FlightError, FlightRecord, ScrapeOutcome, SearchQuery};

/// Tunables for one scraper instance. Defaults match the pacing the booking
/// sites tolerate without flagging the session.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub headless: bool,
    pub user_agent: String,
    /// Browser launch attempts before giving up (session-level failure).
    pub launch_attempts: u32,
    pub nav_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Settle time after navigation before the first marker poll.
    pub after_search_delay_secs: u64,
    /// Ceiling on the marker wait, polled in fixed increments.
    pub result_wait_secs: u64,
    pub poll_interval_secs: u64,
    /// Full capture-wait cycles to retry (reload) when nothing was captured.
    pub reload_attempts: u32,
    /// When set, raw payload and page-source dumps land here.
    pub debug_dir: Option<PathBuf>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            launch_attempts: 3,
            nav_timeout_secs: 60,
            idle_timeout_secs: 120,
            after_search_delay_secs: 10,
            result_wait_secs: 30,
            poll_interval_secs: 2,
            reload_attempts: 2,
            debug_dir: None,
        }
    }
}

/// One-search-at-a-time scraper for a single airline.
pub struct FlightScraper {
    profile: &'static AirlineProfile,
    config: ScraperConfig,
}

impl FlightScraper {
    pub fn new(airline: Airline, config: ScraperConfig) -> Self {
        Self { profile: airline.profile(), config }
    }

    /// Run one search end to end. Session-level failures come back as a
    /// `success: false` outcome; `Err` is reserved for misconfiguration.
    #[instrument(level = "info", skip(self, query), fields(airline = self.profile.display_name))]
    pub async fn scrape(&self, query: SearchQuery) -> Result<ScrapeOutcome, FlightError> {
        let profile = self.profile;
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || scrape_blocking(profile, config, query))
            .await
            .map_err(|e| FlightError::SessionError(format!("scrape task failed: {e}")))?
    }
}

fn scrape_blocking(
    profile: &'static AirlineProfile,
    config: ScraperConfig,
    query: SearchQuery,
) -> Result<ScrapeOutcome, FlightError> {
    let patterns = TextPatterns::new(profile)?;

    // Fresh session per search; instances are never reused across queries.
    let session = match ChromeSession::launch(&config) {
        Ok(session) => session,
        Err(e) => return Ok(ScrapeOutcome::failure(e.to_string())),
    };

    let capture = Arc::new(Mutex::new(CaptureLog::new(profile)));
    // The listener must exist before navigation starts or early responses
    // are lost.
    if let Err(e) = session.on_response(Arc::clone(&capture)) {
        return Ok(ScrapeOutcome::failure(e.to_string()));
    }

    let url = profile.search_url(&query);
    info!(url = %url, "loading search results page");

    let mut navigated = false;
    for attempt in 0..=config.reload_attempts {
        if attempt > 0 {
            warn!(attempt, "no flight data captured, reloading");
            if let Ok(mut log) = capture.lock() {
                log.reset();
            }
            thread::sleep(Duration::from_secs(2));
        }

        match session.navigate(&url) {
            Ok(()) => navigated = true,
            Err(e) => {
                warn!(attempt, error = %e, "navigation failed");
                continue;
            }
        }

        thread::sleep(Duration::from_secs(config.after_search_delay_secs));
        wait_for_results(profile, &config, &session, &capture);

        let captured = capture.lock().map(|log| log.primary().is_some()).unwrap_or(false);
        if captured || markers_present(profile, &session) {
            break;
        }
        // Otherwise fall through into the next reload cycle; after the last
        // attempt the pipeline proceeds with whatever rendered.
    }

    if !navigated {
        return Ok(ScrapeOutcome::failure(format!(
            "could not navigate to {} after {} attempts",
            url,
            config.reload_attempts + 1
        )));
    }

    let payload = capture
        .lock()
        .ok()
        .and_then(|log| log.primary().cloned());
    write_debug_artifacts(profile, &config, &session, &capture);

    let flights = run_pipeline(profile, &patterns, &session, payload.as_ref())?;

    if flights.is_empty() {
        let reason = diagnose_empty(&session, &capture);
        info!(reason = %reason, "search finished without flights");
        let mut outcome = ScrapeOutcome::from_flights(flights);
        outcome.error = Some(reason);
        return Ok(outcome);
    }

    info!(count = flights.len(), "search finished");
    Ok(ScrapeOutcome::from_flights(flights))
}

/// Extraction and reconciliation, independent of how the session came to be.
/// Exposed for tests that drive a scripted session.
pub fn run_pipeline(
    profile: &'static AirlineProfile,
    patterns: &TextPatterns,
    session: &dyn PageSession,
    payload: Option<&Value>,
) -> Result<Vec<FlightRecord>, FlightError> {
    let api_flights: Vec<FlightRecord> = match payload {
        Some(payload) => {
            let raw = find_flight_records(payload);
            debug!(raw = raw.len(), "raw API records located");
            raw.into_iter()
                .filter_map(|item| record_from_json(profile, item))
                .collect()
        }
        None => Vec::new(),
    };

    let mut dom_flights = DomExtractor::new(profile, patterns)?.extract(session);
    if dom_flights.is_empty() {
        if let Some(source) = session.page_source() {
            debug!("live DOM pass empty, parsing page source");
            dom_flights = PageSourceExtractor::new(profile, patterns)?.extract(&source);
        }
    }

    info!(
        api = api_flights.len(),
        dom = dom_flights.len(),
        "reconciling extraction results"
    );
    let mut flights = reconcile(dom_flights, api_flights);
    flights.retain(FlightRecord::is_viable);
    Ok(flights)
}

/// Poll for DOM flight markers in fixed increments up to the ceiling. There
/// is no cancellation; hitting the ceiling just means proceeding with
/// whatever was captured.
fn wait_for_results(
    profile: &AirlineProfile,
    config: &ScraperConfig,
    session: &dyn PageSession,
    capture: &Arc<Mutex<CaptureLog>>,
) {
    let mut waited = 0;
    while waited < config.result_wait_secs {
        if markers_present(profile, session) {
            debug!(waited, "flight markers visible");
            // Prices render a beat after the markers do.
            thread::sleep(Duration::from_secs(2));
            return;
        }
        if capture.lock().map(|log| log.primary().is_some()).unwrap_or(false) {
            debug!(waited, "API payload captured");
            thread::sleep(Duration::from_secs(2));
            return;
        }
        thread::sleep(Duration::from_secs(config.poll_interval_secs));
        waited += config.poll_interval_secs;
    }
    debug!(waited, "result wait ceiling reached");
}

fn markers_present(profile: &AirlineProfile, session: &dyn PageSession) -> bool {
    profile
        .result_markers
        .iter()
        .any(|marker| !session.query_all(marker).is_empty())
}

/// Best-effort reason for an empty result, preferred over raising: empty is
/// a steady-state outcome when scraping an uncontrolled site.
fn diagnose_empty(session: &dyn PageSession, capture: &Arc<Mutex<CaptureLog>>) -> String {
    if let Some(source) = session.page_source() {
        let lowered = source.to_lowercase();
        if lowered.contains("error code 15")
            || lowered.contains("security system")
            || lowered.contains("access denied")
        {
            return "request blocked by the site's security system".to_string();
        }
    }
    let captured_any = capture.lock().map(|log| !log.is_empty()).unwrap_or(false);
    if captured_any {
        "API responses captured but no flights found; no availability for this route and date"
            .to_string()
    } else {
        "no flight data rendered; the site structure may have changed".to_string()
    }
}

fn write_debug_artifacts(
    profile: &AirlineProfile,
    config: &ScraperConfig,
    session: &dyn PageSession,
    capture: &Arc<Mutex<CaptureLog>>,
) {
    let Some(dir) = &config.debug_dir else {
        return;
    };
    let slug = profile.display_name.to_lowercase().replace(' ', "_");

    if let Ok(log) = capture.lock() {
        if let Some(payload) = log.primary() {
            if let Ok(json) = serde_json::to_string_pretty(payload) {
                let path = dir.join(format!("{slug}_api_response.json"));
                if let Err(e) = std::fs::write(&path, json) {
                    warn!(path = %path.display(), error = %e, "could not write payload dump");
                }
            }
        }
    }
    if let Some(source) = session.page_source() {
        let path = dir.join(format!("{slug}_page_source.html"));
        if let Err(e) = std::fs::write(&path, source) {
            warn!(path = %path.display(), error = %e, "could not write page-source dump");
        }
    }
}
