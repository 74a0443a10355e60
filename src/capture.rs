//! Network response capture during a page load
//!
//! The results page calls the site's internal search API while rendering.
//! A `CaptureLog` subscribes to every response on the session (it must be
//! registered before navigation starts, or early responses are lost) and
//! keeps the most relevant JSON payload as "the" API payload for the search.

use serde_json::Value;
use tracing::debug;

use crate::profile::AirlineProfile;

/// One decoded API response observed during the page load. The full log is
/// kept only for debug artifacts; the pipeline reads the primary payload.
#[derive(Debug, Clone)]
pub struct Capture {
    pub url: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    Availability,
    LowFare,
}

/// Append-only capture log with a single promoted primary payload.
/// Owned by one scrape session; never shared across searches.
#[derive(Debug)]
pub struct CaptureLog {
    domain_hint: &'static str,
    captures: Vec<Capture>,
    primary: Option<(PayloadKind, usize)>,
}

impl CaptureLog {
    pub fn new(profile: &AirlineProfile) -> Self {
        Self {
            domain_hint: profile.domain_hint,
            captures: Vec::new(),
            primary: None,
        }
    }

    pub fn domain_hint(&self) -> &'static str {
        self.domain_hint
    }

    /// Feed one network response. Called sequentially in arrival order;
    /// each call makes at most one promotion decision, idempotently.
    /// Non-JSON and unrelated responses are skipped silently.
    pub fn observe(&mut self, url: &str, status: u16, body: &[u8]) {
        if status != 200 {
            return;
        }
        let lowered = url.to_lowercase();
        if !(lowered.contains(self.domain_hint) && lowered.contains("api")) {
            return;
        }
        let data: Value = match serde_json::from_slice(body) {
            Ok(data) => data,
            Err(_) => return,
        };

        self.captures.push(Capture { url: url.to_string(), data });
        let index = self.captures.len() - 1;

        if !lowered.contains("search") {
            return;
        }
        if lowered.contains("availability") {
            // First availability match wins outright, even over an earlier
            // lowfare promotion.
            if !matches!(self.primary, Some((PayloadKind::Availability, _))) {
                debug!(url, "captured availability payload");
                self.primary = Some((PayloadKind::Availability, index));
            }
        } else if lowered.contains("lowfare") && self.primary.is_none() {
            debug!(url, "captured lowfare payload");
            self.primary = Some((PayloadKind::LowFare, index));
        }
    }

    /// The promoted search payload, if any page-load response qualified.
    /// `None` is a valid terminal state: the pipeline falls back to
    /// DOM-only extraction.
    pub fn primary(&self) -> Option<&Value> {
        self.primary.map(|(_, index)| &self.captures[index].data)
    }

    pub fn primary_url(&self) -> Option<&str> {
        self.primary
            .map(|(_, index)| self.captures[index].url.as_str())
    }

    /// Every decoded capture, in arrival order (debug artifact only).
    pub fn all(&self) -> &[Capture] {
        &self.captures
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    /// Reset before a reload attempt so a stale payload from the previous
    /// load cannot satisfy the new one.
    pub fn reset(&mut self) {
        self.captures.clear();
        self.primary = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SPICEJET;

    fn log() -> CaptureLog {
        CaptureLog::new(&SPICEJET)
    }

    #[test]
    fn test_ignores_non_matching_urls() {
        let mut log = log();
        log.observe("https://analytics.example.com/api/track", 200, b"{}");
        log.observe("https://www.spicejet.com/assets/logo.png", 200, b"{}");
        assert!(log.is_empty());
    }

    #[test]
    fn test_ignores_non_200_and_non_json() {
        let mut log = log();
        log.observe("https://api.spicejet.com/v1/search/availability", 404, b"{}");
        log.observe("https://api.spicejet.com/v1/search/availability", 200, b"<html>");
        assert!(log.is_empty());
        assert!(log.primary().is_none());
    }

    #[test]
    fn test_availability_beats_lowfare() {
        let mut log = log();
        log.observe(
            "https://api.spicejet.com/v1/search/lowfare",
            200,
            br#"{"kind":"lowfare"}"#,
        );
        assert_eq!(log.primary().unwrap()["kind"], "lowfare");

        log.observe(
            "https://api.spicejet.com/v1/search/availability",
            200,
            br#"{"kind":"availability"}"#,
        );
        assert_eq!(log.primary().unwrap()["kind"], "availability");
    }

    #[test]
    fn test_first_availability_wins() {
        let mut log = log();
        log.observe(
            "https://api.spicejet.com/v1/search/availability",
            200,
            br#"{"seq":1}"#,
        );
        log.observe(
            "https://api.spicejet.com/v1/search/availability",
            200,
            br#"{"seq":2}"#,
        );
        assert_eq!(log.primary().unwrap()["seq"], 1);
        assert_eq!(log.all().len(), 2); // log itself is append-only
    }

    #[test]
    fn test_lowfare_does_not_replace_lowfare() {
        let mut log = log();
        log.observe("https://api.spicejet.com/search/lowfare?a=1", 200, br#"{"seq":1}"#);
        log.observe("https://api.spicejet.com/search/lowfare?a=2", 200, br#"{"seq":2}"#);
        assert_eq!(log.primary().unwrap()["seq"], 1);
    }

    #[test]
    fn test_non_search_api_logged_but_not_promoted() {
        let mut log = log();
        log.observe(
            "https://api.spicejet.com/v1/session/config",
            200,
            br#"{"cfg":true}"#,
        );
        assert_eq!(log.all().len(), 1);
        assert!(log.primary().is_none());
    }

    #[test]
    fn test_reset_clears_promotion() {
        let mut log = log();
        log.observe(
            "https://api.spicejet.com/v1/search/availability",
            200,
            br#"{"seq":1}"#,
        );
        log.reset();
        assert!(log.is_empty());
        assert!(log.primary().is_none());
    }
}
