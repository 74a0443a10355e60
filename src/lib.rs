//! # Flypoints
//!
//! Retrieves flight search results (schedule, fares, loyalty points) from
//! airline booking websites that expose no stable public API. A single search
//! drives one headless browser session, captures the site's internal search
//! API responses while the results page loads, extracts flight-shaped text
//! blocks from the rendered DOM, and reconciles both sources into one
//! deduplicated flight list.

pub mod capture;
pub mod cities;
pub mod dom;
pub mod finder;
pub mod html;
pub mod normalize;
pub mod output;
pub mod profile;
pub mod reconcile;
pub mod scrape;
pub mod session;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export main types for convenience
pub use capture::CaptureLog;
pub use profile::{Airline, AirlineProfile, FareClass};
pub use scrape::{FlightScraper, ScraperConfig};
pub use session::{ChromeSession, DomHandle, PageSession};

/// Sentinel used for any field whose value could not be extracted.
pub const NA: &str = "N/A";

/// Error types for the flypoints library
#[derive(Error, Debug)]
pub enum FlightError {
    #[error("Browser session failed: {0}")]
    SessionError(String),

    #[error("HTML parsing failed: {0}")]
    ParseError(String),

    #[error("Invalid pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Unknown airline: {0}")]
    UnknownAirline(String),

    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Invalid date format: {0}")]
    DateParseError(String),
}

/// One-way search input, already normalized to airport codes and an
/// ISO `YYYY-MM-DD` date. Use [`SearchQuery::parse`] to build one from
/// free-form user input.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub date: String,
}

impl SearchQuery {
    /// Normalize raw user input (city names or IATA codes, date in
    /// `DD-MM-YYYY` or `YYYY-MM-DD`) into a query.
    pub fn parse(origin: &str, destination: &str, date: &str) -> Result<Self, FlightError> {
        let origin = cities::normalize_city_input(origin)
            .ok_or_else(|| FlightError::CityNotFound(origin.to_string()))?;
        let destination = cities::normalize_city_input(destination)
            .ok_or_else(|| FlightError::CityNotFound(destination.to_string()))?;
        let date = cities::parse_date(date)
            .ok_or_else(|| FlightError::DateParseError(date.to_string()))?;
        Ok(Self { origin, destination, date })
    }
}

/// Canonical flight record, the unit every extraction path produces and the
/// reconciler merges. String fields hold the rendered value or `"N/A"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub airline: String,
    /// Carrier-code + digits tokens, comma-joined for connecting itineraries.
    pub flight_number: String,
    /// `HH:MM` 24-hour clock.
    pub departure_time: String,
    pub arrival_time: String,
    /// `"<h>h <m>m"`.
    pub duration: String,
    /// Currency-symbol-prefixed, thousands-grouped, e.g. `"₹4,500"`.
    pub price: String,
    pub points: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub price_by_fare_class: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub points_by_fare_class: BTreeMap<String, String>,
}

impl FlightRecord {
    pub fn new(airline: &str) -> Self {
        Self {
            airline: airline.to_string(),
            flight_number: NA.to_string(),
            departure_time: NA.to_string(),
            arrival_time: NA.to_string(),
            duration: NA.to_string(),
            price: NA.to_string(),
            points: NA.to_string(),
            price_by_fare_class: BTreeMap::new(),
            points_by_fare_class: BTreeMap::new(),
        }
    }

    /// Deduplication identity: two records with the same key are the same
    /// physical flight and must be merged, never emitted twice.
    pub fn identity_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.flight_number, self.departure_time, self.arrival_time
        )
    }

    pub fn has_price(&self) -> bool {
        self.price != NA || self.price_by_fare_class.values().any(|p| p != NA)
    }

    pub fn has_times(&self) -> bool {
        self.departure_time != NA && self.arrival_time != NA
    }

    /// Minimum-viability invariant: a record is keepable only with a known
    /// flight number and at least one price or a full departure/arrival pair.
    pub fn is_viable(&self) -> bool {
        self.flight_number != NA && (self.has_price() || self.has_times())
    }

    /// Fill this record's `"N/A"` schedule fields from `other`. Known fields
    /// are never overwritten, and commercial fields are never touched.
    pub(crate) fn fill_schedule_from(&mut self, other: &FlightRecord) {
        if self.departure_time == NA && other.departure_time != NA {
            self.departure_time = other.departure_time.clone();
        }
        if self.arrival_time == NA && other.arrival_time != NA {
            self.arrival_time = other.arrival_time.clone();
        }
        if self.duration == NA && other.duration != NA {
            self.duration = other.duration.clone();
        }
    }
}

/// What a scrape run hands to the caller: the flight list plus a
/// success/error pair for whole-session failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub success: bool,
    pub flights: Vec<FlightRecord>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeOutcome {
    pub fn from_flights(flights: Vec<FlightRecord>) -> Self {
        let count = flights.len();
        Self { success: true, flights, count, error: None }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self { success: false, flights: Vec::new(), count: 0, error: Some(reason.into()) }
    }
}

/// Run one search against one airline with default configuration.
///
/// # Example
/// ```no_run
/// use flypoints::{scrape_flights, Airline, SearchQuery};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let query = SearchQuery::parse("Delhi", "Mumbai", "2026-09-15")?;
/// let outcome = scrape_flights(Airline::SpiceJet, query).await?;
/// println!("Found {} flights", outcome.count);
/// # Ok(())
/// # }
/// ```
pub async fn scrape_flights(
    airline: Airline,
    query: SearchQuery,
) -> Result<ScrapeOutcome, FlightError> {
    let scraper = FlightScraper::new(airline, ScraperConfig::default());
    scraper.scrape(query).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_starts_unviable() {
        let record = FlightRecord::new("SpiceJet");
        assert_eq!(record.flight_number, NA);
        assert!(!record.is_viable());
    }

    #[test]
    fn test_viability_requires_flight_number() {
        let mut record = FlightRecord::new("SpiceJet");
        record.departure_time = "10:00".to_string();
        record.arrival_time = "12:30".to_string();
        assert!(!record.is_viable());

        record.flight_number = "SG 123".to_string();
        assert!(record.is_viable());
    }

    #[test]
    fn test_viability_with_price_only() {
        let mut record = FlightRecord::new("IndiGo");
        record.flight_number = "6E 202".to_string();
        assert!(!record.is_viable());

        record.price = "₹4,500".to_string();
        assert!(record.is_viable());
    }

    #[test]
    fn test_fare_class_price_counts_as_price() {
        let mut record = FlightRecord::new("SpiceJet");
        record.flight_number = "SG 123".to_string();
        record
            .price_by_fare_class
            .insert("SpiceSaver".to_string(), "₹5,099".to_string());
        assert!(record.has_price());
        assert!(record.is_viable());
    }

    #[test]
    fn test_fill_schedule_never_overwrites() {
        let mut dom = FlightRecord::new("SpiceJet");
        dom.flight_number = "SG 123".to_string();
        dom.departure_time = "10:00".to_string();
        dom.price = "₹4,500".to_string();

        let mut api = FlightRecord::new("SpiceJet");
        api.flight_number = "SG 123".to_string();
        api.departure_time = "10:05".to_string();
        api.arrival_time = "12:30".to_string();
        api.duration = "2h 25m".to_string();

        dom.fill_schedule_from(&api);
        assert_eq!(dom.departure_time, "10:00"); // known field kept
        assert_eq!(dom.arrival_time, "12:30"); // N/A filled
        assert_eq!(dom.duration, "2h 25m");
        assert_eq!(dom.price, "₹4,500"); // commercial fields untouched
    }

    #[test]
    fn test_query_parse_normalizes_input() {
        let query = SearchQuery::parse("Delhi", "BOM", "2030-01-15").unwrap();
        assert_eq!(query.origin, "DEL");
        assert_eq!(query.destination, "BOM");
        assert_eq!(query.date, "2030-01-15");
    }

    #[test]
    fn test_query_parse_rejects_unknown_city() {
        assert!(matches!(
            SearchQuery::parse("Atlantis", "BOM", "2030-01-15"),
            Err(FlightError::CityNotFound(_))
        ));
    }
}
