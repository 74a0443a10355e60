//! Flight extraction from the rendered results page
//!
//! Scans the page's containers for flight-shaped text blocks. The precision
//! gate (flight-number pattern + price pattern + two clock times) is what
//! keeps calendars, banners and nav chrome out of the results; identity-key
//! deduplication keeps nested containers that re-render the same flight from
//! producing duplicates.

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, warn};

use crate::normalize::{dedup_in_order, is_unavailable_marker, TextPatterns};
use crate::profile::AirlineProfile;
use crate::session::{DomHandle, PageSession};
use crate::{FlightError, FlightRecord, NA};

/// Upper bound on containers examined per pass; the gate plus dedup make
/// anything past this noise.
const MAX_CONTAINERS: usize = 40;

/// Ancestor-walk depth bound for fare-cell lookup.
const MAX_ANCESTOR_DEPTH: usize = 10;

pub struct DomExtractor<'a> {
    profile: &'static AirlineProfile,
    patterns: &'a TextPatterns,
    calendar: Regex,
}

impl<'a> DomExtractor<'a> {
    pub fn new(
        profile: &'static AirlineProfile,
        patterns: &'a TextPatterns,
    ) -> Result<Self, FlightError> {
        Ok(Self {
            profile,
            patterns,
            // Date-picker cells carry flight-number-like digits; their text
            // leads with a weekday.
            calendar: Regex::new(r"(?i)^(Mon|Tue|Wed|Thu|Fri|Sat|Sun)\b")?,
        })
    }

    /// One pass over the rendered page. Finding nothing is a valid outcome.
    pub fn extract(&self, session: &dyn PageSession) -> Vec<FlightRecord> {
        let containers = session.query_all(self.profile.container_selector);
        let mut seen: HashSet<String> = HashSet::new();
        let mut flights = Vec::new();

        for handle in containers.into_iter().take(MAX_CONTAINERS) {
            let Some(text) = session.text(handle) else {
                continue;
            };
            if let Some(record) = self.record_from_container(session, handle, &text, &mut seen) {
                debug!(
                    flight = %record.flight_number,
                    departure = %record.departure_time,
                    "extracted flight from DOM"
                );
                flights.push(record);
            }
        }

        flights
    }

    fn record_from_container(
        &self,
        session: &dyn PageSession,
        handle: DomHandle,
        text: &str,
        seen: &mut HashSet<String>,
    ) -> Option<FlightRecord> {
        let trimmed = text.trim();
        if trimmed.len() < 30 || self.calendar.is_match(trimmed) {
            return None;
        }

        let flight_number = self.patterns.flight_number_in(text)?;
        // Fare-per-class pages always render prices next to the flight;
        // their absence marks an unrelated container. Single-price sites can
        // render the schedule before fares, so the price gate is waived and
        // the reconciler completes the record.
        let priced = self.patterns.prices_in(text, 1).len();
        if !self.profile.fare_classes.is_empty() && priced == 0 {
            return None;
        }
        let times = self.patterns.times_in(text);
        if times.len() < 2 {
            return None;
        }

        let key = format!("{}_{}_{}", flight_number, times[0], times[1]);
        if !seen.insert(key) {
            return None;
        }

        let mut record = FlightRecord::new(self.profile.display_name);
        record.flight_number = flight_number;
        record.departure_time = times[0].clone();
        record.arrival_time = times[1].clone();
        if let Some(duration) = self.patterns.duration_in(text) {
            record.duration = duration;
        }

        if self.profile.fare_classes.is_empty() {
            if let Some(price) = self
                .patterns
                .prices_in(text, self.profile.min_price)
                .into_iter()
                .next()
            {
                record.price = price;
            }
            if let Some(points) = self.patterns.points_in(text).into_iter().next() {
                record.points = points;
            }
        } else {
            self.extract_fares(session, handle, text, &mut record);
        }

        Some(record)
    }

    /// Per-fare-class price/points. Marker sub-elements are located first;
    /// classes whose marker is missing fall back to positional assignment
    /// over the container text.
    fn extract_fares(
        &self,
        session: &dyn PageSession,
        container: DomHandle,
        container_text: &str,
        record: &mut FlightRecord,
    ) {
        for fare in self.profile.fare_classes {
            record
                .price_by_fare_class
                .entry(fare.name.to_string())
                .or_insert_with(|| NA.to_string());
            record
                .points_by_fare_class
                .entry(fare.name.to_string())
                .or_insert_with(|| NA.to_string());

            let Some(marker) = session.query_within(container, fare.marker).into_iter().next()
            else {
                continue;
            };
            let Some(cell_text) = self.fare_cell_text(session, marker) else {
                continue;
            };

            if is_unavailable_marker(&cell_text)
                || cell_text.to_lowercase().contains("not available")
            {
                // Explicitly unavailable: keep the sentinel, never record the
                // marker text or a zero. Whether the fare is truly not
                // offered or merely not yet rendered is not reliably
                // distinguishable; note it and move on.
                debug!(
                    flight = %record.flight_number,
                    fare = fare.name,
                    "fare marked unavailable in DOM"
                );
                continue;
            }

            if let Some(price) = self
                .patterns
                .prices_in(&cell_text, self.profile.min_price)
                .into_iter()
                .next()
            {
                record
                    .price_by_fare_class
                    .insert(fare.name.to_string(), price);
            }
            if let Some(points) = self.patterns.points_in(&cell_text).into_iter().next() {
                record
                    .points_by_fare_class
                    .insert(fare.name.to_string(), points);
            }
        }

        let missing_price = self
            .profile
            .fare_classes
            .iter()
            .any(|f| record.price_by_fare_class.get(f.name).map(String::as_str) == Some(NA));
        if missing_price {
            self.positional_fares(container_text, record);
        }

        // The headline price/points mirror the first fare class with data.
        for fare in self.profile.fare_classes {
            if record.price == NA {
                if let Some(price) = record.price_by_fare_class.get(fare.name) {
                    if price != NA {
                        record.price = price.clone();
                    }
                }
            }
            if record.points == NA {
                if let Some(points) = record.points_by_fare_class.get(fare.name) {
                    if points != NA {
                        record.points = points.clone();
                    }
                }
            }
        }
    }

    /// Walk ancestors of a fare marker (bounded depth, in-page) until one
    /// contains both a price symbol and the points keyword, and return its
    /// text. Runs inside the page: one round-trip instead of ten.
    fn fare_cell_text(&self, session: &dyn PageSession, marker: DomHandle) -> Option<String> {
        let function = format!(
            r#"function() {{
                let current = this.parentElement;
                for (let i = 0; i < {depth} && current; i++) {{
                    let text = current.innerText || '';
                    if (text.includes('{symbol}') && text.includes('{keyword}')) {{
                        return text;
                    }}
                    if (/n\/a|not available/i.test(text)) {{
                        return text;
                    }}
                    current = current.parentElement;
                }}
                return (this.parentElement && this.parentElement.innerText) || '';
            }}"#,
            depth = MAX_ANCESTOR_DEPTH,
            symbol = self.profile.currency_symbol,
            keyword = self.profile.points_keyword,
        );
        match session.eval_on(marker, &function) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            Some(_) => None,
            None => {
                warn!("fare-cell ancestor walk returned nothing");
                None
            }
        }
    }

    /// Positional fallback: prices and points in document order are assigned
    /// to fare classes in display order, filling only unknown slots.
    fn positional_fares(&self, text: &str, record: &mut FlightRecord) {
        let prices = dedup_in_order(self.patterns.prices_in(text, self.profile.min_price));
        let points = dedup_in_order(self.patterns.points_in(text));

        // A partial price row cannot be aligned to classes reliably; with a
        // full set assign all, otherwise only the first (cheapest) class.
        let price_slots = if prices.len() >= self.profile.fare_classes.len() {
            prices.len()
        } else {
            prices.len().min(1)
        };
        for (fare, price) in self.profile.fare_classes.iter().zip(prices.into_iter().take(price_slots)) {
            let slot = record
                .price_by_fare_class
                .entry(fare.name.to_string())
                .or_insert_with(|| NA.to_string());
            if slot.as_str() == NA {
                *slot = price;
            }
        }
        let point_slots = if points.len() >= self.profile.fare_classes.len() {
            points.len()
        } else {
            points.len().min(1)
        };
        for (fare, value) in self.profile.fare_classes.iter().zip(points.into_iter().take(point_slots)) {
            let slot = record
                .points_by_fare_class
                .entry(fare.name.to_string())
                .or_insert_with(|| NA.to_string());
            if slot.as_str() == NA {
                *slot = value;
            }
        }
    }
}
