//! Static page-source extraction
//!
//! Fallback path for when the live DOM pass comes up empty: the saved page
//! source is parsed offline. Sites whose results survive in the HTML get a
//! structured card parse (Etihad's Angular bound cards); everything else goes
//! through the same text gates as the live extractor, container by container.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::normalize::{dedup_in_order, is_unavailable_marker, TextPatterns};
use crate::profile::AirlineProfile;
use crate::{FlightError, FlightRecord, NA};

const MAX_CARDS: usize = 20;
const MAX_ANCESTOR_DEPTH: usize = 10;

/// Pre-compiled selectors for one profile's static extraction.
pub struct PageSourceExtractor<'a> {
    profile: &'static AirlineProfile,
    patterns: &'a TextPatterns,
    container: Selector,
    cards: Option<CardSelectorSet>,
    fare_markers: Vec<(&'static str, Selector)>,
}

struct CardSelectorSet {
    card: Selector,
    flight_number: Selector,
    departure_time: Selector,
    arrival_time: Selector,
    duration: Selector,
    price: Selector,
}

impl<'a> PageSourceExtractor<'a> {
    pub fn new(
        profile: &'static AirlineProfile,
        patterns: &'a TextPatterns,
    ) -> Result<Self, FlightError> {
        let cards = match profile.cards {
            Some(cards) => Some(CardSelectorSet {
                card: parse_selector(cards.card, "card")?,
                flight_number: parse_selector(cards.flight_number, "flight number")?,
                departure_time: parse_selector(cards.departure_time, "departure time")?,
                arrival_time: parse_selector(cards.arrival_time, "arrival time")?,
                duration: parse_selector(cards.duration, "duration")?,
                price: parse_selector(cards.price, "price")?,
            }),
            None => None,
        };
        let fare_markers = profile
            .fare_classes
            .iter()
            .map(|fare| Ok((fare.name, parse_selector(fare.marker, "fare marker")?)))
            .collect::<Result<Vec<_>, FlightError>>()?;

        Ok(Self {
            profile,
            patterns,
            container: parse_selector(profile.container_selector, "container")?,
            cards,
            fare_markers,
        })
    }

    /// Parse flights out of saved page source. Empty result is valid.
    pub fn extract(&self, html: &str) -> Vec<FlightRecord> {
        let document = Html::parse_document(html);

        let mut flights = if self.cards.is_some() {
            self.extract_cards(&document)
        } else {
            Vec::new()
        };
        if flights.is_empty() {
            flights = self.extract_containers(&document);
        }
        flights
    }

    /// Structured card parse for sites with stable result markup.
    fn extract_cards(&self, document: &Html) -> Vec<FlightRecord> {
        let Some(selectors) = &self.cards else {
            return Vec::new();
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut flights = Vec::new();

        for card in document.select(&selectors.card).take(MAX_CARDS) {
            let mut record = FlightRecord::new(self.profile.display_name);

            // Connecting itineraries render one flight-number span per leg.
            let mut numbers: Vec<String> = Vec::new();
            for span in card.select(&selectors.flight_number) {
                if let Some(number) = self.patterns.flight_number_in(&element_text(&span)) {
                    if !numbers.contains(&number) {
                        numbers.push(number);
                    }
                }
            }
            if !numbers.is_empty() {
                record.flight_number = numbers.join(", ");
            }

            if let Some(el) = card.select(&selectors.departure_time).next() {
                record.departure_time = element_text(&el);
            }
            if let Some(el) = card.select(&selectors.arrival_time).next() {
                record.arrival_time = element_text(&el);
            }
            if let Some(el) = card.select(&selectors.duration).next() {
                if let Some(duration) = self.patterns.duration_in(&element_text(&el)) {
                    record.duration = duration;
                }
            }
            if let Some(el) = card.select(&selectors.price).next() {
                let digits: String = element_text(&el)
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == ',')
                    .collect();
                let magnitude: i64 = digits.replace(',', "").parse().unwrap_or(0);
                if magnitude >= self.profile.min_price {
                    record.price = format!("{}{}", self.profile.currency_symbol, digits);
                }
            }

            // Cards without times in their dedicated slots sometimes carry
            // them in loose text.
            if !record.has_times() {
                let times = self.patterns.times_in(&element_text(&card));
                if times.len() >= 2 {
                    record.departure_time = times[0].clone();
                    record.arrival_time = times[1].clone();
                }
            }

            if record.is_viable() && seen.insert(record.identity_key()) {
                debug!(flight = %record.flight_number, "extracted flight from page source card");
                flights.push(record);
            }
        }

        flights
    }

    /// Generic container scan with the live extractor's text gates.
    fn extract_containers(&self, document: &Html) -> Vec<FlightRecord> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut flights = Vec::new();

        for container in document.select(&self.container) {
            let text = element_text(&container);
            if text.len() < 30 {
                continue;
            }
            let Some(flight_number) = self.patterns.flight_number_in(&text) else {
                continue;
            };
            if !self.profile.fare_classes.is_empty()
                && self.patterns.prices_in(&text, 1).is_empty()
            {
                continue;
            }
            let times = self.patterns.times_in(&text);
            if times.len() < 2 {
                continue;
            }
            let key = format!("{}_{}_{}", flight_number, times[0], times[1]);
            if !seen.insert(key) {
                continue;
            }

            let mut record = FlightRecord::new(self.profile.display_name);
            record.flight_number = flight_number;
            record.departure_time = times[0].clone();
            record.arrival_time = times[1].clone();
            if let Some(duration) = self.patterns.duration_in(&text) {
                record.duration = duration;
            }

            if self.fare_markers.is_empty() {
                if let Some(price) = self
                    .patterns
                    .prices_in(&text, self.profile.min_price)
                    .into_iter()
                    .next()
                {
                    record.price = price;
                }
                if let Some(points) = self.patterns.points_in(&text).into_iter().next() {
                    record.points = points;
                }
            } else {
                self.extract_fares(&container, &text, &mut record);
            }

            if record.is_viable() {
                flights.push(record);
            }
        }

        flights
    }

    fn extract_fares(&self, container: &ElementRef, container_text: &str, record: &mut FlightRecord) {
        for (name, marker) in &self.fare_markers {
            record
                .price_by_fare_class
                .entry((*name).to_string())
                .or_insert_with(|| NA.to_string());
            record
                .points_by_fare_class
                .entry((*name).to_string())
                .or_insert_with(|| NA.to_string());

            let Some(element) = container.select(marker).next() else {
                continue;
            };
            let Some(cell_text) = self.fare_cell_text(&element) else {
                continue;
            };
            if is_unavailable_marker(&cell_text)
                || cell_text.to_lowercase().contains("not available")
            {
                debug!(flight = %record.flight_number, fare = name, "fare marked unavailable");
                continue;
            }
            if let Some(price) = self
                .patterns
                .prices_in(&cell_text, self.profile.min_price)
                .into_iter()
                .next()
            {
                record.price_by_fare_class.insert((*name).to_string(), price);
            }
            if let Some(points) = self.patterns.points_in(&cell_text).into_iter().next() {
                record.points_by_fare_class.insert((*name).to_string(), points);
            }
        }

        let missing = self
            .fare_markers
            .iter()
            .any(|(name, _)| record.price_by_fare_class.get(*name).map(String::as_str) == Some(NA));
        if missing {
            let prices = dedup_in_order(self.patterns.prices_in(container_text, self.profile.min_price));
            let points = dedup_in_order(self.patterns.points_in(container_text));
            let price_slots = if prices.len() >= self.fare_markers.len() {
                prices.len()
            } else {
                prices.len().min(1)
            };
            for ((name, _), price) in self.fare_markers.iter().zip(prices.into_iter().take(price_slots)) {
                let slot = record
                    .price_by_fare_class
                    .entry((*name).to_string())
                    .or_insert_with(|| NA.to_string());
                if slot.as_str() == NA {
                    *slot = price;
                }
            }
            let point_slots = if points.len() >= self.fare_markers.len() {
                points.len()
            } else {
                points.len().min(1)
            };
            for ((name, _), value) in self.fare_markers.iter().zip(points.into_iter().take(point_slots)) {
                let slot = record
                    .points_by_fare_class
                    .entry((*name).to_string())
                    .or_insert_with(|| NA.to_string());
                if slot.as_str() == NA {
                    *slot = value;
                }
            }
        }

        for (name, _) in &self.fare_markers {
            if record.price == NA {
                if let Some(price) = record.price_by_fare_class.get(*name) {
                    if price != NA {
                        record.price = price.clone();
                    }
                }
            }
            if record.points == NA {
                if let Some(points) = record.points_by_fare_class.get(*name) {
                    if points != NA {
                        record.points = points.clone();
                    }
                }
            }
        }
    }

    /// Offline equivalent of the in-page ancestor walk: climb until an
    /// ancestor's text carries both a price symbol and the points keyword.
    fn fare_cell_text(&self, element: &ElementRef) -> Option<String> {
        for node in element.ancestors().take(MAX_ANCESTOR_DEPTH) {
            let Some(ancestor) = ElementRef::wrap(node) else {
                continue;
            };
            let text = element_text(&ancestor);
            if text.contains(self.profile.currency_symbol)
                && text.contains(self.profile.points_keyword)
            {
                return Some(text);
            }
            if is_unavailable_marker(&text) {
                return Some(text);
            }
        }
        ElementRef::wrap(element.parent()?).map(|parent| element_text(&parent))
    }
}

fn parse_selector(css: &str, what: &str) -> Result<Selector, FlightError> {
    Selector::parse(css)
        .map_err(|e| FlightError::ParseError(format!("Invalid {} selector: {}", what, e)))
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::TextPatterns;
    use crate::profile::{ETIHAD, SPICEJET};

    #[test]
    fn test_etihad_bound_cards() {
        let patterns = TextPatterns::new(&ETIHAD).unwrap();
        let extractor = PageSourceExtractor::new(&ETIHAD, &patterns).unwrap();
        let html = r#"
            <html><body>
            <ey-bound-card-new>
              <span class="flight-number">EY&nbsp;219&nbsp;</span>
              <time id="departureTime" class="bound-time">04:25</time>
              <time id="arrivalTime" class="bound-time">10:25</time>
              <span class="total-duration"> 7h 30m </span>
              <div class="cff-container cabin--blue cabin-1">
                <span class="price-amount">49,095</span>
              </div>
            </ey-bound-card-new>
            <ey-bound-card-new>
              <span class="flight-number">EY 213 </span>
              <span class="flight-number">EY 8867 </span>
              <time id="departureTime" class="bound-time">21:35</time>
              <time id="arrivalTime" class="bound-time">05:10</time>
              <span class="total-duration"> 9h 5m </span>
            </ey-bound-card-new>
            </body></html>
        "#;

        let flights = extractor.extract(html);
        assert_eq!(flights.len(), 2);
        assert_eq!(flights[0].flight_number, "EY 219");
        assert_eq!(flights[0].departure_time, "04:25");
        assert_eq!(flights[0].duration, "7h 30m");
        assert_eq!(flights[0].price, "₹49,095");
        // Connecting itinerary: both legs, comma-joined; no price rendered.
        assert_eq!(flights[1].flight_number, "EY 213, EY 8867");
        assert_eq!(flights[1].price, "N/A");
    }

    #[test]
    fn test_card_dedup_by_identity() {
        let patterns = TextPatterns::new(&ETIHAD).unwrap();
        let extractor = PageSourceExtractor::new(&ETIHAD, &patterns).unwrap();
        let card = r#"
            <ey-bound-card-new>
              <span class="flight-number">EY 219</span>
              <time id="departureTime">04:25</time>
              <time id="arrivalTime">10:25</time>
            </ey-bound-card-new>
        "#;
        let html = format!("<html><body>{}{}</body></html>", card, card);
        let flights = extractor.extract(&html);
        assert_eq!(flights.len(), 1);
    }

    #[test]
    fn test_generic_container_fallback() {
        let patterns = TextPatterns::new(&SPICEJET).unwrap();
        let extractor = PageSourceExtractor::new(&SPICEJET, &patterns).unwrap();
        let html = r#"
            <html><body>
            <div class="result-row">
              SG 8133 departs 06:10 arrives 08:25 in 2h 15m
              <span>₹5,099</span> <span>Earn 250</span>
              <span>₹6,299</span> <span>Earn 310</span>
              <span>₹7,499</span> <span>Earn 380</span>
            </div>
            <div class="footer">Terms and conditions apply to all bookings made today</div>
            </body></html>
        "#;

        let flights = extractor.extract(html);
        assert_eq!(flights.len(), 1);
        let flight = &flights[0];
        assert_eq!(flight.flight_number, "SG 8133");
        assert_eq!(flight.price_by_fare_class["SpiceSaver"], "₹5,099");
        assert_eq!(flight.price_by_fare_class["SpiceMax"], "₹7,499");
    }

    #[test]
    fn test_low_magnitude_price_rejected_in_card() {
        let patterns = TextPatterns::new(&ETIHAD).unwrap();
        let extractor = PageSourceExtractor::new(&ETIHAD, &patterns).unwrap();
        // A price slot showing a row index, not a fare.
        let html = r#"
            <html><body>
            <ey-bound-card-new>
              <span class="flight-number">EY 219</span>
              <time id="departureTime">04:25</time>
              <time id="arrivalTime">10:25</time>
              <div class="cabin--blue"><span class="price-amount">7</span></div>
            </ey-bound-card-new>
            </body></html>
        "#;
        let flights = extractor.extract(html);
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].price, "N/A");
    }
}
