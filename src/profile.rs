//! Per-airline extraction profiles
//!
//! The pipeline is airline-agnostic; everything site-specific (URL shape,
//! carrier codes, fare-class DOM markers, capture heuristics) lives here.

use std::str::FromStr;

use crate::{FlightError, SearchQuery};

/// Supported booking sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Airline {
    SpiceJet,
    IndiGo,
    Etihad,
}

impl FromStr for Airline {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spicejet" | "sg" => Ok(Airline::SpiceJet),
            "indigo" | "6e" => Ok(Airline::IndiGo),
            "etihad" | "ey" => Ok(Airline::Etihad),
            _ => Err(FlightError::UnknownAirline(s.to_string())),
        }
    }
}

impl Airline {
    pub fn profile(&self) -> &'static AirlineProfile {
        match self {
            Airline::SpiceJet => &SPICEJET,
            Airline::IndiGo => &INDIGO,
            Airline::Etihad => &ETIHAD,
        }
    }
}

/// A named pricing tier for the same physical flight, located in the DOM by
/// a marker selector scoped to the flight container.
#[derive(Debug, Clone, Copy)]
pub struct FareClass {
    pub name: &'static str,
    pub marker: &'static str,
}

/// Structured selectors for the static page-source extractor, for sites
/// whose results survive in the HTML source (Angular bound cards on Etihad).
#[derive(Debug, Clone, Copy)]
pub struct CardSelectors {
    pub card: &'static str,
    pub flight_number: &'static str,
    pub departure_time: &'static str,
    pub arrival_time: &'static str,
    pub duration: &'static str,
    pub price: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct AirlineProfile {
    pub airline: Airline,
    pub display_name: &'static str,
    /// Substring a response URL must contain (with "api") to be captured.
    pub domain_hint: &'static str,
    /// Carrier-code prefixes for flight-number patterns, e.g. SG 123.
    pub carrier_codes: &'static [&'static str],
    pub currency_symbol: &'static str,
    /// Keyword preceding loyalty-point values in rendered text.
    pub points_keyword: &'static str,
    /// Fare classes in display order; empty for single-price airlines.
    pub fare_classes: &'static [FareClass],
    /// Containers scanned by the DOM text extractor.
    pub container_selector: &'static str,
    /// Selectors polled after navigation to detect that results rendered.
    pub result_markers: &'static [&'static str],
    /// Structured card selectors for the static extractor, when available.
    pub cards: Option<CardSelectors>,
    /// Minimum numeric magnitude for a value to count as a price, after
    /// stripping symbol and separators. Filters out flight numbers and times
    /// picked up by free-text scans.
    pub min_price: i64,
}

impl AirlineProfile {
    /// Build the search-results URL for one query.
    pub fn search_url(&self, query: &SearchQuery) -> String {
        match self.airline {
            Airline::SpiceJet => format!(
                "https://www.spicejet.com/search?from={}&to={}&tripType=1&departure={}\
                 &adult=1&child=0&srCitizen=0&infant=0&currency=INR&redirectTo=/",
                query.origin, query.destination, query.date
            ),
            Airline::IndiGo => format!(
                "https://www.goindigo.in/flight-booking.html?from={}&to={}&departure={}",
                query.origin, query.destination, query.date
            ),
            Airline::Etihad => {
                // Etihad encodes the date as YYYYMMDD0000.
                let compact: String = query.date.chars().filter(|c| c.is_ascii_digit()).collect();
                format!(
                    "https://digital.etihad.com/book/search?LANGUAGE=EN&CHANNEL=DESKTOP\
                     &B_LOCATION={}&E_LOCATION={}&TRIP_TYPE=O&CABIN=E&TRAVELERS=ADT\
                     &TRIP_FLOW_TYPE=AVAILABILITY&SITE_EDITION=EN-IN&DATE_1={}0000&FLOW=REVENUE",
                    query.origin, query.destination, compact
                )
            }
        }
    }
}

pub static SPICEJET: AirlineProfile = AirlineProfile {
    airline: Airline::SpiceJet,
    display_name: "SpiceJet",
    domain_hint: "spicejet",
    carrier_codes: &["SG", "UK"],
    currency_symbol: "₹",
    points_keyword: "Earn",
    fare_classes: &[
        FareClass { name: "SpiceSaver", marker: "[data-testid*='spicesaver-flight-select-radio-button']" },
        FareClass { name: "SpiceFlex", marker: "[data-testid*='spiceflex-flight-select-radio-button']" },
        FareClass { name: "SpiceMax", marker: "[data-testid*='spicemax-flight-select-radio-button']" },
    ],
    container_selector: "div",
    result_markers: &["[data-testid*='flight-select-radio-button']", "#fare-bundle-val"],
    cards: None,
    min_price: 100,
};

pub static INDIGO: AirlineProfile = AirlineProfile {
    airline: Airline::IndiGo,
    display_name: "IndiGo",
    domain_hint: "goindigo",
    carrier_codes: &["6E"],
    currency_symbol: "₹",
    points_keyword: "Earn",
    fare_classes: &[
        FareClass { name: "Economy", marker: ".economy-class-item" },
        FareClass { name: "Business", marker: ".business-class-item" },
    ],
    container_selector: ".srp__search-result-list__item, div[class*='flight-card'], div[class*='flight-result']",
    result_markers: &[".srp__search-result-list__item"],
    cards: None,
    min_price: 1000,
};

pub static ETIHAD: AirlineProfile = AirlineProfile {
    airline: Airline::Etihad,
    display_name: "Etihad Airways",
    domain_hint: "etihad",
    carrier_codes: &["EY"],
    currency_symbol: "₹",
    points_keyword: "miles",
    fare_classes: &[],
    container_selector: "ey-bound-card-new, ey-bound-card",
    result_markers: &["ey-bound-card-new", "ey-bound-card"],
    cards: Some(CardSelectors {
        card: "ey-bound-card-new, ey-bound-card",
        flight_number: "span.flight-number",
        departure_time: "time#departureTime",
        arrival_time: "time#arrivalTime",
        duration: "span.total-duration",
        price: "div[class*='cabin--blue'] span.price-amount, div[class*='cabin-1'] span.price-amount",
    }),
    min_price: 100,
};
