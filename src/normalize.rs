//! Canonical field extraction from raw records
//!
//! One raw item is either a JSON object captured from the search API or a
//! text blob lifted from a rendered flight container. Both are reduced to the
//! same canonical [`FlightRecord`] through ordered fallback chains: for every
//! field a fixed list of key aliases / patterns is tried and the first match
//! wins. A field that resists extraction stays `"N/A"`; it never aborts the
//! record, and a bad record never aborts the batch.

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::profile::AirlineProfile;
use crate::{FlightError, FlightRecord, NA};

const FLIGHT_NUMBER_KEYS: &[&str] = &[
    "flightNumber",
    "flight_number",
    "flightNo",
    "flight_no",
    "carrierString",
    "carrier_string",
];

const DEPARTURE_KEYS: &[&str] = &[
    "departureTime",
    "departure_time",
    "depTime",
    "dep_time",
    "departure",
    "dep",
    "std",
    "scheduledDepartureTime",
];

const ARRIVAL_KEYS: &[&str] = &[
    "arrivalTime",
    "arrival_time",
    "arrTime",
    "arr_time",
    "arrival",
    "arr",
    "sta",
    "scheduledArrivalTime",
];

const DURATION_KEYS: &[&str] = &[
    "flightDuration",
    "duration",
    "flight_duration",
    "time",
    "journeyTime",
    "flightTime",
];

const PRICE_KEYS: &[&str] = &[
    "totalFare",
    "baseFare",
    "fare",
    "price",
    "amount",
    "adultFare",
    "totalPrice",
    "total_price",
];

const POINTS_KEYS: &[&str] = &[
    "points",
    "loyaltyPoints",
    "awardPoints",
    "rewardPoints",
    "miles",
];

/// Pre-compiled text patterns for one airline profile. Compiling up front
/// keeps the per-container extraction loops allocation-light and surfaces a
/// malformed pattern as a constructor error instead of a runtime one.
pub struct TextPatterns {
    pub flight_number: Regex,
    pub connecting: Regex,
    pub time: Regex,
    pub duration: Regex,
    pub price: Regex,
    pub points: Regex,
    pub currency_symbol: &'static str,
    pub points_keyword: &'static str,
}

impl TextPatterns {
    pub fn new(profile: &AirlineProfile) -> Result<Self, FlightError> {
        let codes = profile.carrier_codes.join("|");
        let symbol = regex::escape(profile.currency_symbol);
        let keyword = regex::escape(profile.points_keyword);
        Ok(Self {
            flight_number: Regex::new(&format!(r"(?i)\b({})\s*(\d{{3,4}})\b", codes))?,
            connecting: Regex::new(&format!(
                r"(?i)\b({codes})\s*(\d{{3,4}})\s*,\s*({codes})\s*(\d{{3,4}})\b",
                codes = codes
            ))?,
            time: Regex::new(r"\b(\d{1,2}):(\d{2})\b")?,
            duration: Regex::new(r"(?i)\b(\d+)\s*h(?:r)?\s*(\d+)\s*m(?:in)?\b")?,
            price: Regex::new(&format!(r"{}\s*([\d,]+)", symbol))?,
            points: Regex::new(&format!(r"(?i){}\s*(\d{{1,3}}(?:,\d{{3}})*|\d+)", keyword))?,
            currency_symbol: profile.currency_symbol,
            points_keyword: profile.points_keyword,
        })
    }

    /// Flight number from free text: a connecting `SG 123, SG 456` pair when
    /// present, otherwise the first single match.
    pub fn flight_number_in(&self, text: &str) -> Option<String> {
        if let Some(caps) = self.connecting.captures(text) {
            return Some(format!(
                "{} {}, {} {}",
                caps[1].to_uppercase(),
                &caps[2],
                caps[3].to_uppercase(),
                &caps[4]
            ));
        }
        self.flight_number.captures(text).map(|caps| {
            format!("{} {}", caps[1].to_uppercase(), &caps[2])
        })
    }

    /// All `HH:MM` tokens in document order, hours zero-padded so DOM and
    /// API times compare equal.
    pub fn times_in(&self, text: &str) -> Vec<String> {
        self.time
            .captures_iter(text)
            .map(|caps| format!("{:0>2}:{}", &caps[1], &caps[2]))
            .collect()
    }

    pub fn duration_in(&self, text: &str) -> Option<String> {
        self.duration
            .captures(text)
            .map(|caps| format!("{}h {}m", &caps[1], &caps[2]))
    }

    /// All currency amounts in document order, grouped as rendered, filtered
    /// by the profile's minimum plausible magnitude.
    pub fn prices_in(&self, text: &str, min_price: i64) -> Vec<String> {
        self.price
            .captures_iter(text)
            .filter_map(|caps| {
                let raw = caps.get(1)?.as_str().trim_matches(',');
                let magnitude: i64 = digits_only(raw).parse().ok()?;
                if magnitude >= min_price {
                    Some(format!("{}{}", self.currency_symbol, raw))
                } else {
                    None
                }
            })
            .collect()
    }

    /// All loyalty-point values in document order, separators stripped.
    pub fn points_in(&self, text: &str) -> Vec<String> {
        self.points
            .captures_iter(text)
            .map(|caps| digits_only(&caps[1]))
            .collect()
    }
}

/// Recognizes an explicit unavailability marker next to a fare. Distinct from
/// "nothing found": both end as `"N/A"`, but this one must suppress any price
/// text that would otherwise be scraped from the same ancestor.
pub fn is_unavailable_marker(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    lowered == "n/a" || lowered.contains("not available")
}

/// Digits of `s` with every separator, symbol and space removed.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// First occurrence of each value, document order preserved. Fare rows often
/// repeat the same amount in nested nodes.
pub fn dedup_in_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

/// Render an integer amount with thousands separators and the currency
/// symbol, matching how the sites render fares.
pub fn format_price(amount: i64, symbol: &str) -> String {
    format!("{}{}", symbol, group_thousands(amount))
}

fn group_thousands(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Normalize a raw time value to `HH:MM`. Pass-through if already clocklike,
/// ISO-8601 timestamps are reduced to their clock time, and anything
/// unparseable is kept verbatim rather than erased.
pub fn normalize_time(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NA.to_string();
    }
    if let Some((h, m)) = clock_parts(trimmed) {
        return format!("{:02}:{:02}", h, m);
    }
    if trimmed.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return dt.format("%H:%M").to_string();
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
            return dt.format("%H:%M").to_string();
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return dt.format("%H:%M").to_string();
    }
    trimmed.to_string()
}

fn clock_parts(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    if h.len() > 2 || m.len() != 2 {
        return None;
    }
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    if hours < 24 && minutes < 60 {
        Some((hours, minutes))
    } else {
        None
    }
}

/// Normalize a raw duration value: already-shaped strings pass through,
/// bare minute counts are rendered as `"<h>h <m>m"`.
pub fn normalize_duration(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NA.to_string();
    }
    if trimmed.to_lowercase().contains('h') {
        return trimmed.to_string();
    }
    if let Ok(minutes) = trimmed.parse::<i64>() {
        return format!("{}h {}m", minutes / 60, minutes % 60);
    }
    trimmed.to_string()
}

/// Derive duration from a departure/arrival clock pair, rolling over +24h
/// when the arrival reads earlier than the departure (red-eye flights).
pub fn duration_from_times(departure: &str, arrival: &str) -> Option<String> {
    let (dh, dm) = clock_parts(departure)?;
    let (ah, am) = clock_parts(arrival)?;
    let dep_minutes = (dh * 60 + dm) as i64;
    let mut arr_minutes = (ah * 60 + am) as i64;
    if arr_minutes < dep_minutes {
        arr_minutes += 24 * 60;
    }
    let total = arr_minutes - dep_minutes;
    Some(format!("{}h {}m", total / 60, total % 60))
}

/// Extract one canonical record from a raw API object. Returns `None` when
/// the minimum-viability invariant is not met; the caller keeps going with
/// the rest of the batch either way.
pub fn record_from_json(profile: &AirlineProfile, item: &Value) -> Option<FlightRecord> {
    let map = item.as_object()?;
    let mut record = FlightRecord::new(profile.display_name);

    if let Some(number) = json_flight_number(item) {
        record.flight_number = number;
    }

    if let Some(raw) = first_string(map, DEPARTURE_KEYS)
        .or_else(|| segment_time(item, DEPARTURE_KEYS, true))
    {
        record.departure_time = normalize_time(&raw);
    }
    if let Some(raw) = first_string(map, ARRIVAL_KEYS)
        .or_else(|| segment_time(item, ARRIVAL_KEYS, false))
    {
        record.arrival_time = normalize_time(&raw);
    }

    if let Some(raw) = first_string(map, DURATION_KEYS) {
        record.duration = normalize_duration(&raw);
    } else if record.has_times() {
        if let Some(derived) = duration_from_times(&record.departure_time, &record.arrival_time) {
            record.duration = derived;
        }
    }

    if let Some(price) = json_price(profile, item) {
        record.price = price;
    }
    if let Some(points) = first_value(map, POINTS_KEYS).and_then(|v| points_value(&v)) {
        record.points = points;
    }

    if record.is_viable() {
        Some(record)
    } else {
        debug!(flight = %record.flight_number, "raw record below viability, dropped");
        None
    }
}

fn json_flight_number(item: &Value) -> Option<String> {
    let map = item.as_object()?;

    for key in FLIGHT_NUMBER_KEYS {
        if let Some(number) = map.get(*key).and_then(scalar_string) {
            if !number.is_empty() && number != NA {
                return Some(number);
            }
        }
    }

    // Connecting itineraries carry the number on the first segment.
    if let Some(first) = map.get("segments").and_then(Value::as_array).and_then(|s| s.first()) {
        if let Some(identifier) = first.get("identifier") {
            let carrier = identifier
                .get("carrierCode")
                .and_then(Value::as_str)
                .unwrap_or("");
            let number = identifier
                .get("identifier")
                .and_then(|v| scalar_string(v))
                .unwrap_or_default();
            if !carrier.is_empty() && !number.is_empty() {
                return Some(format!("{} {}", carrier, number));
            }
            if !number.is_empty() {
                return Some(number);
            }
        }
    }

    if let Some(designator) = map.get("designator").and_then(Value::as_str) {
        let trimmed = designator.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    None
}

fn segment_time(item: &Value, keys: &[&str], first: bool) -> Option<String> {
    let segments = item.get("segments")?.as_array()?;
    let segment = if first { segments.first()? } else { segments.last()? };
    first_string(segment.as_object()?, keys)
}

fn json_price(profile: &AirlineProfile, item: &Value) -> Option<String> {
    if let Some(fares) = item.get("fares") {
        match fares {
            // A fare list carries amounts on its first entry.
            Value::Array(list) => {
                if let Some(fare) = list.first() {
                    if let Some(price) = price_from_aliases(profile, fare) {
                        return Some(price);
                    }
                }
            }
            // A fare *map* only proves a fare class exists; the amounts
            // arrive on the rendered page, so the price stays unknown here.
            Value::Object(_) => {}
            _ => {}
        }
    }
    price_from_aliases(profile, item)
}

fn price_from_aliases(profile: &AirlineProfile, item: &Value) -> Option<String> {
    let map = item.as_object()?;
    for key in PRICE_KEYS {
        match map.get(*key) {
            Some(Value::Number(n)) => {
                let amount = n.as_f64()? as i64;
                if amount >= profile.min_price {
                    return Some(format_price(amount, profile.currency_symbol));
                }
            }
            Some(Value::String(s)) => {
                let stripped: String = s
                    .chars()
                    .filter(|c| !matches!(c, '₹' | ',' | '.' | ' ') && !c.is_alphabetic())
                    .collect();
                if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
                    let amount: i64 = stripped.parse().ok()?;
                    if amount >= profile.min_price {
                        return Some(format_price(amount, profile.currency_symbol));
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn points_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.as_i64()?.to_string()),
        Value::String(s) => {
            let digits = digits_only(s);
            if digits.is_empty() {
                None
            } else {
                Some(digits)
            }
        }
        _ => None,
    }
}

fn first_string(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(|v| scalar_string(v)))
        .filter(|s| !s.is_empty())
}

fn first_value(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter().find_map(|key| map.get(*key).cloned())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ETIHAD, INDIGO, SPICEJET};
    use serde_json::json;

    fn patterns() -> TextPatterns {
        TextPatterns::new(&SPICEJET).unwrap()
    }

    #[test]
    fn test_flight_number_in_text() {
        let p = patterns();
        assert_eq!(p.flight_number_in("SG 8133 Non-stop"), Some("SG 8133".to_string()));
        assert_eq!(p.flight_number_in("sg8133"), Some("SG 8133".to_string()));
        assert_eq!(p.flight_number_in("no flights here"), None);
    }

    #[test]
    fn test_connecting_flight_number() {
        let p = patterns();
        assert_eq!(
            p.flight_number_in("SG 123, SG 456 via BOM"),
            Some("SG 123, SG 456".to_string())
        );
    }

    #[test]
    fn test_times_and_duration_in_text() {
        let p = patterns();
        assert_eq!(p.times_in("06:10 → 08:25"), vec!["06:10", "08:25"]);
        assert_eq!(p.duration_in("2h 15m non-stop"), Some("2h 15m".to_string()));
        assert_eq!(p.duration_in("2 hr 15 min"), Some("2h 15m".to_string()));
    }

    #[test]
    fn test_prices_respect_minimum_magnitude() {
        let p = patterns();
        // 45 is a row number or similar, not a fare.
        let prices = p.prices_in("₹ 45 seat ₹4,500 fare", 100);
        assert_eq!(prices, vec!["₹4,500"]);
    }

    #[test]
    fn test_points_in_text() {
        let p = patterns();
        assert_eq!(p.points_in("+ Earn 736 BluChips"), vec!["736"]);
        assert_eq!(p.points_in("Earn 1,250"), vec!["1250"]);
    }

    #[test]
    fn test_unavailable_marker() {
        assert!(is_unavailable_marker("N/A"));
        assert!(is_unavailable_marker(" not available "));
        assert!(is_unavailable_marker("Not Available"));
        assert!(!is_unavailable_marker("₹4,500"));
    }

    #[test]
    fn test_normalize_time_variants() {
        assert_eq!(normalize_time("9:05"), "09:05");
        assert_eq!(normalize_time("23:50"), "23:50");
        assert_eq!(normalize_time("2025-01-01T10:00:00"), "10:00");
        assert_eq!(normalize_time("2025-01-01T10:00:00Z"), "10:00");
        assert_eq!(normalize_time("2025-01-01T10:00:00+05:30"), "10:00");
        // Unparseable values are kept, not erased.
        assert_eq!(normalize_time("morning"), "morning");
    }

    #[test]
    fn test_normalize_duration_variants() {
        assert_eq!(normalize_duration("2h 30m"), "2h 30m");
        assert_eq!(normalize_duration("150"), "2h 30m");
        assert_eq!(normalize_duration("95"), "1h 35m");
    }

    #[test]
    fn test_duration_wraparound() {
        assert_eq!(duration_from_times("23:50", "01:20"), Some("1h 30m".to_string()));
        assert_eq!(duration_from_times("10:00", "12:30"), Some("2h 30m".to_string()));
        assert_eq!(duration_from_times("N/A", "12:30"), None);
    }

    #[test]
    fn test_format_price_grouping() {
        assert_eq!(format_price(4500, "₹"), "₹4,500");
        assert_eq!(format_price(999, "₹"), "₹999");
        assert_eq!(format_price(1234567, "₹"), "₹1,234,567");
    }

    #[test]
    fn test_record_from_flat_object() {
        let item = json!({
            "flightNumber": "SG 123",
            "departureTime": "2025-01-01T10:00:00",
            "arrivalTime": "2025-01-01T12:30:00",
            "totalFare": 4500
        });
        let record = record_from_json(&SPICEJET, &item).unwrap();
        assert_eq!(record.flight_number, "SG 123");
        assert_eq!(record.departure_time, "10:00");
        assert_eq!(record.arrival_time, "12:30");
        assert_eq!(record.duration, "2h 30m"); // derived
        assert_eq!(record.price, "₹4,500");
    }

    #[test]
    fn test_record_from_segments() {
        let item = json!({
            "segments": [
                {
                    "identifier": {"carrierCode": "SG", "identifier": "123"},
                    "std": "2025-01-01T23:50:00"
                },
                {
                    "identifier": {"carrierCode": "SG", "identifier": "456"},
                    "sta": "2025-01-02T01:20:00"
                }
            ]
        });
        let record = record_from_json(&SPICEJET, &item).unwrap();
        assert_eq!(record.flight_number, "SG 123");
        assert_eq!(record.departure_time, "23:50");
        assert_eq!(record.arrival_time, "01:20");
        assert_eq!(record.duration, "1h 30m"); // wraparound derivation
    }

    #[test]
    fn test_record_string_price_stripped() {
        let item = json!({
            "flightNumber": "6E 202",
            "departureTime": "08:00",
            "arrivalTime": "10:15",
            "price": "Rs. 3,999"
        });
        let record = record_from_json(&INDIGO, &item).unwrap();
        assert_eq!(record.price, "₹3,999");
    }

    #[test]
    fn test_fares_map_leaves_price_unknown() {
        // SpiceJet availability payloads list fare codes without amounts.
        let item = json!({
            "flightNumber": "SG 8133",
            "departureTime": "10:00",
            "arrivalTime": "12:30",
            "fares": {"SAVER": {}, "FLEX": {}}
        });
        let record = record_from_json(&SPICEJET, &item).unwrap();
        assert_eq!(record.price, NA);
    }

    #[test]
    fn test_fares_list_first_entry_wins() {
        let item = json!({
            "flightNumber": "EY 219",
            "fares": [{"totalFare": 49095}, {"totalFare": 98000}],
            "departureTime": "04:25",
            "arrivalTime": "10:25"
        });
        let record = record_from_json(&ETIHAD, &item).unwrap();
        assert_eq!(record.price, "₹49,095");
    }

    #[test]
    fn test_unviable_record_dropped() {
        // No flight number at all.
        assert!(record_from_json(&SPICEJET, &json!({"departureTime": "10:00"})).is_none());
        // Flight number but neither price nor a full time pair.
        assert!(record_from_json(
            &SPICEJET,
            &json!({"flightNumber": "SG 1", "departureTime": "10:00"})
        )
        .is_none());
        // Non-object input.
        assert!(record_from_json(&SPICEJET, &json!("nope")).is_none());
    }

    #[test]
    fn test_designator_fallback() {
        let item = json!({
            "designator": "SG 771",
            "departureTime": "06:10",
            "arrivalTime": "08:25"
        });
        let record = record_from_json(&SPICEJET, &item).unwrap();
        assert_eq!(record.flight_number, "SG 771");
    }
}
