//! Structural flight-list discovery in undocumented JSON
//!
//! Search payloads differ per airline and per release; none of the shapes
//! are documented. The finder locates the list of flight-like objects inside
//! an arbitrary JSON value via an ordered set of strategies: known key names
//! first, structural sniffing second, exhaustive descent last.

use serde_json::Value;
use tracing::debug;

/// Key names that commonly hold the flight list, tried in order.
const PRIORITY_KEYS: &[&str] = &[
    "flights",
    "data",
    "results",
    "items",
    "flightList",
    "schedules",
    "availability",
    "availabilityList",
    "journeys",
    "journeyList",
    "outbound",
    "inbound",
    "segments",
    "segmentList",
];

/// Field names that mark an object as flight-shaped.
const FLIGHT_HINT_KEYS: &[&str] = &[
    "flightNumber",
    "flight_number",
    "departureTime",
    "departure_time",
    "price",
    "fare",
];

/// Nesting bound for the exhaustive descent. Parsed JSON is acyclic, but the
/// payload is site-controlled and can nest arbitrarily deep.
const MAX_DEPTH: usize = 16;

/// Locate raw flight-like objects in an arbitrary payload. Returns an empty
/// vector when nothing qualifies; that is a valid outcome, not an error.
pub fn find_flight_records(payload: &Value) -> Vec<&Value> {
    let mut records = resolve(payload, 0);

    // One known airline buries the list at data.trips[].journeysAvailable[];
    // none of the generic strategies reach through the intermediate array.
    let fallback = journeys_available(payload);
    if !fallback.is_empty() {
        debug!(count = fallback.len(), "journeysAvailable fallback matched");
        records.extend(fallback);
    }

    records
}

fn resolve(payload: &Value, depth: usize) -> Vec<&Value> {
    match payload {
        Value::Array(items) => items.iter().filter(|v| v.is_object()).collect(),
        Value::Object(map) => {
            // Strategy 1: first present priority key wins.
            for key in PRIORITY_KEYS {
                if let Some(candidate) = map.get(*key) {
                    let records = candidates_from(candidate);
                    if !records.is_empty() {
                        debug!(key = *key, count = records.len(), "priority key matched");
                        return records;
                    }
                }
            }

            // Strategy 2: any list whose first element looks like a flight.
            for (key, value) in map {
                if let Value::Array(items) = value {
                    if let Some(Value::Object(first)) = items.first() {
                        if FLIGHT_HINT_KEYS.iter().any(|hint| first.contains_key(*hint)) {
                            debug!(key = key.as_str(), count = items.len(), "flight-shaped list matched");
                            return items.iter().filter(|v| v.is_object()).collect();
                        }
                    }
                }
            }

            // Strategy 3: descend into nested maps, concatenating everything
            // found. Depth-bounded work-list walk rather than open recursion.
            if depth >= MAX_DEPTH {
                return Vec::new();
            }
            let mut found = Vec::new();
            for value in map.values() {
                if value.is_object() {
                    found.extend(resolve(value, depth + 1));
                }
            }
            found
        }
        _ => Vec::new(),
    }
}

/// A priority key can hold the list itself or, occasionally, a single record
/// object. A bare container object (no flight-shaped field) is not a
/// candidate; the walk continues past it.
fn candidates_from(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().filter(|v| v.is_object()).collect(),
        Value::Object(map) => {
            if FLIGHT_HINT_KEYS.iter().any(|hint| map.contains_key(*hint)) {
                vec![value]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

/// Hard-coded `data.trips[].journeysAvailable[]` shape.
fn journeys_available(payload: &Value) -> Vec<&Value> {
    let Some(trips) = payload
        .get("data")
        .and_then(|d| d.get("trips"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    trips
        .iter()
        .filter_map(|trip| trip.get("journeysAvailable"))
        .filter_map(Value::as_array)
        .flatten()
        .filter(|v| v.is_object())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_key_wins() {
        let payload = json!({
            "meta": {"count": 1},
            "flights": [{"flightNumber": "SG123"}],
            "results": [{"flightNumber": "SG999"}]
        });
        let records = find_flight_records(&payload);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["flightNumber"], "SG123");
    }

    #[test]
    fn test_flight_shaped_list_without_known_key() {
        let payload = json!({
            "weirdKeyName": [
                {"departureTime": "10:00", "fare": 4500},
                {"departureTime": "14:00", "fare": 5200}
            ]
        });
        let records = find_flight_records(&payload);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_non_flight_lists_skipped() {
        let payload = json!({
            "banners": [{"imageUrl": "x.png"}],
            "currencies": ["INR", "USD"]
        });
        assert!(find_flight_records(&payload).is_empty());
    }

    #[test]
    fn test_nested_descent() {
        let payload = json!({
            "response": {
                "body": {
                    "itineraries": [{"flightNumber": "6E202", "price": 3999}]
                }
            }
        });
        let records = find_flight_records(&payload);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["flightNumber"], "6E202");
    }

    #[test]
    fn test_journeys_available_fallback() {
        let payload = json!({
            "data": {
                "trips": [
                    {"journeysAvailable": [
                        {"flightNumber": "SG123", "departureTime": "2025-01-01T10:00:00"}
                    ]}
                ]
            }
        });
        let records = find_flight_records(&payload);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["flightNumber"], "SG123");
    }

    #[test]
    fn test_top_level_list() {
        let payload = json!([
            {"flightNumber": "EY219"},
            {"flightNumber": "EY251"},
            "noise"
        ]);
        let records = find_flight_records(&payload);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_priority_key_holding_single_object() {
        let payload = json!({"availability": {"flightNumber": "SG8133"}});
        let records = find_flight_records(&payload);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["flightNumber"], "SG8133");
    }

    #[test]
    fn test_scalar_payload_finds_nothing() {
        assert!(find_flight_records(&json!("nope")).is_empty());
        assert!(find_flight_records(&json!(42)).is_empty());
        assert!(find_flight_records(&json!(null)).is_empty());
    }

    #[test]
    fn test_depth_bound_terminates() {
        // 40 levels of nesting, flights buried past the bound: the walk must
        // terminate without finding them.
        let mut payload = json!({"flights": [{"flightNumber": "SG1"}]});
        for _ in 0..40 {
            payload = json!({"wrap": payload});
        }
        let _ = find_flight_records(&payload);
    }
}
