//! Merging API-derived and DOM-derived flight lists
//!
//! The two sources disagree in coverage: API payloads carry authoritative
//! schedules but frequently omit pricing; the rendered page carries prices
//! and points but may miss schedule details. The merge starts from the DOM
//! list, fills its schedule gaps from the API, appends API-only flights, and
//! deduplicates by flight identity.

use std::collections::HashSet;

use tracing::debug;

use crate::{FlightRecord, NA};

/// Merge the two canonical lists into one deduplicated list. Either side
/// being empty degrades to a pass-through of the other; running the merge
/// again on its own output changes nothing.
pub fn reconcile(dom: Vec<FlightRecord>, api: Vec<FlightRecord>) -> Vec<FlightRecord> {
    let mut merged = dom;

    for api_flight in api {
        match find_match(&merged, &api_flight) {
            Some(index) => {
                merged[index].fill_schedule_from(&api_flight);
            }
            None => {
                debug!(flight = %api_flight.flight_number, "API flight absent from DOM, appended");
                merged.push(api_flight);
            }
        }
    }

    dedup_by_identity(merged)
}

/// An API flight matches a merged entry on exact flight number, as long as
/// their known times agree. An API time against a DOM `"N/A"` agrees (and
/// will fill it); two known-and-different times mark a distinct flight.
fn find_match(merged: &[FlightRecord], api_flight: &FlightRecord) -> Option<usize> {
    merged.iter().position(|entry| {
        entry.flight_number == api_flight.flight_number
            && times_agree(&entry.departure_time, &api_flight.departure_time)
            && times_agree(&entry.arrival_time, &api_flight.arrival_time)
    })
}

fn times_agree(dom: &str, api: &str) -> bool {
    dom == NA || api == NA || dom == api
}

/// Keep the first occurrence of each identity key. Guards against the same
/// flight being discovered twice within a single source.
pub fn dedup_by_identity(flights: Vec<FlightRecord>) -> Vec<FlightRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    flights
        .into_iter()
        .filter(|flight| seen.insert(flight.identity_key()))
        .collect()
}
