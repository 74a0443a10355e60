//! Tabular rendering of flight results
//!
//! Plain aligned text, one row per flight. Airlines with fare classes get a
//! price column per class plus a combined points column; single-price
//! airlines get the compact layout.

use crate::profile::AirlineProfile;
use crate::{FlightRecord, NA};

/// Render the result list as an aligned table. Empty input renders a
/// one-line notice.
pub fn render_table(profile: &AirlineProfile, flights: &[FlightRecord]) -> String {
    if flights.is_empty() {
        return "No flights found.".to_string();
    }

    let mut headers: Vec<String> = vec![
        "Airline".to_string(),
        "Flight".to_string(),
        "Departure".to_string(),
        "Arrival".to_string(),
        "Duration".to_string(),
    ];
    if profile.fare_classes.is_empty() {
        headers.push("Price".to_string());
        headers.push("Points".to_string());
    } else {
        for fare in profile.fare_classes {
            headers.push(fare.name.to_string());
        }
        headers.push("Points".to_string());
    }

    let rows: Vec<Vec<String>> = flights.iter().map(|f| row_for(profile, f)).collect();

    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push(join_row(&headers, &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &rows {
        lines.push(join_row(row, &widths));
    }
    lines.push(format!("\nTotal flights found: {}", flights.len()));
    lines.join("\n")
}

fn row_for(profile: &AirlineProfile, flight: &FlightRecord) -> Vec<String> {
    let mut row = vec![
        flight.airline.clone(),
        flight.flight_number.clone(),
        flight.departure_time.clone(),
        flight.arrival_time.clone(),
        flight.duration.clone(),
    ];
    if profile.fare_classes.is_empty() {
        row.push(flight.price.clone());
        row.push(flight.points.clone());
    } else {
        for fare in profile.fare_classes {
            row.push(
                flight
                    .price_by_fare_class
                    .get(fare.name)
                    .cloned()
                    .unwrap_or_else(|| NA.to_string()),
            );
        }
        // Points across classes, slash-separated, omitting unknown tails.
        let points: Vec<&str> = profile
            .fare_classes
            .iter()
            .filter_map(|fare| flight.points_by_fare_class.get(fare.name))
            .map(String::as_str)
            .collect();
        let shown: Vec<&str> = if points.iter().all(|p| *p == NA) {
            vec![NA]
        } else {
            points
        };
        row.push(shown.join("/"));
    }
    row
}

fn join_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ETIHAD, SPICEJET};

    #[test]
    fn test_empty_table() {
        assert_eq!(render_table(&SPICEJET, &[]), "No flights found.");
    }

    #[test]
    fn test_single_price_layout() {
        let mut flight = FlightRecord::new("Etihad Airways");
        flight.flight_number = "EY 219".to_string();
        flight.departure_time = "04:25".to_string();
        flight.arrival_time = "10:25".to_string();
        flight.duration = "7h 30m".to_string();
        flight.price = "₹49,095".to_string();

        let table = render_table(&ETIHAD, &[flight]);
        assert!(table.contains("Price"));
        assert!(table.contains("EY 219"));
        assert!(table.contains("₹49,095"));
        assert!(table.contains("Total flights found: 1"));
    }

    #[test]
    fn test_fare_class_columns() {
        let mut flight = FlightRecord::new("SpiceJet");
        flight.flight_number = "SG 8133".to_string();
        flight.departure_time = "06:10".to_string();
        flight.arrival_time = "08:25".to_string();
        flight
            .price_by_fare_class
            .insert("SpiceSaver".to_string(), "₹5,099".to_string());
        flight
            .price_by_fare_class
            .insert("SpiceFlex".to_string(), "N/A".to_string());
        flight
            .points_by_fare_class
            .insert("SpiceSaver".to_string(), "250".to_string());

        let table = render_table(&SPICEJET, &[flight]);
        assert!(table.contains("SpiceSaver"));
        assert!(table.contains("SpiceFlex"));
        assert!(table.contains("SpiceMax"));
        assert!(table.contains("₹5,099"));
        assert!(table.contains("250"));
    }
}
