//! City-name and date normalization for search input
//!
//! Booking sites want IATA codes and ISO dates; users type city names and
//! whatever date order they grew up with.

use chrono::{Local, NaiveDate};

/// City names (lowercase) to IATA airport codes. Covers the domestic network
/// plus the international destinations the supported carriers serve.
static AIRPORT_CODES: &[(&str, &str)] = &[
    ("delhi", "DEL"),
    ("new delhi", "DEL"),
    ("mumbai", "BOM"),
    ("bombay", "BOM"),
    ("bangalore", "BLR"),
    ("bengaluru", "BLR"),
    ("chennai", "MAA"),
    ("madras", "MAA"),
    ("kolkata", "CCU"),
    ("calcutta", "CCU"),
    ("hyderabad", "HYD"),
    ("pune", "PNQ"),
    ("ahmedabad", "AMD"),
    ("goa", "GOI"),
    ("kochi", "COK"),
    ("cochin", "COK"),
    ("jaipur", "JAI"),
    ("lucknow", "LKO"),
    ("varanasi", "VNS"),
    ("patna", "PAT"),
    ("guwahati", "GAU"),
    ("srinagar", "SXR"),
    ("amritsar", "ATQ"),
    ("chandigarh", "IXC"),
    ("dehradun", "DED"),
    ("indore", "IDR"),
    ("bhopal", "BHO"),
    ("nagpur", "NAG"),
    ("visakhapatnam", "VTZ"),
    ("vizag", "VTZ"),
    ("coimbatore", "CJB"),
    ("madurai", "IXM"),
    ("trivandrum", "TRV"),
    ("thiruvananthapuram", "TRV"),
    ("mangalore", "IXE"),
    ("surat", "STV"),
    ("rajkot", "RAJ"),
    ("vadodara", "BDQ"),
    ("baroda", "BDQ"),
    ("udaipur", "UDR"),
    ("jodhpur", "JDH"),
    ("bhubaneswar", "BBI"),
    ("raipur", "RPR"),
    ("ranchi", "IXR"),
    ("imphal", "IMF"),
    ("agartala", "IXA"),
    ("port blair", "IXZ"),
    ("leh", "IXL"),
    // International
    ("abu dhabi", "AUH"),
    ("dubai", "DXB"),
    ("london", "LHR"),
    ("paris", "CDG"),
    ("new york", "JFK"),
    ("singapore", "SIN"),
    ("bangkok", "BKK"),
    ("kathmandu", "KTM"),
    ("colombo", "CMB"),
    ("male", "MLE"),
];

/// Normalize a city name or airport code to a 3-letter IATA code.
/// Returns `None` for anything unrecognized.
pub fn normalize_city_input(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();

    // Already a known airport code?
    if trimmed.len() == 3 {
        let upper = trimmed.to_uppercase();
        if AIRPORT_CODES.iter().any(|(_, code)| *code == upper) {
            return Some(upper);
        }
    }

    AIRPORT_CODES
        .iter()
        .find(|(city, _)| *city == lowered)
        .map(|(_, code)| (*code).to_string())
}

/// Parse a departure date in `DD-MM-YYYY` or `YYYY-MM-DD` (also `/`, `.` or
/// space separators) into `YYYY-MM-DD`. Past dates are rejected.
pub fn parse_date(input: &str) -> Option<String> {
    let cleaned = input.trim().replace(['/', '.', ' '], "-");
    let parts: Vec<&str> = cleaned.split('-').filter(|p| !p.is_empty()).collect();
    if parts.len() != 3 {
        return None;
    }

    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else {
        (parts[2], parts[1], parts[0])
    };

    let iso = format!("{}-{:0>2}-{:0>2}", year, month, day);
    let parsed = NaiveDate::parse_from_str(&iso, "%Y-%m-%d").ok()?;
    if parsed < Local::now().date_naive() {
        return None;
    }
    Some(parsed.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_name_to_code() {
        assert_eq!(normalize_city_input("Delhi"), Some("DEL".to_string()));
        assert_eq!(normalize_city_input("  bengaluru "), Some("BLR".to_string()));
        assert_eq!(normalize_city_input("Abu Dhabi"), Some("AUH".to_string()));
    }

    #[test]
    fn test_code_passthrough() {
        assert_eq!(normalize_city_input("BOM"), Some("BOM".to_string()));
        assert_eq!(normalize_city_input("bom"), Some("BOM".to_string()));
    }

    #[test]
    fn test_unknown_city_rejected() {
        assert_eq!(normalize_city_input("Gotham"), None);
        assert_eq!(normalize_city_input(""), None);
        // Unknown three-letter strings are not silently accepted as codes.
        assert_eq!(normalize_city_input("ZZZ"), None);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date("2030-01-15"), Some("2030-01-15".to_string()));
        assert_eq!(parse_date("15-01-2030"), Some("2030-01-15".to_string()));
        assert_eq!(parse_date("15/01/2030"), Some("2030-01-15".to_string()));
        assert_eq!(parse_date("5-1-2030"), Some("2030-01-05".to_string()));
    }

    #[test]
    fn test_past_and_invalid_dates_rejected() {
        assert_eq!(parse_date("2001-01-01"), None);
        assert_eq!(parse_date("2030-13-40"), None);
        assert_eq!(parse_date("not a date"), None);
    }
}
