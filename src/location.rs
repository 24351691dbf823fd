//! Location model and parsing of user-supplied locations

use crate::WeatherAgentError;
use anyhow::Result;
use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};

/// Location coordinates
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Location name (city, station, etc.)
    pub name: String,
    /// Country name as reported by the geocoder
    pub country: Option<String>,
}

impl Location {
    /// Create a new location
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, name: String) -> Self {
        Self {
            latitude,
            longitude,
            name,
            country: None,
        }
    }

    /// Create location with country
    #[must_use]
    pub fn with_country(latitude: f64, longitude: f64, name: String, country: String) -> Self {
        Self {
            latitude,
            longitude,
            name,
            country: Some(country),
        }
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Generate cache key for this location
    #[must_use]
    pub fn cache_key(&self, prefix: &str) -> String {
        let (lat, lon) = self.rounded_coordinates(2);
        format!("{prefix}:{lat:.2}:{lon:.2}")
    }

    /// Great-circle distance in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &Location) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance in kilometers between two coordinate pairs
#[must_use]
pub fn distance_km(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    distance(
        HaversineLocation {
            latitude: from_lat,
            longitude: from_lon,
        },
        HaversineLocation {
            latitude: to_lat,
            longitude: to_lon,
        },
        Units::Kilometers,
    )
}

/// Types of location input
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    /// Coordinates (latitude, longitude)
    Coordinates(f64, f64),
    /// Location name (city, village, etc.)
    Name(String),
    /// Dutch postal code, normalized to "1234 AB"
    PostalCode(String),
}

impl LocationInput {
    /// Parse location input (coordinates, Dutch postal codes, city names)
    pub fn parse(input: &str) -> Result<LocationInput> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WeatherAgentError::validation("Location cannot be empty").into());
        }

        if let Some(coordinates) = Self::parse_coordinates(input) {
            let (lat, lon) = coordinates?;
            return Ok(LocationInput::Coordinates(lat, lon));
        }

        if let Some(postal) = Self::normalize_postal_code(input) {
            return Ok(LocationInput::PostalCode(postal));
        }

        Ok(LocationInput::Name(input.to_string()))
    }

    /// The text sent to the geocoder, or `None` for coordinates
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        match self {
            LocationInput::Coordinates(..) => None,
            LocationInput::Name(name) => Some(name),
            LocationInput::PostalCode(postal) => Some(postal),
        }
    }

    /// Parse coordinates from string like "52.1601,4.4970" or "52.1601 4.4970".
    ///
    /// `None` when the input is not a pair of numbers; out-of-range pairs
    /// are validation errors.
    fn parse_coordinates(input: &str) -> Option<Result<(f64, f64)>> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        let [lat, lon] = parts.as_slice() else {
            return None;
        };
        let (Ok(lat), Ok(lon)) = (lat.parse::<f64>(), lon.parse::<f64>()) else {
            return None;
        };

        if !(-90.0..=90.0).contains(&lat) {
            return Some(Err(WeatherAgentError::validation(format!(
                "Latitude must be between -90 and 90, got: {lat}"
            ))
            .into()));
        }

        if !(-180.0..=180.0).contains(&lon) {
            return Some(Err(WeatherAgentError::validation(format!(
                "Longitude must be between -180 and 180, got: {lon}"
            ))
            .into()));
        }

        Some(Ok((lat, lon)))
    }

    /// Dutch postal codes are four digits (no leading zero) followed by two letters
    fn normalize_postal_code(input: &str) -> Option<String> {
        let normalized: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if normalized.len() != 6 {
            return None;
        }

        let (digits, letters) = normalized.split_at(4);
        let digits_ok = digits.chars().all(|c| c.is_ascii_digit()) && !digits.starts_with('0');
        let letters_ok = letters.chars().all(|c| c.is_ascii_alphabetic());

        (digits_ok && letters_ok).then(|| format!("{digits} {}", letters.to_ascii_uppercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_location_cache_key() {
        let location = Location::new(52.1601, 4.4970, "Leiden".to_string());
        assert_eq!(location.cache_key("raintext"), "raintext:52.16:4.50");
    }

    #[test]
    fn test_location_rounded_coordinates() {
        let location = Location::new(52.158_234, 4.493_456, "Test".to_string());
        let (lat, lon) = location.rounded_coordinates(2);
        assert_eq!(lat, 52.16);
        assert_eq!(lon, 4.49);
    }

    #[test]
    fn test_distance_leiden_to_amsterdam() {
        let leiden = Location::new(52.1601, 4.4970, "Leiden".to_string());
        let amsterdam = Location::new(52.3676, 4.9041, "Amsterdam".to_string());
        let km = leiden.distance_km(&amsterdam);
        assert!(km > 33.0 && km < 38.0, "got {km}");
        assert_eq!(leiden.distance_km(&leiden), 0.0);
    }

    #[rstest]
    #[case("52.1601,4.4970", 52.1601, 4.4970)]
    #[case("52.1601 4.4970", 52.1601, 4.4970)]
    #[case(" 51.44, 5.47 ", 51.44, 5.47)]
    fn test_parse_coordinates(#[case] input: &str, #[case] lat: f64, #[case] lon: f64) {
        assert_eq!(
            LocationInput::parse(input).unwrap(),
            LocationInput::Coordinates(lat, lon)
        );
    }

    #[rstest]
    #[case("91.0,8.0", "Latitude")]
    #[case("-90.5 4.0", "Latitude")]
    #[case("46.0,181.0", "Longitude")]
    fn test_out_of_range_coordinates_are_rejected(#[case] input: &str, #[case] field: &str) {
        let err = LocationInput::parse(input).unwrap_err();
        assert!(matches!(
            WeatherAgentError::find_in(&err),
            Some(WeatherAgentError::Validation { .. })
        ));
        assert!(err.to_string().contains(field), "got {err}");
    }

    #[rstest]
    #[case("46.0")]
    #[case("46.0,8.0,0.0")]
    #[case("52.1,Leiden")]
    fn test_malformed_coordinates_are_names(#[case] input: &str) {
        assert!(matches!(
            LocationInput::parse(input).unwrap(),
            LocationInput::Name(_)
        ));
    }

    #[rstest]
    #[case("2311 EZ", "2311 EZ")]
    #[case("2311ez", "2311 EZ")]
    #[case("1012 jS", "1012 JS")]
    fn test_parse_postal_codes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(
            LocationInput::parse(input).unwrap(),
            LocationInput::PostalCode(expected.to_string())
        );
    }

    #[rstest]
    #[case("Leiden")]
    #[case("Den Haag")]
    #[case("'s-Hertogenbosch")]
    #[case("0123 AB")]
    #[case("12345")]
    fn test_parse_names(#[case] input: &str) {
        assert_eq!(
            LocationInput::parse(input).unwrap(),
            LocationInput::Name(input.to_string())
        );
    }

    #[test]
    fn test_parse_empty_is_validation_error() {
        let err = LocationInput::parse("   ").unwrap_err();
        assert!(err.to_string().contains("Location cannot be empty"));
    }

    #[test]
    fn test_query() {
        assert_eq!(LocationInput::Coordinates(52.0, 4.0).query(), None);
        assert_eq!(LocationInput::Name("Delft".into()).query(), Some("Delft"));
    }
}
