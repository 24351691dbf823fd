//! Unit conversions and "feels like" temperatures

use serde::{Deserialize, Serialize};

use crate::weather::StationObservation;

/// Upper bounds (exclusive, m/s) of Beaufort forces 0 through 11
const BEAUFORT_LIMITS: [f64; 12] = [
    0.3, 1.6, 3.4, 5.5, 8.0, 10.8, 13.9, 17.2, 20.8, 24.5, 28.5, 32.7,
];

/// Beaufort force for a wind speed in m/s
#[must_use]
pub fn beaufort_from_ms(speed_ms: f64) -> u8 {
    BEAUFORT_LIMITS
        .iter()
        .position(|&limit| speed_ms < limit)
        .map_or(12, |force| force as u8)
}

#[must_use]
pub fn ms_to_kmh(speed_ms: f64) -> f64 {
    speed_ms * 3.6
}

/// Wind chill (JAG/TI). Only defined for `temperature <= 10` °C and wind above 4.8 km/h.
#[must_use]
pub fn wind_chill(temperature: f64, wind_kmh: f64) -> Option<f64> {
    if temperature > 10.0 || wind_kmh <= 4.8 {
        return None;
    }
    let v = wind_kmh.powf(0.16);
    Some(13.12 + 0.6215 * temperature - 11.37 * v + 0.3965 * temperature * v)
}

/// Steadman's apparent temperature from air temperature, relative humidity (%) and wind (m/s)
#[must_use]
pub fn apparent_temperature(temperature: f64, humidity: f64, wind_ms: f64) -> f64 {
    let vapour_pressure =
        humidity / 100.0 * 6.105 * ((17.27 * temperature) / (237.7 + temperature)).exp();
    temperature + 0.33 * vapour_pressure - 0.70 * wind_ms - 4.00
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeelsLikeMethod {
    /// Reported by the station itself
    Reported,
    WindChill,
    Apparent,
    /// Not enough data, plain air temperature
    AirTemperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeelsLike {
    pub celsius: f64,
    pub method: FeelsLikeMethod,
}

/// Best available "feels like" temperature for a station measurement
#[must_use]
pub fn feels_like(observation: &StationObservation) -> Option<FeelsLike> {
    if let Some(celsius) = observation.feel_temperature {
        return Some(FeelsLike {
            celsius,
            method: FeelsLikeMethod::Reported,
        });
    }

    let temperature = observation.temperature?;
    let wind_ms = observation.wind_speed.unwrap_or(0.0);

    if let Some(celsius) = wind_chill(temperature, ms_to_kmh(wind_ms)) {
        return Some(FeelsLike {
            celsius,
            method: FeelsLikeMethod::WindChill,
        });
    }

    match observation.humidity {
        Some(humidity) => Some(FeelsLike {
            celsius: apparent_temperature(temperature, humidity, wind_ms),
            method: FeelsLikeMethod::Apparent,
        }),
        None => Some(FeelsLike {
            celsius: temperature,
            method: FeelsLikeMethod::AirTemperature,
        }),
    }
}

/// Translate a Dutch wind direction abbreviation ("ZW", "nno") to English ("SW", "NNE")
#[must_use]
pub fn dutch_direction_to_english(direction: &str) -> String {
    direction
        .trim()
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            'O' => 'E',
            'Z' => 'S',
            other => other,
        })
        .collect()
}

/// Convert wind direction from degrees to a 16-point cardinal direction
#[must_use]
pub fn degrees_to_cardinal(degrees: f64) -> &'static str {
    match degrees.rem_euclid(360.0).round() as u16 {
        0..=11 | 349..=360 => "N",
        12..=33 => "NNE",
        34..=56 => "NE",
        57..=78 => "ENE",
        79..=101 => "E",
        102..=123 => "ESE",
        124..=146 => "SE",
        147..=168 => "SSE",
        169..=191 => "S",
        192..=213 => "SSW",
        214..=236 => "SW",
        237..=258 => "WSW",
        259..=281 => "W",
        282..=303 => "WNW",
        304..=326 => "NW",
        327..=348 => "NNW",
        _ => "Unknown",
    }
}

/// English cardinal direction of a measurement, preferring the reported abbreviation
#[must_use]
pub fn wind_direction_english(observation: &StationObservation) -> Option<String> {
    match (&observation.wind_direction, observation.wind_direction_degrees) {
        (Some(direction), _) if !direction.trim().is_empty() => {
            Some(dutch_direction_to_english(direction))
        }
        (_, Some(degrees)) => Some(degrees_to_cardinal(degrees).to_string()),
        _ => None,
    }
}
