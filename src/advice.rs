//! Recommendation rules turning measurements into advice

use serde::{Deserialize, Serialize};

use crate::config::AdviceConfig;
use crate::units::wind_direction_english;
use crate::weather::{RainForecast, StationObservation};

#[derive(Debug, Clone, PartialEq)]
pub struct AdviceThresholds {
    pub cold_celsius: f64,
    /// m/s
    pub windy_ms: f64,
    pub rain_value: u8,
}

impl Default for AdviceThresholds {
    fn default() -> Self {
        Self::from(&AdviceConfig::default())
    }
}

impl From<&AdviceConfig> for AdviceThresholds {
    fn from(config: &AdviceConfig) -> Self {
        Self {
            cold_celsius: config.cold_threshold_celsius,
            windy_ms: config.windy_threshold_ms,
            rain_value: config.rain_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceKind {
    Rain,
    Cold,
    Windy,
    Pleasant,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub kind: AdviceKind,
    pub message: String,
}

/// Decide what to do based on the current measurement.
///
/// Rules are checked in order: rain, cold, westerly wind faster than the
/// threshold (m/s), otherwise pleasant weather.
#[must_use]
pub fn advise(
    city: &str,
    observation: Option<&StationObservation>,
    thresholds: &AdviceThresholds,
) -> Advice {
    let no_data = || Advice {
        kind: AdviceKind::NoData,
        message: format!("No weather data found for {city}."),
    };

    let Some(obs) = observation else {
        return no_data();
    };

    let rain = obs.precipitation.unwrap_or(0.0);
    if rain > 0.0 {
        return Advice {
            kind: AdviceKind::Rain,
            message: format!("🌧 It's raining ({rain:.1} mm). Take an umbrella!"),
        };
    }

    let Some(temperature) = obs.temperature else {
        return no_data();
    };

    if temperature < thresholds.cold_celsius {
        return Advice {
            kind: AdviceKind::Cold,
            message: format!("🥶 It's cold ({temperature:.1}°C). Wear a warm jacket!"),
        };
    }

    let westerly = wind_direction_english(obs).is_some_and(|direction| direction.contains('W'));
    if let Some(speed) = obs.wind_speed {
        if westerly && speed > thresholds.windy_ms {
            return Advice {
                kind: AdviceKind::Windy,
                message: format!("💨 It's windy ({speed:.1} Bft). Be careful if cycling!"),
            };
        }
    }

    Advice {
        kind: AdviceKind::Pleasant,
        message: format!(
            "☀️ The weather looks nice ({temperature:.1}°C, no rain). Enjoy your day!"
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RainOutlookKind {
    RainExpected {
        at: String,
        intensity_mm_per_hour: f64,
        /// Highest intensity in the whole forecast window
        peak_mm_per_hour: f64,
    },
    Dry,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainOutlook {
    #[serde(flatten)]
    pub kind: RainOutlookKind,
    pub message: String,
}

impl RainOutlook {
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            kind: RainOutlookKind::Unavailable,
            message: "Rain forecast unavailable right now.".to_string(),
        }
    }
}

/// Short-term outlook: rain is expected at the first point above the threshold
#[must_use]
pub fn rain_outlook(forecast: &RainForecast, threshold: u8) -> RainOutlook {
    match forecast.first_above(threshold) {
        Some(point) => RainOutlook {
            kind: RainOutlookKind::RainExpected {
                at: point.time.clone(),
                intensity_mm_per_hour: point.intensity_mm_per_hour(),
                peak_mm_per_hour: forecast.peak_intensity(),
            },
            message: format!("🌧 Rain expected around {}. Take an umbrella!", point.time),
        },
        None => RainOutlook {
            kind: RainOutlookKind::Dry,
            message: "☀️ No rain expected in the next 2 hours.".to_string(),
        },
    }
}

/// The sentence read out (or saved) as the weather summary
#[must_use]
pub fn summary(city: &str, advice: &Advice, outlook: &RainOutlook) -> String {
    format!("In {city}, {} {}", advice.message, outlook.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;
    use crate::weather::parse_raintext;
    use rstest::rstest;

    fn observation(
        temperature: Option<f64>,
        precipitation: Option<f64>,
        wind_speed: Option<f64>,
        direction: &str,
    ) -> StationObservation {
        StationObservation {
            station_id: 6210,
            station_name: "Meetstation Valkenburg Zh".to_string(),
            region: None,
            latitude: Some(52.18),
            longitude: Some(4.42),
            measured_at: None,
            description: None,
            temperature,
            ground_temperature: None,
            feel_temperature: None,
            humidity: None,
            wind_speed,
            wind_speed_bft: None,
            wind_gusts: None,
            wind_direction: Some(direction.to_string()),
            wind_direction_degrees: None,
            air_pressure: None,
            visibility: None,
            precipitation,
            rain_last_hour: None,
            rain_last_24_hours: None,
            sun_power: None,
        }
    }

    fn advise_default(obs: &StationObservation) -> Advice {
        advise("Leiden", Some(obs), &AdviceThresholds::default())
    }

    #[test]
    fn test_rain_takes_precedence() {
        let advice = advise_default(&observation(Some(5.0), Some(0.3), Some(15.0), "W"));
        assert_eq!(advice.kind, AdviceKind::Rain);
        assert_eq!(advice.message, "🌧 It's raining (0.3 mm). Take an umbrella!");
    }

    #[test]
    fn test_cold_before_wind() {
        let advice = advise_default(&observation(Some(7.5), Some(0.0), Some(15.0), "W"));
        assert_eq!(advice.kind, AdviceKind::Cold);
        assert_eq!(advice.message, "🥶 It's cold (7.5°C). Wear a warm jacket!");
    }

    #[test]
    fn test_westerly_wind_above_threshold_is_windy() {
        let advice = advise_default(&observation(Some(14.0), None, Some(7.2), "ZW"));
        assert_eq!(advice.kind, AdviceKind::Windy);
        assert_eq!(advice.message, "💨 It's windy (7.2 Bft). Be careful if cycling!");
    }

    #[test]
    fn test_moderate_westerly_wind_compares_meters_per_second() {
        // 10 m/s is only 5 Bft but already above the threshold
        let mut obs = observation(Some(15.0), Some(0.0), Some(10.0), "W");
        obs.wind_speed_bft = Some(5);
        let advice = advise_default(&obs);
        assert_eq!(advice.kind, AdviceKind::Windy);
        assert_eq!(advice.message, "💨 It's windy (10.0 Bft). Be careful if cycling!");
    }

    #[rstest]
    #[case(Some(15.0), "NO")]
    #[case(Some(6.0), "W")]
    #[case(None, "W")]
    fn test_easterly_moderate_or_unknown_wind_is_pleasant(
        #[case] wind_speed: Option<f64>,
        #[case] direction: &str,
    ) {
        let advice = advise_default(&observation(Some(14.0), None, wind_speed, direction));
        assert_eq!(advice.kind, AdviceKind::Pleasant);
        assert_eq!(
            advice.message,
            "☀️ The weather looks nice (14.0°C, no rain). Enjoy your day!"
        );
    }

    #[test]
    fn test_no_data() {
        let advice = advise("Leiden", None, &AdviceThresholds::default());
        assert_eq!(advice.kind, AdviceKind::NoData);
        assert_eq!(advice.message, "No weather data found for Leiden.");

        let no_temperature = advise_default(&observation(None, None, Some(2.0), "W"));
        assert_eq!(no_temperature.kind, AdviceKind::NoData);
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = AdviceThresholds {
            cold_celsius: 15.0,
            windy_ms: 6.0,
            rain_value: 70,
        };
        let advice = advise("Leiden", Some(&observation(Some(14.0), None, None, "W")), &thresholds);
        assert_eq!(advice.kind, AdviceKind::Cold);
    }

    fn forecast(body: &str) -> RainForecast {
        RainForecast {
            location: Location::new(52.16, 4.49, "Leiden".to_string()),
            points: parse_raintext(body),
        }
    }

    #[test]
    fn test_rain_outlook() {
        let wet = rain_outlook(&forecast("000|13:55\n071|14:00\n120|14:05"), 70);
        assert_eq!(wet.message, "🌧 Rain expected around 14:00. Take an umbrella!");
        match wet.kind {
            RainOutlookKind::RainExpected {
                at,
                intensity_mm_per_hour,
                peak_mm_per_hour,
            } => {
                assert_eq!(at, "14:00");
                assert!(peak_mm_per_hour > intensity_mm_per_hour);
            }
            other => panic!("unexpected outlook: {other:?}"),
        }

        let dry = rain_outlook(&forecast("000|13:55\n070|14:00"), 70);
        assert_eq!(dry.kind, RainOutlookKind::Dry);
    }

    #[test]
    fn test_summary() {
        let advice = advise_default(&observation(Some(7.0), None, None, "W"));
        let outlook = rain_outlook(&forecast("000|13:55"), 70);
        assert_eq!(
            summary("Leiden", &advice, &outlook),
            "In Leiden, 🥶 It's cold (7.0°C). Wear a warm jacket! ☀️ No rain expected in the next 2 hours."
        );
    }

    #[test]
    fn test_rain_outlook_serializes_flat() {
        let json = serde_json::to_value(RainOutlook::unavailable()).unwrap();
        assert_eq!(json["kind"], "unavailable");
        assert!(json["message"].as_str().unwrap().contains("unavailable"));
    }
}
