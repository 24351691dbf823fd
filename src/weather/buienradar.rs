//! Buienradar JSON feed: station measurements and the five-day forecast

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::location::Location;

/// Everything the report needs from one download of the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub stations: Vec<StationObservation>,
    pub five_day: Vec<DailyForecast>,
    /// Short Dutch weather report written by the Buienradar meteorologists
    pub report_summary: Option<String>,
}

/// One station measurement. Stations do not all carry every sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationObservation {
    pub station_id: u32,
    pub station_name: String,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Local (Europe/Amsterdam) time of the measurement
    pub measured_at: Option<NaiveDateTime>,
    pub description: Option<String>,
    /// Celsius
    pub temperature: Option<f64>,
    pub ground_temperature: Option<f64>,
    pub feel_temperature: Option<f64>,
    /// Percent
    pub humidity: Option<f64>,
    /// m/s
    pub wind_speed: Option<f64>,
    pub wind_speed_bft: Option<u8>,
    /// m/s
    pub wind_gusts: Option<f64>,
    /// Dutch abbreviation, e.g. "ZW"
    pub wind_direction: Option<String>,
    pub wind_direction_degrees: Option<f64>,
    /// hPa
    pub air_pressure: Option<f64>,
    /// Meters
    pub visibility: Option<f64>,
    /// mm/h at the time of measurement
    pub precipitation: Option<f64>,
    pub rain_last_hour: Option<f64>,
    pub rain_last_24_hours: Option<f64>,
    /// W/m²
    pub sun_power: Option<f64>,
}

impl StationObservation {
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Location::new(lat, lon, self.station_name.clone())),
            _ => None,
        }
    }

    /// Distance in kilometers, `None` when the station has no coordinates
    #[must_use]
    pub fn distance_to(&self, location: &Location) -> Option<f64> {
        self.location().map(|station| station.distance_km(location))
    }
}

/// One day of the five-day forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub day: Option<NaiveDateTime>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    /// Percent
    pub rain_chance: Option<f64>,
    /// Percent
    pub sun_chance: Option<f64>,
    pub rain_mm_min: Option<f64>,
    pub rain_mm_max: Option<f64>,
    pub wind_direction: Option<String>,
    pub wind_bft: Option<u8>,
    pub description: Option<String>,
}

/// Station closest to `location`, together with its distance in kilometers.
/// Stations without coordinates are skipped.
#[must_use]
pub fn nearest_station<'a>(
    location: &Location,
    stations: &'a [StationObservation],
) -> Option<(&'a StationObservation, f64)> {
    let mut nearest: Option<(&StationObservation, f64)> = None;

    for station in stations {
        let Some(distance) = station.distance_to(location) else {
            continue;
        };
        if nearest.is_none_or(|(_, min_distance)| distance < min_distance) {
            nearest = Some((station, distance));
        }
    }

    nearest
}

fn parse_timestamp(value: Option<&str>) -> Option<NaiveDateTime> {
    value.and_then(|raw| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok())
}

fn round_bft(value: Option<f64>) -> Option<u8> {
    value
        .filter(|bft| (0.0..=12.0).contains(bft))
        .map(|bft| bft.round() as u8)
}

/// Raw response structures of `data.buienradar.nl/2.0/feed/json`
pub(crate) mod dto {
    use super::{
        DailyForecast, FeedSnapshot, StationObservation, parse_timestamp, round_bft,
    };
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct Feed {
        pub actual: Actual,
        #[serde(default)]
        pub forecast: Option<Forecast>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Actual {
        #[serde(rename = "stationmeasurements", default)]
        pub station_measurements: Vec<StationMeasurement>,
    }

    #[derive(Debug, Deserialize)]
    pub struct StationMeasurement {
        #[serde(rename = "stationid")]
        pub station_id: u32,
        #[serde(rename = "stationname")]
        pub station_name: String,
        pub lat: Option<f64>,
        pub lon: Option<f64>,
        pub regio: Option<String>,
        pub timestamp: Option<String>,
        #[serde(rename = "weatherdescription")]
        pub weather_description: Option<String>,
        #[serde(rename = "winddirection")]
        pub wind_direction: Option<String>,
        pub temperature: Option<f64>,
        #[serde(rename = "groundtemperature")]
        pub ground_temperature: Option<f64>,
        #[serde(rename = "feeltemperature")]
        pub feel_temperature: Option<f64>,
        #[serde(rename = "windgusts")]
        pub wind_gusts: Option<f64>,
        #[serde(rename = "windspeed")]
        pub wind_speed: Option<f64>,
        #[serde(rename = "windspeedBft")]
        pub wind_speed_bft: Option<f64>,
        pub humidity: Option<f64>,
        pub precipitation: Option<f64>,
        #[serde(rename = "sunpower")]
        pub sun_power: Option<f64>,
        #[serde(rename = "rainFallLast24Hour")]
        pub rain_fall_last_24_hour: Option<f64>,
        #[serde(rename = "rainFallLastHour")]
        pub rain_fall_last_hour: Option<f64>,
        #[serde(rename = "winddirectiondegrees")]
        pub wind_direction_degrees: Option<f64>,
        #[serde(rename = "airpressure")]
        pub air_pressure: Option<f64>,
        pub visibility: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Forecast {
        #[serde(rename = "weatherreport")]
        pub weather_report: Option<WeatherReport>,
        #[serde(rename = "fivedayforecast", default)]
        pub five_day_forecast: Vec<DayForecast>,
    }

    #[derive(Debug, Deserialize)]
    pub struct WeatherReport {
        pub title: Option<String>,
        pub summary: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct DayForecast {
        pub day: Option<String>,
        #[serde(rename = "mintemperatureMin")]
        pub min_temperature_min: Option<f64>,
        #[serde(rename = "maxtemperatureMax")]
        pub max_temperature_max: Option<f64>,
        #[serde(rename = "rainChance")]
        pub rain_chance: Option<f64>,
        #[serde(rename = "sunChance")]
        pub sun_chance: Option<f64>,
        #[serde(rename = "mmRainMin")]
        pub mm_rain_min: Option<f64>,
        #[serde(rename = "mmRainMax")]
        pub mm_rain_max: Option<f64>,
        #[serde(rename = "windDirection")]
        pub wind_direction: Option<String>,
        pub wind: Option<f64>,
        #[serde(rename = "weatherdescription")]
        pub weather_description: Option<String>,
    }

    impl From<StationMeasurement> for StationObservation {
        fn from(m: StationMeasurement) -> Self {
            Self {
                station_id: m.station_id,
                station_name: m.station_name,
                region: m.regio,
                latitude: m.lat,
                longitude: m.lon,
                measured_at: parse_timestamp(m.timestamp.as_deref()),
                description: m.weather_description,
                temperature: m.temperature,
                ground_temperature: m.ground_temperature,
                feel_temperature: m.feel_temperature,
                humidity: m.humidity,
                wind_speed: m.wind_speed,
                wind_speed_bft: round_bft(m.wind_speed_bft),
                wind_gusts: m.wind_gusts,
                wind_direction: m.wind_direction,
                wind_direction_degrees: m.wind_direction_degrees,
                air_pressure: m.air_pressure,
                visibility: m.visibility,
                precipitation: m.precipitation,
                rain_last_hour: m.rain_fall_last_hour,
                rain_last_24_hours: m.rain_fall_last_24_hour,
                sun_power: m.sun_power,
            }
        }
    }

    impl From<DayForecast> for DailyForecast {
        fn from(d: DayForecast) -> Self {
            Self {
                day: parse_timestamp(d.day.as_deref()),
                min_temperature: d.min_temperature_min,
                max_temperature: d.max_temperature_max,
                rain_chance: d.rain_chance,
                sun_chance: d.sun_chance,
                rain_mm_min: d.mm_rain_min,
                rain_mm_max: d.mm_rain_max,
                wind_direction: d.wind_direction,
                wind_bft: round_bft(d.wind),
                description: d.weather_description,
            }
        }
    }

    impl From<Feed> for FeedSnapshot {
        fn from(feed: Feed) -> Self {
            let (five_day, report_summary) = match feed.forecast {
                Some(forecast) => (
                    forecast
                        .five_day_forecast
                        .into_iter()
                        .map(DailyForecast::from)
                        .collect(),
                    forecast
                        .weather_report
                        .and_then(|report| report.summary.or(report.title)),
                ),
                None => (Vec::new(), None),
            };

            Self {
                stations: feed
                    .actual
                    .station_measurements
                    .into_iter()
                    .map(StationObservation::from)
                    .collect(),
                five_day,
                report_summary,
            }
        }
    }
}
