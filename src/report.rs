//! Weather reports: the pipeline from a city name to advice and a summary

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Europe::Amsterdam;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::WeatherAgentError;
use crate::advice::{self, Advice, AdviceThresholds, RainOutlook};
use crate::cache::{Cached, Freshness, PersistentCache};
use crate::config::AppConfig;
use crate::geocode::Geocoder;
use crate::http::{self, HttpSettings};
use crate::location::{Location, LocationInput};
use crate::units::{self, FeelsLike};
use crate::weather::{
    BuienradarClient, DailyForecast, FeedSnapshot, StationObservation, get_sunrise_sunset,
    nearest_station,
};

/// Upper bound on cities per comparison
pub const MAX_COMPARED_CITIES: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct SunTimes {
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    /// What the user asked for
    pub query: String,
    pub location: Location,
    pub station: StationObservation,
    pub station_distance_km: f64,
    pub advice: Advice,
    pub rain: RainOutlook,
    pub feels_like: Option<FeelsLike>,
    /// English 16-point direction
    pub wind_direction: Option<String>,
    pub sun: Option<SunTimes>,
    pub forecast: Vec<DailyForecast>,
    /// Buienradar's own (Dutch) weather report
    pub report_summary: Option<String>,
    pub summary: String,
    pub freshness: Freshness,
    pub generated_at: DateTime<Utc>,
}

impl WeatherReport {
    #[must_use]
    pub fn city(&self) -> &str {
        &self.location.name
    }
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let station = &self.station;

        writeln!(
            f,
            "📍 Found {}: {}",
            self.location.name,
            self.location.format_coordinates()
        )?;
        writeln!(
            f,
            "📡 Nearest station: {} ({:.1} km away)",
            station.station_name, self.station_distance_km
        )?;

        if let Some(description) = &station.description {
            writeln!(f, "   {description}")?;
        }
        if let Some(temperature) = station.temperature {
            match self.feels_like {
                Some(feels) if (feels.celsius - temperature).abs() >= 0.5 => writeln!(
                    f,
                    "🌡  Temperature: {temperature:.1}°C (feels like {:.1}°C)",
                    feels.celsius
                )?,
                _ => writeln!(f, "🌡  Temperature: {temperature:.1}°C")?,
            }
        }
        if let Some(humidity) = station.humidity {
            writeln!(f, "💧 Humidity: {humidity:.0}%")?;
        }
        let bft = station
            .wind_speed_bft
            .or_else(|| station.wind_speed.map(units::beaufort_from_ms));
        let direction = self.wind_direction.as_deref().unwrap_or("-");
        match (bft, station.wind_speed) {
            (Some(bft), Some(speed)) => {
                writeln!(f, "🌬  Wind: {direction} {bft} Bft ({speed:.1} m/s)")?;
            }
            (Some(bft), None) => writeln!(f, "🌬  Wind: {direction} {bft} Bft")?,
            _ => {}
        }
        if let Some(rain) = station.precipitation {
            writeln!(f, "☔ Precipitation: {rain} mm")?;
        }
        if let Some(sun) = &self.sun {
            writeln!(
                f,
                "🌅 Sunrise {}, sunset {}",
                sun.sunrise.format("%H:%M"),
                sun.sunset.format("%H:%M")
            )?;
        }

        writeln!(f)?;
        writeln!(f, "{}", self.advice.message)?;
        writeln!(f, "{}", self.rain.message)?;

        if !self.forecast.is_empty() {
            writeln!(f)?;
            writeln!(f, "Five-day forecast:")?;
            for day in &self.forecast {
                let label = day
                    .day
                    .map_or_else(|| "?".to_string(), |d| d.format("%a %d %b").to_string());
                let min = day.min_temperature.map_or("?".to_string(), |t| format!("{t:.0}"));
                let max = day.max_temperature.map_or("?".to_string(), |t| format!("{t:.0}"));
                let rain = day.rain_chance.map_or("?".to_string(), |p| format!("{p:.0}"));
                writeln!(f, "  {label}: {min}..{max}°C, {rain}% chance of rain")?;
            }
        }

        if let Freshness::Stale { age_seconds } = self.freshness {
            writeln!(f)?;
            writeln!(
                f,
                "⚠️ Weather service unreachable, showing cached data from {} minutes ago.",
                age_seconds / 60
            )?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CityOutcome {
    Report(Box<WeatherReport>),
    Failed { query: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    pub city: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Highlights {
    /// Highest temperature (°C)
    pub warmest: Option<Highlight>,
    /// Lowest temperature (°C)
    pub coldest: Option<Highlight>,
    /// Least precipitation (mm)
    pub driest: Option<Highlight>,
    /// Highest wind speed (m/s)
    pub windiest: Option<Highlight>,
}

impl Highlights {
    fn from_reports<'a>(reports: impl Iterator<Item = &'a WeatherReport> + Clone) -> Self {
        let pick = |metric: fn(&WeatherReport) -> Option<f64>, highest: bool| {
            reports
                .clone()
                .filter_map(|report| metric(report).map(|value| (report, value)))
                .fold(None::<(&WeatherReport, f64)>, |best, (report, value)| {
                    let better = best.is_none_or(|(_, current)| {
                        if highest { value > current } else { value < current }
                    });
                    if better { Some((report, value)) } else { best }
                })
                .map(|(report, value)| Highlight {
                    city: report.city().to_string(),
                    value,
                })
        };

        Self {
            warmest: pick(|r| r.station.temperature, true),
            coldest: pick(|r| r.station.temperature, false),
            driest: pick(|r| Some(r.station.precipitation.unwrap_or(0.0)), false),
            windiest: pick(|r| r.station.wind_speed, true),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CityComparison {
    /// One entry per requested city, in request order
    pub cities: Vec<CityOutcome>,
    pub highlights: Highlights,
}

impl CityComparison {
    pub fn reports(&self) -> impl Iterator<Item = &WeatherReport> + Clone {
        self.cities.iter().filter_map(|outcome| match outcome {
            CityOutcome::Report(report) => Some(report.as_ref()),
            CityOutcome::Failed { .. } => None,
        })
    }
}

impl fmt::Display for CityComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.cities {
            match outcome {
                CityOutcome::Report(report) => {
                    let temperature = report
                        .station
                        .temperature
                        .map_or("?".to_string(), |t| format!("{t:.1}°C"));
                    writeln!(
                        f,
                        "{:<20} {:>7}  {}",
                        report.city(),
                        temperature,
                        report.advice.message
                    )?;
                }
                CityOutcome::Failed { query, error } => {
                    writeln!(f, "{query:<20} {:>7}  {error}", "-")?;
                }
            }
        }

        let lines = [
            ("Warmest", &self.highlights.warmest, "°C"),
            ("Coldest", &self.highlights.coldest, "°C"),
            ("Driest", &self.highlights.driest, " mm"),
            ("Windiest", &self.highlights.windiest, " m/s"),
        ];
        if lines.iter().any(|(_, highlight, _)| highlight.is_some()) {
            writeln!(f)?;
        }
        for (label, highlight, unit) in lines {
            if let Some(highlight) = highlight {
                writeln!(f, "{label}: {} ({}{unit})", highlight.city, highlight.value)?;
            }
        }
        Ok(())
    }
}

pub struct WeatherService {
    config: AppConfig,
    geocoder: Geocoder,
    buienradar: BuienradarClient,
    thresholds: AdviceThresholds,
}

impl WeatherService {
    pub fn new(config: AppConfig, cache: Arc<PersistentCache>) -> Result<Self> {
        let client = http::build_client(&HttpSettings::from(&config.http))?;
        let geocoder = Geocoder::new(
            client.clone(),
            config.geocoding.clone(),
            Arc::clone(&cache),
            &config.cache,
        );
        let buienradar = BuienradarClient::new(
            client,
            config.buienradar.clone(),
            cache,
            config.cache.clone(),
        );
        let thresholds = AdviceThresholds::from(&config.advice);

        Ok(Self {
            config,
            geocoder,
            buienradar,
            thresholds,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn default_city(&self) -> &str {
        &self.config.defaults.city
    }

    /// Build the full report for one city, postcode or coordinate pair
    #[instrument(skip(self))]
    pub async fn report(&self, query: &str) -> Result<WeatherReport> {
        let location = self.locate(query).await?;
        let snapshot = self.buienradar.snapshot().await?;
        self.assemble(query, location, &snapshot).await
    }

    async fn locate(&self, query: &str) -> Result<Cached<Location>> {
        let input = LocationInput::parse(query)?;
        self.geocoder.resolve(&input).await
    }

    /// Report for one query against a feed snapshot that was already fetched
    async fn report_with(
        &self,
        query: &str,
        snapshot: &Cached<FeedSnapshot>,
    ) -> Result<WeatherReport> {
        let location = self.locate(query).await?;
        self.assemble(query, location, snapshot).await
    }

    async fn assemble(
        &self,
        query: &str,
        location: Cached<Location>,
        snapshot: &Cached<FeedSnapshot>,
    ) -> Result<WeatherReport> {
        let mut freshness = location.freshness.combine(snapshot.freshness);
        let location = location.value;
        let snapshot = &snapshot.value;

        let (station, distance) = nearest_station(&location, &snapshot.stations).ok_or_else(|| {
            WeatherAgentError::no_stations("no station in the feed has coordinates")
        })?;
        info!(
            "📡 Nearest station: {} ({:.1} km away)",
            station.station_name, distance
        );

        let advice = advice::advise(&location.name, Some(station), &self.thresholds);

        let rain = match self.buienradar.rain_forecast(&location).await {
            Ok(forecast) => {
                freshness = freshness.combine(forecast.freshness);
                advice::rain_outlook(&forecast.value, self.thresholds.rain_value)
            }
            Err(e) => {
                warn!("Rain forecast for {} unavailable: {:#}", location.name, e);
                RainOutlook::unavailable()
            }
        };

        let today = Utc::now().with_timezone(&Amsterdam).date_naive();
        let sun = get_sunrise_sunset(&location, today).map(|(sunrise, sunset)| SunTimes {
            sunrise: sunrise.fixed_offset(),
            sunset: sunset.fixed_offset(),
        });

        let summary = advice::summary(&location.name, &advice, &rain);

        Ok(WeatherReport {
            query: query.trim().to_string(),
            feels_like: units::feels_like(station),
            wind_direction: units::wind_direction_english(station),
            station: station.clone(),
            station_distance_km: distance,
            location,
            advice,
            rain,
            sun,
            forecast: snapshot.five_day.clone(),
            report_summary: snapshot.report_summary.clone(),
            summary,
            freshness,
            generated_at: Utc::now(),
        })
    }

    /// Reports for several cities, fetched concurrently from one feed
    /// download. A failing city does not fail the comparison, an unreachable
    /// feed does.
    #[instrument(skip(self))]
    pub async fn compare(&self, queries: &[String]) -> Result<CityComparison> {
        let queries: Vec<&str> = queries
            .iter()
            .map(|query| query.trim())
            .filter(|query| !query.is_empty())
            .collect();

        if queries.is_empty() {
            return Err(WeatherAgentError::validation("At least one city is required").into());
        }
        if queries.len() > MAX_COMPARED_CITIES {
            return Err(WeatherAgentError::validation(format!(
                "At most {MAX_COMPARED_CITIES} cities can be compared, got {}",
                queries.len()
            ))
            .into());
        }

        let snapshot = self.buienradar.snapshot().await?;
        let results = join_all(
            queries
                .iter()
                .map(|query| self.report_with(query, &snapshot)),
        )
        .await;

        let cities: Vec<CityOutcome> = queries
            .iter()
            .zip(results)
            .map(|(query, result)| match result {
                Ok(report) => CityOutcome::Report(Box::new(report)),
                Err(e) => {
                    warn!("Comparison: {} failed: {:#}", query, e);
                    CityOutcome::Failed {
                        query: (*query).to_string(),
                        error: describe_error(&e),
                    }
                }
            })
            .collect();

        let mut comparison = CityComparison {
            cities,
            highlights: Highlights::default(),
        };
        comparison.highlights = Highlights::from_reports(comparison.reports());
        Ok(comparison)
    }
}

/// User-facing text for an error chain
#[must_use]
pub fn describe_error(error: &anyhow::Error) -> String {
    WeatherAgentError::find_in(error).map_or_else(|| format!("{error:#}"), |e| e.user_message())
}

/// Save the summary sentence to a text file (the fallback for reading it aloud)
pub fn write_summary(report: &WeatherReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(WeatherAgentError::from)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, format!("{}\n", report.summary))
        .map_err(WeatherAgentError::from)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    info!("Summary saved to {}", path.display());
    Ok(())
}
