use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Europe::Amsterdam;
use chrono_tz::Tz;
use reqwest_middleware::ClientWithMiddleware;
use sunrise::{Coordinates, SolarDay, SolarEvent};
use tracing::{info, instrument};

use crate::WeatherAgentError;
use crate::cache::{Cached, PersistentCache, cached_or_stale};
use crate::config::{BuienradarConfig, CacheConfig};
use crate::http;
use crate::location::Location;

pub mod buienradar;
pub mod raintext;

pub use buienradar::{DailyForecast, FeedSnapshot, StationObservation, nearest_station};
pub use raintext::{RainForecast, RainPoint, parse_raintext};

pub(crate) const FEED_CACHE_KEY: &str = "buienradar:feed";

/// Sunrise and sunset in Dutch local time. `None` when the sun does not
/// rise or set on `date` at the location.
pub fn get_sunrise_sunset(
    location: &Location,
    date: NaiveDate,
) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
    let coordinates = Coordinates::new(location.latitude, location.longitude)?;
    let solar_day = SolarDay::new(coordinates, date);

    let sunrise: DateTime<Utc> = solar_day.event_time(SolarEvent::Sunrise)?;
    let sunset: DateTime<Utc> = solar_day.event_time(SolarEvent::Sunset)?;

    Some((
        sunrise.with_timezone(&Amsterdam),
        sunset.with_timezone(&Amsterdam),
    ))
}

/// Client for the Buienradar feed and raintext endpoints, cached with stale fallback
pub struct BuienradarClient {
    http: ClientWithMiddleware,
    config: BuienradarConfig,
    cache: Arc<PersistentCache>,
    cache_config: CacheConfig,
}

impl BuienradarClient {
    #[must_use]
    pub fn new(
        http: ClientWithMiddleware,
        config: BuienradarConfig,
        cache: Arc<PersistentCache>,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            http,
            config,
            cache,
            cache_config,
        }
    }

    /// All station measurements plus the five-day forecast
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> Result<Cached<FeedSnapshot>> {
        cached_or_stale(
            &self.cache,
            FEED_CACHE_KEY,
            self.cache_config.feed_ttl(),
            self.cache_config.max_stale(),
            || self.fetch_snapshot(),
        )
        .await
    }

    async fn fetch_snapshot(&self) -> Result<FeedSnapshot> {
        info!("Fetching Buienradar station feed");
        let feed: buienradar::dto::Feed = http::get_json(&self.http, &self.config.feed_url).await?;
        let snapshot = FeedSnapshot::from(feed);

        let placed = snapshot
            .stations
            .iter()
            .filter(|station| station.latitude.is_some() && station.longitude.is_some())
            .count();
        if placed == 0 {
            return Err(WeatherAgentError::no_stations(
                "the Buienradar feed contained no stations with coordinates",
            )
            .into());
        }

        info!(
            "Received {} station measurements ({} with coordinates)",
            snapshot.stations.len(),
            placed
        );
        Ok(snapshot)
    }

    /// 2-hour rain forecast for the location, keyed by coordinates rounded to 0.01°
    #[instrument(skip(self), fields(location = %location.name))]
    pub async fn rain_forecast(&self, location: &Location) -> Result<Cached<RainForecast>> {
        cached_or_stale(
            &self.cache,
            &location.cache_key("raintext"),
            self.cache_config.rain_ttl(),
            self.cache_config.max_stale(),
            || self.fetch_rain_forecast(location),
        )
        .await
    }

    async fn fetch_rain_forecast(&self, location: &Location) -> Result<RainForecast> {
        let url = format!(
            "{}?lat={:.2}&lon={:.2}",
            self.config.raintext_url, location.latitude, location.longitude
        );
        let body = http::get_text(&self.http, &url).await?;
        let points = parse_raintext(&body);

        if points.is_empty() {
            return Err(WeatherAgentError::api("Empty rain forecast received from Buienradar").into());
        }

        info!("Received {} rain forecast points", points.len());
        Ok(RainForecast {
            location: location.clone(),
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{build_client, test_settings};
    use chrono::Timelike;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, dir: &TempDir) -> BuienradarClient {
        let config = BuienradarConfig {
            feed_url: format!("{}/feed/json", server.uri()),
            raintext_url: format!("{}/data/raintext", server.uri()),
        };
        let cache = Arc::new(PersistentCache::open(dir.path()).unwrap());
        BuienradarClient::new(
            build_client(&test_settings()).unwrap(),
            config,
            cache,
            CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_snapshot_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed/json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(buienradar::tests::sample_feed()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let client = client_for(&server, &dir);

        let first = client.snapshot().await.unwrap();
        let second = client.snapshot().await.unwrap();
        assert_eq!(first.value.stations.len(), 3);
        assert_eq!(second.value.stations, first.value.stations);
        assert!(!second.freshness.is_stale());
    }

    #[tokio::test]
    async fn test_snapshot_without_placed_stations_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "actual": {"stationmeasurements": [{"stationid": 1, "stationname": "Nowhere"}]}
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = client_for(&server, &dir).snapshot().await.unwrap_err();
        assert!(matches!(
            WeatherAgentError::find_in(&err),
            Some(WeatherAgentError::NoStations { .. })
        ));
    }

    #[tokio::test]
    async fn test_rain_forecast_uses_rounded_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/raintext"))
            .and(query_param("lat", "52.16"))
            .and(query_param("lon", "4.50"))
            .respond_with(ResponseTemplate::new(200).set_body_string("000|13:55\r\n090|14:00\r\n"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let leiden = Location::new(52.1601, 4.4970, "Leiden".to_string());
        let forecast = client_for(&server, &dir).rain_forecast(&leiden).await.unwrap();
        assert_eq!(forecast.value.points.len(), 2);
        assert_eq!(forecast.value.first_above(70).map(|p| p.time.as_str()), Some("14:00"));
    }

    #[tokio::test]
    async fn test_empty_rain_forecast_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/raintext"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let leiden = Location::new(52.16, 4.49, "Leiden".to_string());
        let err = client_for(&server, &dir).rain_forecast(&leiden).await.unwrap_err();
        assert!(err.to_string().contains("Empty rain forecast"));
    }

    #[test]
    fn test_sunrise_sunset_in_leiden() {
        let leiden = Location::new(52.1601, 4.4970, "Leiden".to_string());
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let (sunrise, sunset) = get_sunrise_sunset(&leiden, date).unwrap();

        assert!(sunrise < sunset);
        assert!((5..=6).contains(&sunrise.hour()), "sunrise at {sunrise}");
        assert!((21..=22).contains(&sunset.hour()), "sunset at {sunset}");
    }
}
