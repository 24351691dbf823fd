//! Resolve city names and postal codes to coordinates via Nominatim

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::RngExt;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::WeatherAgentError;
use crate::cache::{Cached, PersistentCache, cached_or_stale};
use crate::config::{CacheConfig, GeocodingConfig};
use crate::http;
use crate::location::{Location, LocationInput};

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    name: Option<String>,
    display_name: String,
}

impl NominatimPlace {
    fn into_location(self, query: &str) -> Result<Location> {
        let latitude = self.lat.parse::<f64>().map_err(|_| {
            WeatherAgentError::api(format!("Invalid latitude from geocoder: {}", self.lat))
        })?;
        let longitude = self.lon.parse::<f64>().map_err(|_| {
            WeatherAgentError::api(format!("Invalid longitude from geocoder: {}", self.lon))
        })?;

        let mut parts = self.display_name.split(',').map(str::trim);
        let first = parts.next().unwrap_or(query);
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| first.to_string());

        match parts.last() {
            Some(country) => Ok(Location::with_country(
                latitude,
                longitude,
                name,
                country.to_string(),
            )),
            None => Ok(Location::new(latitude, longitude, name)),
        }
    }
}

pub struct Geocoder {
    http: ClientWithMiddleware,
    config: GeocodingConfig,
    cache: Arc<PersistentCache>,
    ttl: Duration,
}

impl Geocoder {
    #[must_use]
    pub fn new(
        http: ClientWithMiddleware,
        config: GeocodingConfig,
        cache: Arc<PersistentCache>,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            http,
            config,
            cache,
            ttl: cache_config.geocode_ttl(),
        }
    }

    /// Resolve a parsed location input. Coordinates are used as given.
    #[instrument(skip(self))]
    pub async fn resolve(&self, input: &LocationInput) -> Result<Cached<Location>> {
        let query = match input {
            LocationInput::Coordinates(lat, lon) => {
                let mut location = Location::new(*lat, *lon, String::new());
                location.name = location.format_coordinates();
                return Ok(Cached::fresh(location));
            }
            LocationInput::Name(query) | LocationInput::PostalCode(query) => query,
        };

        let key = format!("geocode:{}", query.to_lowercase());
        // Spread expiry so lookups made together don't all refresh at once
        let jitter: f64 = rand::rng().random_range(0.9..1.1);
        let ttl = Duration::from_secs_f64(self.ttl.as_secs_f64() * jitter);

        cached_or_stale(&self.cache, &key, ttl, self.ttl, || self.lookup(query)).await
    }

    async fn lookup(&self, query: &str) -> Result<Location> {
        let search = if self.config.country_suffix.is_empty() {
            query.to_string()
        } else {
            format!("{query}, {}", self.config.country_suffix)
        };
        let url = format!(
            "{}/search?q={}&format=json&limit=1",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&search)
        );

        debug!("Geocoding '{}'", search);
        let places: Vec<NominatimPlace> = http::get_json(&self.http, &url).await?;

        let Some(place) = places.into_iter().next() else {
            return Err(WeatherAgentError::location_not_found(query).into());
        };

        let location = place.into_location(query)?;
        info!(
            "📍 Found {}: {}",
            location.name,
            location.format_coordinates()
        );
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{build_client, test_settings};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder_for(server: &MockServer, dir: &TempDir) -> Geocoder {
        let config = GeocodingConfig {
            base_url: server.uri(),
            country_suffix: "Netherlands".to_string(),
        };
        Geocoder::new(
            build_client(&test_settings()).unwrap(),
            config,
            Arc::new(PersistentCache::open(dir.path()).unwrap()),
            &CacheConfig::default(),
        )
    }

    fn leiden_response() -> serde_json::Value {
        serde_json::json!([{
            "lat": "52.1594747",
            "lon": "4.4908843",
            "name": "Leiden",
            "display_name": "Leiden, Zuid-Holland, Nederland"
        }])
    }

    #[tokio::test]
    async fn test_resolve_name_adds_country_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Leiden, Netherlands"))
            .and(query_param("format", "json"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(leiden_response()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let geocoder = geocoder_for(&server, &dir);
        let input = LocationInput::Name("Leiden".to_string());

        let first = geocoder.resolve(&input).await.unwrap();
        assert_eq!(first.value.name, "Leiden");
        assert_eq!(first.value.country.as_deref(), Some("Nederland"));
        assert!((first.value.latitude - 52.159).abs() < 0.001);

        // Served from cache; the mock expects exactly one call
        let second = geocoder
            .resolve(&LocationInput::Name("LEIDEN".to_string()))
            .await
            .unwrap();
        assert_eq!(second.value, first.value);
    }

    #[tokio::test]
    async fn test_unknown_city_is_location_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = geocoder_for(&server, &dir)
            .resolve(&LocationInput::Name("Atlantis".to_string()))
            .await
            .unwrap_err();

        match WeatherAgentError::find_in(&err) {
            Some(WeatherAgentError::LocationNotFound { query }) => assert_eq!(query, "Atlantis"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_coordinates_skip_geocoder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let location = geocoder_for(&server, &dir)
            .resolve(&LocationInput::Coordinates(52.0116, 4.3571))
            .await
            .unwrap();
        assert_eq!(location.value.name, "52.0116, 4.3571");
    }

    #[test]
    fn test_place_without_name_uses_display_name() {
        let place = NominatimPlace {
            lat: "52.0".to_string(),
            lon: "4.3".to_string(),
            name: None,
            display_name: "2611 AA, Delft, Nederland".to_string(),
        };
        let location = place.into_location("2611 AA").unwrap();
        assert_eq!(location.name, "2611 AA");
        assert_eq!(location.country.as_deref(), Some("Nederland"));
    }

    #[test]
    fn test_invalid_coordinates_from_geocoder() {
        let place = NominatimPlace {
            lat: "north".to_string(),
            lon: "4.3".to_string(),
            name: None,
            display_name: "Somewhere".to_string(),
        };
        assert!(place.into_location("Somewhere").is_err());
    }
}
