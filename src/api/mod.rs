use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::WeatherAgentError;
use crate::report::{CityComparison, WeatherReport, WeatherService};

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    /// Comma-separated city names
    pub cities: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error response: the user-facing message with a status matching the cause
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match WeatherAgentError::find_in(&self.0) {
            Some(WeatherAgentError::Validation { .. }) => StatusCode::BAD_REQUEST,
            Some(WeatherAgentError::LocationNotFound { .. }) => StatusCode::NOT_FOUND,
            Some(WeatherAgentError::Api { .. } | WeatherAgentError::NoStations { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {:#}", self.0);
        }
        let body = ErrorBody {
            error: crate::report::describe_error(&self.0),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(service: Arc<WeatherService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/weather", get(get_weather))
        .route("/compare", get(get_comparison))
        .route("/summary", get(get_summary))
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

fn city_or_default<'a>(service: &'a WeatherService, query: &'a CityQuery) -> &'a str {
    query
        .city
        .as_deref()
        .filter(|city| !city.trim().is_empty())
        .unwrap_or_else(|| service.default_city())
}

async fn get_weather(
    State(service): State<Arc<WeatherService>>,
    Query(query): Query<CityQuery>,
) -> Result<Json<WeatherReport>, ApiError> {
    let report = service.report(city_or_default(&service, &query)).await?;
    Ok(Json(report))
}

async fn get_summary(
    State(service): State<Arc<WeatherService>>,
    Query(query): Query<CityQuery>,
) -> Result<String, ApiError> {
    let report = service.report(city_or_default(&service, &query)).await?;
    Ok(report.summary)
}

async fn get_comparison(
    State(service): State<Arc<WeatherService>>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<CityComparison>, ApiError> {
    let cities: Vec<String> = query.cities.split(',').map(str::to_string).collect();
    let comparison = service.compare(&cities).await?;
    Ok(Json(comparison))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::service_with_expired_feed;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use wiremock::MockServer;

    async fn get_weather_status(age: Duration) -> (StatusCode, serde_json::Value) {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let service = service_with_expired_feed(&server, &dir, age).await;

        let response = router(Arc::new(service))
            .oneshot(
                Request::builder()
                    .uri("/weather?city=51.95,4.45")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_recent_cache_answers_while_feed_is_down() {
        let (status, body) = get_weather_status(Duration::from_secs(120)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["freshness"]["state"], "stale");
    }

    #[tokio::test]
    async fn test_outdated_cache_is_bad_gateway() {
        let (status, body) = get_weather_status(Duration::from_secs(4 * 60 * 60)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("Unable to reach the weather service"));
    }

    #[tokio::test]
    async fn test_out_of_range_coordinates_are_bad_request() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let service = service_with_expired_feed(&server, &dir, Duration::from_secs(120)).await;

        let response = router(Arc::new(service))
            .oneshot(
                Request::builder()
                    .uri("/weather?city=91.0,8.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
