//! Outbound HTTP client with timeouts and bounded retries

use crate::WeatherAgentError;
use crate::config::HttpConfig;
use anyhow::{Context, Result};
use reqwest::{Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Settings for [`build_client`]
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    /// Shortest wait between retries; doubles per attempt up to `max_backoff`
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&HttpConfig> for HttpSettings {
    fn from(config: &HttpConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds.into()),
            max_retries: config.max_retries,
            user_agent: config.user_agent.clone(),
            min_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Build a client that retries transient failures (connect errors, timeouts,
/// 5xx and 429) up to `max_retries` times with exponential backoff.
pub fn build_client(settings: &HttpSettings) -> Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.as_str())
        .build()
        .with_context(|| "Failed to create HTTP client")?;

    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(settings.min_backoff, settings.max_backoff)
        .build_with_max_retries(settings.max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// GET `url` and decode the body as JSON
#[instrument(skip(client))]
pub async fn get_json<T: DeserializeOwned>(client: &ClientWithMiddleware, url: &str) -> Result<T> {
    let response = send(client, url).await?;
    let parse_start = Instant::now();
    let value = response.json::<T>().await.map_err(|e| {
        WeatherAgentError::api(format!("Invalid JSON received from {url}: {e}"))
    })?;
    debug!("Parsed JSON in {:.3}s", parse_start.elapsed().as_secs_f64());
    Ok(value)
}

/// GET `url` and return the body as text
#[instrument(skip(client))]
pub async fn get_text(client: &ClientWithMiddleware, url: &str) -> Result<String> {
    let response = send(client, url).await?;
    let text = response
        .text()
        .await
        .map_err(|e| WeatherAgentError::api(format!("Failed to read body from {url}: {e}")))?;
    Ok(text)
}

async fn send(client: &ClientWithMiddleware, url: &str) -> Result<Response> {
    let start_time = Instant::now();

    let response = client.get(url).send().await.map_err(|e| {
        warn!("Request to {} failed: {}", url, e);
        WeatherAgentError::api(format!("Request to {url} failed: {e}"))
    })?;

    let status = response.status();
    let elapsed = start_time.elapsed();
    debug!("HTTP {} in {:.3}s", status, elapsed.as_secs_f64());

    if elapsed.as_secs() > 5 {
        warn!("Slow API response detected: {:.3}s", elapsed.as_secs_f64());
    }

    if status.is_success() {
        return Ok(response);
    }

    let message = match status {
        StatusCode::NOT_FOUND => format!("Resource not found (HTTP 404): {url}"),
        StatusCode::TOO_MANY_REQUESTS => {
            "Rate limit exceeded and retry attempts exhausted (HTTP 429)".to_string()
        }
        _ => format!(
            "API request failed with status: {} - {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        ),
    };
    warn!("{}", message);
    Err(WeatherAgentError::api(message).into())
}

#[cfg(test)]
pub(crate) fn test_settings() -> HttpSettings {
    HttpSettings {
        timeout: Duration::from_secs(5),
        max_retries: 2,
        user_agent: "weather-agent-tests".to_string(),
        min_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}
