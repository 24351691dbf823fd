//! Error types and handling for the weather agent

use thiserror::Error;

/// Main error type for the weather agent
#[derive(Error, Debug)]
pub enum WeatherAgentError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream API communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Geocoding returned nothing for the query
    #[error("Location not found: {query}")]
    LocationNotFound { query: String },

    /// The Buienradar feed did not contain any usable station
    #[error("No weather stations available: {message}")]
    NoStations { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl WeatherAgentError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn location_not_found<S: Into<String>>(query: S) -> Self {
        Self::LocationNotFound {
            query: query.into(),
        }
    }

    pub fn no_stations<S: Into<String>>(message: S) -> Self {
        Self::NoStations {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            WeatherAgentError::Config { message } => {
                format!("Configuration error: {message}. Please check your config file.")
            }
            WeatherAgentError::Api { .. } => {
                "Unable to reach the weather service. Please check your internet connection."
                    .to_string()
            }
            WeatherAgentError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            WeatherAgentError::LocationNotFound { query } => {
                format!("⚠️ Could not find '{query}'. Try again.")
            }
            WeatherAgentError::NoStations { .. } => {
                "No weather stations are reporting right now. Please try again later.".to_string()
            }
            WeatherAgentError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            WeatherAgentError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            WeatherAgentError::General { message } => message.clone(),
        }
    }

    /// Find the first `WeatherAgentError` in an `anyhow` error chain
    #[must_use]
    pub fn find_in(error: &anyhow::Error) -> Option<&WeatherAgentError> {
        error
            .chain()
            .find_map(|cause| cause.downcast_ref::<WeatherAgentError>())
    }
}
