//! `weather-agent` - a personal weather agent for Dutch cities
//!
//! Looks up a city, finds the nearest Buienradar station, turns the current
//! measurements into advice and checks the 2-hour rain forecast. Used from
//! the command line or through a small JSON API.

pub mod advice;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod geocode;
pub mod http;
pub mod location;
pub mod report;
pub mod telemetry;
pub mod units;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use advice::{Advice, AdviceKind, AdviceThresholds, RainOutlook};
pub use cache::{Freshness, PersistentCache};
pub use config::AppConfig;
pub use error::WeatherAgentError;
pub use location::{Location, LocationInput};
pub use report::{CityComparison, CityOutcome, WeatherReport, WeatherService};
pub use weather::{RainForecast, StationObservation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeatherAgentError>;
