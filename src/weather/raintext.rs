//! Buienradar "raintext": the 2-hour precipitation forecast for one coordinate
//!
//! The endpoint returns one `value|HH:MM` line per 5 minutes, where `value`
//! is 0-255 and maps logarithmically onto mm/h.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::location::Location;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainPoint {
    /// Local time as sent by Buienradar ("HH:MM")
    pub time: String,
    pub value: u8,
}

impl RainPoint {
    /// Precipitation intensity in mm/h: `10^((value - 109) / 32)`, 0 for no rain
    #[must_use]
    pub fn intensity_mm_per_hour(&self) -> f64 {
        if self.value == 0 {
            return 0.0;
        }
        10_f64.powf((f64::from(self.value) - 109.0) / 32.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainForecast {
    pub location: Location,
    pub points: Vec<RainPoint>,
}

impl RainForecast {
    /// First point whose value exceeds `threshold`
    #[must_use]
    pub fn first_above(&self, threshold: u8) -> Option<&RainPoint> {
        self.points.iter().find(|point| point.value > threshold)
    }

    /// Peak intensity over the forecast window in mm/h
    #[must_use]
    pub fn peak_intensity(&self) -> f64 {
        self.points
            .iter()
            .map(RainPoint::intensity_mm_per_hour)
            .fold(0.0, f64::max)
    }
}

/// Parse a raintext body. Malformed lines are skipped.
#[must_use]
pub fn parse_raintext(body: &str) -> Vec<RainPoint> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let Some((value, time)) = line.split_once('|') else {
                warn!("Skipping malformed raintext line: {:?}", line);
                return None;
            };
            match value.trim().parse::<u8>() {
                Ok(value) => Some(RainPoint {
                    time: time.trim().to_string(),
                    value,
                }),
                Err(_) => {
                    warn!("Skipping raintext line with invalid value: {:?}", line);
                    None
                }
            }
        })
        .collect()
}
