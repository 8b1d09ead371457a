//! Forecast data models.
//!
//! `RawForecastHour` is what a forecast source hands over; `ForecastRecord` is
//! one scored, versioned archive row keyed by (target_time, fetched_at).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{AtmosphericMetrics, QualityClass, Score};

/// Predicted conditions for one hour. Every value may be missing in the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastConditions {
    pub seeing_arcsec: Option<f64>,
    pub total_cloud_pct: Option<f64>,
    pub low_cloud_pct: Option<f64>,
    pub mid_cloud_pct: Option<f64>,
    pub high_cloud_pct: Option<f64>,
    pub jetstream_speed_ms: Option<f64>,
    pub moonlight_pct: Option<f64>,
    pub zenith_angle_deg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub precipitation_prob_pct: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub visibility_m: Option<f64>,
    pub fog_probability_pct: Option<f64>,
}

impl ForecastConditions {
    pub fn metrics(&self) -> AtmosphericMetrics {
        AtmosphericMetrics {
            cloud_cover: self.total_cloud_pct,
            seeing_arcsec: self.seeing_arcsec,
            jetstream_speed: self.jetstream_speed_ms,
            moonlight_pct: self.moonlight_pct,
            zenith_angle: self.zenith_angle_deg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForecastHour {
    pub target_time: DateTime<Utc>,
    pub conditions: ForecastConditions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub target_time: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub conditions: ForecastConditions,
    pub score: u8,
    pub quality_class: QualityClass,
}

impl ForecastRecord {
    pub fn scored(raw: RawForecastHour, fetched_at: DateTime<Utc>, score: Score) -> Self {
        Self {
            target_time: raw.target_time,
            fetched_at,
            conditions: raw.conditions,
            score: score.value,
            quality_class: score.class,
        }
    }

    /// A missing zenith angle never counts as dark.
    pub fn is_dark(&self, night_zenith_deg: f64) -> bool {
        self.conditions
            .zenith_angle_deg
            .is_some_and(|zenith| zenith > night_zenith_deg)
    }
}

/// One attempt against a remote API, kept for credit accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCall {
    pub api_name: String,
    pub endpoint: String,
    pub called_at: DateTime<Utc>,
    pub success: bool,
    pub response_time_ms: u64,
    pub credits_used: Option<u64>,
    pub error_message: Option<String>,
}
