use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SafetyFlag;

/// One reconciled forecast / ground-truth comparison for an hour bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub hour: DateTime<Utc>,
    pub forecast_fetched_at: DateTime<Utc>,
    pub ground_truth_at: DateTime<Utc>,

    pub forecast_seeing_arcsec: Option<f64>,
    pub forecast_cloud_pct: Option<f64>,
    pub forecast_score: u8,
    pub forecast_temperature_c: Option<f64>,
    pub forecast_humidity_pct: Option<f64>,

    pub actual_sky_minus_ambient_c: Option<f64>,
    pub actual_sky_brightness_mpsas: Option<f64>,
    pub actual_temperature_c: Option<f64>,
    pub actual_humidity_pct: Option<f64>,
    pub actual_safety: SafetyFlag,

    pub forecast_clear: bool,
    pub cloud_classification_match: bool,
    /// forecast - actual
    pub temperature_error_c: Option<f64>,
    /// forecast - actual
    pub humidity_error_pct: Option<f64>,

    pub hour_of_day: u32,
    pub day_of_year: u32,
}
