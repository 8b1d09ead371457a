//! Ground-truth sensor models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::imagery::ImageRef;

/// Canonical tri-state sky safety.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SafetyFlag {
    Unknown,
    Safe,
    Unsafe,
}

impl SafetyFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyFlag::Unknown => "unknown",
            SafetyFlag::Safe => "safe",
            SafetyFlag::Unsafe => "unsafe",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unknown" => Some(SafetyFlag::Unknown),
            "safe" => Some(SafetyFlag::Safe),
            "unsafe" => Some(SafetyFlag::Unsafe),
            _ => None,
        }
    }
}

/// Measured values from one poll of the sky sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    /// Sky minus ambient temperature; more negative means clearer
    pub sky_minus_ambient_c: Option<f64>,
    pub sky_temp_c: Option<f64>,
    pub ambient_temp_c: Option<f64>,
    pub dew_point_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    /// Sky quality in mag/arcsec², higher is darker
    pub sky_brightness_mpsas: Option<f64>,
    pub rain_raw: Option<f64>,
    /// `Some(false)` when the rain sensor reports wet
    pub rain_dry: Option<bool>,
    pub wind_kmh: Option<f64>,
    pub gust_kmh: Option<f64>,
    pub pressure_abs_hpa: Option<f64>,
    pub pressure_rel_hpa: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial: Option<String>,
    pub firmware: Option<String>,
}

/// Raw sample as delivered by a sensor source, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp: DateTime<Utc>,
    pub readings: SensorReadings,
    /// Device-specific cloud safety code (see `ground_truth::translate_safety_code`)
    pub safety_code: Option<i64>,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub timestamp: DateTime<Utc>,
    pub readings: SensorReadings,
    pub safety: SafetyFlag,
    pub images: Vec<ImageRef>,
    pub device: DeviceInfo,
}
