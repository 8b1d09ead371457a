use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tunable thresholds for the observation-window state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Hours scoring at or above this qualify for a window
    pub threshold: u8,

    /// Shorter runs are discarded
    pub min_duration_hours: u32,

    /// Consecutive sub-threshold hours absorbed inside a run before it closes
    pub gap_tolerance_hours: u32,

    /// Solar zenith angle above which an hour counts as astronomically dark
    pub night_zenith_deg: f64,

    /// How far back the detector reads the archive, so a window already in
    /// progress is still detected with its real start
    pub lookback_hours: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            threshold: 60,
            min_duration_hours: 2,
            gap_tolerance_hours: 1,
            night_zenith_deg: 108.0,
            lookback_hours: 12,
        }
    }
}

impl WindowConfig {
    pub fn min_duration(&self) -> Duration {
        Duration::hours(i64::from(self.min_duration_hours))
    }

    pub fn lookback(&self) -> Duration {
        Duration::hours(i64::from(self.lookback_hours))
    }
}
