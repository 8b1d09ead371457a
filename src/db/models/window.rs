use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataQualityError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFeedback {
    /// 1 (useless) to 5 (excellent)
    pub rating: u8,
    pub notes: Option<String>,
    pub actually_used: bool,
}

impl WindowFeedback {
    pub fn new(
        rating: u8,
        notes: Option<String>,
        actually_used: bool,
    ) -> Result<Self, DataQualityError> {
        if !(1..=5).contains(&rating) {
            return Err(DataQualityError::new("rating", rating, "must be between 1 and 5"));
        }
        Ok(Self {
            rating,
            notes: notes.filter(|n| !n.trim().is_empty()),
            actually_used,
        })
    }
}

/// A contiguous span of dark forecast hours judged jointly favorable.
///
/// `end_time` is exclusive, so `duration_secs == end_time - start_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationWindow {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: i64,
    /// Hours at or above the threshold; absorbed gap hours are not counted
    pub qualifying_hours: u32,
    pub mean_score: f64,
    pub min_score: u8,
    pub mean_seeing_arcsec: Option<f64>,
    pub mean_cloud_pct: Option<f64>,
    pub notified: bool,
    pub notified_at: Option<DateTime<Utc>>,
    pub feedback: Option<WindowFeedback>,
    pub created_at: DateTime<Utc>,
}

impl ObservationWindow {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs)
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_secs as f64 / 3600.0
    }
}
