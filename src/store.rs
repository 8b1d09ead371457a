//! Storage capabilities consumed by the engine.
//!
//! Each trait carries its own conflict policy: forecast history is
//! insert-if-absent, ground truth and training pairs are write-once and report
//! `StoreError::Duplicate` on a repeat, windows are unique per (start, end).
//! `Database` implements all of them.

use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::db::models::{
    ApiCall, ForecastRecord, GroundTruthRecord, ObservationWindow, TrainingPair, WindowFeedback,
};
use crate::error::StoreError;

#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Insert every row in one transaction. Rows whose (target_time,
    /// fetched_at) already exists are skipped. Returns the number inserted.
    async fn append_forecast_batch(&self, rows: &[ForecastRecord]) -> Result<usize, StoreError>;

    /// Latest-fetched row for each target hour in `range`, ordered by target time.
    async fn read_latest_forecast(
        &self,
        range: Range<DateTime<Utc>>,
    ) -> Result<Vec<ForecastRecord>, StoreError>;

    async fn latest_forecast_fetch(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn log_api_call(&self, call: &ApiCall) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GroundTruthStore: Send + Sync {
    async fn upsert_ground_truth(&self, record: &GroundTruthRecord) -> Result<(), StoreError>;

    /// Most recent sample in `[at - tolerance, at]`.
    async fn read_ground_truth_near(
        &self,
        at: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Option<GroundTruthRecord>, StoreError>;

    async fn latest_ground_truth(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
}

#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn window_exists(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn save_window(&self, window: &ObservationWindow) -> Result<(), StoreError>;

    /// Flip `notified` to true. Returns false if it was already set.
    async fn mark_window_notified(
        &self,
        window_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn record_window_feedback(
        &self,
        window_id: &str,
        feedback: &WindowFeedback,
    ) -> Result<(), StoreError>;

    /// Windows ending after `after`, ranked by mean score then start time.
    async fn upcoming_windows(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Vec<ObservationWindow>, StoreError>;
}

#[async_trait]
pub trait TrainingStore: Send + Sync {
    async fn training_pair_exists(&self, hour: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn save_training_pair(&self, pair: &TrainingPair) -> Result<(), StoreError>;
}

/// Everything the scheduled cycles need from one shared, cloneable store.
pub trait EngineStore:
    ForecastStore + GroundTruthStore + WindowStore + TrainingStore + Clone + 'static
{
}

impl<T> EngineStore for T where
    T: ForecastStore + GroundTruthStore + WindowStore + TrainingStore + Clone + 'static
{
}
