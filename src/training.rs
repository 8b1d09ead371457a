use std::ops::Range;

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use log::{debug, info};

use crate::config::{ReconciliationConfig, ScoringConfig};
use crate::db::models::{ForecastRecord, GroundTruthRecord, SafetyFlag, TrainingPair};
use crate::error::{CycleError, DataQualityError, StoreError};
use crate::store::{ForecastStore, GroundTruthStore, TrainingStore};

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Paired(TrainingPair),
    AlreadyPaired,
    /// One side is still missing; a later pass retries the hour.
    Deferred,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub paired: usize,
    pub already_paired: usize,
    pub deferred: usize,
}

pub struct TrainingPairBuilder<S> {
    store: S,
    clear_cloud_threshold_pct: f64,
    tolerance: Duration,
}

impl<S> TrainingPairBuilder<S>
where
    S: ForecastStore + GroundTruthStore + TrainingStore,
{
    pub fn new(store: S, clear_cloud_threshold_pct: f64, tolerance: Duration) -> Self {
        Self {
            store,
            clear_cloud_threshold_pct,
            tolerance,
        }
    }

    pub fn from_config(store: S, scoring: &ScoringConfig, reconciliation: &ReconciliationConfig) -> Self {
        Self::new(
            store,
            scoring.clear_cloud_threshold_pct,
            reconciliation.tolerance(),
        )
    }

    /// Pair the latest forecast for `hour` with the newest ground-truth sample
    /// taken at most `tolerance` before it.
    pub async fn reconcile(&self, hour: DateTime<Utc>) -> Result<ReconcileOutcome, CycleError> {
        if hour.minute() != 0 || hour.second() != 0 || hour.nanosecond() != 0 {
            return Err(DataQualityError::new("hour", hour, "not aligned to the hour").into());
        }

        if self
            .store
            .training_pair_exists(hour)
            .await
            .map_err(CycleError::Persistence)?
        {
            return Ok(ReconcileOutcome::AlreadyPaired);
        }

        let forecast = self
            .store
            .read_latest_forecast(hour..hour + Duration::hours(1))
            .await
            .map_err(CycleError::Persistence)?
            .into_iter()
            .find(|row| row.target_time == hour);
        let Some(forecast) = forecast else {
            debug!("no forecast for {hour}, deferring");
            return Ok(ReconcileOutcome::Deferred);
        };

        let Some(actual) = self
            .store
            .read_ground_truth_near(hour, self.tolerance)
            .await
            .map_err(CycleError::Persistence)?
        else {
            debug!("no ground truth near {hour}, deferring");
            return Ok(ReconcileOutcome::Deferred);
        };

        let pair = build_pair(hour, &forecast, &actual, self.clear_cloud_threshold_pct);
        match self.store.save_training_pair(&pair).await {
            Ok(()) => {
                info!(
                    "training pair {hour}: forecast_clear={} safety={} match={}",
                    pair.forecast_clear,
                    pair.actual_safety.as_str(),
                    pair.cloud_classification_match
                );
                Ok(ReconcileOutcome::Paired(pair))
            }
            Err(StoreError::Duplicate) => Ok(ReconcileOutcome::AlreadyPaired),
            Err(err) => Err(CycleError::Persistence(err)),
        }
    }

    /// Reconcile every whole hour starting inside `range`.
    pub async fn reconcile_range(
        &self,
        range: Range<DateTime<Utc>>,
    ) -> Result<ReconcileReport, CycleError> {
        let mut report = ReconcileReport::default();
        let mut hour = ceil_to_hour(range.start);

        while hour < range.end {
            match self.reconcile(hour).await? {
                ReconcileOutcome::Paired(_) => report.paired += 1,
                ReconcileOutcome::AlreadyPaired => report.already_paired += 1,
                ReconcileOutcome::Deferred => report.deferred += 1,
            }
            hour += Duration::hours(1);
        }

        Ok(report)
    }
}

/// Forecast predicted clear sky. A missing cloud value never counts as clear.
pub fn forecast_is_clear(cloud_pct: Option<f64>, threshold_pct: f64) -> bool {
    cloud_pct.is_some_and(|c| c < threshold_pct)
}

fn build_pair(
    hour: DateTime<Utc>,
    forecast: &ForecastRecord,
    actual: &GroundTruthRecord,
    clear_cloud_threshold_pct: f64,
) -> TrainingPair {
    let predicted = &forecast.conditions;
    let observed = &actual.readings;

    let forecast_clear = forecast_is_clear(predicted.total_cloud_pct, clear_cloud_threshold_pct);

    TrainingPair {
        hour,
        forecast_fetched_at: forecast.fetched_at,
        ground_truth_at: actual.timestamp,
        forecast_seeing_arcsec: predicted.seeing_arcsec,
        forecast_cloud_pct: predicted.total_cloud_pct,
        forecast_score: forecast.score,
        forecast_temperature_c: predicted.temperature_c,
        forecast_humidity_pct: predicted.humidity_pct,
        actual_sky_minus_ambient_c: observed.sky_minus_ambient_c,
        actual_sky_brightness_mpsas: observed.sky_brightness_mpsas,
        actual_temperature_c: observed.ambient_temp_c,
        actual_humidity_pct: observed.humidity_pct,
        actual_safety: actual.safety,
        forecast_clear,
        cloud_classification_match: forecast_clear && actual.safety == SafetyFlag::Safe,
        temperature_error_c: difference(predicted.temperature_c, observed.ambient_temp_c),
        humidity_error_pct: difference(predicted.humidity_pct, observed.humidity_pct),
        hour_of_day: hour.hour(),
        day_of_year: hour.ordinal(),
    }
}

fn difference(forecast: Option<f64>, actual: Option<f64>) -> Option<f64> {
    Some(forecast? - actual?)
}

fn ceil_to_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    match at.duration_trunc(Duration::hours(1)) {
        Ok(floor) if floor == at => floor,
        Ok(floor) => floor + Duration::hours(1),
        Err(_) => at,
    }
}
