mod types;

pub use types::{Freshness, HealthSnapshot, LoopKind, LoopStats, StatsSnapshot};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::config::FreshnessConfig;
use crate::error::{CycleError, StoreError};
use crate::store::{ForecastStore, GroundTruthStore};

/// In-memory counters of completed and skipped cycles, shared by the loops.
pub struct CycleStats {
    inner: Arc<Mutex<StatsSnapshot>>,
}

impl CycleStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatsSnapshot::default())),
        }
    }

    pub async fn record_success(&self, kind: LoopKind, at: DateTime<Utc>) {
        let mut state = self.inner.lock().await;
        let stats = state.get_mut(kind);
        stats.completed += 1;
        stats.last_success_at = Some(at);
    }

    pub async fn record_skip(&self, kind: LoopKind, err: &CycleError, at: DateTime<Utc>) {
        let mut state = self.inner.lock().await;
        let stats = state.get_mut(kind);
        stats.skipped += 1;
        stats.last_error = Some(err.to_string());
        stats.last_error_kind = Some(err.kind().to_string());
        stats.last_error_at = Some(at);
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().await.clone()
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CycleStats {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Degraded when either feed has not been written within its freshness window.
pub async fn evaluate_health<S>(
    store: &S,
    freshness: &FreshnessConfig,
    now: DateTime<Utc>,
) -> Result<HealthSnapshot, StoreError>
where
    S: ForecastStore + GroundTruthStore,
{
    let last_forecast_fetch = store.latest_forecast_fetch().await?;
    let last_ground_truth = store.latest_ground_truth().await?;

    let forecast = Freshness::evaluate(
        last_forecast_fetch,
        now,
        Duration::minutes(i64::from(freshness.forecast_minutes)),
    );
    let ground_truth = Freshness::evaluate(
        last_ground_truth,
        now,
        Duration::minutes(i64::from(freshness.ground_truth_minutes)),
    );

    Ok(HealthSnapshot {
        checked_at: now,
        last_forecast_fetch,
        last_ground_truth,
        forecast,
        ground_truth,
        degraded: forecast != Freshness::Fresh || ground_truth != Freshness::Fresh,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 23, 22, 0, 0).unwrap()
    }

    #[test]
    fn freshness_boundaries() {
        let window = Duration::minutes(20);
        assert_eq!(Freshness::evaluate(None, now(), window), Freshness::Never);
        assert_eq!(
            Freshness::evaluate(Some(now() - window), now(), window),
            Freshness::Fresh
        );
        assert_eq!(
            Freshness::evaluate(Some(now() - Duration::minutes(21)), now(), window),
            Freshness::Stale
        );
    }

    #[tokio::test]
    async fn stats_are_shared_between_clones() {
        let stats = CycleStats::new();
        let clone = stats.clone();

        clone.record_success(LoopKind::Forecast, now()).await;
        stats
            .record_skip(
                LoopKind::GroundTruth,
                &CycleError::TransientSource(SourceError::Timeout(30)),
                now(),
            )
            .await;

        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.forecast.completed, 1);
        assert_eq!(snapshot.forecast.last_success_at, Some(now()));
        assert_eq!(snapshot.ground_truth.skipped, 1);
        assert_eq!(
            snapshot.get(LoopKind::GroundTruth).last_error_kind.as_deref(),
            Some("transient_source")
        );
        assert_eq!(snapshot.training, LoopStats::default());
    }
}
