use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use chrono_tz::Tz;
use tokio::time::Instant;

use crate::archive::{FetchSummary, ForecastArchive};
use crate::config::{AppConfig, FreshnessConfig, LocationConfig};
use crate::db::models::ApiCall;
use crate::error::CycleError;
use crate::ground_truth::{GroundTruthRecorder, RecordOutcome};
use crate::scoring::SeeingClass;
use crate::sources::{ForecastSource, SensorSource};
use crate::status::{evaluate_health, HealthSnapshot, LoopKind};
use crate::store::EngineStore;
use crate::training::{ReconcileReport, TrainingPairBuilder};
use crate::windows::{summarize_night, PublishReport, WindowConfig, WindowPublisher};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// One unit of scheduled work. A failed run is skipped and retried on the
/// next tick.
#[async_trait]
pub trait Cycle: Send + Sync {
    fn kind(&self) -> LoopKind;

    async fn run(&self, now: DateTime<Utc>) -> Result<(), CycleError>;
}

/// Bound an external call or store write.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T, CycleError>
where
    F: Future<Output = Result<T, CycleError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CycleError::Timeout {
            operation,
            secs: limit.as_secs(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastCycleReport {
    pub fetch: FetchSummary,
    pub windows: PublishReport,
}

/// Fetch, archive, then run window detection over the updated archive.
pub struct ForecastCycle<S> {
    source: Arc<dyn ForecastSource>,
    store: S,
    archive: ForecastArchive<S>,
    publisher: WindowPublisher<S>,
    location: LocationConfig,
    tz: Tz,
    windows: WindowConfig,
    good_score: u8,
    horizon_hours: u32,
    call_timeout: Duration,
    persistence_timeout: Duration,
}

impl<S: EngineStore> ForecastCycle<S> {
    pub fn new(
        source: Arc<dyn ForecastSource>,
        store: S,
        publisher: WindowPublisher<S>,
        config: &AppConfig,
        tz: Tz,
    ) -> Self {
        let persistence_timeout = Duration::from_secs(config.scheduler.persistence_timeout_secs);
        Self {
            source,
            archive: ForecastArchive::new(store.clone()),
            store,
            publisher: publisher.with_store_timeout(persistence_timeout),
            location: config.location.clone(),
            tz,
            windows: config.windows.clone(),
            good_score: config.scoring.good_score,
            horizon_hours: config.sources.meteoblue.forecast_days * 24,
            call_timeout: Duration::from_secs(config.scheduler.call_timeout_secs),
            persistence_timeout,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ForecastCycleReport, CycleError> {
        // Step 1: download, recording the attempt either way
        let started = Instant::now();
        let fetched = bounded("forecast fetch", self.call_timeout, async {
            Ok(self.source.fetch(&self.location, self.horizon_hours).await?)
        })
        .await;

        let mut call = ApiCall {
            api_name: self.source.name().to_string(),
            endpoint: self.source.endpoint(),
            called_at: now,
            success: fetched.is_ok(),
            response_time_ms: started.elapsed().as_millis() as u64,
            credits_used: None,
            error_message: None,
        };
        let fetched = match fetched {
            Ok(fetched) => {
                call.credits_used = fetched.credits_used;
                self.archive.record_api_call(&call).await;
                fetched
            }
            Err(err) => {
                call.error_message = Some(err.to_string());
                self.archive.record_api_call(&call).await;
                return Err(err);
            }
        };

        // Step 2: one atomic batch per fetch
        let fetch = bounded(
            "forecast persist",
            self.persistence_timeout,
            self.archive.record_fetch(fetched.hours, now),
        )
        .await?;

        // Step 3: detection over the evolving archive. Each store call inside
        // the pass is bounded on its own; notification sends are not.
        let windows = self.publisher.run_pass(now).await?;

        self.log_tonight(now).await;

        Ok(ForecastCycleReport { fetch, windows })
    }

    async fn log_tonight(&self, now: DateTime<Utc>) {
        let range = now - ChronoDuration::hours(12)..now + ChronoDuration::hours(36);
        let series = match self.store.read_latest_forecast(range).await {
            Ok(series) => series,
            Err(err) => {
                log_warn!("night summary unavailable: {err}");
                return;
            }
        };

        let date = now.with_timezone(&self.tz).date_naive();
        let summary = summarize_night(
            &series,
            date,
            self.tz,
            self.windows.night_zenith_deg,
            self.good_score,
        );
        if !summary.has_data() {
            return;
        }

        let seeing = summary
            .best_seeing_arcsec
            .map(|s| SeeingClass::from_arcsec(s).label())
            .unwrap_or("n/a");
        log_info!(
            "night of {}: {} dark hour(s), {} good, best score {:?}, best seeing {}, mean clouds {:?}",
            summary.date,
            summary.dark_hours,
            summary.good_hours,
            summary.best_score,
            seeing,
            summary.mean_cloud_pct.map(|c| c.round())
        );
    }
}

#[async_trait]
impl<S: EngineStore> Cycle for ForecastCycle<S> {
    fn kind(&self) -> LoopKind {
        LoopKind::Forecast
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<(), CycleError> {
        let report = self.run_once(now).await?;
        log_info!(
            "forecast cycle done: {} new row(s), {} dropped, {} window(s) detected, {} new, {} notified",
            report.fetch.inserted,
            report.fetch.dropped.len(),
            report.windows.detected,
            report.windows.saved,
            report.windows.notified
        );
        Ok(())
    }
}

/// Poll the sensor once and record the sample.
pub struct GroundTruthCycle<S> {
    source: Arc<dyn SensorSource>,
    recorder: GroundTruthRecorder<S>,
    call_timeout: Duration,
    persistence_timeout: Duration,
}

impl<S: EngineStore> GroundTruthCycle<S> {
    pub fn new(
        source: Arc<dyn SensorSource>,
        recorder: GroundTruthRecorder<S>,
        config: &AppConfig,
    ) -> Self {
        Self {
            source,
            recorder,
            call_timeout: Duration::from_secs(config.scheduler.call_timeout_secs),
            persistence_timeout: Duration::from_secs(config.scheduler.persistence_timeout_secs),
        }
    }

    pub async fn run_once(&self) -> Result<RecordOutcome, CycleError> {
        let sample = bounded("sensor poll", self.call_timeout, async {
            Ok(self.source.poll().await?)
        })
        .await?;

        bounded(
            "ground truth persist",
            self.persistence_timeout,
            self.recorder.record_sample(sample),
        )
        .await
    }
}

#[async_trait]
impl<S: EngineStore> Cycle for GroundTruthCycle<S> {
    fn kind(&self) -> LoopKind {
        LoopKind::GroundTruth
    }

    async fn run(&self, _now: DateTime<Utc>) -> Result<(), CycleError> {
        let outcome = self.run_once().await?;
        log_debug!("ground truth cycle done: {outcome:?}");
        Ok(())
    }
}

/// Reconcile every completed hour in the lookback window.
pub struct TrainingCycle<S> {
    builder: TrainingPairBuilder<S>,
    lookback: ChronoDuration,
    pass_timeout: Duration,
}

impl<S: EngineStore> TrainingCycle<S> {
    pub fn new(builder: TrainingPairBuilder<S>, config: &AppConfig) -> Self {
        Self {
            builder,
            lookback: config.reconciliation.lookback(),
            pass_timeout: Duration::from_secs(config.scheduler.call_timeout_secs),
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ReconcileReport, CycleError> {
        // Hours up to and including the current top of the hour
        let end = now
            .duration_trunc(ChronoDuration::hours(1))
            .unwrap_or(now)
            + ChronoDuration::seconds(1);
        bounded(
            "training reconciliation",
            self.pass_timeout,
            self.builder.reconcile_range(now - self.lookback..end),
        )
        .await
    }
}

#[async_trait]
impl<S: EngineStore> Cycle for TrainingCycle<S> {
    fn kind(&self) -> LoopKind {
        LoopKind::Training
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<(), CycleError> {
        let report = self.run_once(now).await?;
        log_info!(
            "training cycle done: {} paired, {} already paired, {} deferred",
            report.paired,
            report.already_paired,
            report.deferred
        );
        Ok(())
    }
}

/// Re-evaluate feed freshness and warn while degraded.
pub struct HealthCycle<S> {
    store: S,
    freshness: FreshnessConfig,
    persistence_timeout: Duration,
}

impl<S: EngineStore> HealthCycle<S> {
    pub fn new(store: S, config: &AppConfig) -> Self {
        Self {
            store,
            freshness: config.freshness.clone(),
            persistence_timeout: Duration::from_secs(config.scheduler.persistence_timeout_secs),
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<HealthSnapshot, CycleError> {
        bounded("health check", self.persistence_timeout, async {
            evaluate_health(&self.store, &self.freshness, now)
                .await
                .map_err(CycleError::Persistence)
        })
        .await
    }
}

#[async_trait]
impl<S: EngineStore> Cycle for HealthCycle<S> {
    fn kind(&self) -> LoopKind {
        LoopKind::Health
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<(), CycleError> {
        let health = self.run_once(now).await?;
        if health.degraded {
            log_warn!(
                "status degraded: forecast {:?} (last {:?}), ground truth {:?} (last {:?})",
                health.forecast,
                health.last_forecast_fetch,
                health.ground_truth,
                health.last_ground_truth
            );
        } else {
            log_debug!("status healthy");
        }
        Ok(())
    }
}
