pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod ground_truth;
pub mod imagery;
pub mod notify;
pub mod scheduler;
pub mod scoring;
pub mod sources;
pub mod status;
pub mod store;
pub mod training;
pub mod windows;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use log::{info, warn};
use tokio::time::Duration;

use config::AppConfig;
use db::Database;
use error::SourceError;
use ground_truth::{GroundTruthRecorder, ImageMaxAges};
use imagery::{FsImageLookup, ImageLookup, NoImages};
use notify::{LogNotifier, Notifier, PushoverNotifier};
use scheduler::{
    ForecastCycle, GroundTruthCycle, HealthCycle, ScheduledCycle, SchedulerController,
    TrainingCycle,
};
use sources::{CloudWatcherClient, MeteoblueClient};
use status::{evaluate_health, CycleStats};
use training::TrainingPairBuilder;
use windows::{NotificationPolicy, WindowPublisher};

/// Daemon entry point: load configuration, open the store, run the loops
/// until Ctrl-C.
pub async fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().context("failed to load configuration")?;
    for warning in config.validate() {
        warn!("config: {warning}");
    }

    let db = Database::new(config.database_path.clone()).context("failed to open database")?;
    let stats = CycleStats::new();

    match evaluate_health(&db, &config.freshness, Utc::now()).await {
        Ok(health) => info!(
            "startup status: forecast {:?}, ground truth {:?}",
            health.forecast, health.ground_truth
        ),
        Err(err) => warn!("startup status unavailable: {err}"),
    }

    let cycles = build_cycles(&config, &db)?;
    let mut controller = SchedulerController::new(stats.clone());
    controller.start(cycles)?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested, waiting for in-flight cycles");

    controller.stop().await?;

    let snapshot = stats.snapshot().await;
    for kind in status::LoopKind::ALL {
        let loop_stats = snapshot.get(kind);
        info!(
            "{}: {} completed, {} skipped",
            kind.as_str(),
            loop_stats.completed,
            loop_stats.skipped
        );
    }
    Ok(())
}

/// Wire every configured loop against `db`. A source without credentials or
/// host disables its loop instead of failing startup.
pub fn build_cycles(config: &AppConfig, db: &Database) -> Result<Vec<ScheduledCycle>> {
    let tz: Tz = config.location.tz()?;
    let scheduler = &config.scheduler;
    let mut cycles = Vec::new();

    match MeteoblueClient::new(&config.sources.meteoblue, scheduler.call_timeout_secs) {
        Ok(source) => {
            let publisher = WindowPublisher::new(
                db.clone(),
                config.windows.clone(),
                NotificationPolicy::from_config(&config.notifications),
                build_notifier(config, tz)?,
            );
            let cycle = ForecastCycle::new(Arc::new(source), db.clone(), publisher, config, tz);
            cycles.push(ScheduledCycle::new(
                Arc::new(cycle),
                Duration::from_secs(scheduler.forecast_interval_secs),
            ));
        }
        Err(SourceError::NotConfigured(what)) => warn!("forecast loop disabled: no {what}"),
        Err(err) => return Err(err).context("failed to build forecast client"),
    }

    match CloudWatcherClient::new(&config.sources.cloudwatcher, scheduler.call_timeout_secs) {
        Ok(source) => {
            let images: Arc<dyn ImageLookup> = match FsImageLookup::from_config(&config.imagery) {
                Some(lookup) => Arc::new(lookup),
                None => Arc::new(NoImages),
            };
            let recorder = GroundTruthRecorder::new(
                db.clone(),
                images,
                ImageMaxAges::from_config(&config.imagery),
            );
            let cycle = GroundTruthCycle::new(Arc::new(source), recorder, config);
            cycles.push(ScheduledCycle::new(
                Arc::new(cycle),
                Duration::from_secs(scheduler.ground_truth_interval_secs),
            ));
        }
        Err(SourceError::NotConfigured(what)) => warn!("ground truth loop disabled: no {what}"),
        Err(err) => return Err(err).context("failed to build sensor client"),
    }

    let builder =
        TrainingPairBuilder::from_config(db.clone(), &config.scoring, &config.reconciliation);
    cycles.push(ScheduledCycle::new(
        Arc::new(TrainingCycle::new(builder, config)),
        Duration::from_secs(scheduler.training_interval_secs),
    ));

    cycles.push(ScheduledCycle::new(
        Arc::new(HealthCycle::new(db.clone(), config)),
        Duration::from_secs(scheduler.ground_truth_interval_secs),
    ));

    Ok(cycles)
}

fn build_notifier(config: &AppConfig, tz: Tz) -> Result<Arc<dyn Notifier>> {
    match PushoverNotifier::from_config(&config.notifications, tz) {
        Some(pushover) => Ok(Arc::new(
            pushover.context("failed to build pushover client")?,
        )),
        None => {
            info!("pushover not configured, window notifications go to the log");
            Ok(Arc::new(LogNotifier::new(tz)))
        }
    }
}
