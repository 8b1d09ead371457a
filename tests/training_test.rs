mod common;

use std::sync::Arc;

use astroweather::archive::ForecastArchive;
use astroweather::db::models::SafetyFlag;
use astroweather::ground_truth::{GroundTruthRecorder, ImageMaxAges};
use astroweather::imagery::NoImages;
use astroweather::training::{ReconcileOutcome, TrainingPairBuilder};
use chrono::Duration;

use common::{at, dark_hour, open_db, sample};

fn builder(db: &astroweather::db::Database) -> TrainingPairBuilder<astroweather::db::Database> {
    TrainingPairBuilder::new(db.clone(), 30.0, Duration::minutes(10))
}

#[tokio::test]
async fn pair_waits_for_both_sides_then_is_created_once() {
    let db = open_db();
    let archive = ForecastArchive::new(db.clone());
    let recorder = GroundTruthRecorder::new(db.clone(), Arc::new(NoImages), ImageMaxAges::default());
    let pairs = builder(&db);
    let hour = at(2024, 1, 24, 1, 0);

    // Forecast only
    let mut raw = dark_hour(hour, 100);
    raw.conditions.total_cloud_pct = Some(5.0);
    archive.record_fetch(vec![raw], at(2024, 1, 23, 12, 0)).await.unwrap();
    assert_eq!(pairs.reconcile(hour).await.unwrap(), ReconcileOutcome::Deferred);

    // Both sides present
    recorder
        .record_sample(sample(hour - Duration::minutes(4), Some(1)))
        .await
        .unwrap();
    let pair = match pairs.reconcile(hour).await.unwrap() {
        ReconcileOutcome::Paired(pair) => pair,
        other => panic!("expected a pair, got {other:?}"),
    };
    assert!(pair.forecast_clear);
    assert_eq!(pair.actual_safety, SafetyFlag::Safe);
    assert!(pair.cloud_classification_match);
    assert_eq!(pair.temperature_error_c, Some(0.5));
    assert_eq!(pair.humidity_error_pct, Some(-4.0));
    assert_eq!(pair.ground_truth_at, hour - Duration::minutes(4));

    assert_eq!(pairs.reconcile(hour).await.unwrap(), ReconcileOutcome::AlreadyPaired);
    let stored = db
        .list_training_pairs(hour..hour + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], pair);
}

#[tokio::test]
async fn ground_truth_only_is_deferred() {
    let db = open_db();
    let recorder = GroundTruthRecorder::new(db.clone(), Arc::new(NoImages), ImageMaxAges::default());
    let hour = at(2024, 1, 24, 2, 0);

    recorder
        .record_sample(sample(hour - Duration::minutes(1), Some(1)))
        .await
        .unwrap();
    assert_eq!(builder(&db).reconcile(hour).await.unwrap(), ReconcileOutcome::Deferred);
}

#[tokio::test]
async fn sample_after_the_hour_does_not_count() {
    let db = open_db();
    let archive = ForecastArchive::new(db.clone());
    let recorder = GroundTruthRecorder::new(db.clone(), Arc::new(NoImages), ImageMaxAges::default());
    let hour = at(2024, 1, 24, 3, 0);

    archive
        .record_fetch(vec![dark_hour(hour, 90)], at(2024, 1, 23, 12, 0))
        .await
        .unwrap();
    recorder
        .record_sample(sample(hour + Duration::minutes(2), Some(1)))
        .await
        .unwrap();
    recorder
        .record_sample(sample(hour - Duration::minutes(15), Some(1)))
        .await
        .unwrap();

    assert_eq!(builder(&db).reconcile(hour).await.unwrap(), ReconcileOutcome::Deferred);
}

#[tokio::test]
async fn cloudy_forecast_or_unsafe_sky_is_not_a_match() {
    let db = open_db();
    let archive = ForecastArchive::new(db.clone());
    let recorder = GroundTruthRecorder::new(db.clone(), Arc::new(NoImages), ImageMaxAges::default());
    let first = at(2024, 1, 24, 1, 0);
    let second = first + Duration::hours(1);

    // 30 % cloud is not below the clear threshold
    archive
        .record_fetch(
            vec![dark_hour(first, 85), dark_hour(second, 95)],
            at(2024, 1, 23, 12, 0),
        )
        .await
        .unwrap();
    recorder.record_sample(sample(first, Some(1))).await.unwrap();
    recorder.record_sample(sample(second, Some(2))).await.unwrap();

    let report = builder(&db)
        .reconcile_range(first..second + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(report.paired, 2);

    let stored = db.list_training_pairs(first..second + Duration::hours(1)).await.unwrap();
    assert!(!stored[0].forecast_clear);
    assert!(!stored[0].cloud_classification_match);
    assert!(stored[1].forecast_clear);
    assert_eq!(stored[1].actual_safety, SafetyFlag::Unsafe);
    assert!(!stored[1].cloud_classification_match);
}
