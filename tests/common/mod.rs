#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use astroweather::db::models::{
    ForecastConditions, RawForecastHour, SensorReadings, SensorSample,
};
use astroweather::db::{Database, DeviceInfo, ObservationWindow};
use astroweather::notify::Notifier;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn open_db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// A dark hour whose metrics score exactly `score` (for scores >= 50).
pub fn dark_hour(target_time: DateTime<Utc>, score: u8) -> RawForecastHour {
    let cloud = if score >= 50 {
        2.0 * (100.0 - f64::from(score))
    } else {
        100.0
    };
    RawForecastHour {
        target_time,
        conditions: ForecastConditions {
            seeing_arcsec: Some(0.8),
            total_cloud_pct: Some(cloud),
            jetstream_speed_ms: Some(18.0),
            moonlight_pct: Some(0.0),
            zenith_angle_deg: Some(150.0),
            temperature_c: Some(-2.0),
            humidity_pct: Some(80.0),
            ..ForecastConditions::default()
        },
    }
}

pub fn dark_series(start: DateTime<Utc>, scores: &[u8]) -> Vec<RawForecastHour> {
    scores
        .iter()
        .enumerate()
        .map(|(i, score)| dark_hour(start + Duration::hours(i as i64), *score))
        .collect()
}

pub fn sample(timestamp: DateTime<Utc>, safety_code: Option<i64>) -> SensorSample {
    SensorSample {
        timestamp,
        readings: SensorReadings {
            sky_minus_ambient_c: Some(-22.5),
            sky_temp_c: Some(-25.0),
            ambient_temp_c: Some(-2.5),
            humidity_pct: Some(84.0),
            sky_brightness_mpsas: Some(20.6),
            ..SensorReadings::default()
        },
        safety_code,
        device: DeviceInfo {
            serial: Some("2653".into()),
            firmware: Some("5.89".into()),
        },
    }
}

/// Counts deliveries and remembers which windows were sent.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<AtomicUsize>,
    ids: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, window: &ObservationWindow) {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.ids.lock().unwrap().push(window.id.clone());
    }
}
