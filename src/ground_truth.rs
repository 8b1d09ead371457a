use std::sync::Arc;

use anyhow::anyhow;
use chrono::Duration;
use log::{info, warn};

use crate::config::ImageryConfig;
use crate::db::models::{GroundTruthRecord, SafetyFlag, SensorReadings, SensorSample};
use crate::error::{CycleError, DataQualityError, StoreError};
use crate::imagery::{ImageKind, ImageLookup, ImageRef};
use crate::store::GroundTruthStore;

/// Map the sensor's cloud safety code onto the canonical tri-state.
///
/// | device code       | device meaning | canonical |
/// |-------------------|----------------|-----------|
/// | `1`               | clear          | `Safe`    |
/// | `2`               | cloudy         | `Unsafe`  |
/// | `0`, other, none  | undetermined   | `Unknown` |
///
/// The device does not use the common `0 = safe` convention.
pub fn translate_safety_code(code: Option<i64>) -> SafetyFlag {
    match code {
        Some(1) => SafetyFlag::Safe,
        Some(2) => SafetyFlag::Unsafe,
        _ => SafetyFlag::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { images: usize },
    /// A sample with the same timestamp is already stored.
    AlreadyRecorded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMaxAges {
    pub allsky_jpg: Duration,
    pub zwo_jpg: Duration,
    pub zwo_fits: Duration,
}

impl ImageMaxAges {
    pub fn from_config(config: &ImageryConfig) -> Self {
        Self {
            allsky_jpg: Duration::minutes(i64::from(config.allsky_max_age_minutes)),
            zwo_jpg: Duration::minutes(i64::from(config.zwo_jpg_max_age_minutes)),
            zwo_fits: Duration::minutes(i64::from(config.zwo_fits_max_age_minutes)),
        }
    }

    pub fn for_kind(&self, kind: ImageKind) -> Duration {
        match kind {
            ImageKind::AllSkyJpg => self.allsky_jpg,
            ImageKind::ZwoJpg => self.zwo_jpg,
            ImageKind::ZwoFits => self.zwo_fits,
        }
    }
}

impl Default for ImageMaxAges {
    fn default() -> Self {
        Self::from_config(&ImageryConfig::default())
    }
}

pub struct GroundTruthRecorder<S> {
    store: S,
    images: Arc<dyn ImageLookup>,
    max_ages: ImageMaxAges,
}

impl<S: GroundTruthStore> GroundTruthRecorder<S> {
    pub fn new(store: S, images: Arc<dyn ImageLookup>, max_ages: ImageMaxAges) -> Self {
        Self {
            store,
            images,
            max_ages,
        }
    }

    /// Normalize, correlate imagery and persist one sample, at most once per timestamp.
    pub async fn record_sample(&self, sample: SensorSample) -> Result<RecordOutcome, CycleError> {
        validate_readings(&sample.readings)?;

        let safety = translate_safety_code(sample.safety_code);
        let images = self.correlate_images(&sample).await;
        let image_count = images.len();

        let record = GroundTruthRecord {
            timestamp: sample.timestamp,
            readings: sample.readings,
            safety,
            images,
            device: sample.device,
        };

        match self.store.upsert_ground_truth(&record).await {
            Ok(()) => {
                info!(
                    "ground truth {} recorded: safety={}, {} image(s)",
                    record.timestamp,
                    safety.as_str(),
                    image_count
                );
                Ok(RecordOutcome::Recorded {
                    images: image_count,
                })
            }
            Err(StoreError::Duplicate) => {
                info!("ground truth {} already recorded", record.timestamp);
                Ok(RecordOutcome::AlreadyRecorded)
            }
            Err(err) => Err(CycleError::Persistence(err)),
        }
    }

    async fn correlate_images(&self, sample: &SensorSample) -> Vec<ImageRef> {
        let lookup = Arc::clone(&self.images);
        let max_ages = self.max_ages;
        let at = sample.timestamp;

        let found = tokio::task::spawn_blocking(move || {
            ImageKind::ALL
                .into_iter()
                .filter_map(|kind| lookup.find(kind, at, max_ages.for_kind(kind)))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|err| anyhow!("image lookup worker join failed: {err}"));

        match found {
            Ok(images) => images
                .into_iter()
                .filter(|image| image.within(at, self.max_ages.for_kind(image.kind)))
                .collect(),
            Err(err) => {
                warn!("{err}");
                Vec::new()
            }
        }
    }
}

fn validate_readings(r: &SensorReadings) -> Result<(), DataQualityError> {
    let finite_fields = [
        ("sky_minus_ambient_c", r.sky_minus_ambient_c),
        ("sky_temp_c", r.sky_temp_c),
        ("ambient_temp_c", r.ambient_temp_c),
        ("dew_point_c", r.dew_point_c),
        ("rain_raw", r.rain_raw),
        ("wind_kmh", r.wind_kmh),
        ("gust_kmh", r.gust_kmh),
        ("pressure_abs_hpa", r.pressure_abs_hpa),
        ("pressure_rel_hpa", r.pressure_rel_hpa),
    ];
    for (field, value) in finite_fields {
        if let Some(v) = value.filter(|v| !v.is_finite()) {
            return Err(DataQualityError::new(field, v, "not a finite number"));
        }
    }

    if let Some(h) = r.humidity_pct {
        if !(0.0..=100.0).contains(&h) {
            return Err(DataQualityError::new("humidity_pct", h, "out of range"));
        }
    }
    if let Some(b) = r.sky_brightness_mpsas {
        if !b.is_finite() || b < 0.0 {
            return Err(DataQualityError::new("sky_brightness_mpsas", b, "out of range"));
        }
    }
    Ok(())
}
