use serde::{Deserialize, Serialize};

use super::classes::QualityClass;

const MAX_SCORE: f64 = 100.0;

const CLOUD_WEIGHT: f64 = 0.5;

const SEEING_BASELINE_ARCSEC: f64 = 1.0;
const SEEING_WEIGHT: f64 = 15.0;
const SEEING_MAX_PENALTY: f64 = 30.0;

const JETSTREAM_FAST_MS: f64 = 35.0;
const JETSTREAM_STAGNANT_MS: f64 = 5.0;
const JETSTREAM_WEIGHT: f64 = 0.5;
const JETSTREAM_MAX_PENALTY: f64 = 10.0;
const STAGNANT_AIR_PENALTY: f64 = 3.0;

const SUN_BELOW_HORIZON_DEG: f64 = 90.0;
const MOONLIGHT_THRESHOLD_PCT: f64 = 30.0;
const MOONLIGHT_WEIGHT: f64 = 0.15;
const MOONLIGHT_MAX_PENALTY: f64 = 10.0;

/// Inputs to the astro score. Every field is optional; a missing (or non-finite)
/// value contributes no penalty:
///
/// | field             | neutral meaning when `None`                      |
/// |-------------------|--------------------------------------------------|
/// | `cloud_cover`     | 0 % cloud                                        |
/// | `seeing_arcsec`   | seeing at or below 1.0"                          |
/// | `jetstream_speed` | inside the 5–35 m/s band (no stagnant penalty)   |
/// | `moonlight_pct`   | no moonlight                                     |
/// | `zenith_angle`    | sun above the horizon (moonlight ignored)        |
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericMetrics {
    pub cloud_cover: Option<f64>,
    pub seeing_arcsec: Option<f64>,
    pub jetstream_speed: Option<f64>,
    pub moonlight_pct: Option<f64>,
    pub zenith_angle: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub value: u8,
    pub class: QualityClass,
}

/// Compute the bounded astro score (0–100) and its quality band.
pub fn score_metrics(metrics: &AtmosphericMetrics) -> Score {
    let raw = MAX_SCORE
        - cloud_penalty(finite(metrics.cloud_cover))
        - seeing_penalty(finite(metrics.seeing_arcsec))
        - jetstream_penalty(finite(metrics.jetstream_speed))
        - moonlight_penalty(finite(metrics.moonlight_pct), finite(metrics.zenith_angle));

    let value = raw.clamp(0.0, MAX_SCORE).trunc() as u8;
    Score {
        value,
        class: QualityClass::from_score(value),
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Cloud cover costs half a point per percent, at most 50.
fn cloud_penalty(cloud_cover: Option<f64>) -> f64 {
    cloud_cover
        .map(|pct| pct.clamp(0.0, 100.0) * CLOUD_WEIGHT)
        .unwrap_or(0.0)
}

fn seeing_penalty(seeing_arcsec: Option<f64>) -> f64 {
    match seeing_arcsec {
        Some(seeing) if seeing > SEEING_BASELINE_ARCSEC => {
            ((seeing - SEEING_BASELINE_ARCSEC) * SEEING_WEIGHT).min(SEEING_MAX_PENALTY)
        }
        _ => 0.0,
    }
}

/// Fast jet stream degrades seeing; near-zero flow means stagnant air.
fn jetstream_penalty(jetstream_speed: Option<f64>) -> f64 {
    match jetstream_speed {
        Some(speed) if speed > JETSTREAM_FAST_MS => {
            ((speed - JETSTREAM_FAST_MS) * JETSTREAM_WEIGHT).min(JETSTREAM_MAX_PENALTY)
        }
        Some(speed) if speed < JETSTREAM_STAGNANT_MS => STAGNANT_AIR_PENALTY,
        _ => 0.0,
    }
}

/// Moonlight only matters once the sun is below the horizon.
fn moonlight_penalty(moonlight_pct: Option<f64>, zenith_angle: Option<f64>) -> f64 {
    match (moonlight_pct, zenith_angle) {
        (Some(moon), Some(zenith))
            if zenith > SUN_BELOW_HORIZON_DEG && moon > MOONLIGHT_THRESHOLD_PCT =>
        {
            (moon * MOONLIGHT_WEIGHT).min(MOONLIGHT_MAX_PENALTY)
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(cloud: f64, seeing: f64, jet: f64, moon: f64, zenith: f64) -> AtmosphericMetrics {
        AtmosphericMetrics {
            cloud_cover: Some(cloud),
            seeing_arcsec: Some(seeing),
            jetstream_speed: Some(jet),
            moonlight_pct: Some(moon),
            zenith_angle: Some(zenith),
        }
    }

    #[test]
    fn clear_dark_hour_scores_excellent() {
        let score = score_metrics(&metrics(5.0, 0.9, 18.0, 10.0, 150.0));
        assert_eq!(score.value, 97);
        assert_eq!(score.class, QualityClass::Excellent);
    }

    #[test]
    fn each_penalty_is_capped() {
        let score = score_metrics(&metrics(100.0, 10.0, 200.0, 100.0, 150.0));
        // 100 - 50 - 30 - 10 - 10
        assert_eq!(score.value, 0);
        assert_eq!(score.class, QualityClass::Bad);

        let seeing_only = score_metrics(&metrics(0.0, 5.0, 20.0, 0.0, 150.0));
        assert_eq!(seeing_only.value, 70);
    }

    #[test]
    fn stagnant_air_costs_three_points() {
        let score = score_metrics(&metrics(0.0, 1.0, 2.0, 0.0, 150.0));
        assert_eq!(score.value, 97);
    }

    #[test]
    fn moonlight_ignored_in_daylight() {
        let day = score_metrics(&metrics(0.0, 1.0, 20.0, 80.0, 45.0));
        let night = score_metrics(&metrics(0.0, 1.0, 20.0, 80.0, 120.0));
        assert_eq!(day.value, 100);
        assert_eq!(night.value, 90);
    }

    #[test]
    fn missing_inputs_are_neutral() {
        let score = score_metrics(&AtmosphericMetrics::default());
        assert_eq!(score.value, 100);

        let nan_cloud = AtmosphericMetrics {
            cloud_cover: Some(f64::NAN),
            ..AtmosphericMetrics::default()
        };
        assert_eq!(score_metrics(&nan_cloud).value, 100);

        // A missing jet stream must not be read as stagnant air.
        let no_jet = AtmosphericMetrics {
            cloud_cover: Some(0.0),
            seeing_arcsec: Some(1.0),
            ..AtmosphericMetrics::default()
        };
        assert_eq!(score_metrics(&no_jet).value, 100);
    }

    #[test]
    fn score_is_bounded_and_monotone() {
        let steps: Vec<f64> = (0..=40).map(|i| i as f64 * 2.5).collect();

        let mut previous = u8::MAX;
        for cloud in &steps {
            let value = score_metrics(&metrics(*cloud, 1.4, 20.0, 40.0, 120.0)).value;
            assert!(value <= 100);
            assert!(value <= previous, "cloud {cloud} raised the score");
            previous = value;
        }

        let mut previous = u8::MAX;
        for seeing in steps.iter().map(|s| 1.0 + s / 20.0) {
            let value = score_metrics(&metrics(20.0, seeing, 20.0, 0.0, 120.0)).value;
            assert!(value <= previous, "seeing {seeing} raised the score");
            previous = value;
        }

        let mut previous = u8::MAX;
        for jet in steps.iter().map(|s| 35.0 + s) {
            let value = score_metrics(&metrics(20.0, 1.2, jet, 0.0, 120.0)).value;
            assert!(value <= previous, "jet stream {jet} raised the score");
            previous = value;
        }
    }
}
