use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;

use crate::db::models::ForecastRecord;

/// Per-date overview of the forecast, in local time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NightSummary {
    pub date: NaiveDate,
    pub total_hours: usize,
    pub dark_hours: usize,
    pub good_hours: usize,
    pub best_score: Option<u8>,
    pub best_seeing_arcsec: Option<f64>,
    pub mean_cloud_pct: Option<f64>,
}

impl NightSummary {
    pub fn has_data(&self) -> bool {
        self.total_hours > 0
    }
}

/// Summarize the hours of `series` that fall on local `date` in `tz`.
/// Best/mean figures are taken over dark hours only.
pub fn summarize_night(
    series: &[ForecastRecord],
    date: NaiveDate,
    tz: Tz,
    night_zenith_deg: f64,
    good_score: u8,
) -> NightSummary {
    let on_date: Vec<&ForecastRecord> = series
        .iter()
        .filter(|h| h.target_time.with_timezone(&tz).date_naive() == date)
        .collect();

    let dark: Vec<&ForecastRecord> = on_date
        .iter()
        .copied()
        .filter(|h| h.is_dark(night_zenith_deg))
        .collect();

    let clouds: Vec<f64> = dark
        .iter()
        .filter_map(|h| h.conditions.total_cloud_pct)
        .collect();

    NightSummary {
        date,
        total_hours: on_date.len(),
        dark_hours: dark.len(),
        good_hours: dark.iter().filter(|h| h.score >= good_score).count(),
        best_score: dark.iter().map(|h| h.score).max(),
        best_seeing_arcsec: dark
            .iter()
            .filter_map(|h| h.conditions.seeing_arcsec)
            .min_by(|a, b| a.total_cmp(b)),
        mean_cloud_pct: (!clouds.is_empty())
            .then(|| clouds.iter().sum::<f64>() / clouds.len() as f64),
    }
}
