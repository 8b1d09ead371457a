use std::collections::HashSet;
use std::ops::Range;

use chrono::{DateTime, Timelike, Utc};
use log::{info, warn};

use crate::db::models::{ApiCall, ForecastConditions, ForecastRecord, RawForecastHour};
use crate::error::{CycleError, DataQualityError};
use crate::scoring::score_metrics;
use crate::store::ForecastStore;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchSummary {
    pub fetched_at: DateTime<Utc>,
    pub received: usize,
    pub accepted: usize,
    /// Rows actually written; lower than `accepted` on a retried fetch
    pub inserted: usize,
    pub dropped: Vec<DataQualityError>,
}

/// Append-only, versioned archive of scored forecast hours.
pub struct ForecastArchive<S> {
    store: S,
}

impl<S: ForecastStore> ForecastArchive<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Score and persist one fetch cycle as a single atomic batch.
    ///
    /// Malformed hours are dropped with a warning; the rest of the batch is
    /// still written. If the store fails nothing is written and the caller
    /// retries the whole batch on its next cycle.
    pub async fn record_fetch(
        &self,
        batch: Vec<RawForecastHour>,
        fetched_at: DateTime<Utc>,
    ) -> Result<FetchSummary, CycleError> {
        let received = batch.len();
        let mut dropped = Vec::new();
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(received);

        for hour in batch {
            if let Err(err) = validate_hour(&hour) {
                warn!("dropping forecast hour {}: {err}", hour.target_time);
                dropped.push(err);
                continue;
            }
            if !seen.insert(hour.target_time) {
                let err = DataQualityError::new(
                    "target_time",
                    hour.target_time,
                    "repeated within one fetch",
                );
                warn!("dropping forecast hour {}: {err}", hour.target_time);
                dropped.push(err);
                continue;
            }

            let score = score_metrics(&hour.conditions.metrics());
            rows.push(ForecastRecord::scored(hour, fetched_at, score));
        }

        let accepted = rows.len();
        let inserted = self
            .store
            .append_forecast_batch(&rows)
            .await
            .map_err(CycleError::Persistence)?;

        info!(
            "forecast fetch {fetched_at}: {received} hours received, {accepted} accepted, {inserted} new"
        );

        Ok(FetchSummary {
            fetched_at,
            received,
            accepted,
            inserted,
            dropped,
        })
    }

    /// Current belief: the latest-fetched row for every target hour in `range`.
    pub async fn latest_per_hour(
        &self,
        range: Range<DateTime<Utc>>,
    ) -> Result<Vec<ForecastRecord>, CycleError> {
        self.store
            .read_latest_forecast(range)
            .await
            .map_err(CycleError::Persistence)
    }

    /// Failures here never fail the fetch cycle.
    pub async fn record_api_call(&self, call: &ApiCall) {
        if let Err(err) = self.store.log_api_call(call).await {
            warn!("failed to log {} api call: {err}", call.api_name);
        }
    }
}

fn validate_hour(hour: &RawForecastHour) -> Result<(), DataQualityError> {
    let t = hour.target_time;
    if t.minute() != 0 || t.second() != 0 || t.nanosecond() != 0 {
        return Err(DataQualityError::new("target_time", t, "not aligned to the hour"));
    }
    validate_conditions(&hour.conditions)
}

fn validate_conditions(c: &ForecastConditions) -> Result<(), DataQualityError> {
    check_range("seeing_arcsec", c.seeing_arcsec, 0.0, f64::MAX)?;
    check_range("total_cloud_pct", c.total_cloud_pct, 0.0, 100.0)?;
    check_range("low_cloud_pct", c.low_cloud_pct, 0.0, 100.0)?;
    check_range("mid_cloud_pct", c.mid_cloud_pct, 0.0, 100.0)?;
    check_range("high_cloud_pct", c.high_cloud_pct, 0.0, 100.0)?;
    check_range("jetstream_speed_ms", c.jetstream_speed_ms, 0.0, f64::MAX)?;
    check_range("moonlight_pct", c.moonlight_pct, 0.0, 100.0)?;
    check_range("zenith_angle_deg", c.zenith_angle_deg, 0.0, 180.0)?;
    check_range("temperature_c", c.temperature_c, -100.0, 70.0)?;
    check_range("humidity_pct", c.humidity_pct, 0.0, 100.0)?;
    check_range("precipitation_prob_pct", c.precipitation_prob_pct, 0.0, 100.0)?;
    check_range("wind_speed_kmh", c.wind_speed_kmh, 0.0, f64::MAX)?;
    check_range("visibility_m", c.visibility_m, 0.0, f64::MAX)?;
    check_range("fog_probability_pct", c.fog_probability_pct, 0.0, 100.0)?;
    Ok(())
}

fn check_range(
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> Result<(), DataQualityError> {
    match value {
        None => Ok(()),
        Some(v) if !v.is_finite() => Err(DataQualityError::new(field, v, "not a finite number")),
        Some(v) if v < min || v > max => Err(DataQualityError::new(field, v, "out of range")),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hour(h: u32) -> RawForecastHour {
        RawForecastHour {
            target_time: Utc.with_ymd_and_hms(2024, 1, 24, h, 0, 0).unwrap(),
            conditions: ForecastConditions {
                total_cloud_pct: Some(10.0),
                seeing_arcsec: Some(1.1),
                zenith_angle_deg: Some(140.0),
                ..ForecastConditions::default()
            },
        }
    }

    #[test]
    fn accepts_missing_values() {
        let mut h = hour(1);
        h.conditions = ForecastConditions::default();
        assert!(validate_hour(&h).is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_non_finite_values() {
        let mut cloudy = hour(1);
        cloudy.conditions.total_cloud_pct = Some(120.0);
        assert_eq!(validate_hour(&cloudy).unwrap_err().field, "total_cloud_pct");

        let mut nan = hour(1);
        nan.conditions.seeing_arcsec = Some(f64::NAN);
        assert_eq!(validate_hour(&nan).unwrap_err().reason, "not a finite number");

        let mut sun = hour(1);
        sun.conditions.zenith_angle_deg = Some(181.0);
        assert!(validate_hour(&sun).is_err());
    }

    #[test]
    fn rejects_unaligned_target_time() {
        let mut h = hour(1);
        h.target_time = Utc.with_ymd_and_hms(2024, 1, 24, 1, 30, 0).unwrap();
        assert_eq!(validate_hour(&h).unwrap_err().field, "target_time");
    }
}
