use std::ops::Range;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, to_u8},
    models::{SafetyFlag, TrainingPair},
};
use crate::error::StoreError;
use crate::store::TrainingStore;

fn row_to_training_pair(row: &Row) -> Result<TrainingPair> {
    let hour: String = row.get("hour")?;
    let forecast_fetched_at: String = row.get("forecast_fetched_at")?;
    let ground_truth_at: String = row.get("ground_truth_at")?;
    let actual_safety: String = row.get("actual_safety")?;

    Ok(TrainingPair {
        hour: parse_datetime(&hour, "hour")?,
        forecast_fetched_at: parse_datetime(&forecast_fetched_at, "forecast_fetched_at")?,
        ground_truth_at: parse_datetime(&ground_truth_at, "ground_truth_at")?,
        forecast_seeing_arcsec: row.get("forecast_seeing_arcsec")?,
        forecast_cloud_pct: row.get("forecast_cloud_pct")?,
        forecast_score: to_u8(row.get("forecast_score")?, "forecast_score")?,
        forecast_temperature_c: row.get("forecast_temperature_c")?,
        forecast_humidity_pct: row.get("forecast_humidity_pct")?,
        actual_sky_minus_ambient_c: row.get("actual_sky_minus_ambient_c")?,
        actual_sky_brightness_mpsas: row.get("actual_sky_brightness_mpsas")?,
        actual_temperature_c: row.get("actual_temperature_c")?,
        actual_humidity_pct: row.get("actual_humidity_pct")?,
        actual_safety: SafetyFlag::parse(&actual_safety)
            .ok_or_else(|| anyhow!("unknown safety flag '{actual_safety}'"))?,
        forecast_clear: row.get("forecast_clear")?,
        cloud_classification_match: row.get("cloud_classification_match")?,
        temperature_error_c: row.get("temperature_error_c")?,
        humidity_error_pct: row.get("humidity_error_pct")?,
        hour_of_day: row.get("hour_of_day")?,
        day_of_year: row.get("day_of_year")?,
    })
}

#[async_trait]
impl TrainingStore for Database {
    async fn training_pair_exists(&self, hour: DateTime<Utc>) -> Result<bool, StoreError> {
        let hour = format_datetime(&hour);
        let exists = self
            .execute(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM training_pairs WHERE hour = ?1)",
                    params![hour],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    async fn save_training_pair(&self, pair: &TrainingPair) -> Result<(), StoreError> {
        let pair = pair.clone();
        let changed = self
            .execute(move |conn| {
                let changed = conn
                    .execute(
                        "INSERT OR IGNORE INTO training_pairs (
                            hour,
                            forecast_fetched_at,
                            ground_truth_at,
                            forecast_seeing_arcsec,
                            forecast_cloud_pct,
                            forecast_score,
                            forecast_temperature_c,
                            forecast_humidity_pct,
                            actual_sky_minus_ambient_c,
                            actual_sky_brightness_mpsas,
                            actual_temperature_c,
                            actual_humidity_pct,
                            actual_safety,
                            forecast_clear,
                            cloud_classification_match,
                            temperature_error_c,
                            humidity_error_pct,
                            hour_of_day,
                            day_of_year,
                            created_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                        params![
                            format_datetime(&pair.hour),
                            format_datetime(&pair.forecast_fetched_at),
                            format_datetime(&pair.ground_truth_at),
                            pair.forecast_seeing_arcsec,
                            pair.forecast_cloud_pct,
                            i64::from(pair.forecast_score),
                            pair.forecast_temperature_c,
                            pair.forecast_humidity_pct,
                            pair.actual_sky_minus_ambient_c,
                            pair.actual_sky_brightness_mpsas,
                            pair.actual_temperature_c,
                            pair.actual_humidity_pct,
                            pair.actual_safety.as_str(),
                            pair.forecast_clear,
                            pair.cloud_classification_match,
                            pair.temperature_error_c,
                            pair.humidity_error_pct,
                            pair.hour_of_day,
                            pair.day_of_year,
                            format_datetime(&Utc::now()),
                        ],
                    )
                    .context("failed to insert training pair")?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::Duplicate);
        }
        Ok(())
    }
}

impl Database {
    pub async fn list_training_pairs(
        &self,
        range: Range<DateTime<Utc>>,
    ) -> Result<Vec<TrainingPair>> {
        let start = format_datetime(&range.start);
        let end = format_datetime(&range.end);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM training_pairs
                 WHERE hour >= ?1 AND hour < ?2
                 ORDER BY hour ASC",
            )?;
            let mut rows = stmt.query(params![start, end])?;

            let mut pairs = Vec::new();
            while let Some(row) = rows.next()? {
                pairs.push(row_to_training_pair(row)?);
            }
            Ok(pairs)
        })
        .await
    }
}
