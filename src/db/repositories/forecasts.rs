use std::ops::Range;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_optional_datetime, to_i64, to_u8},
    models::{ApiCall, ForecastConditions, ForecastRecord},
};
use crate::error::StoreError;
use crate::scoring::QualityClass;
use crate::store::ForecastStore;

const SELECT_FORECAST: &str = "SELECT
    f.target_time,
    f.fetched_at,
    f.seeing_arcsec,
    f.total_cloud_pct,
    f.low_cloud_pct,
    f.mid_cloud_pct,
    f.high_cloud_pct,
    f.jetstream_speed_ms,
    f.moonlight_pct,
    f.zenith_angle_deg,
    f.temperature_c,
    f.humidity_pct,
    f.precipitation_prob_pct,
    f.wind_speed_kmh,
    f.visibility_m,
    f.fog_probability_pct,
    f.score,
    f.quality_class
FROM forecast_hours f";

fn row_to_forecast(row: &Row) -> Result<ForecastRecord> {
    let target_time: String = row.get("target_time")?;
    let fetched_at: String = row.get("fetched_at")?;
    let quality_class: String = row.get("quality_class")?;

    Ok(ForecastRecord {
        target_time: parse_datetime(&target_time, "target_time")?,
        fetched_at: parse_datetime(&fetched_at, "fetched_at")?,
        conditions: ForecastConditions {
            seeing_arcsec: row.get("seeing_arcsec")?,
            total_cloud_pct: row.get("total_cloud_pct")?,
            low_cloud_pct: row.get("low_cloud_pct")?,
            mid_cloud_pct: row.get("mid_cloud_pct")?,
            high_cloud_pct: row.get("high_cloud_pct")?,
            jetstream_speed_ms: row.get("jetstream_speed_ms")?,
            moonlight_pct: row.get("moonlight_pct")?,
            zenith_angle_deg: row.get("zenith_angle_deg")?,
            temperature_c: row.get("temperature_c")?,
            humidity_pct: row.get("humidity_pct")?,
            precipitation_prob_pct: row.get("precipitation_prob_pct")?,
            wind_speed_kmh: row.get("wind_speed_kmh")?,
            visibility_m: row.get("visibility_m")?,
            fog_probability_pct: row.get("fog_probability_pct")?,
        },
        score: to_u8(row.get("score")?, "score")?,
        quality_class: QualityClass::parse(&quality_class)
            .ok_or_else(|| anyhow!("unknown quality class '{quality_class}'"))?,
    })
}

#[async_trait]
impl ForecastStore for Database {
    async fn append_forecast_batch(&self, rows: &[ForecastRecord]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        let inserted = self
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO forecast_hours (
                            target_time,
                            fetched_at,
                            seeing_arcsec,
                            total_cloud_pct,
                            low_cloud_pct,
                            mid_cloud_pct,
                            high_cloud_pct,
                            jetstream_speed_ms,
                            moonlight_pct,
                            zenith_angle_deg,
                            temperature_c,
                            humidity_pct,
                            precipitation_prob_pct,
                            wind_speed_kmh,
                            visibility_m,
                            fog_probability_pct,
                            score,
                            quality_class
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                    )?;

                    for row in &rows {
                        let c = &row.conditions;
                        inserted += stmt
                            .execute(params![
                                format_datetime(&row.target_time),
                                format_datetime(&row.fetched_at),
                                c.seeing_arcsec,
                                c.total_cloud_pct,
                                c.low_cloud_pct,
                                c.mid_cloud_pct,
                                c.high_cloud_pct,
                                c.jetstream_speed_ms,
                                c.moonlight_pct,
                                c.zenith_angle_deg,
                                c.temperature_c,
                                c.humidity_pct,
                                c.precipitation_prob_pct,
                                c.wind_speed_kmh,
                                c.visibility_m,
                                c.fog_probability_pct,
                                i64::from(row.score),
                                row.quality_class.as_str(),
                            ])
                            .with_context(|| {
                                format!("failed to insert forecast hour {}", row.target_time)
                            })?;
                    }
                }
                tx.commit().context("failed to commit forecast batch")?;
                Ok(inserted)
            })
            .await?;

        Ok(inserted)
    }

    async fn read_latest_forecast(
        &self,
        range: Range<DateTime<Utc>>,
    ) -> Result<Vec<ForecastRecord>, StoreError> {
        let start = format_datetime(&range.start);
        let end = format_datetime(&range.end);

        let records = self
            .execute(move |conn| {
                let sql = format!(
                    "{SELECT_FORECAST}
                    JOIN (
                        SELECT target_time, MAX(fetched_at) AS fetched_at
                        FROM forecast_hours
                        WHERE target_time >= ?1 AND target_time < ?2
                        GROUP BY target_time
                    ) latest
                    ON f.target_time = latest.target_time AND f.fetched_at = latest.fetched_at
                    ORDER BY f.target_time ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params![start, end])?;

                let mut records = Vec::new();
                while let Some(row) = rows.next()? {
                    records.push(row_to_forecast(row)?);
                }
                Ok(records)
            })
            .await?;

        Ok(records)
    }

    async fn latest_forecast_fetch(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let latest = self
            .execute(|conn| {
                let raw: Option<String> =
                    conn.query_row("SELECT MAX(fetched_at) FROM forecast_hours", [], |row| {
                        row.get(0)
                    })?;
                parse_optional_datetime(raw, "fetched_at")
            })
            .await?;
        Ok(latest)
    }

    async fn log_api_call(&self, call: &ApiCall) -> Result<(), StoreError> {
        let call = call.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO api_calls (
                    api_name,
                    endpoint,
                    called_at,
                    success,
                    response_time_ms,
                    credits_used,
                    error_message
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    call.api_name,
                    call.endpoint,
                    format_datetime(&call.called_at),
                    call.success,
                    to_i64(call.response_time_ms)?,
                    call.credits_used.map(to_i64).transpose()?,
                    call.error_message,
                ],
            )
            .context("failed to insert api call")?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}

impl Database {
    /// Number of archived rows written by one fetch cycle.
    pub async fn count_forecasts_fetched_at(&self, fetched_at: DateTime<Utc>) -> Result<usize> {
        let fetched_at = format_datetime(&fetched_at);
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM forecast_hours WHERE fetched_at = ?1",
                params![fetched_at],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    /// Every archived version of one target hour, oldest fetch first.
    pub async fn forecast_history(&self, target_time: DateTime<Utc>) -> Result<Vec<ForecastRecord>> {
        let target_time = format_datetime(&target_time);
        self.execute(move |conn| {
            let sql = format!("{SELECT_FORECAST} WHERE f.target_time = ?1 ORDER BY f.fetched_at ASC");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![target_time])?;

            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_forecast(row)?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn api_call_count(&self, api_name: &str) -> Result<usize> {
        let api_name = api_name.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM api_calls WHERE api_name = ?1",
                params![api_name],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }
}
