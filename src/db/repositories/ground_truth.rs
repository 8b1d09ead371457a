use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Row};
use serde_json::{from_str, to_string};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_optional_datetime},
    models::{DeviceInfo, GroundTruthRecord, SafetyFlag, SensorReadings},
};
use crate::error::StoreError;
use crate::imagery::ImageRef;
use crate::store::GroundTruthStore;

fn row_to_ground_truth(row: &Row) -> Result<GroundTruthRecord> {
    let timestamp: String = row.get("timestamp")?;
    let safety: String = row.get("safety")?;
    let readings_json: String = row.get("readings_json")?;
    let images_json: String = row.get("images_json")?;

    let readings: SensorReadings =
        from_str(&readings_json).context("failed to decode readings_json")?;
    let images: Vec<ImageRef> = from_str(&images_json).context("failed to decode images_json")?;

    Ok(GroundTruthRecord {
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        readings,
        safety: SafetyFlag::parse(&safety).ok_or_else(|| anyhow!("unknown safety flag '{safety}'"))?,
        images,
        device: DeviceInfo {
            serial: row.get("device_serial")?,
            firmware: row.get("device_firmware")?,
        },
    })
}

#[async_trait]
impl GroundTruthStore for Database {
    async fn upsert_ground_truth(&self, record: &GroundTruthRecord) -> Result<(), StoreError> {
        let record = record.clone();
        let changed = self
            .execute(move |conn| {
                let readings_json =
                    to_string(&record.readings).context("failed to serialize readings")?;
                let images_json = to_string(&record.images).context("failed to serialize images")?;
                let r = &record.readings;

                let changed = conn
                    .execute(
                        "INSERT OR IGNORE INTO ground_truth_readings (
                            timestamp,
                            sky_minus_ambient_c,
                            sky_brightness_mpsas,
                            ambient_temp_c,
                            humidity_pct,
                            rain_raw,
                            safety,
                            readings_json,
                            images_json,
                            device_serial,
                            device_firmware,
                            recorded_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                        params![
                            format_datetime(&record.timestamp),
                            r.sky_minus_ambient_c,
                            r.sky_brightness_mpsas,
                            r.ambient_temp_c,
                            r.humidity_pct,
                            r.rain_raw,
                            record.safety.as_str(),
                            readings_json,
                            images_json,
                            record.device.serial,
                            record.device.firmware,
                            format_datetime(&Utc::now()),
                        ],
                    )
                    .context("failed to insert ground truth reading")?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::Duplicate);
        }
        Ok(())
    }

    async fn read_ground_truth_near(
        &self,
        at: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Option<GroundTruthRecord>, StoreError> {
        let earliest = format_datetime(&(at - tolerance));
        let latest = format_datetime(&at);

        let record = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT *
                     FROM ground_truth_readings
                     WHERE timestamp >= ?1 AND timestamp <= ?2
                     ORDER BY timestamp DESC
                     LIMIT 1",
                )?;
                let mut rows = stmt.query(params![earliest, latest])?;
                match rows.next()? {
                    Some(row) => row_to_ground_truth(row).map(Some),
                    None => Ok(None),
                }
            })
            .await?;

        Ok(record)
    }

    async fn latest_ground_truth(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let latest = self
            .execute(|conn| {
                let raw: Option<String> = conn.query_row(
                    "SELECT MAX(timestamp) FROM ground_truth_readings",
                    [],
                    |row| row.get(0),
                )?;
                parse_optional_datetime(raw, "timestamp")
            })
            .await?;
        Ok(latest)
    }
}

impl Database {
    pub async fn count_ground_truth_readings(&self) -> Result<usize> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM ground_truth_readings", [], |row| {
                    row.get(0)
                })?;
            Ok(count as usize)
        })
        .await
    }
}
