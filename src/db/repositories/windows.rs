use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_optional_datetime, to_u8},
    models::{ObservationWindow, WindowFeedback},
};
use crate::error::StoreError;
use crate::store::WindowStore;

fn row_to_window(row: &Row) -> Result<ObservationWindow> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let created_at: String = row.get("created_at")?;
    let rating: Option<i64> = row.get("feedback_rating")?;
    let qualifying_hours: i64 = row.get("qualifying_hours")?;

    let feedback = match rating {
        Some(rating) => Some(WindowFeedback {
            rating: to_u8(rating, "feedback_rating")?,
            notes: row.get("feedback_notes")?,
            actually_used: row
                .get::<_, Option<bool>>("feedback_actually_used")?
                .unwrap_or(false),
        }),
        None => None,
    };

    Ok(ObservationWindow {
        id: row.get("id")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_datetime(&end_time, "end_time")?,
        duration_secs: row.get("duration_secs")?,
        qualifying_hours: u32::try_from(qualifying_hours).context("qualifying_hours out of range")?,
        mean_score: row.get("mean_score")?,
        min_score: to_u8(row.get("min_score")?, "min_score")?,
        mean_seeing_arcsec: row.get("mean_seeing_arcsec")?,
        mean_cloud_pct: row.get("mean_cloud_pct")?,
        notified: row.get("notified")?,
        notified_at: parse_optional_datetime(row.get("notified_at")?, "notified_at")?,
        feedback,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

#[async_trait]
impl WindowStore for Database {
    async fn window_exists(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let start = format_datetime(&start);
        let end = format_datetime(&end);
        let exists = self
            .execute(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(
                        SELECT 1 FROM observation_windows WHERE start_time = ?1 AND end_time = ?2
                    )",
                    params![start, end],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    async fn save_window(&self, window: &ObservationWindow) -> Result<(), StoreError> {
        let window = window.clone();
        let changed = self
            .execute(move |conn| {
                let feedback = window.feedback.as_ref();
                let changed = conn
                    .execute(
                        "INSERT OR IGNORE INTO observation_windows (
                            id,
                            start_time,
                            end_time,
                            duration_secs,
                            qualifying_hours,
                            mean_score,
                            min_score,
                            mean_seeing_arcsec,
                            mean_cloud_pct,
                            notified,
                            notified_at,
                            feedback_rating,
                            feedback_notes,
                            feedback_actually_used,
                            created_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                        params![
                            window.id,
                            format_datetime(&window.start_time),
                            format_datetime(&window.end_time),
                            window.duration_secs,
                            i64::from(window.qualifying_hours),
                            window.mean_score,
                            i64::from(window.min_score),
                            window.mean_seeing_arcsec,
                            window.mean_cloud_pct,
                            window.notified,
                            window.notified_at.as_ref().map(format_datetime),
                            feedback.map(|f| i64::from(f.rating)),
                            feedback.and_then(|f| f.notes.clone()),
                            feedback.map(|f| f.actually_used),
                            format_datetime(&window.created_at),
                        ],
                    )
                    .context("failed to insert observation window")?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::Duplicate);
        }
        Ok(())
    }

    async fn mark_window_notified(
        &self,
        window_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let window_id = window_id.to_string();
        let changed = self
            .execute(move |conn| {
                let changed = conn
                    .execute(
                        "UPDATE observation_windows
                         SET notified = 1,
                             notified_at = ?2
                         WHERE id = ?1 AND notified = 0",
                        params![window_id, format_datetime(&at)],
                    )
                    .context("failed to mark window notified")?;
                Ok(changed)
            })
            .await?;
        Ok(changed == 1)
    }

    async fn record_window_feedback(
        &self,
        window_id: &str,
        feedback: &WindowFeedback,
    ) -> Result<(), StoreError> {
        let id = window_id.to_string();
        let feedback = feedback.clone();
        let changed = self
            .execute(move |conn| {
                let changed = conn
                    .execute(
                        "UPDATE observation_windows
                         SET feedback_rating = ?2,
                             feedback_notes = ?3,
                             feedback_actually_used = ?4
                         WHERE id = ?1",
                        params![
                            id,
                            i64::from(feedback.rating),
                            feedback.notes,
                            feedback.actually_used,
                        ],
                    )
                    .context("failed to record window feedback")?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::NotFound(window_id.to_string()));
        }
        Ok(())
    }

    async fn upcoming_windows(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Vec<ObservationWindow>, StoreError> {
        let after = format_datetime(&after);
        let windows = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM observation_windows
                     WHERE end_time > ?1
                     ORDER BY mean_score DESC, start_time ASC",
                )?;
                let mut rows = stmt.query(params![after])?;

                let mut windows = Vec::new();
                while let Some(row) = rows.next()? {
                    windows.push(row_to_window(row)?);
                }
                Ok(windows)
            })
            .await?;
        Ok(windows)
    }
}

impl Database {
    pub async fn get_window(&self, window_id: &str) -> Result<Option<ObservationWindow>> {
        let window_id = window_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM observation_windows WHERE id = ?1")?;
            let mut rows = stmt.query(params![window_id])?;
            match rows.next()? {
                Some(row) => row_to_window(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn count_windows_with_span(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize> {
        let start = format_datetime(&start);
        let end = format_datetime(&end);
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM observation_windows WHERE start_time = ?1 AND end_time = ?2",
                params![start, end],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }
}
