use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::models::{ForecastRecord, ObservationWindow};
use crate::windows::config::WindowConfig;

/// A qualifying run found by the detector, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCandidate {
    pub start_time: DateTime<Utc>,
    /// Exclusive: one hour past the last qualifying hour
    pub end_time: DateTime<Utc>,
    pub qualifying_hours: u32,
    pub mean_score: f64,
    pub min_score: u8,
    pub mean_seeing_arcsec: Option<f64>,
    pub mean_cloud_pct: Option<f64>,
}

impl WindowCandidate {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn into_window(self, created_at: DateTime<Utc>) -> ObservationWindow {
        ObservationWindow {
            id: Uuid::new_v4().to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_secs: self.duration().num_seconds(),
            qualifying_hours: self.qualifying_hours,
            mean_score: self.mean_score,
            min_score: self.min_score,
            mean_seeing_arcsec: self.mean_seeing_arcsec,
            mean_cloud_pct: self.mean_cloud_pct,
            notified: false,
            notified_at: None,
            feedback: None,
            created_at,
        }
    }
}

/// Hours collected since the run opened.
struct Run<'a> {
    qualifying: Vec<&'a ForecastRecord>,
    last_seen: DateTime<Utc>,
    pending_gap: u32,
}

impl<'a> Run<'a> {
    fn open(hour: &'a ForecastRecord) -> Self {
        Self {
            qualifying: vec![hour],
            last_seen: hour.target_time,
            pending_gap: 0,
        }
    }

    fn continues_with(&self, hour: &ForecastRecord) -> bool {
        hour.target_time == self.last_seen + Duration::hours(1)
    }

    fn extend(&mut self, hour: &'a ForecastRecord) {
        self.qualifying.push(hour);
        self.last_seen = hour.target_time;
        self.pending_gap = 0;
    }

    fn absorb_gap(&mut self, hour: &ForecastRecord) {
        self.last_seen = hour.target_time;
        self.pending_gap += 1;
    }

    /// Trailing gap hours are not part of the window.
    fn close(self, config: &WindowConfig) -> Option<WindowCandidate> {
        let first = self.qualifying.first()?;
        let last = self.qualifying.last()?;

        let start_time = first.target_time;
        let end_time = last.target_time + Duration::hours(1);
        if end_time - start_time < config.min_duration() {
            return None;
        }

        let count = self.qualifying.len();
        let total_score: u32 = self.qualifying.iter().map(|h| u32::from(h.score)).sum();
        let min_score = self.qualifying.iter().map(|h| h.score).min()?;

        Some(WindowCandidate {
            start_time,
            end_time,
            qualifying_hours: count as u32,
            mean_score: f64::from(total_score) / count as f64,
            min_score,
            mean_seeing_arcsec: mean_of(self.qualifying.iter().map(|h| h.conditions.seeing_arcsec)),
            mean_cloud_pct: mean_of(self.qualifying.iter().map(|h| h.conditions.total_cloud_pct)),
        })
    }
}

enum DetectorState<'a> {
    Searching,
    InWindow(Run<'a>),
}

impl<'a> DetectorState<'a> {
    fn from_hour(hour: &'a ForecastRecord, qualifies: bool) -> Self {
        if qualifies {
            DetectorState::InWindow(Run::open(hour))
        } else {
            DetectorState::Searching
        }
    }
}

/// Scan a forecast series for runs of dark hours scoring at or above the
/// threshold.
///
/// The series may be unsorted and may contain several fetches of the same
/// hour; only the latest fetch of each hour is used. Up to
/// `gap_tolerance_hours` consecutive sub-threshold hours are absorbed into an
/// open run. A missing hour (non-consecutive timestamps) closes the run.
pub fn detect_windows(series: &[ForecastRecord], config: &WindowConfig) -> Vec<WindowCandidate> {
    let dark = latest_dark_hours(series, config.night_zenith_deg);

    let mut windows = Vec::new();
    let mut state = DetectorState::Searching;

    for hour in dark {
        let qualifies = hour.score >= config.threshold;

        state = match state {
            DetectorState::InWindow(run) if !run.continues_with(hour) => {
                windows.extend(run.close(config));
                DetectorState::from_hour(hour, qualifies)
            }
            DetectorState::Searching => DetectorState::from_hour(hour, qualifies),
            DetectorState::InWindow(mut run) => {
                if qualifies {
                    run.extend(hour);
                    DetectorState::InWindow(run)
                } else {
                    run.absorb_gap(hour);
                    if run.pending_gap > config.gap_tolerance_hours {
                        windows.extend(run.close(config));
                        DetectorState::Searching
                    } else {
                        DetectorState::InWindow(run)
                    }
                }
            }
        };
    }

    if let DetectorState::InWindow(run) = state {
        windows.extend(run.close(config));
    }

    windows
}

/// Display order: best mean score first, earlier start on ties.
pub fn rank_windows(windows: &mut [WindowCandidate]) {
    windows.sort_by(|a, b| {
        b.mean_score
            .partial_cmp(&a.mean_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.start_time.cmp(&b.start_time))
    });
}

fn latest_dark_hours(series: &[ForecastRecord], night_zenith_deg: f64) -> Vec<&ForecastRecord> {
    let mut dark: Vec<&ForecastRecord> = series
        .iter()
        .filter(|h| h.is_dark(night_zenith_deg))
        .collect();

    // Latest fetch first within each hour, then keep the first of each hour
    dark.sort_by(|a, b| {
        a.target_time
            .cmp(&b.target_time)
            .then_with(|| b.fetched_at.cmp(&a.fetched_at))
    });
    dark.dedup_by_key(|h| h.target_time);
    dark
}

fn mean_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ForecastConditions;
    use crate::scoring::QualityClass;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 23, 20, 0, 0).unwrap()
    }

    fn record(offset_hours: i64, score: u8) -> ForecastRecord {
        ForecastRecord {
            target_time: base() + Duration::hours(offset_hours),
            fetched_at: base() - Duration::hours(3),
            conditions: ForecastConditions {
                seeing_arcsec: Some(1.0),
                total_cloud_pct: Some(f64::from(100 - score.min(100)) / 2.0),
                zenith_angle_deg: Some(140.0),
                ..ForecastConditions::default()
            },
            score,
            quality_class: QualityClass::from_score(score),
        }
    }

    fn series(scores: &[u8]) -> Vec<ForecastRecord> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| record(i as i64, *s))
            .collect()
    }

    fn config(threshold: u8, min_hours: u32, gap: u32) -> WindowConfig {
        WindowConfig {
            threshold,
            min_duration_hours: min_hours,
            gap_tolerance_hours: gap,
            ..WindowConfig::default()
        }
    }

    #[test]
    fn single_noisy_hour_is_absorbed() {
        let windows = detect_windows(&series(&[55, 72, 74, 68, 80, 82, 40]), &config(70, 2, 1));

        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert_eq!(w.start_time, base() + Duration::hours(1));
        assert_eq!(w.end_time, base() + Duration::hours(6));
        assert_eq!(w.duration(), Duration::hours(5));
        assert_eq!(w.qualifying_hours, 4);
        assert_eq!(w.mean_score, 77.0);
        assert_eq!(w.min_score, 72);
    }

    #[test]
    fn gap_longer_than_tolerance_splits_runs() {
        let windows = detect_windows(&series(&[80, 80, 50, 50, 75, 75, 75]), &config(70, 2, 1));

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start_time, base());
        assert_eq!(windows[0].duration(), Duration::hours(2));
        assert_eq!(windows[1].start_time, base() + Duration::hours(4));
        assert_eq!(windows[1].duration(), Duration::hours(3));
    }

    #[test]
    fn zero_tolerance_closes_on_first_bad_hour() {
        let windows = detect_windows(&series(&[80, 80, 65, 80, 80]), &config(70, 2, 0));
        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.duration() == Duration::hours(2)));
    }

    #[test]
    fn runs_shorter_than_minimum_are_discarded() {
        let windows = detect_windows(&series(&[90, 40, 40, 90, 90]), &config(70, 3, 1));
        assert!(windows.is_empty());
    }

    #[test]
    fn trailing_gap_hours_do_not_extend_window() {
        let windows = detect_windows(&series(&[80, 80, 60]), &config(70, 2, 1));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end_time, base() + Duration::hours(2));
    }

    #[test]
    fn daylight_hours_are_ignored() {
        let mut hours = series(&[90, 90, 90, 90]);
        hours[0].conditions.zenith_angle_deg = Some(95.0);
        hours[1].conditions.zenith_angle_deg = None;

        let windows = detect_windows(&hours, &config(70, 2, 1));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_time, base() + Duration::hours(2));
    }

    #[test]
    fn missing_hour_closes_run() {
        let mut hours = series(&[80, 80, 80, 80]);
        hours.remove(2);

        let windows = detect_windows(&hours, &config(70, 1, 1));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].end_time, base() + Duration::hours(2));
        assert_eq!(windows[1].start_time, base() + Duration::hours(3));
    }

    #[test]
    fn latest_fetch_wins_for_each_hour() {
        let mut hours = series(&[80, 80, 80]);
        let mut revised = record(1, 20);
        revised.fetched_at = base() - Duration::hours(1);
        hours.push(revised);
        hours.reverse();

        let windows = detect_windows(&hours, &config(70, 1, 0));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start_time, base());
        assert_eq!(windows[1].start_time, base() + Duration::hours(2));
    }

    #[test]
    fn ranking_prefers_score_then_start() {
        let mut windows = detect_windows(
            &series(&[75, 75, 10, 10, 90, 90, 10, 10, 75, 75]),
            &config(70, 2, 1),
        );
        rank_windows(&mut windows);

        let starts: Vec<_> = windows.iter().map(|w| w.start_time).collect();
        assert_eq!(
            starts,
            vec![
                base() + Duration::hours(4),
                base(),
                base() + Duration::hours(8),
            ]
        );
    }

    #[test]
    fn statistics_cover_qualifying_hours_only() {
        let mut hours = series(&[80, 40, 90]);
        hours[1].conditions.seeing_arcsec = Some(4.0);
        hours[2].conditions.seeing_arcsec = Some(2.0);

        let windows = detect_windows(&hours, &config(70, 2, 1));
        let w = &windows[0];
        assert_eq!(w.mean_seeing_arcsec, Some(1.5));
        assert_eq!(w.mean_score, 85.0);
        assert_eq!(w.min_score, 80);
    }
}
