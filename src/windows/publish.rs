use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::config::NotificationConfig;
use crate::db::models::ObservationWindow;
use crate::error::{CycleError, StoreError};
use crate::notify::Notifier;
use crate::scheduler::bounded;
use crate::store::{ForecastStore, WindowStore};
use crate::windows::config::WindowConfig;
use crate::windows::detector::{detect_windows, rank_windows, WindowCandidate};

/// How far ahead the detector reads the archive.
const DETECTION_HORIZON_DAYS: i64 = 8;

const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;

/// Which stored windows deserve a push notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPolicy {
    pub enabled: bool,
    pub min_score: u8,
    pub min_duration: Duration,
}

impl NotificationPolicy {
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_score: config.min_score,
            min_duration: Duration::hours(i64::from(config.min_hours)),
        }
    }

    pub fn should_notify(&self, window: &ObservationWindow, now: DateTime<Utc>) -> bool {
        self.enabled
            && window.mean_score >= f64::from(self.min_score)
            && window.duration() >= self.min_duration
            && window.end_time > now
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub detected: usize,
    pub saved: usize,
    pub already_known: usize,
    pub notified: usize,
}

/// Runs the detector against the archive, persists new windows once and
/// notifies about each at most once.
///
/// Store calls are bounded by `store_timeout`. The notifier is not: it carries
/// its own request timeout, and a send must never be dropped between the
/// notified claim and the delivery.
pub struct WindowPublisher<S> {
    store: S,
    config: WindowConfig,
    policy: NotificationPolicy,
    notifier: Arc<dyn Notifier>,
    store_timeout: StdDuration,
}

impl<S> WindowPublisher<S>
where
    S: ForecastStore + WindowStore,
{
    pub fn new(
        store: S,
        config: WindowConfig,
        policy: NotificationPolicy,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            config,
            policy,
            notifier,
            store_timeout: StdDuration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: StdDuration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Detect over `[now - lookback, now + horizon)` and publish the results.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PublishReport, CycleError> {
        let range = (now - self.config.lookback())..(now + Duration::days(DETECTION_HORIZON_DAYS));
        let series = self
            .store_call("forecast read", self.store.read_latest_forecast(range))
            .await?;

        let mut candidates = detect_windows(&series, &self.config);
        rank_windows(&mut candidates);
        self.publish(candidates, now).await
    }

    pub async fn publish(
        &self,
        candidates: Vec<WindowCandidate>,
        now: DateTime<Utc>,
    ) -> Result<PublishReport, CycleError> {
        let mut report = PublishReport {
            detected: candidates.len(),
            ..PublishReport::default()
        };

        for candidate in candidates {
            let exists = self
                .store_call(
                    "window lookup",
                    self.store
                        .window_exists(candidate.start_time, candidate.end_time),
                )
                .await?;
            if exists {
                report.already_known += 1;
                continue;
            }

            let window = candidate.into_window(now);
            match self.store_call("window save", self.store.save_window(&window)).await {
                Ok(()) => report.saved += 1,
                // Another pass stored the same span in between
                Err(CycleError::Persistence(err)) if err.is_duplicate() => {
                    report.already_known += 1;
                    continue;
                }
                Err(err) => return Err(err),
            }

            info!(
                "new observation window {} - {} (mean score {:.1}, {:.0}h)",
                window.start_time,
                window.end_time,
                window.mean_score,
                window.duration_hours()
            );
        }

        report.notified = self.notify_pending(now).await?;
        Ok(report)
    }

    /// Send every stored upcoming window that passes the policy and has not
    /// been notified yet, including ones left over from an interrupted pass.
    /// The notified flag is claimed before sending, so a window is never
    /// sent twice.
    async fn notify_pending(&self, now: DateTime<Utc>) -> Result<usize, CycleError> {
        if !self.policy.enabled {
            return Ok(0);
        }

        let pending = self
            .store_call("pending windows", self.store.upcoming_windows(now))
            .await?;

        let mut notified = 0;
        for window in pending
            .into_iter()
            .filter(|w| !w.notified && self.policy.should_notify(w, now))
        {
            let claimed = self
                .store_call(
                    "window notified flag",
                    self.store.mark_window_notified(&window.id, now),
                )
                .await?;
            if !claimed {
                warn!("window {} was already claimed by another pass", window.id);
                continue;
            }

            self.notifier.send(&window).await;
            notified += 1;
        }
        Ok(notified)
    }

    async fn store_call<T, F>(&self, operation: &'static str, call: F) -> Result<T, CycleError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        bounded(operation, self.store_timeout, async {
            call.await.map_err(CycleError::Persistence)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(mean_score: f64, hours: i64, start: DateTime<Utc>) -> ObservationWindow {
        ObservationWindow {
            id: "w".into(),
            start_time: start,
            end_time: start + Duration::hours(hours),
            duration_secs: hours * 3600,
            qualifying_hours: hours as u32,
            mean_score,
            min_score: 70,
            mean_seeing_arcsec: None,
            mean_cloud_pct: None,
            notified: false,
            notified_at: None,
            feedback: None,
            created_at: start,
        }
    }

    #[test]
    fn policy_requires_score_duration_and_future_end() {
        let policy = NotificationPolicy::from_config(&NotificationConfig::default());
        let now = Utc.with_ymd_and_hms(2024, 1, 23, 18, 0, 0).unwrap();
        let tonight = Utc.with_ymd_and_hms(2024, 1, 23, 21, 0, 0).unwrap();

        assert!(policy.should_notify(&window(72.0, 3, tonight), now));
        assert!(!policy.should_notify(&window(69.5, 3, tonight), now));
        assert!(!policy.should_notify(&window(90.0, 2, tonight), now));
        assert!(!policy.should_notify(&window(90.0, 3, now - Duration::hours(4)), now));
    }

    #[test]
    fn disabled_policy_never_notifies() {
        let policy = NotificationPolicy {
            enabled: false,
            min_score: 0,
            min_duration: Duration::zero(),
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 23, 18, 0, 0).unwrap();
        assert!(!policy.should_notify(&window(99.0, 5, now), now));
    }
}
