use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use log::{info, warn};

use crate::config::NotificationConfig;
use crate::db::models::ObservationWindow;
use crate::error::SourceError;

const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";
const PUSHOVER_TITLE: &str = "Astro Window!";
const PUSHOVER_PRIORITY: &str = "0";
const SEND_TIMEOUT_SECS: u64 = 15;

/// Delivery is best-effort. Implementations log their own failures and never
/// report them back, so a window is never re-sent because of a delivery error.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, window: &ObservationWindow);
}

/// Writes the notification to the log only.
pub struct LogNotifier {
    tz: Tz,
}

impl LogNotifier {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, window: &ObservationWindow) {
        info!("{}", format_window_message(window, self.tz).replace('\n', " | "));
    }
}

pub struct PushoverNotifier {
    client: reqwest::Client,
    user: String,
    token: String,
    tz: Tz,
}

impl PushoverNotifier {
    pub fn new(user: &str, token: &str, tz: Tz) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            user: user.to_string(),
            token: token.to_string(),
            tz,
        })
    }

    /// `None` when notifications are off or credentials are missing.
    pub fn from_config(config: &NotificationConfig, tz: Tz) -> Option<Result<Self, SourceError>> {
        if !config.enabled {
            return None;
        }
        let (user, token) = config.pushover_credentials()?;
        Some(Self::new(user, token, tz))
    }

    async fn post(&self, message: &str) -> Result<(), SourceError> {
        let form = [
            ("token", self.token.as_str()),
            ("user", self.user.as_str()),
            ("title", PUSHOVER_TITLE),
            ("message", message),
            ("priority", PUSHOVER_PRIORITY),
        ];

        let response = self.client.post(PUSHOVER_URL).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: PUSHOVER_URL.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, window: &ObservationWindow) {
        let message = format_window_message(window, self.tz);
        match self.post(&message).await {
            Ok(()) => info!("pushover notification sent for window {}", window.id),
            Err(err) => warn!("pushover notification for window {} failed: {err}", window.id),
        }
    }
}

/// Human-readable summary of a window, times shown in `tz`.
pub fn format_window_message(window: &ObservationWindow, tz: Tz) -> String {
    let start = window.start_time.with_timezone(&tz);
    let end = window.end_time.with_timezone(&tz);

    let mut lines = vec![
        "Good Astro Night!".to_string(),
        String::new(),
        format!("Date: {}", start.format("%a %d.%m.")),
        format!("Time: {} - {}", start.format("%H:%M"), end.format("%H:%M")),
        format!("Score: {:.0}", window.mean_score),
    ];
    if let Some(seeing) = window.mean_seeing_arcsec {
        lines.push(format!("Seeing: {seeing:.1}\""));
    }
    if let Some(clouds) = window.mean_cloud_pct {
        lines.push(format!("Clouds: {clouds:.0}%"));
    }
    lines.join("\n")
}
