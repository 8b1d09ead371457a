use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use log::info;
use serde::{Deserialize, Serialize};

use crate::windows::WindowConfig;

pub const CONFIG_PATH_ENV: &str = "ASTRO_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "astroweather.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA zone the forecast provider reports local times in
    pub timezone: String,
    pub elevation_m: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name: "Wietesch".into(),
            latitude: 52.17,
            longitude: 7.25,
            timezone: "Europe/Berlin".into(),
            elevation_m: 45.0,
        }
    }
}

impl LocationConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid timezone '{}': {err}", self.timezone))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Forecast cloud cover below this counts as a "clear" prediction
    pub clear_cloud_threshold_pct: f64,
    pub good_score: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            clear_cloud_threshold_pct: 30.0,
            good_score: 70,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub min_score: u8,
    pub min_hours: u32,
    pub pushover_user: Option<String>,
    pub pushover_token: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_score: 70,
            min_hours: 3,
            pushover_user: None,
            pushover_token: None,
        }
    }
}

impl NotificationConfig {
    pub fn pushover_credentials(&self) -> Option<(&str, &str)> {
        match (self.pushover_user.as_deref(), self.pushover_token.as_deref()) {
            (Some(user), Some(token)) if !user.is_empty() && !token.is_empty() => {
                Some((user, token))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// How far before the top of the hour a ground-truth sample may be
    pub tolerance_minutes: u32,
    /// Hours re-examined on every training pass
    pub lookback_hours: u32,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tolerance_minutes: 10,
            lookback_hours: 48,
        }
    }
}

impl ReconciliationConfig {
    pub fn tolerance(&self) -> Duration {
        Duration::minutes(i64::from(self.tolerance_minutes))
    }

    pub fn lookback(&self) -> Duration {
        Duration::hours(i64::from(self.lookback_hours))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageryConfig {
    /// All-sky camera archive root; `None` disables image correlation
    pub root: Option<PathBuf>,
    /// ZWO camera archive, relative to `root`
    pub zwo_subdir: String,
    pub allsky_max_age_minutes: u32,
    pub zwo_jpg_max_age_minutes: u32,
    pub zwo_fits_max_age_minutes: u32,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            root: None,
            zwo_subdir: "zwo".into(),
            allsky_max_age_minutes: 5,
            zwo_jpg_max_age_minutes: 5,
            zwo_fits_max_age_minutes: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteoblueConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub package: String,
    /// Clamped to 1..=7 by the provider
    pub forecast_days: u32,
}

impl Default for MeteoblueConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://my.meteoblue.com/packages".into(),
            package: "seeing-1h_clouds-1h_moonlight-1h_air-1h_basic-1h".into(),
            forecast_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudWatcherConfig {
    pub host: Option<String>,
    pub port: u16,
}

impl Default for CloudWatcherConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 80,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub meteoblue: MeteoblueConfig,
    pub cloudwatcher: CloudWatcherConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub forecast_interval_secs: u64,
    pub ground_truth_interval_secs: u64,
    pub training_interval_secs: u64,
    /// Upper bound for a single forecast fetch or sensor poll
    pub call_timeout_secs: u64,
    /// Upper bound for a single store write
    pub persistence_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            forecast_interval_secs: 3600,
            ground_truth_interval_secs: 300,
            training_interval_secs: 6 * 3600,
            call_timeout_secs: 30,
            persistence_timeout_secs: 10,
        }
    }
}

impl SchedulerConfig {
    fn shortened(&self) -> Self {
        Self {
            forecast_interval_secs: 300,
            ground_truth_interval_secs: 60,
            training_interval_secs: 600,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    pub forecast_minutes: u32,
    pub ground_truth_minutes: u32,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            forecast_minutes: 180,
            ground_truth_minutes: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub location: LocationConfig,
    pub scoring: ScoringConfig,
    pub windows: WindowConfig,
    pub notifications: NotificationConfig,
    pub reconciliation: ReconciliationConfig,
    pub imagery: ImageryConfig,
    pub sources: SourcesConfig,
    pub scheduler: SchedulerConfig,
    pub freshness: FreshnessConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/astroweather.sqlite3"),
            location: LocationConfig::default(),
            scoring: ScoringConfig::default(),
            windows: WindowConfig::default(),
            notifications: NotificationConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            imagery: ImageryConfig::default(),
            sources: SourcesConfig::default(),
            scheduler: SchedulerConfig::default(),
            freshness: FreshnessConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `$ASTRO_CONFIG` (or `./astroweather.json`), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty("METEOBLUE_API_KEY") {
            self.sources.meteoblue.api_key = Some(key);
        }
        if let Some(host) = non_empty("CLOUDWATCHER_HOST") {
            self.sources.cloudwatcher.host = Some(host);
        }
        if let Some(lat) = non_empty("ASTRO_LAT").and_then(|v| v.trim().parse().ok()) {
            self.location.latitude = lat;
        }
        if let Some(lon) = non_empty("ASTRO_LON").and_then(|v| v.trim().parse().ok()) {
            self.location.longitude = lon;
        }
        if let Some(path) = non_empty("ASTRO_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(root) = non_empty("ASTRO_IMAGE_ROOT") {
            self.imagery.root = Some(PathBuf::from(root));
        }
        if let Some(user) = non_empty("PUSHOVER_USER") {
            self.notifications.pushover_user = Some(user);
        }
        if let Some(token) = non_empty("PUSHOVER_TOKEN") {
            self.notifications.pushover_token = Some(token);
        }
        if non_empty("ASTRO_DEBUG").is_some_and(|v| v != "0" && v != "false") {
            self.scheduler = self.scheduler.shortened();
        }
    }

    /// Human-readable problems that do not stop the daemon from starting.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.sources.meteoblue.api_key.is_none() {
            warnings.push("METEOBLUE_API_KEY not set, forecast cycles will be skipped".into());
        }
        if self.sources.cloudwatcher.host.is_none() {
            warnings.push("CLOUDWATCHER_HOST not set, ground-truth cycles will be skipped".into());
        }
        if self.notifications.enabled && self.notifications.pushover_credentials().is_none() {
            warnings.push("notifications enabled but Pushover is not configured".into());
        }
        if self.location.tz().is_err() {
            warnings.push(format!("unknown timezone '{}'", self.location.timezone));
        }
        if !(-90.0..=90.0).contains(&self.location.latitude)
            || !(-180.0..=180.0).contains(&self.location.longitude)
        {
            warnings.push("coordinates out of range".into());
        }
        if self.windows.threshold > 100 || self.notifications.min_score > 100 {
            warnings.push("score thresholds must be within 0-100".into());
        }
        if self.windows.min_duration_hours == 0 {
            warnings.push("windows.min_duration_hours is 0, every dark hour may form a window".into());
        }

        let scheduler = &self.scheduler;
        for (name, value) in [
            ("forecast_interval_secs", scheduler.forecast_interval_secs),
            ("ground_truth_interval_secs", scheduler.ground_truth_interval_secs),
            ("training_interval_secs", scheduler.training_interval_secs),
            ("call_timeout_secs", scheduler.call_timeout_secs),
            ("persistence_timeout_secs", scheduler.persistence_timeout_secs),
        ] {
            if value == 0 {
                warnings.push(format!("scheduler.{name} is 0"));
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_site_setup() {
        let config = AppConfig::default();
        assert_eq!(config.location.name, "Wietesch");
        assert_eq!(config.windows.threshold, 60);
        assert_eq!(config.windows.night_zenith_deg, 108.0);
        assert_eq!(config.notifications.min_score, 70);
        assert_eq!(config.notifications.min_hours, 3);
        assert_eq!(config.reconciliation.tolerance(), Duration::minutes(10));
        assert_eq!(config.scheduler.forecast_interval_secs, 3600);
        assert!(config.location.tz().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "windows": { "threshold": 75 }, "location": { "name": "Home" } }"#)
                .unwrap();
        assert_eq!(config.windows.threshold, 75);
        assert_eq!(config.windows.gap_tolerance_hours, 1);
        assert_eq!(config.location.name, "Home");
        assert_eq!(config.location.latitude, 52.17);
    }

    #[test]
    fn env_overrides_apply_and_ignore_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("METEOBLUE_API_KEY", "abc"),
            ("ASTRO_LAT", "48.5"),
            ("ASTRO_LON", "not-a-number"),
            ("PUSHOVER_USER", "  "),
            ("ASTRO_DEBUG", "1"),
        ]);

        let mut config = AppConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.sources.meteoblue.api_key.as_deref(), Some("abc"));
        assert_eq!(config.location.latitude, 48.5);
        assert_eq!(config.location.longitude, 7.25);
        assert!(config.notifications.pushover_user.is_none());
        assert_eq!(config.scheduler.forecast_interval_secs, 300);
        assert_eq!(config.scheduler.call_timeout_secs, 30);
    }

    #[test]
    fn validate_reports_missing_credentials_and_bad_values() {
        let mut config = AppConfig::default();
        config.location.timezone = "Mars/Olympus".into();
        config.scheduler.call_timeout_secs = 0;

        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("METEOBLUE_API_KEY")));
        assert!(warnings.iter().any(|w| w.contains("Mars/Olympus")));
        assert!(warnings.iter().any(|w| w.contains("call_timeout_secs")));
    }
}
