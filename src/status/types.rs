use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    Forecast,
    GroundTruth,
    Training,
    Health,
}

impl LoopKind {
    pub const ALL: [LoopKind; 4] = [
        LoopKind::Forecast,
        LoopKind::GroundTruth,
        LoopKind::Training,
        LoopKind::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopKind::Forecast => "forecast",
            LoopKind::GroundTruth => "ground_truth",
            LoopKind::Training => "training",
            LoopKind::Health => "health",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopStats {
    pub completed: u64,
    pub skipped: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_kind: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub forecast: LoopStats,
    pub ground_truth: LoopStats,
    pub training: LoopStats,
    pub health: LoopStats,
}

impl StatsSnapshot {
    pub fn get(&self, kind: LoopKind) -> &LoopStats {
        match kind {
            LoopKind::Forecast => &self.forecast,
            LoopKind::GroundTruth => &self.ground_truth,
            LoopKind::Training => &self.training,
            LoopKind::Health => &self.health,
        }
    }

    pub(super) fn get_mut(&mut self, kind: LoopKind) -> &mut LoopStats {
        match kind {
            LoopKind::Forecast => &mut self.forecast,
            LoopKind::GroundTruth => &mut self.ground_truth,
            LoopKind::Training => &mut self.training,
            LoopKind::Health => &mut self.health,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Stale,
    /// Nothing has ever been written.
    Never,
}

impl Freshness {
    pub fn evaluate(last: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> Self {
        match last {
            None => Freshness::Never,
            Some(at) if now - at <= window => Freshness::Fresh,
            Some(_) => Freshness::Stale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub checked_at: DateTime<Utc>,
    pub last_forecast_fetch: Option<DateTime<Utc>>,
    pub last_ground_truth: Option<DateTime<Utc>>,
    pub forecast: Freshness,
    pub ground_truth: Freshness,
    pub degraded: bool,
}
