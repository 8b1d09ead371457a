//! External data collaborators: the hourly forecast provider and the on-site
//! cloud sensor. Any failure here means "skip this cycle".

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LocationConfig;
use crate::db::models::{RawForecastHour, SensorSample};
use crate::error::{CycleError, DataQualityError, SourceError};

pub mod cloudwatcher;
pub mod meteoblue;

pub use cloudwatcher::CloudWatcherClient;
pub use meteoblue::MeteoblueClient;

/// One successful forecast download.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastFetch {
    /// Ordered by target time.
    pub hours: Vec<RawForecastHour>,
    pub credits_used: Option<u64>,
}

#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Name recorded in the API call log.
    fn name(&self) -> &'static str;

    /// Endpoint recorded in the API call log. Must not contain credentials.
    fn endpoint(&self) -> String;

    async fn fetch(
        &self,
        location: &LocationConfig,
        horizon_hours: u32,
    ) -> Result<ForecastFetch, SourceError>;
}

#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn poll(&self) -> Result<SensorSample, SensorPollError>;
}

/// The device was unreachable, or it answered with a sample that cannot be
/// trusted.
#[derive(Debug, Error)]
pub enum SensorPollError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    DataQuality(#[from] DataQualityError),
}

impl From<SensorPollError> for CycleError {
    fn from(err: SensorPollError) -> Self {
        match err {
            SensorPollError::Source(err) => CycleError::TransientSource(err),
            SensorPollError::DataQuality(err) => CycleError::DataQuality(err),
        }
    }
}
