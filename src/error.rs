use thiserror::Error;

/// Failures reported by the storage boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row's uniqueness key is already present.
    #[error("record already exists")]
    Duplicate,
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0:#}")]
    Unavailable(#[source] anyhow::Error),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Unavailable(err)
    }
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("source not configured: {0}")]
    NotConfigured(&'static str),
    #[error("source timed out after {0}s")]
    Timeout(u64),
}

/// One malformed or out-of-range value. The offending hour or sample is dropped.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{field}={value}: {reason}")]
pub struct DataQualityError {
    pub field: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl DataQualityError {
    pub fn new(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self {
            field,
            value: value.to_string(),
            reason,
        }
    }
}

/// Why a scheduled cycle was skipped. None of these is fatal to the process.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("transient source failure: {0}")]
    TransientSource(#[from] SourceError),
    #[error("persistence failure: {0}")]
    Persistence(#[source] StoreError),
    #[error("data quality: {0}")]
    DataQuality(#[from] DataQualityError),
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
}

impl CycleError {
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::TransientSource(_) => "transient_source",
            CycleError::Persistence(_) => "persistence",
            CycleError::DataQuality(_) => "data_quality",
            CycleError::Timeout { .. } => "timeout",
        }
    }
}
