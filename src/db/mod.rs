mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{
    ApiCall, DeviceInfo, ForecastConditions, ForecastRecord, GroundTruthRecord, ObservationWindow,
    RawForecastHour, SafetyFlag, SensorReadings, SensorSample, TrainingPair, WindowFeedback,
};
