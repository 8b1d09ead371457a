pub mod forecast;
pub mod ground_truth;
pub mod training_pair;
pub mod window;

pub use forecast::{ApiCall, ForecastConditions, ForecastRecord, RawForecastHour};
pub use ground_truth::{DeviceInfo, GroundTruthRecord, SafetyFlag, SensorReadings, SensorSample};
pub use training_pair::TrainingPair;
pub use window::{ObservationWindow, WindowFeedback};
