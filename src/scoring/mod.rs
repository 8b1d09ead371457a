pub mod calculator;
pub mod classes;

pub use calculator::{score_metrics, AtmosphericMetrics, Score};
pub use classes::{QualityClass, SeeingClass};
