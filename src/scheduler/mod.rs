pub mod controller;
pub mod cycles;
mod loop_worker;

pub use controller::{ScheduledCycle, SchedulerController};
pub use cycles::{
    bounded, Cycle, ForecastCycle, ForecastCycleReport, GroundTruthCycle, HealthCycle,
    TrainingCycle,
};
