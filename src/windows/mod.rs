pub mod config;
pub mod detector;
pub mod publish;
pub mod summary;

pub use config::WindowConfig;
pub use detector::{detect_windows, rank_windows, WindowCandidate};
pub use publish::{NotificationPolicy, PublishReport, WindowPublisher};
pub use summary::{summarize_night, NightSummary};
