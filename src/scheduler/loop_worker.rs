use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::CycleError;
use crate::status::CycleStats;

use super::cycles::Cycle;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

/// Run `cycle` on every tick until cancelled. The first tick fires
/// immediately. Cancellation is only observed between cycles, so a cycle
/// that has started always finishes.
pub async fn cycle_loop(
    cycle: Arc<dyn Cycle>,
    interval: Duration,
    stats: CycleStats,
    cancel_token: CancellationToken,
) {
    let kind = cycle.kind();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("{} loop started, every {}s", kind.as_str(), interval.as_secs());

    loop {
        tokio::select! {
            // Cancellation wins over a tick that came due during the last run
            biased;

            _ = cancel_token.cancelled() => {
                log_info!("{} loop shutting down", kind.as_str());
                break;
            }
            _ = ticker.tick() => {
                let now = Utc::now();
                match cycle.run(now).await {
                    Ok(()) => stats.record_success(kind, now).await,
                    Err(err) => {
                        match &err {
                            CycleError::Persistence(_) => {
                                log_error!("{} cycle skipped: {err}", kind.as_str());
                            }
                            _ => {
                                log_warn!("{} cycle skipped: {err}", kind.as_str());
                            }
                        }
                        stats.record_skip(kind, &err, now).await;
                    }
                }
            }
        }
    }
}
