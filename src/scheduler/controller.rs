use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::status::CycleStats;

use super::cycles::Cycle;
use super::loop_worker::cycle_loop;

/// A cycle and how often to run it.
pub struct ScheduledCycle {
    pub cycle: Arc<dyn Cycle>,
    pub interval: Duration,
}

impl ScheduledCycle {
    pub fn new(cycle: Arc<dyn Cycle>, interval: Duration) -> Self {
        Self { cycle, interval }
    }
}

/// Owns the periodic loops. Each loop runs on its own task so a slow forecast
/// fetch never delays a sensor poll.
pub struct SchedulerController {
    handles: Vec<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    stats: CycleStats,
}

impl SchedulerController {
    pub fn new(stats: CycleStats) -> Self {
        Self {
            handles: Vec::new(),
            cancel_token: None,
            stats,
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel_token.is_some()
    }

    pub fn start(&mut self, cycles: Vec<ScheduledCycle>) -> Result<()> {
        if self.is_running() {
            bail!("scheduler already running");
        }
        if let Some(bad) = cycles.iter().find(|c| c.interval.is_zero()) {
            bail!("{} loop has a zero interval", bad.cycle.kind().as_str());
        }

        let cancel_token = CancellationToken::new();
        for scheduled in cycles {
            let handle = tokio::spawn(cycle_loop(
                scheduled.cycle,
                scheduled.interval,
                self.stats.clone(),
                cancel_token.clone(),
            ));
            self.handles.push(handle);
        }

        info!("scheduler started with {} loop(s)", self.handles.len());
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Signal every loop and wait for in-flight cycles to finish.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        for handle in self.handles.drain(..) {
            handle.await.context("scheduler loop task failed to join")?;
        }
        Ok(())
    }
}
