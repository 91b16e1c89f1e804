use mb_core::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::orchestrator::Orchestrator;
use crate::plan::CyclePlan;
use crate::run::{RunRecord, RunTrigger};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Runs a cycle on a fixed interval until shut down. A tick that finds a
/// cycle already running is skipped, never queued.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    every: Duration,
    plan: CyclePlan,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            every: DEFAULT_INTERVAL,
            plan: CyclePlan::full(),
        }
    }

    pub fn every(mut self, every: Duration) -> Self {
        self.every = every;
        self
    }

    pub fn plan(mut self, plan: CyclePlan) -> Self {
        self.plan = plan;
        self
    }

    /// One scheduled cycle. `Ok(None)` means the tick was skipped.
    pub async fn tick(&self) -> Result<Option<RunRecord>> {
        match self.orchestrator.run(self.plan.clone(), RunTrigger::Scheduled).await {
            Ok(record) => Ok(Some(record)),
            Err(Error::AlreadyRunning) => {
                info!("Previous cycle still running, skipping tick");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Ticks immediately, then every interval, until `shutdown` resolves.
    /// Configuration errors stop the loop; cycle failures do not.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.orchestrator.validate(&self.plan)?;
        info!(every = ?self.every, stages = ?self.plan.stages(), "⏰ Scheduler started");

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(_) => {}
                        Err(e @ Error::Config(_)) => {
                            error!(error = %e, "Scheduler stopped");
                            return Err(e);
                        }
                        Err(e) => warn!(error = %e, "Scheduled cycle failed"),
                    }
                }
            }
        }
    }
}
