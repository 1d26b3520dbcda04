//! Scheduled scrape cycles using tokio-cron-scheduler.
//!
//! The cron job fires on `CRON_SCHEDULE` (every minute by default). Whether a
//! tick does any work is decided by the dispatcher's own gates: the enabled
//! flag and the frequency set in the scraper settings.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (every tick)
//!     │
//!     └─► try_lock(CycleLock)
//!             ├─► busy → skip tick
//!             └─► Dispatcher::run_cycle(now)
//! ```
//!
//! Only one cycle is ever in flight. The manual process endpoint and the
//! queue worker take the same lock, so none of them overlap. The scheduler
//! runs in queue mode too, where it settles entries whose messages were lost.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use scrape_pipeline::{CycleReport, Dispatcher};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

/// Single-flight guard shared by every cycle trigger.
pub type CycleLock = Arc<Mutex<()>>;

/// Result of asking for a cycle while another may be running.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardedCycle {
    Ran(CycleReport),
    /// Another cycle held the lock; nothing was done
    Busy,
}

/// Run one cycle unless one is already in flight.
pub async fn run_guarded_cycle(
    dispatcher: &Dispatcher,
    lock: &CycleLock,
) -> scrape_pipeline::error::Result<GuardedCycle> {
    let Ok(_guard) = lock.try_lock() else {
        debug!("Previous scrape cycle still running, skipping");
        return Ok(GuardedCycle::Busy);
    };

    let report = dispatcher.run_cycle(Utc::now()).await?;
    Ok(GuardedCycle::Ran(report))
}

/// Start the scrape cycle cron job
pub async fn start_scheduler(
    dispatcher: Arc<Dispatcher>,
    lock: CycleLock,
    schedule: &str,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let cycle_job = Job::new_async(schedule, move |_uuid, _lock| {
        let dispatcher = dispatcher.clone();
        let lock = lock.clone();
        Box::pin(async move {
            match run_guarded_cycle(&dispatcher, &lock).await {
                Ok(GuardedCycle::Ran(report)) if report.ran() => {
                    info!(summary = %report.summary(), "Scheduled scrape cycle finished");
                }
                Ok(GuardedCycle::Ran(report)) => {
                    debug!(summary = %report.summary(), "Scheduled scrape cycle skipped");
                }
                Ok(GuardedCycle::Busy) => {}
                Err(e) => {
                    error!("Scheduled scrape cycle failed: {}", e);
                }
            }
        })
    })?;

    scheduler.add(cycle_job).await?;
    scheduler.start().await?;

    info!(schedule = %schedule, "Scheduled scrape cycles started");
    Ok(scheduler)
}
