//! In-process scrape queue with at-least-once delivery.
//!
//! Submissions in queue mode enqueue one [`ScrapeMessage`] per URL, or one
//! crawl message. The [`QueueWorker`] hands each message to
//! [`Dispatcher::process_message`] and decides what happens next:
//!
//! ```text
//! recv ─► process_message
//!           ├─► Ok(ack)          → done, throttle before the next message
//!           ├─► Ok(Deferred)     → redeliver after `deferred_delay`
//!           ├─► Ok(Interrupted)  → stop (shutdown)
//!           └─► Err              → redeliver with backoff, up to `max_attempts`
//! ```
//!
//! Redelivery is safe because the dispatcher treats a settled entry as
//! already done and a `processing` entry as re-claimable.
//!
//! Each message is processed while holding the shared [`CycleLock`], so a
//! message never overlaps a scheduled or manual cycle. The queue is held in
//! memory only: at startup [`ScrapeQueue::requeue_unsettled`] re-enqueues
//! whatever the store still has open, and the cron cycle keeps running as a
//! backstop for messages dropped after `max_attempts`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use scrape_pipeline::{Dispatcher, JobStore, MessageOutcome, ScrapeJob, ScrapeMessage};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::scheduled_tasks::CycleLock;

/// Configuration for the queue worker.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Channel capacity
    pub capacity: usize,
    /// Deliveries before a failing message is dropped
    pub max_attempts: u32,
    /// Base backoff, doubled per failed attempt
    pub retry_backoff: Duration,
    /// Upper bound on the doubled backoff
    pub max_backoff: Duration,
    /// How long a message waits while processing is disabled
    pub deferred_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_attempts: 5,
            retry_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(10 * 60),
            deferred_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("scrape queue is closed")]
    Closed,
}

#[derive(Debug, Clone)]
struct Delivery {
    message: ScrapeMessage,
    /// Failed deliveries so far
    attempt: u32,
}

/// Producer handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ScrapeQueue {
    tx: mpsc::Sender<Delivery>,
}

impl ScrapeQueue {
    /// Create a queue and the worker that drains it. The worker takes
    /// `cycle_lock` around every message.
    pub fn channel(
        dispatcher: Arc<Dispatcher>,
        cycle_lock: CycleLock,
        config: QueueConfig,
    ) -> (Self, QueueWorker) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let worker = QueueWorker {
            rx,
            tx: tx.clone(),
            dispatcher,
            cycle_lock,
            config,
        };
        (Self { tx }, worker)
    }

    pub async fn enqueue(&self, message: ScrapeMessage) -> Result<(), QueueError> {
        self.tx
            .send(Delivery {
                message,
                attempt: 0,
            })
            .await
            .map_err(|_| QueueError::Closed)
    }

    /// Enqueue every message covering a freshly submitted job.
    pub async fn enqueue_job(&self, job: &ScrapeJob) -> Result<usize, QueueError> {
        let messages = ScrapeMessage::for_job(job);
        let count = messages.len();
        for message in messages {
            self.enqueue(message).await?;
        }
        debug!(job_id = %job.id, count, "Enqueued scrape messages");
        Ok(count)
    }

    /// Enqueue the remaining work of every active job in `store`.
    ///
    /// Needs a running worker once the backlog exceeds the channel capacity.
    pub async fn requeue_unsettled<S>(&self, store: &S) -> Result<usize>
    where
        S: JobStore + ?Sized,
    {
        let jobs = store.active_jobs(usize::MAX).await?;
        let mut count = 0;
        for job in &jobs {
            for message in ScrapeMessage::for_unsettled(job) {
                self.enqueue(message).await?;
                count += 1;
            }
        }
        if count > 0 {
            info!(jobs = jobs.len(), count, "Re-enqueued unsettled scrape work");
        }
        Ok(count)
    }
}

/// Consumer side of the scrape queue.
pub struct QueueWorker {
    rx: mpsc::Receiver<Delivery>,
    /// Used for redelivery
    tx: mpsc::Sender<Delivery>,
    dispatcher: Arc<Dispatcher>,
    cycle_lock: CycleLock,
    config: QueueConfig,
}

impl QueueWorker {
    /// Drain the queue until shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        info!(
            max_attempts = self.config.max_attempts,
            "scrape queue worker starting"
        );

        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            let job_id = delivery.message.job_id;
            let guard = tokio::select! {
                _ = shutdown.cancelled() => break,
                guard = self.cycle_lock.lock() => guard,
            };
            let result = self
                .dispatcher
                .process_message(&delivery.message, Utc::now())
                .await;
            drop(guard);

            match result {
                Ok(MessageOutcome::Interrupted) => {
                    debug!(job_id = %job_id, "Message interrupted by shutdown");
                    break;
                }
                Ok(MessageOutcome::Deferred) => {
                    self.redeliver(delivery, self.config.deferred_delay, &shutdown);
                }
                Ok(outcome) => {
                    debug!(job_id = %job_id, ?outcome, acked = outcome.is_ack(), "Message handled");
                    if let MessageOutcome::Processed(_) = outcome {
                        match self.dispatcher.throttle().await {
                            Ok(true) => {}
                            Ok(false) => break,
                            Err(e) => warn!(error = %e, "Failed to load settings for throttle"),
                        }
                    }
                }
                Err(e) => {
                    let attempt = delivery.attempt + 1;
                    if attempt >= self.config.max_attempts {
                        error!(
                            job_id = %job_id,
                            attempt,
                            error = %e,
                            "Scrape message failed too many times, dropping"
                        );
                        continue;
                    }
                    let backoff = retry_delay(&self.config, attempt);
                    warn!(job_id = %job_id, attempt, error = %e, ?backoff, "Scrape message failed, will retry");
                    self.redeliver(Delivery { attempt, ..delivery }, backoff, &shutdown);
                }
            }
        }

        info!("scrape queue worker stopped");
        Ok(())
    }

    fn redeliver(&self, delivery: Delivery, after: Duration, shutdown: &CancellationToken) {
        let tx = self.tx.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    if tx.send(delivery).await.is_err() {
                        debug!("Scrape queue closed before redelivery");
                    }
                }
            }
        });
    }
}

/// Backoff before redelivery number `attempt` (1-based): the base doubled per
/// earlier failure, capped at `max_backoff`.
fn retry_delay(config: &QueueConfig, attempt: u32) -> Duration {
    2u32.checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| config.retry_backoff.checked_mul(factor))
        .map_or(config.max_backoff, |delay| delay.min(config.max_backoff))
}
