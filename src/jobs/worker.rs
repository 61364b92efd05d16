//! Job worker
//!
//! Polls the queue, runs claimed jobs concurrently and records their outcome.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::queue::{ClaimedJob, JobPayload, JobQueue};
use crate::error::AppError;
use crate::federation::{InboxProcessor, OutboxProcessor};
use crate::service::ActorDirectory;

pub struct JobWorker {
    queue: JobQueue,
    inbox: Arc<InboxProcessor>,
    outbox: Arc<OutboxProcessor>,
    directory: Arc<ActorDirectory>,
}

impl JobWorker {
    pub fn new(
        queue: JobQueue,
        inbox: Arc<InboxProcessor>,
        outbox: Arc<OutboxProcessor>,
        directory: Arc<ActorDirectory>,
    ) -> Self {
        Self {
            queue,
            inbox,
            outbox,
            directory,
        }
    }

    /// Run until `shutdown` flips to true, then wait for in-flight jobs.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let notify = self.queue.notifier();
        let poll_interval = Duration::from_millis(self.queue.config().poll_interval_ms);
        let batch_size = self.queue.config().batch_size;
        let mut in_flight = JoinSet::new();

        tracing::info!(
            poll_interval_ms = self.queue.config().poll_interval_ms,
            batch_size,
            "Job worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            // Reap finished jobs
            while in_flight.try_join_next().is_some() {}

            match self.queue.claim_due(batch_size).await {
                Ok(jobs) => {
                    for job in jobs {
                        let worker = self.clone();
                        in_flight.spawn(async move { worker.execute(job).await });
                    }
                }
                Err(error) => {
                    tracing::error!(error = %error, "Failed to claim jobs");
                }
            }

            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        tracing::info!(in_flight = in_flight.len(), "Job worker stopping");
        while in_flight.join_next().await.is_some() {}
    }

    /// Claim and run one batch of due jobs, waiting for all of them.
    ///
    /// # Returns
    /// Number of jobs executed
    pub async fn run_once(&self) -> Result<usize, AppError> {
        let jobs = self.queue.claim_due(self.queue.config().batch_size).await?;
        let count = jobs.len();
        futures::future::join_all(jobs.into_iter().map(|job| self.execute(job))).await;
        Ok(count)
    }

    async fn execute(&self, job: ClaimedJob) {
        let ClaimedJob { record, payload } = job;
        tracing::debug!(job_id = %record.id, kind = %record.kind, attempt = record.attempts, "Running job");

        let result = match &payload {
            JobPayload::Inbox(job) => {
                let recipient = match job.recipient_actor_id.as_deref() {
                    Some(id) => match self.directory.find_by_id(id).await {
                        Ok(actor) => Some(actor),
                        Err(AppError::NotFound) => {
                            tracing::warn!(job_id = %record.id, recipient = %id, "Inbox recipient no longer exists");
                            None
                        }
                        Err(error) => {
                            self.settle(&record, Err(error)).await;
                            return;
                        }
                    },
                    None => None,
                };
                self.inbox
                    .process(&job.activity, recipient.as_ref())
                    .await
                    .map(|outcome| tracing::debug!(job_id = %record.id, outcome = ?outcome, "Inbox job done"))
            }
            JobPayload::Outbox(job) => self
                .outbox
                .process(job)
                .await
                .map(|outcome| tracing::debug!(job_id = %record.id, outcome = ?outcome, "Outbox job done")),
        };

        self.settle(&record, result).await;
    }

    async fn settle(&self, record: &crate::data::JobRecord, result: Result<(), AppError>) {
        let settled = match result {
            Ok(()) => self.queue.complete(record).await,
            Err(error) => self.queue.fail(record, &error).await.map(|_| ()),
        };
        if let Err(error) = settled {
            tracing::error!(job_id = %record.id, error = %error, "Failed to record job outcome");
        }
    }
}
