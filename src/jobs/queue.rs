//! Durable job queue
//!
//! Jobs live in the `jobs` table. A job is claimed with a conditional update
//! so only one worker runs it at a time; failures are rescheduled with
//! exponential backoff until the attempt budget is spent, after which the job
//! is dead-lettered and never retried automatically.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::config::QueueConfig;
use crate::data::{Database, EntityId, JobRecord, JobStatus};
use crate::error::AppError;

pub const INBOX_JOB: &str = "inbox";
pub const OUTBOX_JOB: &str = "outbox";

/// Deliver a locally originated activity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxJob {
    pub activity: Value,
    /// Local sending actor
    pub actor_id: String,
    /// Internal id of the logged activity, for tracing deliveries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
}

/// Apply an authenticated inbound activity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxJob {
    pub activity: Value,
    /// Local actor whose inbox received it (None for the shared inbox)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_actor_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum JobPayload {
    Inbox(InboxJob),
    Outbox(OutboxJob),
}

impl JobPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inbox(_) => INBOX_JOB,
            Self::Outbox(_) => OUTBOX_JOB,
        }
    }

    fn to_json(&self) -> Result<String, AppError> {
        let json = match self {
            Self::Inbox(job) => serde_json::to_string(job),
            Self::Outbox(job) => serde_json::to_string(job),
        };
        json.map_err(|e| AppError::Internal(e.into()))
    }

    fn from_record(record: &JobRecord) -> Result<Self, AppError> {
        let parsed = match record.kind.as_str() {
            INBOX_JOB => serde_json::from_str(&record.payload).map(Self::Inbox),
            OUTBOX_JOB => serde_json::from_str(&record.payload).map(Self::Outbox),
            other => {
                return Err(AppError::Validation(format!("Unknown job kind: {}", other)));
            }
        };
        parsed.map_err(|e| AppError::Validation(format!("Malformed job payload: {}", e)))
    }
}

/// A job claimed for execution
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub record: JobRecord,
    pub payload: JobPayload,
}

/// What `fail` decided for a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// Rescheduled for another attempt
    Retrying { next_run_at_ms: i64 },
    /// Dead-lettered
    Dead,
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped at
/// `max`, plus up to one second of jitter.
pub fn next_backoff(attempt: u32, base_secs: u64, max_secs: u64) -> Duration {
    let pow = attempt.saturating_sub(1).min(20);
    let secs = base_secs.saturating_mul(1u64 << pow).min(max_secs);
    let jitter_ms = rand::thread_rng().gen_range(0..1000);
    Duration::from_secs(secs) + Duration::from_millis(jitter_ms)
}

#[derive(Clone)]
pub struct JobQueue {
    db: Arc<Database>,
    config: QueueConfig,
    notify: Arc<Notify>,
}

impl JobQueue {
    pub fn new(db: Arc<Database>, config: QueueConfig) -> Self {
        Self {
            db,
            config,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Signalled whenever a job is enqueued
    pub fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Persist a job; it is durable once this returns.
    ///
    /// # Returns
    /// The job id
    pub async fn enqueue(&self, payload: JobPayload) -> Result<String, AppError> {
        let now = Utc::now();
        let record = JobRecord {
            id: EntityId::new().0,
            kind: payload.kind().to_string(),
            payload: payload.to_json()?,
            status: JobStatus::Pending.as_str().to_string(),
            attempts: 0,
            max_attempts: i64::from(self.config.max_attempts),
            next_run_at_ms: now_ms(),
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_job(&record).await?;

        crate::metrics::JOBS_PENDING
            .with_label_values(&[payload.kind()])
            .inc();
        tracing::debug!(job_id = %record.id, kind = payload.kind(), "Job enqueued");

        self.notify.notify_one();
        Ok(record.id)
    }

    /// Claim up to `limit` due jobs.
    ///
    /// Jobs whose payload cannot be decoded are dead-lettered on the spot.
    pub async fn claim_due(&self, limit: u32) -> Result<Vec<ClaimedJob>, AppError> {
        let ids = self.db.get_due_job_ids(now_ms(), i64::from(limit)).await?;

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(record) = self.db.claim_job(&id).await? else {
                // Another worker got there first
                continue;
            };
            crate::metrics::JOBS_PENDING
                .with_label_values(&[record.kind.as_str()])
                .dec();

            match JobPayload::from_record(&record) {
                Ok(payload) => claimed.push(ClaimedJob { record, payload }),
                Err(error) => {
                    tracing::error!(job_id = %record.id, error = %error, "Dead-lettering undecodable job");
                    self.db.kill_job(&record.id, &error.to_string()).await?;
                }
            }
        }

        Ok(claimed)
    }

    pub async fn complete(&self, job: &JobRecord) -> Result<(), AppError> {
        self.db.complete_job(&job.id).await?;
        crate::metrics::JOBS_TOTAL
            .with_label_values(&[job.kind.as_str(), "completed"])
            .inc();
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// Retryable errors with attempts left go back to pending after a
    /// backoff; anything else is dead-lettered.
    pub async fn fail(&self, job: &JobRecord, error: &AppError) -> Result<JobFailure, AppError> {
        let message = error.to_string();

        if error.is_retryable() && job.attempts < job.max_attempts {
            let attempt = u32::try_from(job.attempts).unwrap_or(u32::MAX);
            let delay = next_backoff(
                attempt,
                self.config.base_backoff_secs,
                self.config.max_backoff_secs,
            );
            let next_run_at_ms =
                now_ms().saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX));
            self.db.reschedule_job(&job.id, next_run_at_ms, &message).await?;

            crate::metrics::JOBS_TOTAL
                .with_label_values(&[job.kind.as_str(), "retried"])
                .inc();
            crate::metrics::JOBS_PENDING
                .with_label_values(&[job.kind.as_str()])
                .inc();
            tracing::warn!(
                job_id = %job.id,
                kind = %job.kind,
                attempt = job.attempts,
                max_attempts = job.max_attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %message,
                "Job failed, retrying"
            );
            return Ok(JobFailure::Retrying { next_run_at_ms });
        }

        self.db.kill_job(&job.id, &message).await?;
        crate::metrics::JOBS_TOTAL
            .with_label_values(&[job.kind.as_str(), "dead"])
            .inc();
        tracing::error!(
            job_id = %job.id,
            kind = %job.kind,
            attempts = job.attempts,
            retryable = error.is_retryable(),
            error = %message,
            "Job dead-lettered"
        );
        Ok(JobFailure::Dead)
    }

    /// Dead-lettered jobs, most recent first
    pub async fn dead_jobs(&self, limit: u32) -> Result<Vec<JobRecord>, AppError> {
        self.db
            .get_jobs_by_status(JobStatus::Dead, i64::from(limit))
            .await
    }

    /// Return jobs orphaned in `running` by a previous process to pending.
    pub async fn recover_stale(&self) -> Result<u64, AppError> {
        let recovered = self.db.reset_running_jobs().await?;
        if recovered > 0 {
            tracing::warn!(count = recovered, "Recovered jobs left running by a previous process");
            self.notify.notify_one();
        }
        Ok(recovered)
    }
}
