//! Queue substrate
//!
//! Durable at-least-once job queue with retry/backoff and dead-lettering,
//! plus the worker that drives the inbox and outbox pipelines.

mod queue;
mod worker;

pub use queue::{
    ClaimedJob, INBOX_JOB, InboxJob, JobFailure, JobPayload, JobQueue, OUTBOX_JOB, OutboxJob,
    next_backoff,
};
pub use worker::JobWorker;
