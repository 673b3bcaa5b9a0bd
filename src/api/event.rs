use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::job::Job;

/// What happened to a job. Per-job ordering follows the lifecycle:
/// submitted, then exactly one of queued / duplicate-found / failed;
/// cancelling before cancelled; reprioritizing before updated and
/// reprioritized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEventKind {
    /// Carries the full job record so downstream consumers can act on
    /// submissions without a store round-trip.
    Submitted { job: Box<Job> },
    Queued,
    DuplicateFound { original_job_id: String },
    Failed { reason: String },
    Cancelling,
    Cancelled,
    Updated,
    Reprioritizing { new_priority: f64 },
    Reprioritized { new_priority: f64 },
}

impl JobEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobEventKind::Submitted { .. } => "submitted",
            JobEventKind::Queued => "queued",
            JobEventKind::DuplicateFound { .. } => "duplicate_found",
            JobEventKind::Failed { .. } => "failed",
            JobEventKind::Cancelling => "cancelling",
            JobEventKind::Cancelled => "cancelled",
            JobEventKind::Updated => "updated",
            JobEventKind::Reprioritizing { .. } => "reprioritizing",
            JobEventKind::Reprioritized { .. } => "reprioritized",
        }
    }
}

/// One record of the append-only lifecycle stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: String,
    pub queue: String,
    pub job_set_id: String,
    pub created: DateTime<Utc>,
    /// Name of the principal whose request produced the event.
    pub requestor: String,
    pub kind: JobEventKind,
}

impl JobEvent {
    pub fn for_job(job: &Job, requestor: &str, created: DateTime<Utc>, kind: JobEventKind) -> Self {
        Self {
            job_id: job.id.clone(),
            queue: job.queue.clone(),
            job_set_id: job.job_set_id.clone(),
            created,
            requestor: requestor.to_string(),
            kind,
        }
    }
}
