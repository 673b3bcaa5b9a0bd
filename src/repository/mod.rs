use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::api::cluster::ClusterSchedulingInfo;
use crate::api::event::JobEvent;
use crate::api::job::Job;
use crate::api::queue::{JobSetInfo, Queue};
use crate::error::RepositoryError;

pub mod memory;

pub use memory::{
    InMemoryEventSink, InMemoryJobRepository, InMemoryQueueRepository,
    InMemorySchedulingInfoRepository,
};

/// Outcome of persisting one submitted job.
///
/// On a duplicate, `job_id` is the id of the job already stored for the same
/// `(queue, job_set_id, client_id)`; the new record is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitJobResult {
    pub job_id: String,
    pub duplicate_detected: bool,
    pub error: Option<RepositoryError>,
}

/// Per-job outcome of an optimistic update.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdateOutcome {
    /// The write committed. `events` is whatever the mutator returned for
    /// the committed snapshot; mutator output of lost writes is discarded,
    /// so appending these after the call cannot describe state that never
    /// existed.
    Updated { events: Vec<JobEvent> },
    NotFound,
    /// The job changed between read and write; nothing was committed.
    Conflict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateJobResult {
    pub job_id: String,
    pub outcome: JobUpdateOutcome,
}

/// Mutates one job and returns the events describing the mutation.
pub type JobMutator<'a> = &'a (dyn Fn(&mut Job) -> Vec<JobEvent> + Send + Sync);

/// Registry of named queues. Strongly consistent for single-key operations.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn get_queue(&self, name: &str) -> Result<Queue, RepositoryError>;

    /// Fails with `QueueAlreadyExists` on a name collision.
    async fn create_queue(&self, queue: Queue) -> Result<(), RepositoryError>;

    /// Fails with `QueueNotFound` if the queue does not exist.
    async fn update_queue(&self, queue: Queue) -> Result<(), RepositoryError>;

    async fn delete_queue(&self, name: &str) -> Result<(), RepositoryError>;
}

/// Durable job persistence.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Store jobs atomically one by one, reporting per-job results in input
    /// order. A job whose `(queue, job_set_id, client_id)` already exists is
    /// not replaced; the result carries the existing id and the duplicate
    /// flag.
    async fn add_jobs(&self, jobs: &[Job]) -> Result<Vec<SubmitJobResult>, RepositoryError>;

    /// Fetch the listed ids, silently dropping those that do not exist.
    async fn get_existing_jobs_by_ids(&self, ids: &[String]) -> Result<Vec<Job>, RepositoryError>;

    async fn get_active_job_ids(
        &self,
        queue: &str,
        job_set_id: &str,
    ) -> Result<Vec<String>, RepositoryError>;

    async fn get_queue_active_job_sets(
        &self,
        queue: &str,
    ) -> Result<Vec<JobSetInfo>, RepositoryError>;

    /// Apply `mutator` to each listed job under an optimistic-concurrency
    /// guard. See [`JobUpdateOutcome`] for the event-handoff contract.
    async fn update_jobs(
        &self,
        ids: &[String],
        mutator: JobMutator<'_>,
    ) -> Result<Vec<UpdateJobResult>, RepositoryError>;

    /// Delete the given jobs, reporting a per-job error where deletion
    /// failed.
    async fn delete_jobs(
        &self,
        jobs: &[Job],
    ) -> Result<Vec<(Job, Option<RepositoryError>)>, RepositoryError>;
}

/// Append-only, totally-ordered sink for lifecycle events.
/// An `Ok` return means the event is durable.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn append(&self, event: JobEvent) -> Result<(), RepositoryError>;
}

/// Read-only view of per-cluster schedulable capacity and taints.
#[async_trait]
pub trait SchedulingInfoRepository: Send + Sync {
    async fn get_cluster_scheduling_info(
        &self,
    ) -> Result<BTreeMap<String, ClusterSchedulingInfo>, RepositoryError>;
}
