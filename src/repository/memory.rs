use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::api::cluster::ClusterSchedulingInfo;
use crate::api::event::JobEvent;
use crate::api::job::Job;
use crate::api::queue::{JobSetInfo, Queue};
use crate::error::RepositoryError;
use crate::repository::{
    EventSink, JobMutator, JobRepository, JobUpdateOutcome, QueueRepository,
    SchedulingInfoRepository, SubmitJobResult, UpdateJobResult,
};

/// Queue registry backed by a process-local map. Used by the integration
/// tests and by embedded deployments without an external store.
#[derive(Debug, Default)]
pub struct InMemoryQueueRepository {
    queues: RwLock<HashMap<String, Queue>>,
}

impl InMemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn get_queue(&self, name: &str) -> Result<Queue, RepositoryError> {
        self.queues
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RepositoryError::QueueNotFound(name.to_string()))
    }

    async fn create_queue(&self, queue: Queue) -> Result<(), RepositoryError> {
        let mut queues = self.queues.write().await;
        if queues.contains_key(&queue.name) {
            return Err(RepositoryError::QueueAlreadyExists(queue.name));
        }
        queues.insert(queue.name.clone(), queue);
        Ok(())
    }

    async fn update_queue(&self, queue: Queue) -> Result<(), RepositoryError> {
        let mut queues = self.queues.write().await;
        match queues.get_mut(&queue.name) {
            Some(existing) => {
                *existing = queue;
                Ok(())
            }
            None => Err(RepositoryError::QueueNotFound(queue.name)),
        }
    }

    async fn delete_queue(&self, name: &str) -> Result<(), RepositoryError> {
        self.queues.write().await.remove(name);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct VersionedJob {
    job: Job,
    version: u64,
}

#[derive(Debug, Default)]
struct JobTable {
    jobs: HashMap<String, VersionedJob>,
    /// `(queue, job_set_id, client_id)` to stored job id, for deduplication.
    by_client_id: HashMap<(String, String, String), String>,
}

/// Job store backed by a process-local versioned table. `update_jobs` uses
/// the version counter as its optimistic guard.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    table: RwLock<JobTable>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs, for test assertions.
    pub async fn len(&self) -> usize {
        self.table.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.jobs.is_empty()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn add_jobs(&self, jobs: &[Job]) -> Result<Vec<SubmitJobResult>, RepositoryError> {
        let mut table = self.table.write().await;
        let mut results = Vec::with_capacity(jobs.len());

        for job in jobs {
            let dedup_key = job.client_id.as_ref().map(|client_id| {
                (
                    job.queue.clone(),
                    job.job_set_id.clone(),
                    client_id.clone(),
                )
            });

            if let Some(existing_id) = dedup_key
                .as_ref()
                .and_then(|key| table.by_client_id.get(key))
            {
                results.push(SubmitJobResult {
                    job_id: existing_id.clone(),
                    duplicate_detected: true,
                    error: None,
                });
                continue;
            }

            table.jobs.insert(
                job.id.clone(),
                VersionedJob {
                    job: job.clone(),
                    version: 0,
                },
            );
            if let Some(key) = dedup_key {
                table.by_client_id.insert(key, job.id.clone());
            }
            results.push(SubmitJobResult {
                job_id: job.id.clone(),
                duplicate_detected: false,
                error: None,
            });
        }

        Ok(results)
    }

    async fn get_existing_jobs_by_ids(&self, ids: &[String]) -> Result<Vec<Job>, RepositoryError> {
        let table = self.table.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| table.jobs.get(id).map(|versioned| versioned.job.clone()))
            .collect())
    }

    async fn get_active_job_ids(
        &self,
        queue: &str,
        job_set_id: &str,
    ) -> Result<Vec<String>, RepositoryError> {
        let table = self.table.read().await;
        let mut ids: Vec<String> = table
            .jobs
            .values()
            .filter(|versioned| {
                versioned.job.queue == queue && versioned.job.job_set_id == job_set_id
            })
            .map(|versioned| versioned.job.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_queue_active_job_sets(
        &self,
        queue: &str,
    ) -> Result<Vec<JobSetInfo>, RepositoryError> {
        let table = self.table.read().await;
        let mut sets: BTreeMap<String, u32> = BTreeMap::new();
        for versioned in table.jobs.values() {
            if versioned.job.queue == queue {
                *sets.entry(versioned.job.job_set_id.clone()).or_default() += 1;
            }
        }
        Ok(sets
            .into_iter()
            .map(|(name, queued_jobs)| JobSetInfo {
                name,
                queued_jobs,
                leased_jobs: 0,
            })
            .collect())
    }

    async fn update_jobs(
        &self,
        ids: &[String],
        mutator: JobMutator<'_>,
    ) -> Result<Vec<UpdateJobResult>, RepositoryError> {
        let mut results = Vec::with_capacity(ids.len());

        for id in ids {
            // Read a snapshot, mutate it outside the lock, then commit only
            // if the version is unchanged.
            let snapshot = {
                let table = self.table.read().await;
                table.jobs.get(id).cloned()
            };

            let Some(mut versioned) = snapshot else {
                results.push(UpdateJobResult {
                    job_id: id.clone(),
                    outcome: JobUpdateOutcome::NotFound,
                });
                continue;
            };

            let read_version = versioned.version;
            let events = mutator(&mut versioned.job);

            let mut table = self.table.write().await;
            let outcome = match table.jobs.get_mut(id) {
                Some(current) if current.version == read_version => {
                    current.job = versioned.job;
                    current.version += 1;
                    JobUpdateOutcome::Updated { events }
                }
                Some(_) => JobUpdateOutcome::Conflict,
                None => JobUpdateOutcome::NotFound,
            };
            results.push(UpdateJobResult {
                job_id: id.clone(),
                outcome,
            });
        }

        Ok(results)
    }

    async fn delete_jobs(
        &self,
        jobs: &[Job],
    ) -> Result<Vec<(Job, Option<RepositoryError>)>, RepositoryError> {
        let mut table = self.table.write().await;
        let mut results = Vec::with_capacity(jobs.len());

        for job in jobs {
            let error = match table.jobs.remove(&job.id) {
                Some(_) => {
                    if let Some(client_id) = &job.client_id {
                        table.by_client_id.remove(&(
                            job.queue.clone(),
                            job.job_set_id.clone(),
                            client_id.clone(),
                        ));
                    }
                    None
                }
                None => Some(RepositoryError::JobNotFound(job.id.clone())),
            };
            results.push((job.clone(), error));
        }

        Ok(results)
    }
}

/// Event sink backed by an append-only in-process log. The vector order is
/// the sink's total order.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: RwLock<Vec<JobEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far, in order.
    pub async fn events(&self) -> Vec<JobEvent> {
        self.events.read().await.clone()
    }

    /// Events for one job, in append order.
    pub async fn events_for_job(&self, job_id: &str) -> Vec<JobEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.job_id == job_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn append(&self, event: JobEvent) -> Result<(), RepositoryError> {
        self.events.write().await.push(event);
        Ok(())
    }
}

/// Scheduling-info oracle serving a fixed, replaceable snapshot.
#[derive(Debug, Default)]
pub struct InMemorySchedulingInfoRepository {
    infos: RwLock<BTreeMap<String, ClusterSchedulingInfo>>,
}

impl InMemorySchedulingInfoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_cluster(&self, info: ClusterSchedulingInfo) {
        self.infos
            .write()
            .await
            .insert(info.cluster_id.clone(), info);
    }
}

#[async_trait]
impl SchedulingInfoRepository for InMemorySchedulingInfoRepository {
    async fn get_cluster_scheduling_info(
        &self,
    ) -> Result<BTreeMap<String, ClusterSchedulingInfo>, RepositoryError> {
        Ok(self.infos.read().await.clone())
    }
}
