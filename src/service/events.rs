use std::sync::Arc;

use crate::api::event::{JobEvent, JobEventKind};
use crate::api::job::Job;
use crate::error::RepositoryError;
use crate::repository::EventSink;
use crate::util::Clock;

/// Emits lifecycle events to the sink, stamping them with the clock.
///
/// All helpers append in job order; the sink assigns the total order.
#[derive(Clone)]
pub struct EventReporter {
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl EventReporter {
    pub fn new(sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    pub async fn report_submitted(
        &self,
        requestor: &str,
        jobs: &[Job],
    ) -> Result<(), RepositoryError> {
        for job in jobs {
            self.append(JobEvent::for_job(
                job,
                requestor,
                self.clock.now(),
                JobEventKind::Submitted {
                    job: Box::new(job.clone()),
                },
            ))
            .await?;
        }
        Ok(())
    }

    pub async fn report_queued(&self, requestor: &str, jobs: &[Job]) -> Result<(), RepositoryError> {
        self.report_plain(requestor, jobs, JobEventKind::Queued).await
    }

    /// One duplicate event per `(attempted job, id of the stored original)`.
    pub async fn report_duplicates(
        &self,
        requestor: &str,
        duplicates: &[(&Job, String)],
    ) -> Result<(), RepositoryError> {
        for (job, original_job_id) in duplicates {
            self.append(JobEvent::for_job(
                job,
                requestor,
                self.clock.now(),
                JobEventKind::DuplicateFound {
                    original_job_id: original_job_id.clone(),
                },
            ))
            .await?;
        }
        Ok(())
    }

    pub async fn report_failed(
        &self,
        requestor: &str,
        failures: &[(&Job, String)],
    ) -> Result<(), RepositoryError> {
        for (job, reason) in failures {
            self.append(JobEvent::for_job(
                job,
                requestor,
                self.clock.now(),
                JobEventKind::Failed {
                    reason: reason.clone(),
                },
            ))
            .await?;
        }
        Ok(())
    }

    pub async fn report_cancelling(
        &self,
        requestor: &str,
        jobs: &[Job],
    ) -> Result<(), RepositoryError> {
        self.report_plain(requestor, jobs, JobEventKind::Cancelling)
            .await
    }

    pub async fn report_cancelled(
        &self,
        requestor: &str,
        jobs: &[Job],
    ) -> Result<(), RepositoryError> {
        self.report_plain(requestor, jobs, JobEventKind::Cancelled)
            .await
    }

    pub async fn report_reprioritizing(
        &self,
        requestor: &str,
        jobs: &[Job],
        new_priority: f64,
    ) -> Result<(), RepositoryError> {
        self.report_plain(requestor, jobs, JobEventKind::Reprioritizing { new_priority })
            .await
    }

    /// Events describing a committed priority change: `updated` followed by
    /// `reprioritized`, built from the snapshot the update produced. These
    /// are returned by the store mutator and appended by the caller once the
    /// optimistic write has committed.
    pub fn reprioritized_events(
        &self,
        job: &Job,
        requestor: &str,
        new_priority: f64,
    ) -> Vec<JobEvent> {
        vec![
            JobEvent::for_job(job, requestor, self.clock.now(), JobEventKind::Updated),
            JobEvent::for_job(
                job,
                requestor,
                self.clock.now(),
                JobEventKind::Reprioritized { new_priority },
            ),
        ]
    }

    pub async fn append_all(&self, events: Vec<JobEvent>) -> Result<(), RepositoryError> {
        for event in events {
            self.append(event).await?;
        }
        Ok(())
    }

    async fn report_plain(
        &self,
        requestor: &str,
        jobs: &[Job],
        kind: JobEventKind,
    ) -> Result<(), RepositoryError> {
        for job in jobs {
            self.append(JobEvent::for_job(
                job,
                requestor,
                self.clock.now(),
                kind.clone(),
            ))
            .await?;
        }
        Ok(())
    }

    async fn append(&self, event: JobEvent) -> Result<(), RepositoryError> {
        self.sink.append(event).await
    }
}
