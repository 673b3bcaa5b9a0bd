use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::{Code, Status};

use crate::api::job::{
    CancellationResult, Job, JobCancelRequest, JobReprioritizeRequest, JobReprioritizeResponse,
    JobSubmitRequest, JobSubmitResponse, JobSubmitResponseItem,
};
use crate::api::queue::{
    PermissionSubject, PermissionVerb, Queue, QueueInfo, QueuePermissions,
};
use crate::auth::{Permission, PermissionChecker, Principal, RequestScope};
use crate::config::SubmitConfig;
use crate::error::{AuthorizationError, RepositoryError, ValidationError};
use crate::repository::{
    EventSink, JobRepository, JobUpdateOutcome, QueueRepository, SchedulingInfoRepository,
};
use crate::service::events::EventReporter;
use crate::service::{feasibility, validation};
use crate::util::{batch, Clock, IdGenerator};

/// The submission facade: every mutation of queues and jobs goes through
/// here. Holds only immutable configuration; all mutable state lives in the
/// collaborators, so concurrent requests need no coordination beyond what
/// the stores provide.
pub struct SubmitServer {
    permissions: PermissionChecker,
    queue_repository: Arc<dyn QueueRepository>,
    job_repository: Arc<dyn JobRepository>,
    scheduling_info_repository: Arc<dyn SchedulingInfoRepository>,
    event_reporter: EventReporter,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: SubmitConfig,
}

/// Failure while acting on the queues a set of jobs belongs to.
enum QueueAccessError {
    Denied(AuthorizationError),
    Failed(RepositoryError),
}

impl SubmitServer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        permissions: PermissionChecker,
        queue_repository: Arc<dyn QueueRepository>,
        job_repository: Arc<dyn JobRepository>,
        event_sink: Arc<dyn EventSink>,
        scheduling_info_repository: Arc<dyn SchedulingInfoRepository>,
        id_generator: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        config: SubmitConfig,
    ) -> Self {
        Self {
            permissions,
            queue_repository,
            job_repository,
            scheduling_info_repository,
            event_reporter: EventReporter::new(event_sink, clock.clone()),
            id_generator,
            clock,
            config,
        }
    }

    /// Validate, authorize, enrich, persist and report a batch of jobs.
    ///
    /// Failures before the submitted events leave no trace; failures while
    /// persisting emit failure events and abort; failures while reporting
    /// the post-write events return `internal` with the partial response in
    /// the status details (see [`partial_result_from_status`]).
    pub async fn submit_jobs(
        &self,
        scope: &RequestScope,
        request: JobSubmitRequest,
    ) -> Result<JobSubmitResponse, Status> {
        let principal = &scope.principal;

        if request.queue.is_empty() {
            return Err(Status::invalid_argument(format!(
                "[SubmitJobs] {}",
                ValidationError::MissingQueue
            )));
        }
        if request.job_set_id.is_empty() {
            return Err(Status::invalid_argument(format!(
                "[SubmitJobs] {}",
                ValidationError::MissingJobSetId
            )));
        }

        let queue = self.get_queue_or_create(scope, &request.queue).await?;

        self.permissions
            .authorize(
                principal,
                Permission::SubmitAnyJobs,
                &queue,
                PermissionVerb::Submit,
            )
            .map_err(|e| {
                Status::permission_denied(format!(
                    "[SubmitJobs] error submitting jobs to queue {}: {e}",
                    queue.name
                ))
            })?;

        let ownership_groups = submit_ownership_groups(principal, &queue);

        let jobs = validation::build_jobs(
            request,
            &self.config.scheduling,
            &principal.name,
            &ownership_groups,
            self.clock.now(),
            self.id_generator.as_ref(),
        )
        .map_err(|e| {
            Status::invalid_argument(format!(
                "[SubmitJobs] error submitting jobs for user {}: {e}",
                principal.name
            ))
        })?;

        // Reject jobs no cluster could ever accept, before anything is
        // written.
        let scheduling_info = self
            .scheduling_info_repository
            .get_cluster_scheduling_info()
            .await
            .map_err(|e| {
                Status::unavailable(format!("[SubmitJobs] error getting scheduling info: {e}"))
            })?;
        feasibility::validate_jobs_can_be_scheduled(&jobs, &scheduling_info).map_err(|e| {
            Status::invalid_argument(format!(
                "[SubmitJobs] error submitting jobs for user {}: {e}",
                principal.name
            ))
        })?;

        self.event_reporter
            .report_submitted(&principal.name, &jobs)
            .await
            .map_err(|e| {
                Status::unavailable(format!("[SubmitJobs] error reporting submitted jobs: {e}"))
            })?;

        let results = match self.job_repository.add_jobs(&jobs).await {
            Ok(results) => results,
            Err(e) => {
                let failures: Vec<(&Job, String)> = jobs
                    .iter()
                    .map(|job| (job, format!("failed to save job: {e}")))
                    .collect();
                if let Err(report_err) = self
                    .event_reporter
                    .report_failed(&principal.name, &failures)
                    .await
                {
                    return Err(Status::internal(format!(
                        "[SubmitJobs] error reporting failure events: {report_err}"
                    )));
                }
                return Err(Status::unavailable(format!(
                    "[SubmitJobs] error saving jobs: {e}"
                )));
            }
        };

        let mut response_items = Vec::with_capacity(results.len());
        let mut created = Vec::new();
        let mut duplicates: Vec<(&Job, String)> = Vec::new();
        let mut failures: Vec<(&Job, String)> = Vec::new();

        for (job, result) in jobs.iter().zip(&results) {
            let mut item = JobSubmitResponseItem {
                job_id: result.job_id.clone(),
                error: None,
            };
            if let Some(error) = &result.error {
                item.error = Some(error.to_string());
                failures.push((job, format!("failed to save job: {error}")));
            } else if result.duplicate_detected {
                duplicates.push((job, result.job_id.clone()));
            } else {
                created.push(job.clone());
            }
            response_items.push(item);
        }

        let response = JobSubmitResponse {
            job_response_items: response_items,
        };

        tracing::info!(
            queue = %queue.name,
            user = %principal.name,
            created = created.len(),
            duplicates = duplicates.len(),
            failed = failures.len(),
            "jobs submitted"
        );

        if let Err(e) = self
            .event_reporter
            .report_failed(&principal.name, &failures)
            .await
        {
            return Err(status_with_partial(
                Code::Internal,
                format!("[SubmitJobs] error reporting failed jobs: {e}"),
                &response,
            ));
        }
        if let Err(e) = self
            .event_reporter
            .report_duplicates(&principal.name, &duplicates)
            .await
        {
            return Err(status_with_partial(
                Code::Internal,
                format!("[SubmitJobs] error reporting duplicate jobs: {e}"),
                &response,
            ));
        }
        if let Err(e) = self
            .event_reporter
            .report_queued(&principal.name, &created)
            .await
        {
            return Err(status_with_partial(
                Code::Internal,
                format!("[SubmitJobs] error reporting queued jobs: {e}"),
                &response,
            ));
        }

        if !failures.is_empty() {
            return Err(status_with_partial(
                Code::Internal,
                format!(
                    "[SubmitJobs] {} of {} jobs could not be saved",
                    failures.len(),
                    jobs.len()
                ),
                &response,
            ));
        }

        Ok(response)
    }

    /// Cancel one job by id, or a whole job set batch by batch.
    pub async fn cancel_jobs(
        &self,
        scope: &RequestScope,
        request: JobCancelRequest,
    ) -> Result<CancellationResult, Status> {
        if !request.job_id.is_empty() {
            self.cancel_jobs_by_id(scope, &request.job_id).await
        } else if !request.queue.is_empty() && !request.job_set_id.is_empty() {
            self.cancel_jobs_by_queue_and_set(scope, &request.queue, &request.job_set_id)
                .await
        } else {
            Err(Status::invalid_argument(
                "[CancelJobs] specify either a job id or both queue and job set id",
            ))
        }
    }

    async fn cancel_jobs_by_id(
        &self,
        scope: &RequestScope,
        job_id: &str,
    ) -> Result<CancellationResult, Status> {
        let ids = [job_id.to_string()];
        let jobs = self
            .job_repository
            .get_existing_jobs_by_ids(&ids)
            .await
            .map_err(|e| {
                Status::unavailable(format!("[CancelJobs] error getting job {job_id:?}: {e}"))
            })?;
        if jobs.len() != 1 {
            return Err(Status::not_found(format!(
                "[CancelJobs] job {job_id:?} not found"
            )));
        }

        let cancelled_ids = self.cancel_job_batch(scope, &jobs).await.map_err(|e| match e {
            QueueAccessError::Denied(auth) => Status::permission_denied(format!(
                "[CancelJobs] error cancelling job {job_id:?}: {auth}"
            )),
            QueueAccessError::Failed(repo) => repository_status("CancelJobs", &repo),
        })?;

        Ok(CancellationResult { cancelled_ids })
    }

    /// Cancel everything in `(queue, job_set_id)`, a batch of jobs at a
    /// time so no more than `cancel_jobs_batch_size` jobs are in memory.
    /// Once the remaining deadline falls inside the configured margin the
    /// ids cancelled so far are surfaced with `deadline-exceeded` rather
    /// than silently dropped.
    async fn cancel_jobs_by_queue_and_set(
        &self,
        scope: &RequestScope,
        queue: &str,
        job_set_id: &str,
    ) -> Result<CancellationResult, Status> {
        let ids = self
            .job_repository
            .get_active_job_ids(queue, job_set_id)
            .await
            .map_err(|e| {
                Status::unavailable(format!(
                    "[CancelJobs] error getting job ids for queue {queue} and job set {job_set_id}: {e}"
                ))
            })?;

        let mut cancelled_ids = Vec::new();
        for chunk in batch(ids, self.config.cancel_jobs_batch_size) {
            let jobs = match self.job_repository.get_existing_jobs_by_ids(&chunk).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    return Err(status_with_partial(
                        Code::Internal,
                        format!("[CancelJobs] error getting jobs: {e}"),
                        &CancellationResult { cancelled_ids },
                    ))
                }
            };

            match self.cancel_job_batch(scope, &jobs).await {
                Ok(ids) => cancelled_ids.extend(ids),
                Err(QueueAccessError::Denied(auth)) => {
                    return Err(Status::permission_denied(format!(
                        "[CancelJobs] error cancelling jobs in queue {queue}: {auth}"
                    )))
                }
                Err(QueueAccessError::Failed(e)) => {
                    return Err(status_with_partial(
                        Code::Internal,
                        format!("[CancelJobs] error cancelling jobs: {e}"),
                        &CancellationResult { cancelled_ids },
                    ))
                }
            }

            if scope.close_to_deadline(self.config.deadline_margin()) {
                tracing::warn!(
                    queue,
                    job_set_id,
                    cancelled = cancelled_ids.len(),
                    "deadline close, returning partial cancellation"
                );
                return Err(status_with_partial(
                    Code::DeadlineExceeded,
                    format!(
                        "[CancelJobs] deadline exceeded cancelling job set {job_set_id} in queue {queue}"
                    ),
                    &CancellationResult { cancelled_ids },
                ));
            }
        }

        Ok(CancellationResult { cancelled_ids })
    }

    /// Authorize, mark cancelling, delete, mark cancelled.
    /// Jobs whose deletion fails are logged and left out of the result.
    async fn cancel_job_batch(
        &self,
        scope: &RequestScope,
        jobs: &[Job],
    ) -> Result<Vec<String>, QueueAccessError> {
        let principal = &scope.principal;

        self.authorize_job_queues(
            principal,
            jobs,
            Permission::CancelAnyJobs,
            PermissionVerb::Cancel,
        )
        .await?;

        self.event_reporter
            .report_cancelling(&principal.name, jobs)
            .await
            .map_err(QueueAccessError::Failed)?;

        let deletion_results = self
            .job_repository
            .delete_jobs(jobs)
            .await
            .map_err(QueueAccessError::Failed)?;

        let mut cancelled = Vec::new();
        let mut cancelled_ids = Vec::new();
        for (job, error) in deletion_results {
            match error {
                Some(e) => tracing::error!(job_id = %job.id, error = %e, "error cancelling job"),
                None => {
                    cancelled_ids.push(job.id.clone());
                    cancelled.push(job);
                }
            }
        }

        self.event_reporter
            .report_cancelled(&principal.name, &cancelled)
            .await
            .map_err(QueueAccessError::Failed)?;

        Ok(cancelled_ids)
    }

    /// Change the priority of jobs selected by id list or job set.
    ///
    /// The priority write and its events are handed off through the
    /// optimistic-update contract: the store mutator returns the events for
    /// the snapshot it produced and they are appended only after the write
    /// committed, so a lost write emits nothing.
    pub async fn reprioritize_jobs(
        &self,
        scope: &RequestScope,
        request: JobReprioritizeRequest,
    ) -> Result<JobReprioritizeResponse, Status> {
        let principal = &scope.principal;

        let jobs = if !request.job_ids.is_empty() {
            self.job_repository
                .get_existing_jobs_by_ids(&request.job_ids)
                .await
                .map_err(|e| {
                    Status::unavailable(format!("[ReprioritizeJobs] error getting jobs by id: {e}"))
                })?
        } else if !request.queue.is_empty() && !request.job_set_id.is_empty() {
            let ids = self
                .job_repository
                .get_active_job_ids(&request.queue, &request.job_set_id)
                .await
                .map_err(|e| {
                    Status::unavailable(format!(
                        "[ReprioritizeJobs] error getting job ids for queue {} and job set {}: {e}",
                        request.queue, request.job_set_id
                    ))
                })?;
            self.job_repository
                .get_existing_jobs_by_ids(&ids)
                .await
                .map_err(|e| {
                    Status::unavailable(format!(
                        "[ReprioritizeJobs] error getting jobs for queue {} and job set {}: {e}",
                        request.queue, request.job_set_id
                    ))
                })?
        } else {
            return Err(Status::invalid_argument(
                "[ReprioritizeJobs] specify either job ids or both queue and job set id",
            ));
        };

        self.authorize_job_queues(
            principal,
            &jobs,
            Permission::ReprioritizeAnyJobs,
            PermissionVerb::Reprioritize,
        )
        .await
        .map_err(|e| match e {
            QueueAccessError::Denied(auth) => Status::permission_denied(format!(
                "[ReprioritizeJobs] error reprioritizing jobs: {auth}"
            )),
            QueueAccessError::Failed(repo) => repository_status("ReprioritizeJobs", &repo),
        })?;

        self.event_reporter
            .report_reprioritizing(&principal.name, &jobs, request.new_priority)
            .await
            .map_err(|e| {
                Status::unavailable(format!(
                    "[ReprioritizeJobs] error reporting reprioritization: {e}"
                ))
            })?;

        let job_ids: Vec<String> = jobs.iter().map(|job| job.id.clone()).collect();
        let requestor = principal.name.clone();
        let new_priority = request.new_priority;
        let reporter = self.event_reporter.clone();
        let mutator = move |job: &mut Job| {
            job.priority = new_priority;
            reporter.reprioritized_events(job, &requestor, new_priority)
        };

        let update_results = self
            .job_repository
            .update_jobs(&job_ids, &mutator)
            .await
            .map_err(|e| {
                Status::unavailable(format!("[ReprioritizeJobs] error updating jobs: {e}"))
            })?;

        let mut results = BTreeMap::new();
        for result in update_results {
            match result.outcome {
                JobUpdateOutcome::Updated { events } => {
                    if let Err(e) = self.event_reporter.append_all(events).await {
                        tracing::warn!(
                            job_id = %result.job_id,
                            error = %e,
                            "failed to report events for committed reprioritization"
                        );
                    }
                    results.insert(result.job_id, None);
                }
                JobUpdateOutcome::NotFound => {
                    results.insert(result.job_id, Some("job does not exist".to_string()));
                }
                JobUpdateOutcome::Conflict => {
                    results.insert(
                        result.job_id,
                        Some("job was updated concurrently, priority not changed".to_string()),
                    );
                }
            }
        }

        Ok(JobReprioritizeResponse {
            reprioritization_results: results,
        })
    }

    pub async fn create_queue(&self, scope: &RequestScope, mut queue: Queue) -> Result<(), Status> {
        self.permissions
            .require_permission(&scope.principal, Permission::CreateQueue)
            .map_err(|e| {
                Status::permission_denied(format!(
                    "[CreateQueue] error creating queue {}: {e}",
                    queue.name
                ))
            })?;

        if queue.user_owners.is_empty() {
            queue.user_owners = vec![scope.principal.name.clone()];
        }

        queue
            .validate()
            .map_err(|e| Status::invalid_argument(format!("[CreateQueue] error validating queue: {e}")))?;

        let name = queue.name.clone();
        match self.queue_repository.create_queue(queue).await {
            Ok(()) => {
                tracing::info!(queue = %name, user = %scope.principal.name, "queue created");
                Ok(())
            }
            Err(e @ RepositoryError::QueueAlreadyExists(_)) => Err(Status::already_exists(
                format!("[CreateQueue] error creating queue: {e}"),
            )),
            Err(e) => Err(Status::unavailable(format!(
                "[CreateQueue] error creating queue {name}: {e}"
            ))),
        }
    }

    pub async fn update_queue(&self, scope: &RequestScope, queue: Queue) -> Result<(), Status> {
        self.permissions
            .require_permission(&scope.principal, Permission::CreateQueue)
            .map_err(|e| {
                Status::permission_denied(format!(
                    "[UpdateQueue] error updating queue {}: {e}",
                    queue.name
                ))
            })?;

        queue
            .validate()
            .map_err(|e| Status::invalid_argument(format!("[UpdateQueue] error: {e}")))?;

        let name = queue.name.clone();
        match self.queue_repository.update_queue(queue).await {
            Ok(()) => Ok(()),
            Err(e @ RepositoryError::QueueNotFound(_)) => {
                Err(Status::not_found(format!("[UpdateQueue] error: {e}")))
            }
            Err(e) => Err(Status::unavailable(format!(
                "[UpdateQueue] error updating queue {name:?}: {e}"
            ))),
        }
    }

    /// Delete a queue. Refused while the queue still has active job sets.
    pub async fn delete_queue(&self, scope: &RequestScope, name: &str) -> Result<(), Status> {
        self.permissions
            .require_permission(&scope.principal, Permission::DeleteQueue)
            .map_err(|e| {
                Status::permission_denied(format!("[DeleteQueue] error deleting queue {name}: {e}"))
            })?;

        let active = self
            .job_repository
            .get_queue_active_job_sets(name)
            .await
            .map_err(|e| {
                Status::unavailable(format!(
                    "[DeleteQueue] error getting active job sets for queue {name}: {e}"
                ))
            })?;
        if !active.is_empty() {
            return Err(Status::failed_precondition(format!(
                "[DeleteQueue] error deleting queue {name}: queue is not empty"
            )));
        }

        self.queue_repository.delete_queue(name).await.map_err(|e| {
            Status::unavailable(format!("[DeleteQueue] error deleting queue {name}: {e}"))
        })?;
        tracing::info!(queue = name, "queue deleted");
        Ok(())
    }

    pub async fn get_queue(&self, _scope: &RequestScope, name: &str) -> Result<Queue, Status> {
        match self.queue_repository.get_queue(name).await {
            Ok(queue) => Ok(queue),
            Err(e @ RepositoryError::QueueNotFound(_)) => {
                Err(Status::not_found(format!("[GetQueue] error: {e}")))
            }
            Err(e) => Err(Status::unavailable(format!(
                "[GetQueue] error getting queue {name:?}: {e}"
            ))),
        }
    }

    pub async fn get_queue_info(
        &self,
        scope: &RequestScope,
        name: &str,
    ) -> Result<QueueInfo, Status> {
        let queue = match self.queue_repository.get_queue(name).await {
            Ok(queue) => queue,
            Err(e @ RepositoryError::QueueNotFound(_)) => {
                return Err(Status::not_found(format!("[GetQueueInfo] error: {e}")))
            }
            Err(e) => {
                return Err(Status::unavailable(format!(
                    "[GetQueueInfo] error getting queue {name:?}: {e}"
                )))
            }
        };

        self.permissions
            .authorize(
                &scope.principal,
                Permission::WatchAllEvents,
                &queue,
                PermissionVerb::Watch,
            )
            .map_err(|e| {
                Status::permission_denied(format!(
                    "[GetQueueInfo] error getting info for queue {name}: {e}"
                ))
            })?;

        let active_job_sets = self
            .job_repository
            .get_queue_active_job_sets(name)
            .await
            .map_err(|e| {
                Status::unavailable(format!(
                    "[GetQueueInfo] error getting job sets for queue {name}: {e}"
                ))
            })?;

        Ok(QueueInfo {
            name: name.to_string(),
            active_job_sets,
        })
    }

    /// Fetch the queue for a submit, creating it when the queue is missing,
    /// auto-creation is enabled and the caller may submit anywhere. The
    /// auto-created queue is owned by the caller alone. Losing the creation
    /// race to a concurrent submit is not an error; the winner's queue is
    /// used.
    async fn get_queue_or_create(
        &self,
        scope: &RequestScope,
        queue_name: &str,
    ) -> Result<Queue, Status> {
        match self.queue_repository.get_queue(queue_name).await {
            Ok(queue) => Ok(queue),
            Err(RepositoryError::QueueNotFound(_)) => {
                let principal = &scope.principal;
                if !self.config.queue_management.auto_create_queues
                    || !self
                        .permissions
                        .user_has_permission(principal, Permission::SubmitAnyJobs)
                {
                    return Err(Status::not_found(format!(
                        "[SubmitJobs] queue {queue_name:?} not found"
                    )));
                }

                let queue = Queue {
                    name: queue_name.to_string(),
                    priority_factor: self.config.queue_management.default_priority_factor,
                    user_owners: vec![principal.name.clone()],
                    group_owners: Vec::new(),
                    resource_limits: BTreeMap::new(),
                    permissions: vec![QueuePermissions::from_owners(
                        vec![principal.name.clone()],
                        principal.group_names(),
                    )],
                };

                match self.queue_repository.create_queue(queue.clone()).await {
                    Ok(()) => {
                        tracing::info!(queue = queue_name, user = %principal.name, "queue auto-created");
                        Ok(queue)
                    }
                    Err(RepositoryError::QueueAlreadyExists(_)) => {
                        // Lost the race to a concurrent submit.
                        self.queue_repository
                            .get_queue(queue_name)
                            .await
                            .map_err(|e| repository_status("SubmitJobs", &e))
                    }
                    Err(e) => Err(Status::unavailable(format!(
                        "[SubmitJobs] error creating queue {queue_name:?}: {e}"
                    ))),
                }
            }
            Err(e) => Err(Status::unavailable(format!(
                "[SubmitJobs] could not load queue {queue_name:?}: {e}"
            ))),
        }
    }

    /// Two-tier authorization against every distinct queue the jobs span.
    async fn authorize_job_queues(
        &self,
        principal: &Principal,
        jobs: &[Job],
        permission: Permission,
        verb: PermissionVerb,
    ) -> Result<(), QueueAccessError> {
        let queue_names: BTreeSet<&str> = jobs.iter().map(|job| job.queue.as_str()).collect();
        for queue_name in queue_names {
            let queue = self
                .queue_repository
                .get_queue(queue_name)
                .await
                .map_err(QueueAccessError::Failed)?;
            self.permissions
                .authorize(principal, permission, &queue, verb)
                .map_err(QueueAccessError::Denied)?;
        }
        Ok(())
    }
}

/// Groups through which the caller holds submit rights on the queue.
/// Empty when the caller is granted directly as a user subject; the
/// distinction is load-bearing for audit consumers.
fn submit_ownership_groups(principal: &Principal, queue: &Queue) -> Vec<String> {
    if queue.has_permission(
        &PermissionSubject::user(&principal.name),
        PermissionVerb::Submit,
    ) {
        return Vec::new();
    }
    principal
        .groups
        .iter()
        .filter(|group| {
            queue.has_permission(&PermissionSubject::group(group.as_str()), PermissionVerb::Submit)
        })
        .cloned()
        .collect()
}

fn repository_status(operation: &str, error: &RepositoryError) -> Status {
    match error {
        RepositoryError::QueueNotFound(_) | RepositoryError::JobNotFound(_) => {
            Status::not_found(format!("[{operation}] {error}"))
        }
        RepositoryError::QueueAlreadyExists(_) => {
            Status::already_exists(format!("[{operation}] {error}"))
        }
        RepositoryError::Unavailable(_) => Status::unavailable(format!("[{operation}] {error}")),
    }
}

/// Attach a partial result to an error status as JSON details, so callers
/// learn what did succeed before the operation stopped.
fn status_with_partial<T: Serialize>(code: Code, message: String, partial: &T) -> Status {
    match serde_json::to_vec(partial) {
        Ok(details) => Status::with_details(code, message, bytes::Bytes::from(details)),
        Err(_) => Status::new(code, message),
    }
}

/// Decode the partial result a batched or post-write failure attached to
/// its status details.
pub fn partial_result_from_status<T: DeserializeOwned>(status: &Status) -> Option<T> {
    serde_json::from_slice(status.details()).ok()
}
