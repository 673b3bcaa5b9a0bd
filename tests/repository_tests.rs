//! Tests for the in-memory store implementations: deduplication, listing,
//! the optimistic update contract and per-job delete errors.

use chrono::Utc;

use flotilla::api::event::{JobEvent, JobEventKind};
use flotilla::api::job::Job;
use flotilla::error::RepositoryError;
use flotilla::repository::{
    InMemoryJobRepository, JobRepository, JobUpdateOutcome,
};

fn job(id: &str, queue: &str, job_set_id: &str, client_id: Option<&str>) -> Job {
    Job {
        id: id.to_string(),
        client_id: client_id.map(str::to_string),
        queue: queue.to_string(),
        job_set_id: job_set_id.to_string(),
        namespace: "default".to_string(),
        created: Utc::now(),
        owner: "alice".to_string(),
        ..Job::default()
    }
}

#[tokio::test]
async fn test_add_jobs_detects_duplicates_by_client_id() {
    let store = InMemoryJobRepository::new();

    let first = store
        .add_jobs(&[job("job-1", "q1", "js1", Some("c1"))])
        .await
        .unwrap();
    assert!(!first[0].duplicate_detected);
    assert_eq!(first[0].job_id, "job-1");

    // Same client id in the same job set: original id comes back.
    let second = store
        .add_jobs(&[job("job-2", "q1", "js1", Some("c1"))])
        .await
        .unwrap();
    assert!(second[0].duplicate_detected);
    assert_eq!(second[0].job_id, "job-1");
    assert_eq!(store.len().await, 1);

    // Same client id in a different job set is a distinct job.
    let third = store
        .add_jobs(&[job("job-3", "q1", "js2", Some("c1"))])
        .await
        .unwrap();
    assert!(!third[0].duplicate_detected);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_jobs_without_client_id_are_never_duplicates() {
    let store = InMemoryJobRepository::new();

    let results = store
        .add_jobs(&[
            job("job-1", "q1", "js1", None),
            job("job-2", "q1", "js1", None),
        ])
        .await
        .unwrap();
    assert!(results.iter().all(|result| !result.duplicate_detected));
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_get_existing_jobs_drops_unknown_ids() {
    let store = InMemoryJobRepository::new();
    store
        .add_jobs(&[job("job-1", "q1", "js1", None)])
        .await
        .unwrap();

    let jobs = store
        .get_existing_jobs_by_ids(&["job-1".to_string(), "ghost".to_string()])
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "job-1");
}

#[tokio::test]
async fn test_active_job_set_listing() {
    let store = InMemoryJobRepository::new();
    store
        .add_jobs(&[
            job("job-1", "q1", "js1", None),
            job("job-2", "q1", "js1", None),
            job("job-3", "q1", "js2", None),
            job("job-4", "q2", "js9", None),
        ])
        .await
        .unwrap();

    let ids = store.get_active_job_ids("q1", "js1").await.unwrap();
    assert_eq!(ids, vec!["job-1".to_string(), "job-2".to_string()]);

    let sets = store.get_queue_active_job_sets("q1").await.unwrap();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].name, "js1");
    assert_eq!(sets[0].queued_jobs, 2);
    assert_eq!(sets[1].name, "js2");
    assert_eq!(sets[1].queued_jobs, 1);
}

#[tokio::test]
async fn test_update_jobs_commits_and_returns_mutator_events() {
    let store = InMemoryJobRepository::new();
    store
        .add_jobs(&[job("job-1", "q1", "js1", None)])
        .await
        .unwrap();

    let mutator = |job: &mut Job| {
        job.priority = 3.0;
        vec![JobEvent::for_job(
            job,
            "alice",
            Utc::now(),
            JobEventKind::Updated,
        )]
    };
    let results = store
        .update_jobs(&["job-1".to_string()], &mutator)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    match &results[0].outcome {
        JobUpdateOutcome::Updated { events } => {
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind, JobEventKind::Updated);
        }
        other => panic!("expected committed update, got {other:?}"),
    }

    let jobs = store
        .get_existing_jobs_by_ids(&["job-1".to_string()])
        .await
        .unwrap();
    assert_eq!(jobs[0].priority, 3.0);
}

#[tokio::test]
async fn test_update_jobs_reports_missing_jobs() {
    let store = InMemoryJobRepository::new();
    let mutator = |_job: &mut Job| Vec::new();

    let results = store
        .update_jobs(&["ghost".to_string()], &mutator)
        .await
        .unwrap();
    assert_eq!(results[0].outcome, JobUpdateOutcome::NotFound);
}

#[tokio::test]
async fn test_delete_jobs_reports_per_job_errors() {
    let store = InMemoryJobRepository::new();
    store
        .add_jobs(&[job("job-1", "q1", "js1", Some("c1"))])
        .await
        .unwrap();

    let results = store
        .delete_jobs(&[job("job-1", "q1", "js1", Some("c1")), job("ghost", "q1", "js1", None)])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_none());
    assert!(matches!(
        results[1].1,
        Some(RepositoryError::JobNotFound(_))
    ));

    // Deleting frees the client id for reuse.
    let resubmit = store
        .add_jobs(&[job("job-5", "q1", "js1", Some("c1"))])
        .await
        .unwrap();
    assert!(!resubmit[0].duplicate_detected);
}
