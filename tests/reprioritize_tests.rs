//! Tests for the reprioritize operation and its event ordering.


use tonic::Code;

use flotilla::api::job::JobReprioritizeRequest;
use flotilla::api::queue::PermissionVerb;
use flotilla::auth::Principal;
use flotilla::config::SubmitConfig;
use flotilla::repository::JobRepository;

use test_harness::*;

fn admin_principal() -> Principal {
    Principal::new("alice").with_groups(["admins"])
}

async fn context_with_jobs(verbs: &[PermissionVerb], count: usize) -> (TestContext, Vec<String>) {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "admins", verbs)).await;

    let items = (0..count).map(|_| single_pod_item("1", "1Gi")).collect();
    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", items))
        .await
        .unwrap();
    let ids = response
        .job_response_items
        .into_iter()
        .map(|item| item.job_id)
        .collect();
    (ctx, ids)
}

#[tokio::test]
async fn test_reprioritize_by_ids_updates_priority_and_reports() {
    let (ctx, ids) = context_with_jobs(
        &[PermissionVerb::Submit, PermissionVerb::Reprioritize],
        2,
    )
    .await;

    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .reprioritize_jobs(
            &scope,
            JobReprioritizeRequest {
                job_ids: ids.clone(),
                new_priority: 7.5,
                ..JobReprioritizeRequest::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(response.reprioritization_results.len(), 2);
    for id in &ids {
        assert_eq!(response.reprioritization_results[id], None);
    }

    let stored = ctx.jobs.get_existing_jobs_by_ids(&ids).await.unwrap();
    assert!(stored.iter().all(|job| job.priority == 7.5));

    for id in &ids {
        assert_eq!(
            ctx.event_names_for_job(id).await,
            vec![
                "submitted",
                "queued",
                "reprioritizing",
                "updated",
                "reprioritized"
            ]
        );
    }
}

#[tokio::test]
async fn test_reprioritize_whole_job_set() {
    let (ctx, ids) = context_with_jobs(
        &[PermissionVerb::Submit, PermissionVerb::Reprioritize],
        3,
    )
    .await;

    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .reprioritize_jobs(
            &scope,
            JobReprioritizeRequest {
                queue: "q1".to_string(),
                job_set_id: "js1".to_string(),
                new_priority: 2.0,
                ..JobReprioritizeRequest::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(response.reprioritization_results.len(), 3);
    let stored = ctx.jobs.get_existing_jobs_by_ids(&ids).await.unwrap();
    assert!(stored.iter().all(|job| job.priority == 2.0));
}

#[tokio::test]
async fn test_reprioritize_denied_without_rights() {
    let (ctx, ids) = context_with_jobs(&[PermissionVerb::Submit], 1).await;

    let scope = scope_for(admin_principal());
    let status = ctx
        .server
        .reprioritize_jobs(
            &scope,
            JobReprioritizeRequest {
                job_ids: ids.clone(),
                new_priority: 9.0,
                ..JobReprioritizeRequest::default()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::PermissionDenied);
    assert!(status.message().contains("reprioritize_any_jobs"), "{status}");

    let stored = ctx.jobs.get_existing_jobs_by_ids(&ids).await.unwrap();
    assert_eq!(stored[0].priority, 0.0);
    assert_eq!(
        ctx.event_names_for_job(&ids[0]).await,
        vec!["submitted", "queued"]
    );
}

#[tokio::test]
async fn test_reprioritize_requires_a_selector() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    let scope = scope_for(admin_principal());

    let status = ctx
        .server
        .reprioritize_jobs(
            &scope,
            JobReprioritizeRequest {
                new_priority: 1.0,
                ..JobReprioritizeRequest::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_reprioritize_unknown_ids_yields_empty_results() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    let scope = scope_for(admin_principal());

    let response = ctx
        .server
        .reprioritize_jobs(
            &scope,
            JobReprioritizeRequest {
                job_ids: vec!["no-such-job".to_string()],
                new_priority: 1.0,
                ..JobReprioritizeRequest::default()
            },
        )
        .await
        .unwrap();
    assert!(response.reprioritization_results.is_empty());
    assert!(ctx.events.events().await.is_empty());
}
