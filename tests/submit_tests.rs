//! End-to-end tests for the submit operation: authorization, validation,
//! defaulting, deduplication and the emitted event stream.


use tonic::Code;

use flotilla::api::job::JobSubmitResponse;
use flotilla::api::pod::{Quantity, ResourceList};
use flotilla::api::queue::PermissionVerb;
use flotilla::auth::{Permission, Principal};
use flotilla::config::SubmitConfig;
use flotilla::repository::{JobRepository, QueueRepository};
use flotilla::service::partial_result_from_status;

use test_harness::*;

fn admin_principal() -> Principal {
    Principal::new("alice").with_groups(["admins"])
}

#[tokio::test]
async fn test_submit_through_queue_group_grant() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;

    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![single_pod_item("1", "1Gi")]))
        .await
        .unwrap();

    assert_eq!(response.job_response_items.len(), 1);
    let job_id = &response.job_response_items[0].job_id;
    assert!(response.job_response_items[0].error.is_none());

    let stored = ctx
        .jobs
        .get_existing_jobs_by_ids(&[job_id.clone()])
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].owner, "alice");
    assert_eq!(stored[0].queue, "q1");
    assert_eq!(stored[0].job_set_id, "js1");
    assert_eq!(stored[0].namespace, "default");
    // Submit rights came through the admins group, not a direct user grant.
    assert_eq!(stored[0].queue_ownership_user_groups, vec!["admins".to_string()]);

    assert_eq!(
        ctx.event_names_for_job(job_id).await,
        vec!["submitted", "queued"]
    );
}

#[tokio::test]
async fn test_submit_direct_user_grant_reports_no_groups() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_user("q1", "alice", &[PermissionVerb::Submit]))
        .await;

    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![single_pod_item("1", "1Gi")]))
        .await
        .unwrap();

    let stored = ctx
        .jobs
        .get_existing_jobs_by_ids(&[response.job_response_items[0].job_id.clone()])
        .await
        .unwrap();
    assert!(stored[0].queue_ownership_user_groups.is_empty());
}

#[tokio::test]
async fn test_duplicate_client_id_returns_existing_job() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;
    let scope = scope_for(admin_principal());

    let mut item = single_pod_item("1", "1Gi");
    item.client_id = Some("c1".to_string());

    let first = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![item.clone()]))
        .await
        .unwrap();
    let first_id = first.job_response_items[0].job_id.clone();

    let second = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![item]))
        .await
        .unwrap();
    let second_id = second.job_response_items[0].job_id.clone();

    assert_eq!(first_id, second_id);
    assert_eq!(ctx.jobs.len().await, 1);

    assert_eq!(
        ctx.all_event_names().await,
        vec!["submitted", "queued", "submitted", "duplicate_found"]
    );
}

#[tokio::test]
async fn test_submit_denied_by_both_tiers() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "other-team", &[PermissionVerb::Submit]))
        .await;

    let scope = scope_for(admin_principal());
    let status = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![single_pod_item("1", "1Gi")]))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::PermissionDenied);
    // Both refusals are part of the one message.
    assert!(status.message().contains("submit_any_jobs"), "{status}");
    assert!(status.message().contains("q1"), "{status}");

    assert!(ctx.jobs.is_empty().await);
    assert!(ctx.events.events().await.is_empty());
}

#[tokio::test]
async fn test_empty_submit_is_a_no_op() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;

    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", Vec::new()))
        .await
        .unwrap();

    assert!(response.job_response_items.is_empty());
    assert!(ctx.events.events().await.is_empty());
    assert!(ctx.jobs.is_empty().await);
}

#[tokio::test]
async fn test_submit_rejects_bad_pod_spec_shape() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;
    let scope = scope_for(admin_principal());

    let mut both = single_pod_item("1", "1Gi");
    both.pod_specs = vec![single_container_pod("1", "1Gi")];
    let status = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![both]))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let mut neither = single_pod_item("1", "1Gi");
    neither.pod_spec = None;
    let status = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![neither]))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    // Rejected requests must leave no trace.
    assert!(ctx.jobs.is_empty().await);
    assert!(ctx.events.events().await.is_empty());
}

#[tokio::test]
async fn test_auto_create_queue_owned_by_caller() {
    let config = SubmitConfig {
        queue_management: flotilla::config::QueueManagementConfig {
            auto_create_queues: true,
            default_priority_factor: 5.0,
        },
        ..SubmitConfig::default()
    };
    let ctx = test_context(group_checker(Permission::SubmitAnyJobs, "admins"), config).await;

    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .submit_jobs(&scope, submit_request("fresh-queue", "js1", vec![single_pod_item("1", "1Gi")]))
        .await
        .unwrap();
    assert_eq!(response.job_response_items.len(), 1);

    let queue = ctx.queues.get_queue("fresh-queue").await.unwrap();
    assert_eq!(queue.user_owners, vec!["alice".to_string()]);
    assert_eq!(queue.priority_factor, 5.0);

    // Caller holds a direct user grant on the auto-created queue, so no
    // ownership groups are recorded.
    let stored = ctx
        .jobs
        .get_existing_jobs_by_ids(&[response.job_response_items[0].job_id.clone()])
        .await
        .unwrap();
    assert!(stored[0].queue_ownership_user_groups.is_empty());
}

#[tokio::test]
async fn test_submit_to_missing_queue_without_auto_create() {
    let ctx = test_context(
        group_checker(Permission::SubmitAnyJobs, "admins"),
        SubmitConfig::default(),
    )
    .await;

    let scope = scope_for(admin_principal());
    let status = ctx
        .server
        .submit_jobs(&scope, submit_request("nope", "js1", vec![single_pod_item("1", "1Gi")]))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test]
async fn test_defaulting_fills_requests_limits_and_policy_defaults() {
    let config = SubmitConfig {
        scheduling: flotilla::config::SchedulingConfig {
            default_job_limits: ResourceList::from([("memory", "1Gi".parse().unwrap())]),
            ..flotilla::config::SchedulingConfig::default()
        },
        ..SubmitConfig::default()
    };
    let ctx = test_context(deny_all_checker(), config).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;

    // Limits carry cpu only; requests are empty.
    let mut item = single_pod_item("1", "1Gi");
    if let Some(pod) = item.pod_spec.as_mut() {
        pod.containers[0].resources.requests = ResourceList::new();
        pod.containers[0].resources.limits = ResourceList::from([("cpu", "2".parse().unwrap())]);
    }

    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![item]))
        .await
        .unwrap();

    let stored = ctx
        .jobs
        .get_existing_jobs_by_ids(&[response.job_response_items[0].job_id.clone()])
        .await
        .unwrap();
    let resources = &stored[0].pod_spec.as_ref().unwrap().containers[0].resources;

    let two: Quantity = "2".parse().unwrap();
    let gig: Quantity = "1Gi".parse().unwrap();
    assert_eq!(resources.requests.get("cpu"), Some(&two));
    assert_eq!(resources.limits.get("cpu"), Some(&two));
    assert_eq!(resources.requests.get("memory"), Some(&gig));
    assert_eq!(resources.limits.get("memory"), Some(&gig));
}

#[tokio::test]
async fn test_job_id_substitution_in_labels_and_annotations() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;

    let mut item = single_pod_item("1", "1Gi");
    item.labels
        .insert("tracking-url".to_string(), "https://ui/jobs/{JobId}".to_string());
    item.annotations
        .insert("literal".to_string(), "{{JobId}}".to_string());

    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![item]))
        .await
        .unwrap();
    let job_id = response.job_response_items[0].job_id.clone();

    let stored = ctx
        .jobs
        .get_existing_jobs_by_ids(&[job_id.clone()])
        .await
        .unwrap();
    assert_eq!(
        stored[0].labels["tracking-url"],
        format!("https://ui/jobs/{job_id}")
    );
    assert_eq!(stored[0].annotations["literal"], "JobId");
}

#[tokio::test]
async fn test_required_node_labels_merged_into_node_selector() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;

    let mut item = single_pod_item("1", "1Gi");
    item.required_node_labels
        .insert("zone".to_string(), "eu-west-1a".to_string());

    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![item]))
        .await
        .unwrap();

    let stored = ctx
        .jobs
        .get_existing_jobs_by_ids(&[response.job_response_items[0].job_id.clone()])
        .await
        .unwrap();
    assert_eq!(
        stored[0].pod_spec.as_ref().unwrap().node_selector["zone"],
        "eu-west-1a"
    );
}

#[tokio::test]
async fn test_infeasible_job_rejected_before_any_write() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;

    let scope = scope_for(admin_principal());
    let status = ctx
        .server
        .submit_jobs(
            &scope,
            submit_request("q1", "js1", vec![single_pod_item("4096", "64Ti")]),
        )
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("can not be scheduled"), "{status}");
    assert!(ctx.jobs.is_empty().await);
    assert!(ctx.events.events().await.is_empty());
}

#[tokio::test]
async fn test_post_write_report_failure_returns_partial_response() {
    // One append succeeds (submitted), the queued report then fails.
    let ctx = test_context_with_flaky_sink(deny_all_checker(), SubmitConfig::default(), 1).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;

    let scope = scope_for(admin_principal());
    let status = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", vec![single_pod_item("1", "1Gi")]))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Internal);

    // The job was persisted and the partial response names it.
    let partial: JobSubmitResponse = partial_result_from_status(&status).unwrap();
    assert_eq!(partial.job_response_items.len(), 1);
    let stored = ctx
        .jobs
        .get_existing_jobs_by_ids(&[partial.job_response_items[0].job_id.clone()])
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_response_preserves_input_order() {
    let ctx = test_context(deny_all_checker(), SubmitConfig::default()).await;
    ctx.install_queue(queue_granting_group("q1", "admins", &[PermissionVerb::Submit]))
        .await;

    let items = vec![
        single_pod_item("1", "1Gi"),
        single_pod_item("2", "2Gi"),
        single_pod_item("3", "3Gi"),
    ];
    let scope = scope_for(admin_principal());
    let response = ctx
        .server
        .submit_jobs(&scope, submit_request("q1", "js1", items))
        .await
        .unwrap();

    assert_eq!(response.job_response_items.len(), 3);
    // Minted ids are time-ordered, so response order must be ascending.
    let ids: Vec<&String> = response
        .job_response_items
        .iter()
        .map(|item| &item.job_id)
        .collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    let cpus: Vec<String> = {
        let id_list: Vec<String> = ids.iter().map(|id| (*id).clone()).collect();
        let stored = ctx.jobs.get_existing_jobs_by_ids(&id_list).await.unwrap();
        stored
            .iter()
            .map(|job| {
                job.pod_spec.as_ref().unwrap().containers[0]
                    .resources
                    .requests
                    .get("cpu")
                    .unwrap()
                    .to_string()
            })
            .collect()
    };
    assert_eq!(cpus, vec!["1", "2", "3"]);
}
