use std::collections::BTreeMap;

use thiserror::Error;

use crate::api::cluster::ClusterSchedulingInfo;
use crate::api::job::Job;
use crate::api::pod::ResourceList;

/// A job no known cluster could accept, with the request that failed.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("job {job_id} can not be scheduled: no cluster can accommodate a request of {requested}")]
pub struct InfeasibleJob {
    pub job_id: String,
    pub requested: String,
}

/// Advisory feasibility check: every job must fit on at least one cluster
/// from the latest capacity snapshots. Capacity may change before the job is
/// leased; the point is to reject hopeless submissions early. A single
/// infeasible job fails the whole batch.
pub fn validate_jobs_can_be_scheduled(
    jobs: &[Job],
    scheduling_info: &BTreeMap<String, ClusterSchedulingInfo>,
) -> Result<(), InfeasibleJob> {
    for job in jobs {
        if !job_fits_anywhere(job, scheduling_info) {
            return Err(InfeasibleJob {
                job_id: job.id.clone(),
                requested: describe(&job_total_requests(job)),
            });
        }
    }
    Ok(())
}

fn job_fits_anywhere(
    job: &Job,
    scheduling_info: &BTreeMap<String, ClusterSchedulingInfo>,
) -> bool {
    let requested = job_total_requests(job);
    scheduling_info.values().any(|info| {
        requested.fits_within(&info.schedulable_capacity())
            && job
                .all_pod_specs()
                .iter()
                .all(|pod| pod.tolerates_all(&info.taints))
    })
}

/// Aggregate resource request over all pods of the job.
fn job_total_requests(job: &Job) -> ResourceList {
    let mut total = ResourceList::new();
    for pod in job.all_pod_specs() {
        total.add(&pod.total_requests());
    }
    total
}

fn describe(resources: &ResourceList) -> String {
    if resources.is_empty() {
        return "nothing".to_string();
    }
    resources
        .0
        .iter()
        .map(|(resource, quantity)| format!("{resource}={quantity}"))
        .collect::<Vec<_>>()
        .join(",")
}
