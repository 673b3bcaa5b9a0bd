use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ingress::{IngressConfig, ServiceConfig};
use crate::api::pod::PodSpec;

/// A submitted job: one batch workload queued for dispatch to the fleet.
///
/// Immutable after creation except for `priority`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Caller-supplied idempotency token, scoped to `(queue, job_set_id)`.
    #[serde(default)]
    pub client_id: Option<String>,
    pub queue: String,
    pub job_set_id: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Deprecated; merged into each pod's `node_selector` at submission.
    #[serde(default)]
    pub required_node_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub ingress: Vec<IngressConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    pub priority: f64,
    #[serde(default)]
    pub pod_spec: Option<PodSpec>,
    #[serde(default)]
    pub pod_specs: Vec<PodSpec>,
    pub created: DateTime<Utc>,
    /// Name of the submitting principal.
    pub owner: String,
    /// Groups through which the submitter held submit rights on the queue.
    /// Empty when the submitter was granted directly.
    #[serde(default)]
    pub queue_ownership_user_groups: Vec<String>,
}

impl Job {
    /// All pod specs of the job, whichever of the two fields carries them.
    pub fn all_pod_specs(&self) -> Vec<&PodSpec> {
        match &self.pod_spec {
            Some(spec) => std::iter::once(spec).chain(self.pod_specs.iter()).collect(),
            None => self.pod_specs.iter().collect(),
        }
    }
}

/// One job of a submit request, before ids and defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSubmitRequestItem {
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub required_node_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub pod_spec: Option<PodSpec>,
    #[serde(default)]
    pub pod_specs: Vec<PodSpec>,
    #[serde(default)]
    pub ingress: Vec<IngressConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl JobSubmitRequestItem {
    pub fn all_pod_specs(&self) -> Vec<&PodSpec> {
        match &self.pod_spec {
            Some(spec) => std::iter::once(spec).chain(self.pod_specs.iter()).collect(),
            None => self.pod_specs.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSubmitRequest {
    pub queue: String,
    pub job_set_id: String,
    #[serde(default)]
    pub job_request_items: Vec<JobSubmitRequestItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSubmitResponseItem {
    pub job_id: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSubmitResponse {
    pub job_response_items: Vec<JobSubmitResponseItem>,
}

/// Cancel either one job by id or a whole job set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobCancelRequest {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub queue: String,
    #[serde(default)]
    pub job_set_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancellationResult {
    pub cancelled_ids: Vec<String>,
}

/// Reprioritize either an explicit id list or a whole job set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobReprioritizeRequest {
    #[serde(default)]
    pub job_ids: Vec<String>,
    #[serde(default)]
    pub queue: String,
    #[serde(default)]
    pub job_set_id: String,
    pub new_priority: f64,
}

/// Per-job outcome map; `None` marks success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobReprioritizeResponse {
    pub reprioritization_results: BTreeMap<String, Option<String>>,
}
