use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::pod::{ResourceList, Toleration};

/// Policy for queues that do not exist yet at submit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueManagementConfig {
    /// Allow submit to create a missing queue for sufficiently privileged
    /// callers.
    pub auto_create_queues: bool,
    /// Priority factor given to auto-created queues.
    pub default_priority_factor: f64,
}

impl Default for QueueManagementConfig {
    fn default() -> Self {
        Self {
            auto_create_queues: false,
            default_priority_factor: 1.0,
        }
    }
}

/// Defaulting and validation policy applied to every submitted pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Resources set as both request and limit when a container specifies
    /// neither.
    #[serde(default)]
    pub default_job_limits: ResourceList,
    /// Tolerations appended to pods that lack a matching one.
    #[serde(default)]
    pub default_job_tolerations: Vec<Toleration>,
    /// Ceiling on the serialized size of a single pod spec.
    pub max_pod_size_bytes: usize,
    /// Per-resource minimum a container must request, when listed.
    #[serde(default)]
    pub min_job_resources: ResourceList,
    /// Priority class names jobs may use. Empty means unrestricted.
    #[serde(default)]
    pub permitted_priority_classes: BTreeSet<String>,
    /// Node selector entries every pod must carry.
    #[serde(default)]
    pub required_node_selectors: BTreeMap<String, String>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_job_limits: ResourceList::new(),
            default_job_tolerations: Vec::new(),
            max_pod_size_bytes: 65535,
            min_job_resources: ResourceList::new(),
            permitted_priority_classes: BTreeSet::new(),
            required_node_selectors: BTreeMap::new(),
        }
    }
}

/// Configuration of the submit service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    /// Max jobs materialized per batch when cancelling a whole job set.
    pub cancel_jobs_batch_size: usize,
    /// Batched operations return partial results once the remaining request
    /// deadline drops inside this margin.
    pub deadline_margin_ms: u64,
    #[serde(default)]
    pub queue_management: QueueManagementConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            cancel_jobs_batch_size: 1000,
            deadline_margin_ms: 1000,
            queue_management: QueueManagementConfig::default(),
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl SubmitConfig {
    pub fn deadline_margin(&self) -> Duration {
        Duration::from_millis(self.deadline_margin_ms)
    }
}
