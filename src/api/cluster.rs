use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::pod::{ResourceList, Taint};

/// Snapshot of one executor cluster's schedulable state, as last reported.
/// Read-only inside the submit service; used for feasibility only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSchedulingInfo {
    pub cluster_id: String,
    /// Capacity currently reported free across the cluster's nodes.
    pub available_capacity: ResourceList,
    /// Headroom the scheduler keeps back from any single job.
    #[serde(default)]
    pub minimum_job_reservation: ResourceList,
    #[serde(default)]
    pub taints: Vec<Taint>,
    #[serde(default)]
    pub last_reported: Option<DateTime<Utc>>,
}

impl ClusterSchedulingInfo {
    /// Capacity a single job may claim on this cluster.
    pub fn schedulable_capacity(&self) -> ResourceList {
        self.available_capacity
            .saturating_sub(&self.minimum_job_reservation)
    }
}
