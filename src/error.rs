use thiserror::Error;

use crate::api::queue::PermissionVerb;
use crate::auth::Permission;

/// Storage-layer failures. Not-found and already-exists are distinguished
/// from plain unavailability so the facade can map each to its own status
/// code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("queue {0:?} does not exist")]
    QueueNotFound(String),

    #[error("queue {0:?} already exists")]
    QueueAlreadyExists(String),

    #[error("job {0:?} does not exist")]
    JobNotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Refusal from the two-tier permission check.
///
/// When both tiers refuse, `Both` carries the two diagnostics so the caller
/// sees in one message what was attempted and why each tier said no.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("user {principal} does not have the {permission} permission")]
    GlobalRefused {
        principal: String,
        permission: Permission,
    },

    #[error("queue {queue} does not grant {verb} to user {principal} or any of their groups")]
    QueueRefused {
        principal: String,
        queue: String,
        verb: PermissionVerb,
    },

    #[error("{global}, and {queue}")]
    Both {
        global: Box<AuthorizationError>,
        queue: Box<AuthorizationError>,
    },
}

impl AuthorizationError {
    pub fn merge(global: AuthorizationError, queue: AuthorizationError) -> AuthorizationError {
        AuthorizationError::Both {
            global: Box::new(global),
            queue: Box::new(queue),
        }
    }
}

/// Rejection of a submit request before any state changes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("job {index} in job set {job_set_id} contains both pod_spec and pod_specs, but may only contain either")]
    BothPodSpecFields { index: usize, job_set_id: String },

    #[error("job {index} in job set {job_set_id} contains no pod spec")]
    NoPodSpec { index: usize, job_set_id: String },

    #[error("job {index}: pod {pod_index} has no containers")]
    NoContainers { index: usize, pod_index: usize },

    #[error("job {index}: pod {pod_index} is {size} bytes, exceeding the maximum pod size of {max_size} bytes")]
    PodTooLarge {
        index: usize,
        pod_index: usize,
        size: usize,
        max_size: usize,
    },

    #[error("job {index}: container {container} requests {got} of {resource}, below the minimum of {min}")]
    RequestBelowMinimum {
        index: usize,
        container: String,
        resource: String,
        got: String,
        min: String,
    },

    #[error("job {index}: priority class {priority_class:?} is not permitted")]
    PriorityClassNotPermitted { index: usize, priority_class: String },

    #[error("job {index}: pod {pod_index} is missing required node selector {key}={value}")]
    MissingRequiredNodeSelector {
        index: usize,
        pod_index: usize,
        key: String,
        value: String,
    },

    #[error("job {index}: ingress {ingress_index} contains zero ports, each ingress needs at least one")]
    IngressWithoutPorts { index: usize, ingress_index: usize },

    #[error("job {index}: port {port} appears in ingress configs {first} and {second}, each port may have at most one")]
    DuplicateIngressPort {
        index: usize,
        port: u32,
        first: usize,
        second: usize,
    },

    #[error("job set not specified")]
    MissingJobSetId,

    #[error("queue not specified")]
    MissingQueue,
}
