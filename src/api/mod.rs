pub mod cluster;
pub mod event;
pub mod ingress;
pub mod job;
pub mod pod;
pub mod queue;

pub use cluster::ClusterSchedulingInfo;
pub use event::{JobEvent, JobEventKind};
pub use ingress::{IngressConfig, ServiceConfig};
pub use job::{
    CancellationResult, Job, JobCancelRequest, JobReprioritizeRequest, JobReprioritizeResponse,
    JobSubmitRequest, JobSubmitRequestItem, JobSubmitResponse, JobSubmitResponseItem,
};
pub use pod::{Container, PodSpec, Quantity, ResourceList, Taint, TaintEffect, Toleration};
pub use queue::{
    JobSetInfo, PermissionSubject, PermissionVerb, Queue, QueueInfo, QueuePermissions, SubjectKind,
};
