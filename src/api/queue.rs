use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Action a queue permission binding can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionVerb {
    Submit,
    Cancel,
    Reprioritize,
    Watch,
}

impl PermissionVerb {
    pub const ALL: [PermissionVerb; 4] = [
        PermissionVerb::Submit,
        PermissionVerb::Cancel,
        PermissionVerb::Reprioritize,
        PermissionVerb::Watch,
    ];
}

impl fmt::Display for PermissionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionVerb::Submit => write!(f, "submit"),
            PermissionVerb::Cancel => write!(f, "cancel"),
            PermissionVerb::Reprioritize => write!(f, "reprioritize"),
            PermissionVerb::Watch => write!(f, "watch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    User,
    Group,
}

/// One user or group a permission binding applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionSubject {
    pub kind: SubjectKind,
    pub name: String,
}

impl PermissionSubject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            name: name.into(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Group,
            name: name.into(),
        }
    }
}

/// A queue-local permission binding: the listed subjects may perform
/// the listed verbs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueuePermissions {
    pub subjects: Vec<PermissionSubject>,
    pub verbs: Vec<PermissionVerb>,
}

impl QueuePermissions {
    /// Binding that grants every verb to the given owners.
    /// Used when a queue is created implicitly on first submit.
    pub fn from_owners<U, G>(users: U, groups: G) -> Self
    where
        U: IntoIterator<Item = String>,
        G: IntoIterator<Item = String>,
    {
        let subjects = users
            .into_iter()
            .map(PermissionSubject::user)
            .chain(groups.into_iter().map(PermissionSubject::group))
            .collect();
        Self {
            subjects,
            verbs: PermissionVerb::ALL.to_vec(),
        }
    }

    pub fn grants(&self, subject: &PermissionSubject, verb: PermissionVerb) -> bool {
        self.verbs.contains(&verb) && self.subjects.contains(subject)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidQueue {
    #[error("queue name must not be empty")]
    EmptyName,
    #[error("queue {0}: priority factor must be positive, got {1}")]
    NonPositivePriorityFactor(String, f64),
}

/// A named scope of jobs with its own ownership and permission policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub name: String,
    pub priority_factor: f64,
    #[serde(default)]
    pub user_owners: Vec<String>,
    #[serde(default)]
    pub group_owners: Vec<String>,
    /// Per-resource cap as a fraction of fleet capacity.
    #[serde(default)]
    pub resource_limits: BTreeMap<String, f64>,
    #[serde(default)]
    pub permissions: Vec<QueuePermissions>,
}

impl Queue {
    pub fn validate(&self) -> Result<(), InvalidQueue> {
        if self.name.is_empty() {
            return Err(InvalidQueue::EmptyName);
        }
        if self.priority_factor <= 0.0 {
            return Err(InvalidQueue::NonPositivePriorityFactor(
                self.name.clone(),
                self.priority_factor,
            ));
        }
        Ok(())
    }

    /// True if any binding on this queue grants `verb` to `subject`.
    pub fn has_permission(&self, subject: &PermissionSubject, verb: PermissionVerb) -> bool {
        self.permissions.iter().any(|p| p.grants(subject, verb))
    }
}

/// Summary of one active job set within a queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSetInfo {
    pub name: String,
    pub queued_jobs: u32,
    pub leased_jobs: u32,
}

/// Response payload of the queue-info operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub name: String,
    pub active_job_sets: Vec<JobSetInfo>,
}
