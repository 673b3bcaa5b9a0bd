use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::queue::{PermissionSubject, PermissionVerb, Queue};
use crate::auth::Principal;
use crate::error::AuthorizationError;

/// A globally named capability. Queue-local rights are expressed as
/// [`PermissionVerb`] bindings on the queue instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SubmitAnyJobs,
    CancelAnyJobs,
    ReprioritizeAnyJobs,
    CreateQueue,
    DeleteQueue,
    WatchAllEvents,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::SubmitAnyJobs => write!(f, "submit_any_jobs"),
            Permission::CancelAnyJobs => write!(f, "cancel_any_jobs"),
            Permission::ReprioritizeAnyJobs => write!(f, "reprioritize_any_jobs"),
            Permission::CreateQueue => write!(f, "create_queue"),
            Permission::DeleteQueue => write!(f, "delete_queue"),
            Permission::WatchAllEvents => write!(f, "watch_all_events"),
        }
    }
}

/// Objects with user and group owners, for ownership decisions.
pub trait Owned {
    fn user_owners(&self) -> &[String];
    fn group_owners(&self) -> &[String];
}

impl Owned for Queue {
    fn user_owners(&self) -> &[String] {
        &self.user_owners
    }

    fn group_owners(&self) -> &[String] {
        &self.group_owners
    }
}

pub type PermissionMap = BTreeMap<Permission, Vec<String>>;

/// Resolves global permissions from three independent allow-maps, so a
/// deployment can bind a permission to OIDC scopes (machine clients), to
/// group membership (humans), or to raw claims (custom identity providers)
/// without schema changes.
#[derive(Debug, Clone, Default)]
pub struct PermissionChecker {
    permission_scope_map: PermissionMap,
    permission_group_map: PermissionMap,
    permission_claim_map: PermissionMap,
}

impl PermissionChecker {
    pub fn new(
        permission_scope_map: PermissionMap,
        permission_group_map: PermissionMap,
        permission_claim_map: PermissionMap,
    ) -> Self {
        Self {
            permission_scope_map,
            permission_group_map,
            permission_claim_map,
        }
    }

    /// True if the principal holds any scope, group, or claim listed for
    /// `permission`.
    pub fn user_has_permission(&self, principal: &Principal, permission: Permission) -> bool {
        has_permission(permission, &self.permission_scope_map, |scope| {
            principal.has_scope(scope)
        }) || has_permission(permission, &self.permission_group_map, |group| {
            principal.is_in_group(group)
        }) || has_permission(permission, &self.permission_claim_map, |claim| {
            principal.has_claim(claim)
        })
    }

    /// Ownership of `obj` by the principal, directly or through groups.
    ///
    /// A direct user-owner match reports no groups: audit trails distinguish
    /// "acted as self" from "acted on behalf of group". Otherwise the
    /// returned groups are the intersection of the principal's groups with
    /// the object's group owners.
    pub fn user_owns(&self, principal: &Principal, obj: &dyn Owned) -> (bool, Vec<String>) {
        if obj
            .user_owners()
            .iter()
            .any(|owner| *owner == principal.name)
        {
            return (true, Vec::new());
        }

        let groups: Vec<String> = obj
            .group_owners()
            .iter()
            .filter(|group| principal.is_in_group(group))
            .cloned()
            .collect();
        (!groups.is_empty(), groups)
    }

    /// Like [`user_has_permission`](Self::user_has_permission), but as a
    /// result carrying the refusal diagnostic.
    pub fn require_permission(
        &self,
        principal: &Principal,
        permission: Permission,
    ) -> Result<(), AuthorizationError> {
        if self.user_has_permission(principal, permission) {
            Ok(())
        } else {
            Err(AuthorizationError::GlobalRefused {
                principal: principal.name.clone(),
                permission,
            })
        }
    }

    /// Two-tier authorization: the global `permission` or a queue binding
    /// granting `verb` to the caller (as user or through any group) suffices.
    /// When both tiers refuse, the refusals are merged into one error.
    pub fn authorize(
        &self,
        principal: &Principal,
        permission: Permission,
        queue: &Queue,
        verb: PermissionVerb,
    ) -> Result<(), AuthorizationError> {
        if self.user_has_permission(principal, permission) {
            return Ok(());
        }
        let global = AuthorizationError::GlobalRefused {
            principal: principal.name.clone(),
            permission,
        };

        if self.queue_grants(principal, queue, verb) {
            return Ok(());
        }
        let queue_refusal = AuthorizationError::QueueRefused {
            principal: principal.name.clone(),
            queue: queue.name.clone(),
            verb,
        };

        Err(AuthorizationError::merge(global, queue_refusal))
    }

    fn queue_grants(&self, principal: &Principal, queue: &Queue, verb: PermissionVerb) -> bool {
        if queue.has_permission(&PermissionSubject::user(&principal.name), verb) {
            return true;
        }
        principal
            .groups
            .iter()
            .any(|group| queue.has_permission(&PermissionSubject::group(group), verb))
    }
}

fn has_permission(
    permission: Permission,
    map: &PermissionMap,
    assert: impl Fn(&str) -> bool,
) -> bool {
    map.get(&permission)
        .map(|values| values.iter().any(|value| assert(value)))
        .unwrap_or(false)
}
