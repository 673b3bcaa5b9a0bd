use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// The authenticated identity of a caller, fixed for the life of a request.
///
/// Requests that arrive without credentials resolve to [`Principal::anonymous`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    #[serde(default)]
    pub claims: BTreeSet<String>,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: BTreeSet::new(),
            scopes: BTreeSet::new(),
            claims: BTreeSet::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    pub fn with_groups<I: IntoIterator<Item = S>, S: Into<String>>(mut self, groups: I) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scopes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, scopes: I) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_claims<I: IntoIterator<Item = S>, S: Into<String>>(mut self, claims: I) -> Self {
        self.claims = claims.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn has_claim(&self, claim: &str) -> bool {
        self.claims.contains(claim)
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().cloned().collect()
    }
}

/// Per-request context threaded through every facade operation: the caller's
/// identity plus the request deadline.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub principal: Principal,
    pub deadline: Option<Instant>,
}

impl RequestScope {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            deadline: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(Principal::anonymous())
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Time left before the deadline; `None` when no deadline was set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// True once the remaining deadline is inside `margin`.
    /// Requests without a deadline are never close to it.
    pub fn close_to_deadline(&self, margin: Duration) -> bool {
        match self.remaining() {
            Some(remaining) => remaining <= margin,
            None => false,
        }
    }
}
