//! Access guard: decides whether a requester may talk to the bot

use crate::state_machine::state::UserId;
use std::collections::HashSet;

/// Reply sent to requesters outside the allow-set
pub const ACCESS_DENIED_TEXT: &str = "Access to this command is restricted.";

/// Allow-set of requester identities, fixed at startup
#[derive(Debug, Clone, Default)]
pub struct AccessGuard {
    allowed: HashSet<UserId>,
}

impl AccessGuard {
    pub fn new(allowed: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// True iff the requester is in the allow-set
    pub fn authorize(&self, requester: UserId) -> bool {
        self.allowed.contains(&requester)
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}
