//! Events that can occur in a conversation

use crate::github::RepoError;
use crate::state_machine::state::SessionOrigin;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    /// `/workflow` entry command, from the chat the session will live in
    StartWorkflow { origin: SessionOrigin },
    /// Any non-command text
    UserText { text: String },
    /// `/cancel` command
    UserCancel,

    // Repository events
    BranchesListed { branches: Vec<String> },
    BranchListFailed { error: RepoError },
    DispatchSucceeded,
    DispatchFailed { error: RepoError },

    // Timer events
    /// No input arrived within the session TTL
    SessionExpired,
}

impl Event {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::StartWorkflow { .. } => "start_workflow",
            Event::UserText { .. } => "user_text",
            Event::UserCancel => "user_cancel",
            Event::BranchesListed { .. } => "branches_listed",
            Event::BranchListFailed { .. } => "branch_list_failed",
            Event::DispatchSucceeded => "dispatch_succeeded",
            Event::DispatchFailed { .. } => "dispatch_failed",
            Event::SessionExpired => "session_expired",
        }
    }
}
