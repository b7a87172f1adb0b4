//! Effects produced by state transitions

use crate::state_machine::state::{DispatchRequest, SessionOrigin, SessionOutcome};

/// Keyboard attached to an outgoing chat message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplyKeyboard {
    /// Leave whatever keyboard the client shows
    #[default]
    Unchanged,
    /// One-time keyboard with the given rows of buttons
    Options(Vec<Vec<String>>),
    /// Hide the custom keyboard
    Remove,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// A new session starts; later replies go to the origin's chat
    BeginSession { origin: SessionOrigin },

    /// Send a message to the user's chat
    Reply { text: String, keyboard: ReplyKeyboard },

    /// List repository branches (answers with `BranchesListed` or `BranchListFailed`)
    FetchBranches,

    /// Trigger the CI workflow (answers with `DispatchSucceeded` or `DispatchFailed`)
    Dispatch { request: DispatchRequest },

    /// The session is over and its data discarded
    EndSession { outcome: SessionOutcome },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply {
            text: text.into(),
            keyboard: ReplyKeyboard::Unchanged,
        }
    }

    pub fn reply_with_options(text: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Effect::Reply {
            text: text.into(),
            keyboard: ReplyKeyboard::Options(rows),
        }
    }

    pub fn reply_removing_keyboard(text: impl Into<String>) -> Self {
        Effect::Reply {
            text: text.into(),
            keyboard: ReplyKeyboard::Remove,
        }
    }

    pub fn end(outcome: SessionOutcome) -> Self {
        Effect::EndSession { outcome }
    }
}
