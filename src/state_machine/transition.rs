//! Pure state transition function
//!
//! Stage order is branch, then mode, then tag. Input that does not fit the
//! current stage is rejected with `InputMismatch` and the runtime drops it
//! without answering.

use super::state::{DispatchRequest, SessionOutcome, VersionTag, WorkflowMode};
use super::{ConvContext, ConvState, Effect, Event};
use crate::github::RepoError;
use thiserror::Error;

const CANCEL_HINT: &str = "Send /cancel to stop talking to me.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Input does not match what the {stage} stage expects")]
    InputMismatch { stage: &'static str },
    #[error("No workflow session in progress")]
    NoSession,
    #[error("A workflow session is already in progress")]
    SessionInProgress,
    #[error("Waiting for the repository to answer")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// expressed as effects for the runtime to execute.
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Entry
        // ============================================================

        (ConvState::Idle, Event::StartWorkflow { origin }) => {
            Ok(TransitionResult::new(ConvState::FetchingBranches)
                .with_effect(Effect::BeginSession { origin })
                .with_effect(Effect::FetchBranches))
        }

        (ConvState::FetchingBranches, Event::BranchesListed { branches }) => {
            let prompt = format!("Choose branch\n{CANCEL_HINT}");
            let effect = if branches.is_empty() {
                Effect::reply(prompt)
            } else {
                Effect::reply_with_options(prompt, vec![branches])
            };
            Ok(TransitionResult::new(ConvState::AwaitingBranch).with_effect(effect))
        }

        (ConvState::FetchingBranches, Event::BranchListFailed { error }) => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effects(upstream_failure_replies(&error))
                .with_effect(Effect::end(SessionOutcome::BranchListFailed)))
        }

        (state, Event::StartWorkflow { .. }) if state.has_session() || state.is_busy() => {
            Err(TransitionError::SessionInProgress)
        }

        // ============================================================
        // Stage handlers
        // ============================================================

        (ConvState::AwaitingBranch, Event::UserText { text }) => {
            let prompt = format!(
                "Chosen branch: {text}\nChoose workflow mode (create or destroy)\n{CANCEL_HINT}"
            );
            Ok(TransitionResult::new(ConvState::AwaitingMode { branch: text }).with_effect(
                Effect::reply_with_options(
                    prompt,
                    vec![vec![
                        WorkflowMode::Create.to_string(),
                        WorkflowMode::Destroy.to_string(),
                    ]],
                ),
            ))
        }

        (ConvState::AwaitingMode { branch }, Event::UserText { text }) => {
            let mode = WorkflowMode::parse(&text).ok_or(TransitionError::InputMismatch {
                stage: state.stage(),
            })?;
            let prompt = format!(
                "Chosen branch: {branch}\nChosen workflow mode: {mode}\n\
                 Choose application version. Reply \"latest\" for latest version\n{CANCEL_HINT}"
            );
            Ok(TransitionResult::new(ConvState::AwaitingTag {
                branch: branch.clone(),
                mode,
            })
            .with_effect(Effect::reply_removing_keyboard(prompt)))
        }

        (ConvState::AwaitingTag { branch, mode }, Event::UserText { text }) => {
            let tag = VersionTag::parse(&text).ok_or(TransitionError::InputMismatch {
                stage: state.stage(),
            })?;
            let request = DispatchRequest {
                branch: branch.clone(),
                mode: *mode,
                tag,
            };
            Ok(TransitionResult::new(ConvState::Dispatching {
                request: request.clone(),
            })
            .with_effect(Effect::Dispatch { request }))
        }

        // ============================================================
        // Dispatch outcome
        // ============================================================

        (ConvState::Dispatching { request }, Event::DispatchSucceeded) => {
            let confirmation = format!(
                "{} infrastructure for {} v \"{}\" in branch \"{}\"",
                request.mode.progressive(),
                context.app_name,
                request.tag,
                request.branch
            );
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::reply(confirmation))
                .with_effect(Effect::end(SessionOutcome::Dispatched)))
        }

        (ConvState::Dispatching { .. }, Event::DispatchFailed { error }) => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effects(upstream_failure_replies(&error))
                .with_effect(Effect::end(SessionOutcome::DispatchFailed)))
        }

        // ============================================================
        // Cancellation and expiry
        // ============================================================

        (state, Event::UserCancel | Event::UserText { .. } | Event::SessionExpired)
            if state.is_busy() =>
        {
            Err(TransitionError::Busy)
        }

        (state, Event::UserCancel) if state.has_session() => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::reply_removing_keyboard("Workflow canceled."))
                .with_effect(Effect::end(SessionOutcome::Cancelled)))
        }

        (state, Event::SessionExpired) if state.has_session() => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::reply_removing_keyboard(
                    "Workflow timed out. Send /workflow to start again.",
                ))
                .with_effect(Effect::end(SessionOutcome::Expired)))
        }

        (ConvState::Idle, Event::UserText { .. } | Event::UserCancel | Event::SessionExpired) => {
            Err(TransitionError::NoSession)
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} in state {}",
            event.name(),
            state.stage()
        ))),
    }
}

/// User-facing replies for a failed repository call
fn upstream_failure_replies(error: &RepoError) -> Vec<Effect> {
    match error.body() {
        Some(body) => vec![
            Effect::reply(format!("HTTP error occurred: {error}")),
            Effect::reply(format!("Response: {body}")),
        ],
        None => vec![Effect::reply(format!("Other error occurred: {error}"))],
    }
}
