//! Per-user conversation runtime
//!
//! One task per user owns that user's `ConvState`. Events for the user are
//! processed strictly in arrival order; remote calls are awaited inside the
//! turn that requested them.

use super::traits::{ChatClient, RepoClient};
use super::SessionRegistry;
use crate::state_machine::state::SessionOutcome;
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event, TransitionError};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Generic conversation runtime that can work with any repository and chat implementations
pub struct ConversationRuntime<R, C>
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    /// Distinguishes this runtime from a later one for the same user
    runtime_id: u64,
    context: ConvContext,
    state: ConvState,
    repo: Arc<R>,
    chat: Arc<C>,
    event_rx: mpsc::Receiver<Event>,
    state_tx: watch::Sender<ConvState>,
    registry: Option<SessionRegistry>,
}

impl<R, C> ConversationRuntime<R, C>
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    pub fn new(
        runtime_id: u64,
        context: ConvContext,
        repo: Arc<R>,
        chat: Arc<C>,
        event_rx: mpsc::Receiver<Event>,
        state_tx: watch::Sender<ConvState>,
    ) -> Self {
        Self {
            runtime_id,
            context,
            state: ConvState::Idle,
            repo,
            chat,
            event_rx,
            state_tx,
            registry: None,
        }
    }

    /// Allow the runtime to remove itself from the registry once it has been
    /// idle for a full TTL period
    pub fn with_registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> &ConvState {
        &self.state
    }

    pub async fn run(mut self) {
        tracing::debug!(user_id = self.context.user_id, "Starting conversation runtime");

        loop {
            let next = match self.context.session_ttl {
                Some(ttl) => tokio::time::timeout(ttl, self.event_rx.recv()).await.ok(),
                None => Some(self.event_rx.recv().await),
            };

            match next {
                Some(Some(event)) => self.process_event(event).await,
                // Every sender is gone: the manager shut down
                Some(None) => break,
                None if self.state.has_session() => {
                    tracing::info!(
                        user_id = self.context.user_id,
                        stage = self.state.stage(),
                        "Session expired"
                    );
                    self.process_event(Event::SessionExpired).await;
                }
                None => {
                    if self.try_retire().await {
                        break;
                    }
                }
            }
        }

        tracing::debug!(user_id = self.context.user_id, "Conversation runtime stopped");
    }

    /// Remove this runtime from the registry if nothing is queued for it.
    ///
    /// The manager only sends while holding the registry lock, so an empty
    /// queue observed under the lock stays empty once the entry is gone.
    async fn try_retire(&self) -> bool {
        let Some(registry) = &self.registry else {
            return false;
        };
        let mut runtimes = registry.lock().await;
        if !self.event_rx.is_empty() {
            return false;
        }
        if runtimes
            .get(&self.context.user_id)
            .is_some_and(|handle| handle.runtime_id == self.runtime_id)
        {
            runtimes.remove(&self.context.user_id);
        }
        true
    }

    /// Run one inbound event, plus every event its effects produce, to completion
    pub async fn process_event(&mut self, event: Event) {
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let event_name = current_event.name();

            // Pure state transition
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(e @ TransitionError::InvalidTransition(_)) => {
                    tracing::warn!(user_id = self.context.user_id, error = %e, "Unexpected event");
                    return;
                }
                Err(e) => {
                    // Mismatched input is dropped without a reply
                    tracing::debug!(
                        user_id = self.context.user_id,
                        event = event_name,
                        stage = self.state.stage(),
                        reason = %e,
                        "Ignoring event"
                    );
                    return;
                }
            };

            self.state = result.new_state;
            self.state_tx.send_replace(self.state.clone());

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::BeginSession { origin } => {
                tracing::info!(
                    user_id = self.context.user_id,
                    chat_id = origin.chat_id,
                    sender = %origin.sender_name,
                    "User started the conversation."
                );
                self.context.origin = origin;
                None
            }

            Effect::Reply { text, keyboard } => {
                if let Err(e) = self
                    .chat
                    .send_message(self.context.origin.chat_id, &text, &keyboard)
                    .await
                {
                    tracing::error!(
                        user_id = self.context.user_id,
                        chat_id = self.context.origin.chat_id,
                        error = %e,
                        "Failed to deliver reply"
                    );
                }
                None
            }

            Effect::FetchBranches => match self.repo.list_branches().await {
                Ok(branches) => Some(Event::BranchesListed {
                    branches: branches.into_iter().map(|b| b.name).collect(),
                }),
                Err(error) => Some(Event::BranchListFailed { error }),
            },

            Effect::Dispatch { request } => {
                tracing::info!(
                    user_id = self.context.user_id,
                    mode = %request.mode,
                    branch = %request.branch,
                    tag = %request.tag,
                    "Starting workflow."
                );
                match self.repo.dispatch_workflow(&request).await {
                    Ok(()) => Some(Event::DispatchSucceeded),
                    Err(error) => Some(Event::DispatchFailed { error }),
                }
            }

            Effect::EndSession { outcome } => {
                match outcome {
                    SessionOutcome::Cancelled => tracing::info!(
                        user_id = self.context.user_id,
                        sender = %self.context.origin.sender_name,
                        "User canceled the conversation."
                    ),
                    other => tracing::info!(
                        user_id = self.context.user_id,
                        outcome = ?other,
                        "Session ended"
                    ),
                }
                None
            }
        }
    }
}
