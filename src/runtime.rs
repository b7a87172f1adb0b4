//! Runtime for executing conversations
//!
//! The `RuntimeManager` is the session store: it maps each user id to the
//! task that owns that user's conversation. Every inbound message passes
//! through the access guard before any session is looked up.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use traits::*;

use crate::access::{AccessGuard, ACCESS_DENIED_TEXT};
use crate::command::{self, BotCommand, Input, HELP_TEXT};
use crate::state_machine::state::{ChatId, SessionOrigin, UserId};
use crate::state_machine::{ConvContext, ConvState, Event, ReplyKeyboard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

/// Capacity of each conversation's inbox
const EVENT_QUEUE_CAPACITY: usize = 32;

/// Live conversations keyed by user
pub type SessionRegistry = Arc<Mutex<HashMap<UserId, ConversationHandle>>>;

/// A chat message after transport-specific decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub user_id: UserId,
    pub chat_id: ChatId,
    /// Human-readable sender name for operator logs
    pub sender_name: String,
    pub text: String,
}

impl InboundMessage {
    fn origin(&self) -> SessionOrigin {
        SessionOrigin::new(self.chat_id, self.sender_name.clone())
    }
}

/// Handle to interact with a running conversation
pub struct ConversationHandle {
    pub runtime_id: u64,
    pub event_tx: mpsc::Sender<Event>,
    pub state_rx: watch::Receiver<ConvState>,
}

/// Settings shared by every conversation
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub app_name: String,
    pub session_ttl: Option<Duration>,
}

/// Manager for all conversation runtimes
pub struct RuntimeManager<R, C>
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    guard: AccessGuard,
    repo: Arc<R>,
    chat: Arc<C>,
    settings: RuntimeSettings,
    runtimes: SessionRegistry,
    next_runtime_id: AtomicU64,
}

impl<R, C> RuntimeManager<R, C>
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    pub fn new(guard: AccessGuard, repo: Arc<R>, chat: Arc<C>, settings: RuntimeSettings) -> Self {
        Self {
            guard,
            repo,
            chat,
            settings,
            runtimes: Arc::new(Mutex::new(HashMap::new())),
            next_runtime_id: AtomicU64::new(1),
        }
    }

    /// Entry point for every inbound chat message
    pub async fn handle_message(&self, message: InboundMessage) {
        let event = match command::parse(&message.text) {
            Input::Command(BotCommand::Help) => {
                self.reply(message.chat_id, HELP_TEXT).await;
                return;
            }
            Input::Command(BotCommand::Unknown(name)) => {
                tracing::debug!(user_id = message.user_id, command = %name, "Unknown command");
                return;
            }
            Input::Command(BotCommand::Workflow) => Event::StartWorkflow {
                origin: message.origin(),
            },
            Input::Command(BotCommand::Cancel) => Event::UserCancel,
            Input::Text(text) => Event::UserText { text },
        };

        if !self.guard.authorize(message.user_id) {
            tracing::error!(
                user_id = message.user_id,
                sender = %message.sender_name,
                event = event.name(),
                allowed = self.guard.len(),
                "Unauthorized access denied"
            );
            self.reply(message.chat_id, ACCESS_DENIED_TEXT).await;
            return;
        }

        if matches!(event, Event::StartWorkflow { .. }) {
            tracing::info!(
                user_id = message.user_id,
                sender = %message.sender_name,
                "Workflow requested"
            );
        }

        self.route(&message, event).await;
    }

    /// Current conversation state for a user, if a runtime exists
    #[cfg(test)]
    pub async fn session_state(&self, user_id: UserId) -> Option<ConvState> {
        let runtimes = self.runtimes.lock().await;
        runtimes
            .get(&user_id)
            .map(|handle| handle.state_rx.borrow().clone())
    }

    /// Number of users with a live conversation runtime
    pub async fn active_runtimes(&self) -> usize {
        self.runtimes.lock().await.len()
    }

    /// Number of users currently inside the dialogue
    pub async fn sessions_in_progress(&self) -> usize {
        let runtimes = self.runtimes.lock().await;
        runtimes
            .values()
            .filter(|handle| handle.state_rx.borrow().has_session())
            .count()
    }

    /// Deliver an event to the user's runtime, starting one for `/workflow`.
    ///
    /// Sends happen under the registry lock so a runtime can retire without
    /// losing queued events.
    async fn route(&self, message: &InboundMessage, event: Event) {
        let mut runtimes = self.runtimes.lock().await;

        let closed = runtimes
            .get(&message.user_id)
            .is_some_and(|handle| handle.event_tx.is_closed());
        if closed {
            runtimes.remove(&message.user_id);
        }

        if !runtimes.contains_key(&message.user_id) {
            if !matches!(event, Event::StartWorkflow { .. }) {
                tracing::debug!(
                    user_id = message.user_id,
                    event = event.name(),
                    "No session, ignoring"
                );
                return;
            }
            let handle = self.spawn_runtime(message);
            runtimes.insert(message.user_id, handle);
        }

        let Some(handle) = runtimes.get(&message.user_id) else {
            return;
        };
        match handle.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    user_id = message.user_id,
                    event = event.name(),
                    "Conversation inbox full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::error!(
                    user_id = message.user_id,
                    event = event.name(),
                    "Conversation runtime stopped unexpectedly"
                );
                runtimes.remove(&message.user_id);
            }
        }
    }

    fn spawn_runtime(&self, message: &InboundMessage) -> ConversationHandle {
        let runtime_id = self.next_runtime_id.fetch_add(1, Ordering::Relaxed);
        let context = ConvContext::new(message.user_id, message.origin(), &self.settings.app_name)
            .with_session_ttl(self.settings.session_ttl);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConvState::Idle);

        let runtime = ConversationRuntime::new(
            runtime_id,
            context,
            self.repo.clone(),
            self.chat.clone(),
            event_rx,
            state_tx,
        )
        .with_registry(self.runtimes.clone());

        tokio::spawn(async move {
            runtime.run().await;
        });

        tracing::debug!(user_id = message.user_id, runtime_id, "Spawned conversation runtime");

        ConversationHandle {
            runtime_id,
            event_tx,
            state_rx,
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self
            .chat
            .send_message(chat_id, text, &ReplyKeyboard::Unchanged)
            .await
        {
            tracing::error!(chat_id, error = %e, "Failed to deliver reply");
        }
    }
}
