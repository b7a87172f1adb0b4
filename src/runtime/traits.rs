//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::github::{Branch, RepoError};
use crate::state_machine::state::{ChatId, DispatchRequest};
use crate::state_machine::ReplyKeyboard;
use crate::telegram::ChatError;
use async_trait::async_trait;
use std::sync::Arc;

/// Repository API used by the dialogue
#[async_trait]
pub trait RepoClient: Send + Sync {
    /// List every branch of the repository
    async fn list_branches(&self) -> Result<Vec<Branch>, RepoError>;

    /// Trigger the CI workflow with the assembled selections
    async fn dispatch_workflow(&self, request: &DispatchRequest) -> Result<(), RepoError>;
}

/// Outgoing side of the chat transport
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Deliver a text message, optionally changing the reply keyboard
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<(), ChatError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: RepoClient + ?Sized> RepoClient for Arc<T> {
    async fn list_branches(&self) -> Result<Vec<Branch>, RepoError> {
        (**self).list_branches().await
    }

    async fn dispatch_workflow(&self, request: &DispatchRequest) -> Result<(), RepoError> {
        (**self).dispatch_workflow(request).await
    }
}

#[async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Arc<T> {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<(), ChatError> {
        (**self).send_message(chat_id, text, keyboard).await
    }
}
