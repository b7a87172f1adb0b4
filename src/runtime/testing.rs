//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{InboundMessage, RuntimeManager, RuntimeSettings};
use crate::access::AccessGuard;
use crate::github::{Branch, RepoError};
use crate::state_machine::state::{ChatId, DispatchRequest, UserId};
use crate::state_machine::{ConvState, ReplyKeyboard};
use crate::telegram::ChatError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Repository Client
// ============================================================================

/// Repository with a fixed branch list and queued failures
#[derive(Default)]
pub struct MockRepoClient {
    branches: Vec<String>,
    branch_failures: Mutex<VecDeque<RepoError>>,
    dispatch_failures: Mutex<VecDeque<RepoError>>,
    branch_requests: Mutex<usize>,
    dispatched: Mutex<Vec<DispatchRequest>>,
}

impl MockRepoClient {
    pub fn with_branches(branches: &[&str]) -> Self {
        Self {
            branches: branches.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Fail the next branch listing
    pub fn fail_branches(&self, error: RepoError) {
        self.branch_failures.lock().unwrap().push_back(error);
    }

    /// Fail the next dispatch (the request is still recorded)
    pub fn fail_dispatch(&self, error: RepoError) {
        self.dispatch_failures.lock().unwrap().push_back(error);
    }

    pub fn branch_requests(&self) -> usize {
        *self.branch_requests.lock().unwrap()
    }

    pub fn dispatched(&self) -> Vec<DispatchRequest> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepoClient for MockRepoClient {
    async fn list_branches(&self) -> Result<Vec<Branch>, RepoError> {
        *self.branch_requests.lock().unwrap() += 1;
        if let Some(error) = self.branch_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self
            .branches
            .iter()
            .map(|name| Branch { name: name.clone() })
            .collect())
    }

    async fn dispatch_workflow(&self, request: &DispatchRequest) -> Result<(), RepoError> {
        self.dispatched.lock().unwrap().push(request.clone());
        match self.dispatch_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Mock Chat Client
// ============================================================================

/// A message captured by `MockChatClient`
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: ReplyKeyboard,
}

/// Records every outgoing message
#[derive(Default)]
pub struct MockChatClient {
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<VecDeque<ChatError>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next send (the message is not recorded)
    pub fn fail_next(&self, error: ChatError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.text).collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|m| m.text.clone())
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<(), ChatError> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(())
    }
}

// ============================================================================
// Manager harness
// ============================================================================

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// A `RuntimeManager` wired to mocks, one private chat per user
pub struct TestBot {
    pub manager: RuntimeManager<MockRepoClient, MockChatClient>,
    pub repo: Arc<MockRepoClient>,
    pub chat: Arc<MockChatClient>,
}

impl TestBot {
    pub fn new(repo: MockRepoClient, allowed: &[UserId]) -> Self {
        let repo = Arc::new(repo);
        let chat = Arc::new(MockChatClient::new());
        let manager = RuntimeManager::new(
            AccessGuard::new(allowed.iter().copied()),
            repo.clone(),
            chat.clone(),
            RuntimeSettings {
                app_name: "Cocktail Master".to_string(),
                session_ttl: None,
            },
        );
        Self {
            manager,
            repo,
            chat,
        }
    }

    /// Send from the user's private chat
    pub async fn send(&self, user_id: UserId, text: &str) {
        self.send_in(user_id, user_id, text).await;
    }

    pub async fn send_in(&self, user_id: UserId, chat_id: ChatId, text: &str) {
        self.manager
            .handle_message(InboundMessage {
                user_id,
                chat_id,
                sender_name: format!("user{user_id}"),
                text: text.to_string(),
            })
            .await;
    }

    pub async fn wait_for_state(&self, user_id: UserId, expected: &ConvState) {
        let reached = tokio::time::timeout(WAIT_LIMIT, async {
            while self.manager.session_state(user_id).await.as_ref() != Some(expected) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(
            reached.is_ok(),
            "user {user_id} never reached {expected:?}, last state {:?}",
            self.manager.session_state(user_id).await
        );
    }

    pub async fn wait_for_replies(&self, count: usize) {
        let reached = tokio::time::timeout(WAIT_LIMIT, async {
            while self.chat.sent().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(
            reached.is_ok(),
            "expected {count} replies, got {:?}",
            self.chat.texts()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::state::{VersionTag, WorkflowMode};

    #[tokio::test]
    async fn test_mock_repo_failures_are_one_shot() {
        let repo = MockRepoClient::with_branches(&["main"]);
        repo.fail_branches(RepoError::Transport("down".to_string()));

        assert!(repo.list_branches().await.is_err());
        let branches = repo.list_branches().await.unwrap();
        assert_eq!(branches[0].name, "main");
        assert_eq!(repo.branch_requests(), 2);
    }

    #[tokio::test]
    async fn test_mock_repo_records_failed_dispatch() {
        let repo = MockRepoClient::default();
        repo.fail_dispatch(RepoError::Transport("down".to_string()));
        let request = DispatchRequest {
            branch: "main".to_string(),
            mode: WorkflowMode::Create,
            tag: VersionTag::parse("latest").unwrap(),
        };

        assert!(repo.dispatch_workflow(&request).await.is_err());
        assert!(repo.dispatch_workflow(&request).await.is_ok());
        assert_eq!(repo.dispatched().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_chat_skips_failed_sends() {
        let chat = MockChatClient::new();
        chat.fail_next(ChatError::Transport("offline".to_string()));

        assert!(chat
            .send_message(1, "lost", &ReplyKeyboard::Unchanged)
            .await
            .is_err());
        chat.send_message(1, "kept", &ReplyKeyboard::Remove)
            .await
            .unwrap();

        assert_eq!(chat.texts(), vec!["kept".to_string()]);
        assert_eq!(chat.sent()[0].keyboard, ReplyKeyboard::Remove);
    }
}
