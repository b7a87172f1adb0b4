//! Conversation state types

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

/// Telegram user identifier, used as the session key
pub type UserId = i64;

/// Telegram chat identifier, where replies are delivered
pub type ChatId = i64;

static MODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(create|destroy)$").expect("mode pattern is valid"));

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([0-9]+\.)?([0-9]+\.)?(\*|[0-9]+)|latest)$").expect("tag pattern is valid")
});

// ============================================================================
// Selections
// ============================================================================

/// Workflow mode chosen in the second stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowMode {
    Create,
    Destroy,
}

impl WorkflowMode {
    /// Parse user input; only the exact lowercase words are accepted
    pub fn parse(text: &str) -> Option<Self> {
        if !MODE_PATTERN.is_match(text) {
            return None;
        }
        match text {
            "create" => Some(Self::Create),
            _ => Some(Self::Destroy),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Destroy => "destroy",
        }
    }

    /// Verb used in the confirmation message
    pub fn progressive(self) -> &'static str {
        match self {
            Self::Create => "Creating",
            Self::Destroy => "Destroying",
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application version tag: `latest` or up to three numeric components,
/// the last of which may be `*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn parse(text: &str) -> Option<Self> {
        TAG_PATTERN
            .is_match(text)
            .then(|| Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully assembled workflow trigger. Only constructible once every stage
/// has produced its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub branch: String,
    pub mode: WorkflowMode,
    pub tag: VersionTag,
}

// ============================================================================
// Conversation State
// ============================================================================

/// Per-user conversation state. Each variant carries exactly the
/// selections collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConvState {
    /// No session: never started, or terminated
    #[default]
    Idle,

    /// `/workflow` accepted, branch list request in flight
    FetchingBranches,

    /// Branch keyboard shown, waiting for a branch name
    AwaitingBranch,

    /// Branch stored, waiting for `create` or `destroy`
    AwaitingMode { branch: String },

    /// Branch and mode stored, waiting for a version tag
    AwaitingTag { branch: String, mode: WorkflowMode },

    /// Workflow dispatch in flight
    Dispatching { request: DispatchRequest },
}

impl ConvState {
    /// Whether a session exists (the user is somewhere inside the dialogue)
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            ConvState::AwaitingBranch
                | ConvState::AwaitingMode { .. }
                | ConvState::AwaitingTag { .. }
                | ConvState::Dispatching { .. }
        )
    }

    /// Whether a remote call is outstanding for this conversation
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ConvState::FetchingBranches | ConvState::Dispatching { .. }
        )
    }

    /// Stage name for logs
    pub fn stage(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::FetchingBranches => "fetching_branches",
            ConvState::AwaitingBranch => "awaiting_branch",
            ConvState::AwaitingMode { .. } => "awaiting_mode",
            ConvState::AwaitingTag { .. } => "awaiting_tag",
            ConvState::Dispatching { .. } => "dispatching",
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Workflow dispatch accepted by the repository API
    Dispatched,
    /// Workflow dispatch rejected or unreachable
    DispatchFailed,
    /// Branch list could not be fetched; no session was created
    BranchListFailed,
    /// User sent `/cancel`
    Cancelled,
    /// No input before the session TTL elapsed
    Expired,
}

/// Where a session was started from. Replies for that session go to this
/// chat, whichever chat the runtime was first spawned for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOrigin {
    pub chat_id: ChatId,
    /// Display name of the requester, for operator logs
    pub sender_name: String,
}

impl SessionOrigin {
    pub fn new(chat_id: ChatId, sender_name: impl Into<String>) -> Self {
        Self {
            chat_id,
            sender_name: sender_name.into(),
        }
    }
}

/// Context for a conversation
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub user_id: UserId,
    /// Chat and requester of the current (or most recent) session
    pub origin: SessionOrigin,
    /// Application name used in the confirmation message
    pub app_name: String,
    /// Inactivity period after which a session is dropped; `None` keeps
    /// sessions forever
    pub session_ttl: Option<Duration>,
}

/// Default inactivity period for sessions
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

impl ConvContext {
    pub fn new(user_id: UserId, origin: SessionOrigin, app_name: impl Into<String>) -> Self {
        Self {
            user_id,
            origin,
            app_name: app_name.into(),
            session_ttl: Some(DEFAULT_SESSION_TTL),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.session_ttl = ttl;
        self
    }
}
