//! Minimal provider-agnostic contract for driving remote assistant runs.
//!
//! This crate defines the thread/run/tool-call vocabulary shared by the turn
//! executor and the backends. It excludes transport details, polling policy
//! and transcript concerns.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

use async_trait::async_trait;
use serde_json::Value;

/// Shared cancellation flag for a turn.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing/configuring a backend before any turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Error returned by a single backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Opaque identifier of a server-side conversation (thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationHandle(String);

impl ConversationHandle {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConversationHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConversationHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle status of a remote run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl RunStatus {
    /// Returns true when the run will make no further progress on its own.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Expired | Self::Cancelled | Self::Incomplete
        )
    }

    /// Returns true when polling should stop: terminal, or waiting on the caller.
    #[must_use]
    pub fn stops_polling(self) -> bool {
        self.is_terminal() || self == Self::RequiresAction
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider request envelope for one host tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_name: String,
    /// JSON-encoded argument object as sent by the remote run.
    pub arguments: String,
}

impl ToolCallRequest {
    /// Decodes the argument payload.
    pub fn parse_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// Host tool call result returned back to the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub is_error: bool,
    pub content: Value,
}

impl ToolResult {
    /// Constructs a successful tool result.
    #[must_use]
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            is_error: false,
            content: content.into(),
        }
    }

    /// Constructs a tool error result.
    #[must_use]
    pub fn error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            is_error: true,
            content: content.into(),
        }
    }

    /// JSON-encoded output string submitted to the run.
    #[must_use]
    pub fn output(&self) -> String {
        self.content.to_string()
    }
}

/// Generic host-mediated tool definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Point-in-time view of a remote run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub run_id: String,
    pub status: RunStatus,
    /// Remote-provided failure detail, when the run failed or expired.
    pub last_error: Option<String>,
    /// Tool calls awaiting results; only populated in `RequiresAction`.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl RunSnapshot {
    #[must_use]
    pub fn new(run_id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            run_id: run_id.into(),
            status,
            last_error: None,
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

/// One message of a conversation as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub role: MessageRole,
    /// First text part, if the message has one.
    pub text: Option<String>,
}

/// Immutable metadata describing a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub endpoint: String,
}

/// Backend interface for the remote thread/run protocol.
///
/// Every method is one remote round trip; polling, tool dispatch and
/// timeouts belong to the caller.
#[async_trait]
pub trait AssistantBackend: Send + Sync + 'static {
    /// Returns provider identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Creates a new empty conversation.
    async fn create_thread(&self) -> Result<ConversationHandle, BackendError>;

    /// Appends a user-authored message to the conversation.
    async fn post_user_message(
        &self,
        thread: &ConversationHandle,
        text: &str,
    ) -> Result<(), BackendError>;

    /// Starts a run of `assistant_id` against the conversation.
    async fn start_run(
        &self,
        thread: &ConversationHandle,
        assistant_id: &str,
    ) -> Result<RunSnapshot, BackendError>;

    /// Re-fetches the current state of a run.
    async fn retrieve_run(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<RunSnapshot, BackendError>;

    /// Submits one batch of tool results to a run waiting on them.
    async fn submit_tool_outputs(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
        results: Vec<ToolResult>,
    ) -> Result<RunSnapshot, BackendError>;

    /// Lists conversation messages, newest first.
    async fn list_messages(
        &self,
        thread: &ConversationHandle,
    ) -> Result<Vec<ThreadMessage>, BackendError>;

    /// Asks the remote side to stop a run so the thread accepts new messages.
    async fn cancel_run(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<RunSnapshot, BackendError>;
}
