use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use assistant_provider::{BackendError, ConversationHandle, ProviderInitError, RunStatus};
use thiserror::Error;

/// Failure that stops the process before the first prompt.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error while reading settings file {path}: {source}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Backend(#[from] ProviderInitError),
}

impl StartupError {
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }
}

/// Protocol step a turn was at when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    CreatingThread,
    PostingMessage,
    StartingRun,
    PollingRun,
    SubmittingToolOutputs,
    ListingMessages,
}

impl TurnStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatingThread => "creating the thread",
            Self::PostingMessage => "posting the message",
            Self::StartingRun => "starting the run",
            Self::PollingRun => "polling the run",
            Self::SubmittingToolOutputs => "submitting tool outputs",
            Self::ListingMessages => "listing messages",
        }
    }
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Assistant response timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Run {status}: {detail}")]
    RunFailed { status: RunStatus, detail: String },

    #[error("failed to submit tool outputs: {0}")]
    ToolSubmission(#[source] BackendError),

    #[error("turn cancelled")]
    Cancelled,
}

/// A failed turn: what went wrong, where, and the handle to keep using.
#[derive(Debug, Error)]
#[error("{error} (while {stage})")]
pub struct TurnFailure {
    pub stage: TurnStage,
    #[source]
    pub error: TurnError,
    /// Conversation handle as of the failure; `None` only if thread creation failed.
    pub handle: Option<ConversationHandle>,
}

impl TurnFailure {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, TurnError::Cancelled)
    }

    /// User-facing reply for a failed turn.
    #[must_use]
    pub fn reply_text(&self) -> String {
        format!(
            "An error occurred: {self}. Please try again or contact support if the issue persists."
        )
    }
}
