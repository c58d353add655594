//! Assistants API-backed implementation of the shared `assistant_provider` contract.
//!
//! This adapter translates `assistants_api` wire objects into the
//! provider-neutral thread/run vocabulary expected by `assistant_chat`.

use assistant_provider::{
    AssistantBackend, BackendError, ConversationHandle, MessageRole, ProviderInitError,
    ProviderProfile, RunSnapshot, RunStatus, ThreadMessage, ToolCallRequest, ToolResult,
};
use assistants_api::{
    ApiFlavor, AssistantsApiClient, AssistantsApiConfig, AssistantsApiError, MessageObject,
    RunLastError, RunObject, RunStatus as WireRunStatus, ToolOutput,
};
use async_trait::async_trait;
use tracing::debug;

/// Stable provider identifier used by `assistant_chat` startup selection.
pub const API_PROVIDER_ID: &str = "api";
pub const AZURE_PROVIDER_ID: &str = "azure";

/// `AssistantBackend` adapter backed by `assistants_api` transport primitives.
#[derive(Debug)]
pub struct ApiBackend {
    client: AssistantsApiClient,
}

impl ApiBackend {
    /// Creates a backend using real Assistants API transport.
    pub fn new(config: AssistantsApiConfig) -> Result<Self, ProviderInitError> {
        let client = AssistantsApiClient::new(config).map_err(map_init_error)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssistantBackend for ApiBackend {
    fn profile(&self) -> ProviderProfile {
        let provider_id = match self.client.config().flavor {
            ApiFlavor::OpenAi => API_PROVIDER_ID,
            ApiFlavor::Azure { .. } => AZURE_PROVIDER_ID,
        };
        ProviderProfile {
            provider_id: provider_id.to_string(),
            endpoint: self.client.normalized_base_url(),
        }
    }

    async fn create_thread(&self) -> Result<ConversationHandle, BackendError> {
        let thread = self
            .client
            .create_thread()
            .await
            .map_err(map_backend_error)?;
        debug!(thread_id = %thread.id, "created thread");
        Ok(ConversationHandle::new(thread.id))
    }

    async fn post_user_message(
        &self,
        thread: &ConversationHandle,
        text: &str,
    ) -> Result<(), BackendError> {
        self.client
            .create_message(thread.as_str(), text)
            .await
            .map(|_| ())
            .map_err(map_backend_error)
    }

    async fn start_run(
        &self,
        thread: &ConversationHandle,
        assistant_id: &str,
    ) -> Result<RunSnapshot, BackendError> {
        self.client
            .create_run(thread.as_str(), assistant_id)
            .await
            .map(run_snapshot)
            .map_err(map_backend_error)
    }

    async fn retrieve_run(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<RunSnapshot, BackendError> {
        self.client
            .retrieve_run(thread.as_str(), run_id)
            .await
            .map(run_snapshot)
            .map_err(map_backend_error)
    }

    async fn submit_tool_outputs(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
        results: Vec<ToolResult>,
    ) -> Result<RunSnapshot, BackendError> {
        let outputs = results
            .iter()
            .map(|result| ToolOutput {
                tool_call_id: result.call_id.clone(),
                output: result.output(),
            })
            .collect();

        self.client
            .submit_tool_outputs(thread.as_str(), run_id, outputs)
            .await
            .map(run_snapshot)
            .map_err(map_backend_error)
    }

    async fn list_messages(
        &self,
        thread: &ConversationHandle,
    ) -> Result<Vec<ThreadMessage>, BackendError> {
        let list = self
            .client
            .list_messages(thread.as_str())
            .await
            .map_err(map_backend_error)?;
        Ok(list.data.iter().map(thread_message).collect())
    }

    async fn cancel_run(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<RunSnapshot, BackendError> {
        let run = self
            .client
            .cancel_run(thread.as_str(), run_id)
            .await
            .map_err(map_backend_error)?;
        debug!(run_id = %run.id, status = run.status.as_str(), "requested run cancellation");
        Ok(run_snapshot(run))
    }
}

fn run_snapshot(run: RunObject) -> RunSnapshot {
    let tool_calls = run
        .tool_calls()
        .iter()
        .map(|call| ToolCallRequest {
            call_id: call.id.clone(),
            tool_name: call.function.name.clone(),
            arguments: call.function.arguments.clone(),
        })
        .collect();

    RunSnapshot {
        run_id: run.id,
        status: map_status(run.status),
        last_error: run.last_error.as_ref().and_then(describe_last_error),
        tool_calls,
    }
}

fn map_status(status: WireRunStatus) -> RunStatus {
    match status {
        WireRunStatus::Queued => RunStatus::Queued,
        WireRunStatus::InProgress => RunStatus::InProgress,
        WireRunStatus::RequiresAction => RunStatus::RequiresAction,
        WireRunStatus::Cancelling => RunStatus::Cancelling,
        WireRunStatus::Cancelled => RunStatus::Cancelled,
        WireRunStatus::Failed => RunStatus::Failed,
        WireRunStatus::Completed => RunStatus::Completed,
        WireRunStatus::Incomplete => RunStatus::Incomplete,
        WireRunStatus::Expired => RunStatus::Expired,
    }
}

fn describe_last_error(error: &RunLastError) -> Option<String> {
    let code = error.code.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let message = error
        .message
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (code, message) {
        (Some(code), Some(message)) => Some(format!("{code}: {message}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}

fn thread_message(message: &MessageObject) -> ThreadMessage {
    let role = if message.role == "user" {
        MessageRole::User
    } else {
        MessageRole::Assistant
    };
    ThreadMessage {
        role,
        text: message.first_text().map(str::to_string),
    }
}

fn map_init_error(error: AssistantsApiError) -> ProviderInitError {
    ProviderInitError::new(format!(
        "Failed to initialize assistants api backend: {error}"
    ))
}

fn map_backend_error(error: AssistantsApiError) -> BackendError {
    BackendError::new(format!("Assistants API request failed: {error}"))
}

#[cfg(test)]
mod tests {
    use assistants_api::RunLastError;

    use super::*;

    #[test]
    fn last_error_joins_code_and_message() {
        let both = RunLastError {
            code: Some("rate_limit_exceeded".to_string()),
            message: Some("Slow down".to_string()),
        };
        assert_eq!(
            describe_last_error(&both).as_deref(),
            Some("rate_limit_exceeded: Slow down")
        );

        let message_only = RunLastError {
            code: None,
            message: Some("server_error".to_string()),
        };
        assert_eq!(
            describe_last_error(&message_only).as_deref(),
            Some("server_error")
        );

        let empty = RunLastError {
            code: Some(" ".to_string()),
            message: None,
        };
        assert_eq!(describe_last_error(&empty), None);
    }

    #[test]
    fn every_wire_status_maps_to_same_named_status() {
        for wire in [
            WireRunStatus::Queued,
            WireRunStatus::InProgress,
            WireRunStatus::RequiresAction,
            WireRunStatus::Cancelling,
            WireRunStatus::Cancelled,
            WireRunStatus::Failed,
            WireRunStatus::Completed,
            WireRunStatus::Incomplete,
            WireRunStatus::Expired,
        ] {
            assert_eq!(map_status(wire).as_str(), wire.as_str());
        }
    }

    #[test]
    fn blank_api_key_is_an_init_error() {
        let error = ApiBackend::new(AssistantsApiConfig::openai(""))
            .expect_err("blank key must be rejected");
        assert!(error.message().contains("assistants api backend"));
    }

    #[test]
    fn profile_reports_flavor_and_normalized_endpoint() {
        let openai = ApiBackend::new(AssistantsApiConfig::openai("sk-test")).expect("backend");
        assert_eq!(openai.profile().provider_id, API_PROVIDER_ID);
        assert_eq!(openai.profile().endpoint, "https://api.openai.com/v1");

        let azure = ApiBackend::new(AssistantsApiConfig::azure(
            "https://res.openai.azure.com",
            "az-key",
            "2024-05-01-preview",
        ))
        .expect("backend");
        assert_eq!(azure.profile().provider_id, AZURE_PROVIDER_ID);
        assert_eq!(azure.profile().endpoint, "https://res.openai.azure.com/openai");
    }
}
