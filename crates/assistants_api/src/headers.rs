use std::collections::BTreeMap;

use crate::config::{ApiFlavor, AssistantsApiConfig};
use crate::error::AssistantsApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_AZURE_API_KEY: &str = "api-key";
pub const HEADER_OPENAI_BETA: &str = "openai-beta";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Beta opt-in required by the threads/runs endpoints.
pub const ASSISTANTS_BETA: &str = "assistants=v2";

/// Build a deterministic header map for Assistants API requests.
pub fn build_headers(
    config: &AssistantsApiConfig,
) -> Result<BTreeMap<String, String>, AssistantsApiError> {
    let api_key = config.api_key.trim();
    if api_key.is_empty() {
        return Err(AssistantsApiError::MissingApiKey);
    }

    let mut headers = BTreeMap::new();
    match &config.flavor {
        ApiFlavor::OpenAi => {
            headers.insert(
                HEADER_AUTHORIZATION.to_owned(),
                format!("Bearer {api_key}"),
            );
        }
        ApiFlavor::Azure { .. } => {
            headers.insert(HEADER_AZURE_API_KEY.to_owned(), api_key.to_owned());
        }
    }
    headers.insert(HEADER_OPENAI_BETA.to_owned(), ASSISTANTS_BETA.to_owned());
    headers.insert(HEADER_ACCEPT.to_owned(), "application/json".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    let ua = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

fn default_user_agent() -> String {
    format!(
        "assistant-chat/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}
