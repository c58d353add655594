use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_OPENAI_BASE_URL;

/// Which hosting of the Assistants API a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFlavor {
    /// api.openai.com style: bearer auth, `/v1` prefix.
    OpenAi,
    /// Azure OpenAI style: `api-key` header, `/openai` prefix, `api-version` query.
    Azure { api_version: String },
}

/// Transport configuration for Assistants API requests.
#[derive(Debug, Clone)]
pub struct AssistantsApiConfig {
    /// Secret sent either as bearer token or `api-key` header depending on flavor.
    pub api_key: String,
    pub flavor: ApiFlavor,
    /// Base URL; normalized per flavor before use.
    pub base_url: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional per-request timeout.
    pub timeout: Option<Duration>,
}

impl Default for AssistantsApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            flavor: ApiFlavor::OpenAi,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
        }
    }
}

impl AssistantsApiConfig {
    /// Config for the public OpenAI endpoint.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Config for an Azure OpenAI resource endpoint.
    pub fn azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            flavor: ApiFlavor::Azure {
                api_version: api_version.into(),
            },
            base_url: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    /// Returns the Azure `api-version` when this is an Azure config.
    pub fn api_version(&self) -> Option<&str> {
        match &self.flavor {
            ApiFlavor::OpenAi => None,
            ApiFlavor::Azure { api_version } => Some(api_version.as_str()),
        }
    }
}
