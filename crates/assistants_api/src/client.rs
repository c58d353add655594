use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ApiFlavor, AssistantsApiConfig};
use crate::error::{parse_error_message, AssistantsApiError};
use crate::headers::build_headers;
use crate::objects::{MessageList, MessageObject, RunObject, ThreadObject};
use crate::payload::{
    CreateMessageRequest, CreateRunRequest, SubmitToolOutputsRequest, ToolOutput,
};
use crate::url::{endpoint_url, normalize_base_url};

#[derive(Debug)]
pub struct AssistantsApiClient {
    http: Client,
    config: AssistantsApiConfig,
}

impl AssistantsApiClient {
    pub fn new(config: AssistantsApiConfig) -> Result<Self, AssistantsApiError> {
        if config.api_key.trim().is_empty() {
            return Err(AssistantsApiError::MissingApiKey);
        }
        if matches!(config.flavor, ApiFlavor::Azure { .. }) && config.base_url.trim().is_empty() {
            return Err(AssistantsApiError::InvalidBaseUrl(
                "Azure endpoint must not be empty".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(AssistantsApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AssistantsApiConfig {
        &self.config
    }

    pub fn normalized_base_url(&self) -> String {
        normalize_base_url(&self.config.base_url, &self.config.flavor)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, AssistantsApiError> {
        let headers = build_headers(&self.config)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    AssistantsApiError::InvalidHeader(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    AssistantsApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    /// Builds a request against `path` relative to the API root, with auth
    /// headers and the Azure `api-version` query applied.
    pub fn build_request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, AssistantsApiError> {
        let url = endpoint_url(&self.config.base_url, &self.config.flavor, path);
        let mut request = self
            .http
            .request(method, url)
            .headers(self.build_headers()?);
        if let Some(api_version) = self.config.api_version() {
            request = request.query(&[("api-version", api_version)]);
        }
        Ok(request)
    }

    pub async fn create_thread(&self) -> Result<ThreadObject, AssistantsApiError> {
        let request = self
            .build_request(Method::POST, "threads")?
            .json(&serde_json::json!({}));
        self.send_json(request).await
    }

    pub async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<MessageObject, AssistantsApiError> {
        let request = self
            .build_request(Method::POST, &format!("threads/{thread_id}/messages"))?
            .json(&CreateMessageRequest::user(content));
        self.send_json(request).await
    }

    pub async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunObject, AssistantsApiError> {
        let request = self
            .build_request(Method::POST, &format!("threads/{thread_id}/runs"))?
            .json(&CreateRunRequest {
                assistant_id: assistant_id.to_string(),
            });
        self.send_json(request).await
    }

    pub async fn retrieve_run(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunObject, AssistantsApiError> {
        let request =
            self.build_request(Method::GET, &format!("threads/{thread_id}/runs/{run_id}"))?;
        self.send_json(request).await
    }

    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> Result<RunObject, AssistantsApiError> {
        let request = self
            .build_request(
                Method::POST,
                &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            )?
            .json(&SubmitToolOutputsRequest { tool_outputs });
        self.send_json(request).await
    }

    pub async fn cancel_run(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunObject, AssistantsApiError> {
        let request = self
            .build_request(
                Method::POST,
                &format!("threads/{thread_id}/runs/{run_id}/cancel"),
            )?
            .json(&serde_json::json!({}));
        self.send_json(request).await
    }

    /// Lists thread messages newest first.
    pub async fn list_messages(&self, thread_id: &str) -> Result<MessageList, AssistantsApiError> {
        let request = self
            .build_request(Method::GET, &format!("threads/{thread_id}/messages"))?
            .query(&[("order", "desc")]);
        self.send_json(request).await
    }

    async fn send_json<T>(&self, request: RequestBuilder) -> Result<T, AssistantsApiError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "assistants api response");

        let body = response.text().await?;
        if !status.is_success() {
            return Err(AssistantsApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        serde_json::from_str(&body).map_err(AssistantsApiError::from)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::AssistantsApiClient;
    use crate::config::AssistantsApiConfig;
    use crate::error::AssistantsApiError;

    #[test]
    fn new_rejects_blank_api_key() {
        let error = AssistantsApiClient::new(AssistantsApiConfig::openai("  "))
            .expect_err("blank key must be rejected");
        assert!(matches!(error, AssistantsApiError::MissingApiKey));
    }

    #[test]
    fn new_rejects_blank_azure_endpoint() {
        let error = AssistantsApiClient::new(AssistantsApiConfig::azure("", "key", "2024-05-01"))
            .expect_err("blank azure endpoint must be rejected");
        assert!(matches!(error, AssistantsApiError::InvalidBaseUrl(_)));
    }

    #[test]
    fn azure_requests_carry_api_version_query() {
        let client = AssistantsApiClient::new(AssistantsApiConfig::azure(
            "https://res.openai.azure.com/",
            "key",
            "2024-05-01-preview",
        ))
        .expect("client");

        let request = client
            .build_request(Method::GET, "threads/t1/runs/r1")
            .expect("request builder")
            .build()
            .expect("request");

        assert_eq!(
            request.url().as_str(),
            "https://res.openai.azure.com/openai/threads/t1/runs/r1?api-version=2024-05-01-preview"
        );
    }

    #[test]
    fn openai_requests_have_no_query() {
        let client =
            AssistantsApiClient::new(AssistantsApiConfig::openai("sk-test")).expect("client");

        let request = client
            .build_request(Method::POST, "threads")
            .expect("request builder")
            .build()
            .expect("request");

        assert_eq!(request.url().as_str(), "https://api.openai.com/v1/threads");
        assert_eq!(request.method(), "POST");
    }
}
