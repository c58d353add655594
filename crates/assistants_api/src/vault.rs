//! Key-vault credential fetch behind a device-code sign-in.
//!
//! The flow is: request a device code from the identity endpoint, show the
//! user code to the operator, poll the token endpoint until sign-in finishes,
//! then read the endpoint, API key and API version secrets from the vault.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{parse_error_message, AssistantsApiError};

pub const DEFAULT_LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_TENANT: &str = "organizations";
/// Public client id of the Azure CLI, usable for device-code sign-in.
pub const DEFAULT_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";
pub const KEY_VAULT_API_VERSION: &str = "7.4";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP_SEC: u64 = 5;

/// Names of the vault secrets holding the Azure OpenAI connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSecretNames {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
}

impl Default for VaultSecretNames {
    fn default() -> Self {
        Self {
            endpoint: "openai-endpoint".to_string(),
            api_key: "openai-api-key".to_string(),
            api_version: "openai-api-version".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub vault_name: String,
    pub tenant_id: String,
    pub client_id: String,
    pub login_base_url: String,
    /// Overrides `https://{vault_name}.vault.azure.net`.
    pub vault_base_url: Option<String>,
    pub secret_names: VaultSecretNames,
    pub timeout: Option<Duration>,
}

impl VaultConfig {
    pub fn new(vault_name: impl Into<String>) -> Self {
        Self {
            vault_name: vault_name.into(),
            tenant_id: DEFAULT_TENANT.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            login_base_url: DEFAULT_LOGIN_BASE_URL.to_string(),
            vault_base_url: None,
            secret_names: VaultSecretNames::default(),
            timeout: None,
        }
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_login_base_url(mut self, login_base_url: impl Into<String>) -> Self {
        self.login_base_url = login_base_url.into();
        self
    }

    pub fn with_vault_base_url(mut self, vault_base_url: impl Into<String>) -> Self {
        self.vault_base_url = Some(vault_base_url.into());
        self
    }

    pub fn with_secret_names(mut self, secret_names: VaultSecretNames) -> Self {
        self.secret_names = secret_names;
        self
    }

    pub fn vault_url(&self) -> String {
        match self.vault_base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("https://{}.vault.azure.net", self.vault_name.trim()),
        }
    }

    fn identity_url(&self, leaf: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{leaf}",
            self.login_base_url.trim().trim_end_matches('/'),
            self.tenant_id.trim()
        )
    }
}

/// Connection values read from the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSecrets {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
}

/// What the operator must do to finish device-code sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCodePrompt {
    pub user_code: String,
    pub verification_uri: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default = "default_poll_interval")]
    interval: u64,
    #[serde(default)]
    message: Option<String>,
}

fn default_poll_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug)]
pub struct KeyVaultClient {
    http: Client,
    config: VaultConfig,
}

impl KeyVaultClient {
    pub fn new(config: VaultConfig) -> Result<Self, AssistantsApiError> {
        if config.vault_name.trim().is_empty() && config.vault_base_url.is_none() {
            return Err(AssistantsApiError::InvalidBaseUrl(
                "key vault name must not be empty".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(AssistantsApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Signs in with a device code and reads the three connection secrets.
    pub async fn fetch_secrets<F>(&self, on_prompt: F) -> Result<VaultSecrets, AssistantsApiError>
    where
        F: FnOnce(&DeviceCodePrompt),
    {
        let token = self.sign_in(on_prompt).await?;
        let names = &self.config.secret_names;

        Ok(VaultSecrets {
            endpoint: self.get_secret(&token, &names.endpoint).await?,
            api_key: self.get_secret(&token, &names.api_key).await?,
            api_version: self.get_secret(&token, &names.api_version).await?,
        })
    }

    /// Runs the device-code flow and returns a vault access token.
    pub async fn sign_in<F>(&self, on_prompt: F) -> Result<String, AssistantsApiError>
    where
        F: FnOnce(&DeviceCodePrompt),
    {
        let device = self.request_device_code().await?;
        let message = device.message.clone().unwrap_or_else(|| {
            format!(
                "To sign in, open {} and enter the code {}",
                device.verification_uri, device.user_code
            )
        });
        on_prompt(&DeviceCodePrompt {
            user_code: device.user_code.clone(),
            verification_uri: device.verification_uri.clone(),
            message,
        });

        self.poll_for_token(&device).await
    }

    /// Reads one secret's current value.
    pub async fn get_secret(&self, token: &str, name: &str) -> Result<String, AssistantsApiError> {
        let url = format!("{}/secrets/{}", self.config.vault_url(), name.trim());
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AssistantsApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        let bundle: SecretBundle = serde_json::from_str(&body)?;
        bundle
            .value
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AssistantsApiError::MissingSecret(name.to_string()))
    }

    async fn request_device_code(&self) -> Result<DeviceCodeResponse, AssistantsApiError> {
        let response = self
            .http
            .post(self.config.identity_url("devicecode"))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", KEY_VAULT_SCOPE),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AssistantsApiError::DeviceCode(parse_error_message(
                status, &body,
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn poll_for_token(
        &self,
        device: &DeviceCodeResponse,
    ) -> Result<String, AssistantsApiError> {
        let deadline = Instant::now() + Duration::from_secs(device.expires_in);
        let mut interval = device.interval;

        loop {
            let response = self
                .http
                .post(self.config.identity_url("token"))
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.config.client_id.as_str()),
                    ("device_code", device.device_code.as_str()),
                ])
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;

            if status.is_success() {
                let token: TokenResponse = serde_json::from_str(&body)?;
                info!("device code sign-in completed");
                return Ok(token.access_token);
            }

            let pending = pending_reason(status, &body)?;
            if pending == PendingReason::SlowDown {
                interval += SLOW_DOWN_STEP_SEC;
            }
            if Instant::now() >= deadline {
                return Err(AssistantsApiError::DeviceCode(
                    "device code expired before sign-in completed".to_string(),
                ));
            }
            debug!(interval, "waiting for device code sign-in");
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingReason {
    AuthorizationPending,
    SlowDown,
}

fn pending_reason(status: StatusCode, body: &str) -> Result<PendingReason, AssistantsApiError> {
    let Ok(error) = serde_json::from_str::<TokenErrorResponse>(body) else {
        return Err(AssistantsApiError::DeviceCode(parse_error_message(
            status, body,
        )));
    };

    match error.error.as_str() {
        "authorization_pending" => Ok(PendingReason::AuthorizationPending),
        "slow_down" => Ok(PendingReason::SlowDown),
        other => Err(AssistantsApiError::DeviceCode(
            error
                .error_description
                .filter(|description| !description.trim().is_empty())
                .unwrap_or_else(|| other.to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{pending_reason, PendingReason, VaultConfig};
    use crate::error::AssistantsApiError;

    #[test]
    fn vault_url_defaults_to_vault_name_host() {
        let config = VaultConfig::new("ClassWeatherApi");
        assert_eq!(config.vault_url(), "https://ClassWeatherApi.vault.azure.net");

        let config = config.with_vault_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.vault_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn pending_reason_distinguishes_pending_and_slow_down() {
        assert_eq!(
            pending_reason(
                StatusCode::BAD_REQUEST,
                r#"{"error":"authorization_pending"}"#
            )
            .expect("pending"),
            PendingReason::AuthorizationPending
        );
        assert_eq!(
            pending_reason(StatusCode::BAD_REQUEST, r#"{"error":"slow_down"}"#)
                .expect("slow down"),
            PendingReason::SlowDown
        );
    }

    #[test]
    fn pending_reason_reports_terminal_errors_with_description() {
        let error = pending_reason(
            StatusCode::BAD_REQUEST,
            r#"{"error":"expired_token","error_description":"AADSTS70020: expired"}"#,
        )
        .expect_err("expired token is terminal");

        assert!(
            matches!(error, AssistantsApiError::DeviceCode(ref message) if message.contains("AADSTS70020"))
        );
    }
}
