//! Startup credential resolution.
//!
//! A direct `OPENAI_API_KEY` selects the OpenAI flavor. Without one, the
//! Azure OpenAI connection is read from a key vault after device-code
//! sign-in.

use std::time::Duration;

use assistants_api::{AssistantsApiConfig, DeviceCodePrompt, KeyVaultClient, VaultConfig};
use tracing::info;

use crate::config::{ChatConfig, VAULT_NAME_ENV};
use crate::error::StartupError;

/// Per-request ceiling for the assistants HTTP client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Credentials {
    pub api: AssistantsApiConfig,
    /// Fixed assistant; `None` only for the directory variant.
    pub assistant_id: Option<String>,
}

/// Resolves the API connection and assistant id for `config`.
///
/// The assistant id is checked before any interactive sign-in starts.
pub async fn resolve_credentials<F>(
    config: &ChatConfig,
    on_prompt: F,
) -> Result<Credentials, StartupError>
where
    F: FnOnce(&DeviceCodePrompt),
{
    let assistant_id = required_assistant_id(config)?;

    let api = match config.openai_api_key.as_deref() {
        Some(api_key) => {
            info!("using direct OpenAI API key");
            openai_config(api_key, config.openai_base_url.as_deref())
        }
        None => {
            let vault = vault_config(config).ok_or_else(|| {
                StartupError::authentication(format!(
                    "no OPENAI_API_KEY is set and {VAULT_NAME_ENV} names no key vault"
                ))
            })?;
            fetch_azure_config(vault, on_prompt).await?
        }
    };

    Ok(Credentials { api, assistant_id })
}

/// Assistant id from config, required unless the variant picks it from the directory.
pub fn required_assistant_id(config: &ChatConfig) -> Result<Option<String>, StartupError> {
    match config.assistant_id.clone() {
        Some(id) => Ok(Some(id)),
        None if config.variant.needs_assistant_id() => Err(StartupError::configuration(
            format!(
                "OPENAI_ASSISTANT_ID is required for the {} variant",
                config.variant.as_str()
            ),
        )),
        None => Ok(None),
    }
}

#[must_use]
pub fn openai_config(api_key: &str, base_url: Option<&str>) -> AssistantsApiConfig {
    let config = AssistantsApiConfig::openai(api_key.trim()).with_timeout(REQUEST_TIMEOUT);
    match base_url {
        Some(base_url) => config.with_base_url(base_url.trim()),
        None => config,
    }
}

#[must_use]
pub fn vault_config(config: &ChatConfig) -> Option<VaultConfig> {
    let mut vault = VaultConfig::new(config.vault.vault_name.as_deref()?.trim());
    if let Some(tenant_id) = config.vault.tenant_id.as_deref() {
        vault = vault.with_tenant_id(tenant_id.trim());
    }
    if let Some(client_id) = config.vault.client_id.as_deref() {
        vault = vault.with_client_id(client_id.trim());
    }
    Some(vault)
}

/// Signs in against the vault and builds an Azure-flavored API config.
pub async fn fetch_azure_config<F>(
    vault: VaultConfig,
    on_prompt: F,
) -> Result<AssistantsApiConfig, StartupError>
where
    F: FnOnce(&DeviceCodePrompt),
{
    let vault_name = vault.vault_name.clone();
    let client = KeyVaultClient::new(vault).map_err(|error| {
        StartupError::authentication(format!("failed to create key vault client: {error}"))
    })?;
    let secrets = client.fetch_secrets(on_prompt).await.map_err(|error| {
        StartupError::authentication(format!(
            "failed to read credentials from key vault '{vault_name}': {error}"
        ))
    })?;

    info!(vault = %vault_name, "using Azure OpenAI credentials from key vault");
    Ok(
        AssistantsApiConfig::azure(secrets.endpoint, secrets.api_key, secrets.api_version)
            .with_timeout(REQUEST_TIMEOUT),
    )
}

#[cfg(test)]
mod tests {
    use assistants_api::ApiFlavor;

    use super::*;
    use crate::config::{Variant, VaultSettings};

    fn config(variant: Variant, api_key: Option<&str>, assistant_id: Option<&str>) -> ChatConfig {
        ChatConfig {
            variant,
            openai_api_key: api_key.map(str::to_string),
            assistant_id: assistant_id.map(str::to_string),
            ..ChatConfig::default()
        }
    }

    #[tokio::test]
    async fn api_key_selects_openai_flavor() {
        let mut config = config(Variant::Single, Some("sk-test"), Some("asst_1"));
        config.openai_base_url = Some("http://localhost:8080".to_string());

        let credentials = resolve_credentials(&config, |_| panic!("no sign-in expected"))
            .await
            .expect("credentials");

        assert_eq!(credentials.api.flavor, ApiFlavor::OpenAi);
        assert_eq!(credentials.api.api_key, "sk-test");
        assert_eq!(credentials.api.base_url, "http://localhost:8080");
        assert_eq!(credentials.api.timeout, Some(REQUEST_TIMEOUT));
        assert_eq!(credentials.assistant_id.as_deref(), Some("asst_1"));
    }

    #[tokio::test]
    async fn missing_assistant_id_is_a_configuration_error_for_single_and_tools() {
        for variant in [Variant::Single, Variant::Tools] {
            let error = resolve_credentials(&config(variant, Some("sk-test"), None), |_| {})
                .await
                .expect_err("assistant id required");
            assert!(matches!(error, StartupError::Configuration(_)), "{error}");
        }
    }

    #[tokio::test]
    async fn directory_variant_needs_no_assistant_id() {
        let credentials =
            resolve_credentials(&config(Variant::Directory, Some("sk-test"), None), |_| {})
                .await
                .expect("credentials");

        assert!(credentials.assistant_id.is_none());
    }

    #[tokio::test]
    async fn no_key_and_no_vault_is_an_authentication_error() {
        let error = resolve_credentials(&config(Variant::Single, None, Some("asst_1")), |_| {})
            .await
            .expect_err("no credential path");

        assert!(matches!(error, StartupError::Authentication(_)), "{error}");
    }

    #[test]
    fn vault_config_applies_tenant_and_client_overrides() {
        let mut config = config(Variant::Single, None, Some("asst_1"));
        config.vault = VaultSettings {
            vault_name: Some("ClassWeatherAPI".to_string()),
            tenant_id: Some("tenant-1".to_string()),
            client_id: None,
        };

        let vault = vault_config(&config).expect("vault config");

        assert_eq!(vault.vault_name, "ClassWeatherAPI");
        assert_eq!(vault.tenant_id, "tenant-1");
        assert_eq!(vault.client_id, assistants_api::vault::DEFAULT_CLIENT_ID);
    }
}
