//! Transport-only Assistants API client primitives.
//!
//! This crate owns request building and response parsing for the hosted
//! threads/messages/runs endpoints, in both the OpenAI and the Azure flavor,
//! plus the key-vault credential fetch used when no direct API key exists.
//! It contains no polling policy and no chat/session coupling.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod objects;
pub mod payload;
pub mod url;
pub mod vault;

pub use client::AssistantsApiClient;
pub use config::{ApiFlavor, AssistantsApiConfig};
pub use error::AssistantsApiError;
pub use objects::{
    MessageContent, MessageList, MessageObject, RunLastError, RunObject, RunStatus, ThreadObject,
    ToolCallObject,
};
pub use payload::ToolOutput;
pub use url::{endpoint_url, normalize_base_url};
pub use vault::{DeviceCodePrompt, KeyVaultClient, VaultConfig, VaultSecretNames, VaultSecrets};
