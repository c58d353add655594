//! Terminal chat front end for hosted assistant runs.
//!
//! Each user message is appended to a remote conversation thread, a run is
//! started against the selected assistant, and the run is polled until it
//! reaches a terminal status. Runs that ask for tool outputs are served from
//! a local [`tools::ToolTable`].
//!
//! # Variants
//! - `single`: one assistant fixed by `OPENAI_ASSISTANT_ID`.
//! - `directory`: assistants picked by name from a CSV directory.
//! - `tools`: one assistant plus the fitness tools and the nutrition shortcut.
//!
//! # Configuration
//! Environment variables (a `.env` file is honored) override the optional
//! JSON settings file named by `ASSISTANT_CHAT_CONFIG_PATH`:
//!
//! ```json
//! {
//!   "variant": "directory",
//!   "directory_path": "assistants.csv",
//!   "poll_interval_ms": 1000,
//!   "run_timeout_sec": 60
//! }
//! ```
//!
//! Credentials come from `OPENAI_API_KEY` or, without one, from the key vault
//! named by `AZURE_KEY_VAULT_NAME` after device-code sign-in.

pub mod app;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod nutrition;
pub mod providers;
pub mod runtime;
pub mod tools;
pub mod transcript;

pub use crate::app::{ChatContext, ChatSession, SubmitOutcome};
pub use crate::config::{BackendKind, ChatConfig, Variant};
pub use crate::error::{StartupError, TurnError, TurnFailure, TurnStage};
pub use crate::runtime::{TurnExecutor, TurnOutcome, TurnSettings};
