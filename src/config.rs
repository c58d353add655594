//! Environment and settings-file configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assistant_directory::DEFAULT_DIRECTORY_FILE;
use serde::Deserialize;

use crate::error::StartupError;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const ASSISTANT_ID_ENV: &str = "OPENAI_ASSISTANT_ID";
pub const VARIANT_ENV: &str = "ASSISTANT_CHAT_VARIANT";
pub const DIRECTORY_ENV: &str = "ASSISTANT_CHAT_DIRECTORY";
pub const POLL_INTERVAL_ENV: &str = "ASSISTANT_CHAT_POLL_INTERVAL_MS";
pub const RUN_TIMEOUT_ENV: &str = "ASSISTANT_CHAT_RUN_TIMEOUT_SEC";
pub const BACKEND_ENV: &str = "ASSISTANT_CHAT_BACKEND";
pub const SETTINGS_PATH_ENV: &str = "ASSISTANT_CHAT_CONFIG_PATH";
pub const VAULT_NAME_ENV: &str = "AZURE_KEY_VAULT_NAME";
pub const TENANT_ID_ENV: &str = "AZURE_TENANT_ID";
pub const CLIENT_ID_ENV: &str = "AZURE_CLIENT_ID";
pub const RAPIDAPI_KEY_ENV: &str = "RAPIDAPI_KEY";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(60);

/// Which flavor of chat the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// One fixed assistant from `OPENAI_ASSISTANT_ID`.
    #[default]
    Single,
    /// Assistant chosen by name from the directory file.
    Directory,
    /// Fixed assistant plus local tools and the nutrition shortcut.
    Tools,
}

impl Variant {
    pub fn parse(value: &str) -> Result<Self, StartupError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "directory" => Ok(Self::Directory),
            "tools" => Ok(Self::Tools),
            other => Err(StartupError::configuration(format!(
                "unsupported variant '{other}'; expected single, directory or tools"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Directory => "directory",
            Self::Tools => "tools",
        }
    }

    /// Whether a fixed assistant id must be configured.
    #[must_use]
    pub fn needs_assistant_id(self) -> bool {
        !matches!(self, Self::Directory)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Api,
    Mock,
}

impl BackendKind {
    pub fn parse(value: &str) -> Result<Self, StartupError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "mock" => Ok(Self::Mock),
            other => Err(StartupError::configuration(format!(
                "unsupported backend '{other}'; expected api or mock"
            ))),
        }
    }
}

/// Key-vault coordinates for the device-code credential path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VaultSettings {
    pub vault_name: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
}

/// Optional JSON settings file. Environment values win over file values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub variant: Option<String>,
    pub directory_path: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub run_timeout_sec: Option<u64>,
}

impl SettingsFile {
    pub fn read(path: &Path) -> Result<Self, StartupError> {
        let raw = fs::read_to_string(path).map_err(|source| StartupError::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| StartupError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub variant: Variant,
    pub backend: BackendKind,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub assistant_id: Option<String>,
    pub directory_path: PathBuf,
    pub poll_interval: Duration,
    pub run_timeout: Duration,
    pub vault: VaultSettings,
    pub rapidapi_key: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            backend: BackendKind::default(),
            openai_api_key: None,
            openai_base_url: None,
            assistant_id: None,
            directory_path: PathBuf::from(DEFAULT_DIRECTORY_FILE),
            poll_interval: DEFAULT_POLL_INTERVAL,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            vault: VaultSettings::default(),
            rapidapi_key: None,
        }
    }
}

impl ChatConfig {
    /// Reads the process environment, plus the settings file it names.
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(env_string_opt)
    }

    /// Builds a config from `lookup`, which returns non-blank values only.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match lookup(SETTINGS_PATH_ENV) {
            Some(path) => SettingsFile::read(Path::new(&path))?,
            None => SettingsFile::default(),
        };

        let mut config = Self::default();

        if let Some(variant) = lookup(VARIANT_ENV).or(file.variant) {
            config.variant = Variant::parse(&variant)?;
        }
        if let Some(backend) = lookup(BACKEND_ENV) {
            config.backend = BackendKind::parse(&backend)?;
        }
        if let Some(path) = lookup(DIRECTORY_ENV).or(file.directory_path) {
            config.directory_path = PathBuf::from(path);
        }

        let poll_ms = match lookup(POLL_INTERVAL_ENV) {
            Some(raw) => Some(parse_positive(POLL_INTERVAL_ENV, &raw)?),
            None => file.poll_interval_ms,
        };
        if let Some(poll_ms) = poll_ms {
            config.poll_interval =
                Duration::from_millis(require_positive("poll_interval_ms", poll_ms)?);
        }

        let timeout_sec = match lookup(RUN_TIMEOUT_ENV) {
            Some(raw) => Some(parse_positive(RUN_TIMEOUT_ENV, &raw)?),
            None => file.run_timeout_sec,
        };
        if let Some(timeout_sec) = timeout_sec {
            config.run_timeout =
                Duration::from_secs(require_positive("run_timeout_sec", timeout_sec)?);
        }

        config.openai_api_key = lookup(OPENAI_API_KEY_ENV);
        config.openai_base_url = lookup(OPENAI_BASE_URL_ENV);
        config.assistant_id = lookup(ASSISTANT_ID_ENV).map(|id| id.trim().to_string());
        config.vault = VaultSettings {
            vault_name: lookup(VAULT_NAME_ENV),
            tenant_id: lookup(TENANT_ID_ENV),
            client_id: lookup(CLIENT_ID_ENV),
        };
        config.rapidapi_key = lookup(RAPIDAPI_KEY_ENV);

        Ok(config)
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, StartupError> {
    let value = raw.trim().parse::<u64>().map_err(|_| {
        StartupError::configuration(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    require_positive(key, value)
}

fn require_positive(key: &str, value: u64) -> Result<u64, StartupError> {
    if value == 0 {
        return Err(StartupError::configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(value)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env;
    use std::io::Write;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use super::*;

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    fn config_from(pairs: &[(&str, &str)]) -> Result<ChatConfig, StartupError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ChatConfig::from_lookup(|key| values.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).expect("defaults");

        assert_eq!(config, ChatConfig::default());
        assert_eq!(config.variant, Variant::Single);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.run_timeout, Duration::from_secs(60));
        assert_eq!(config.directory_path, PathBuf::from("assistants.csv"));
    }

    #[test]
    fn env_values_are_read_and_parsed() {
        let config = config_from(&[
            (VARIANT_ENV, "Tools"),
            (BACKEND_ENV, "mock"),
            (POLL_INTERVAL_ENV, "250"),
            (RUN_TIMEOUT_ENV, "5"),
            (ASSISTANT_ID_ENV, " asst_1 "),
            (VAULT_NAME_ENV, "ClassWeatherApi"),
            (RAPIDAPI_KEY_ENV, "rapid"),
        ])
        .expect("config");

        assert_eq!(config.variant, Variant::Tools);
        assert_eq!(config.backend, BackendKind::Mock);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.run_timeout, Duration::from_secs(5));
        assert_eq!(config.assistant_id.as_deref(), Some("asst_1"));
        assert_eq!(config.vault.vault_name.as_deref(), Some("ClassWeatherApi"));
        assert_eq!(config.rapidapi_key.as_deref(), Some("rapid"));
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        for pairs in [
            [(VARIANT_ENV, "dropdown")],
            [(BACKEND_ENV, "grpc")],
            [(POLL_INTERVAL_ENV, "fast")],
            [(RUN_TIMEOUT_ENV, "0")],
        ] {
            let error = config_from(&pairs).expect_err("invalid value must fail");
            assert!(matches!(error, StartupError::Configuration(_)), "{error}");
        }
    }

    #[test]
    fn settings_file_supplies_values_and_env_overrides_them() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"variant": "directory", "directory_path": "team.csv", "poll_interval_ms": 500, "run_timeout_sec": 30}}"#
        )
        .expect("write settings");
        let path = file.path().display().to_string();

        let config = config_from(&[(SETTINGS_PATH_ENV, path.as_str()), (RUN_TIMEOUT_ENV, "90")])
            .expect("config");

        assert_eq!(config.variant, Variant::Directory);
        assert_eq!(config.directory_path, PathBuf::from("team.csv"));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.run_timeout, Duration::from_secs(90));
    }

    #[test]
    fn settings_file_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"variant": "single", "model": "gpt-4o"}}"#).expect("write settings");
        let path = file.path().display().to_string();

        let error = config_from(&[(SETTINGS_PATH_ENV, path.as_str())]).expect_err("unknown field");

        assert!(matches!(error, StartupError::SettingsParse { .. }), "{error}");
    }

    #[test]
    fn missing_settings_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.json").display().to_string();

        let error = config_from(&[(SETTINGS_PATH_ENV, path.as_str())]).expect_err("missing file");

        assert!(matches!(error, StartupError::SettingsRead { .. }), "{error}");
    }

    #[test]
    fn from_env_ignores_blank_values() {
        let _lock = env_lock();
        let _g1 = set_env_guard(OPENAI_API_KEY_ENV, Some("  "));
        let _g2 = set_env_guard(ASSISTANT_ID_ENV, Some("asst_env"));
        let _g3 = set_env_guard(SETTINGS_PATH_ENV, None);
        let _g4 = set_env_guard(VARIANT_ENV, None);
        let _g5 = set_env_guard(POLL_INTERVAL_ENV, None);
        let _g6 = set_env_guard(RUN_TIMEOUT_ENV, None);
        let _g7 = set_env_guard(BACKEND_ENV, None);

        let config = ChatConfig::from_env().expect("config");

        assert!(config.openai_api_key.is_none());
        assert_eq!(config.assistant_id.as_deref(), Some("asst_env"));
    }
}
