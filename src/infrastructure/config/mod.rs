use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::work_item::PRODUCT_BACKLOG_ITEM_TYPE;
use crate::infrastructure::security::keyring::SecretStore;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "testgen.toml";
pub const ENV_PREFIX: &str = "TESTGEN_";
pub const KEYRING_SERVICE: &str = "TestGen";

const TRACKER_PAT_SECRET: &str = "azure_pat";
const LLM_API_KEY_SECRET: &str = "openai_api_key";

/// Plain variable names accepted for compatibility, mapped onto config paths.
const LEGACY_ENV_KEYS: [(&str, &str); 6] = [
    ("AZURE_ORG_URL", "tracker.org_url"),
    ("AZURE_PROJECT", "tracker.project"),
    ("AZURE_PAT", "tracker.pat"),
    ("OPENAI_API_KEY", "llm.api_key"),
    ("OPENAI_MODEL", "llm.model"),
    ("OPENAI_BASE_URL", "llm.base_url"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub org_url: String,
    pub project: String,
    pub pat: String,
    pub api_version: String,
    pub request_timeout_secs: u64,
    /// Child type listed under a Feature.
    pub backlog_item_type: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            org_url: String::new(),
            project: String::new(),
            pat: String::new(),
            api_version: "6.0".to_string(),
            request_timeout_secs: 10,
            backlog_item_type: PRODUCT_BACKLOG_ITEM_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub test_cases_path: PathBuf,
    pub history_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            test_cases_path: PathBuf::from("test_cases.json"),
            history_path: PathBuf::from("test_cases_history.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Pause after each remote test-case creation.
    pub pacing_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { pacing_ms: 1000 }
    }
}

impl GenerationConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub llm: LLMConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub generation: GenerationConfig,
}

impl AppConfig {
    /// Reads `.env`, then layers defaults, `testgen.toml`, `TESTGEN_*` and the
    /// legacy variables. Blank secrets are looked up in the OS keyring.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!(path = %path.display(), "Loaded environment file");
        }

        let mut config = Self::from_figment(
            Self::layered(Path::new(CONFIG_FILE)).merge(legacy_env()),
        )?;
        config.fill_secrets(&SecretStore::new(KEYRING_SERVICE));
        config.warn_missing();
        Ok(config)
    }

    fn layered(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Invalid configuration: {}", e)))
    }

    fn fill_secrets(&mut self, secrets: &SecretStore) {
        if self.tracker.pat.trim().is_empty() {
            if let Some(pat) = secrets.lookup(TRACKER_PAT_SECRET) {
                self.tracker.pat = pat;
            }
        }
        let api_key_missing = self
            .llm
            .api_key
            .as_deref()
            .map_or(true, |key| key.trim().is_empty());
        if api_key_missing {
            self.llm.api_key = secrets.lookup(LLM_API_KEY_SECRET);
        }
    }

    fn warn_missing(&self) {
        if self.tracker.org_url.trim().is_empty() {
            warn!("tracker.org_url is not set; tracker calls will fail");
        }
        if self.tracker.pat.trim().is_empty() {
            warn!("tracker.pat is not set; tracker calls will be rejected");
        }
        if self.llm.api_key.is_none() {
            warn!("llm.api_key is not set; drafting will use the fallback case");
        }
    }
}

fn legacy_path(name: &str) -> Option<&'static str> {
    LEGACY_ENV_KEYS
        .iter()
        .find(|(legacy, _)| legacy.eq_ignore_ascii_case(name))
        .map(|(_, path)| *path)
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| match legacy_path(key.as_str()) {
        Some(path) => path.into(),
        None => key.as_str().to_string().into(),
    })
}
