use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::info;

use crate::error::{EngineError, Result};

/// Global configuration instance
static CONFIG: OnceCell<RwLock<EngineConfig>> = OnceCell::new();

/// Engine configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Classifier endpoint and model selection
    #[serde(default)]
    pub ai: AiConfig,

    /// Deterministic rule settings
    #[serde(default)]
    pub rules: RuleConfig,
}

/// Classifier endpoint configuration.
///
/// Snapshots of this struct are passed into the engine by value; the engine
/// never reads the global mid-flight, so a classification run is reproducible
/// given the snapshot it was handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of an OpenAI-compatible API
    pub api_url: String,

    /// Bearer token; empty for unauthenticated local endpoints
    #[serde(default)]
    pub api_key: String,

    /// First of the two independent classifiers
    pub primary_model: String,

    /// Second of the two independent classifiers
    pub secondary_model: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434".to_string(),
            api_key: String::new(),
            primary_model: "gpt-4o-mini".to_string(),
            secondary_model: "qwen2.5:7b".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Settings for the deterministic rules that run before any classifier call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Label assigned when the sender domain is whitelisted
    pub service_label: String,

    /// Label assigned when the message was addressed to many recipients
    pub copy_label: String,

    /// Rule fires when the external recipient count exceeds this
    pub recipient_threshold: usize,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            service_label: "Servicios".to_string(),
            copy_label: "EnCopia".to_string(),
            recipient_threshold: 1,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Default config file path under the platform config directory.
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| EngineError::Config("Could not determine config directory".to_string()))?;
    Ok(dir.join("mailtriage").join("config.toml"))
}

/// Load configuration from a TOML file and install it as the global instance.
/// A missing file installs the defaults.
pub fn init_config_from_path(path: &PathBuf) -> Result<()> {
    let config = if path.exists() {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)?
    } else {
        info!(path = %path.display(), "No config file found, using defaults");
        EngineConfig::default()
    };

    match CONFIG.get() {
        Some(lock) => {
            let mut guard = lock
                .write()
                .map_err(|_| EngineError::Config("Config lock poisoned".to_string()))?;
            *guard = config;
        }
        None => {
            let _ = CONFIG.set(RwLock::new(config));
        }
    }

    Ok(())
}

/// Load configuration from the default path.
pub fn init_config() -> Result<()> {
    init_config_from_path(&default_config_path()?)
}

/// Get a snapshot of the current configuration (defaults if never initialized).
pub fn current() -> EngineConfig {
    CONFIG
        .get()
        .and_then(|lock| lock.read().ok().map(|c| c.clone()))
        .unwrap_or_default()
}

/// Initialize tracing with an env-filter; intended for binaries and
/// integration harnesses embedding the engine.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("mailtriage=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
