//! Configuration management
//!
//! This module handles loading, validation, and management of the runtime
//! configuration. Configuration is stored in TOML format at
//! `~/.drover/config.toml`.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **agent**: On-chain agent ID, name, description, capability tags
//! - **executor**: Retry, timeout, parallelism, and dry-run tuning
//! - **memory**: Record retention and file-backend location
//! - **webhook**: Listener defaults for the webhook trigger
//!
//! Webhook shared secrets and collaborator API keys are never stored here;
//! they are supplied by the embedding application.
//!
//! # Path Expansion
//!
//! `~` in the data directory expands to the user's home directory.

use crate::executor::ExecutorConfig;
use sdk::errors::AgentError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Core runtime settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Agent identity settings
    pub agent: AgentConfig,

    /// Executor tuning
    #[serde(default)]
    pub executor: ExecutorSettings,

    /// Memory retention settings
    #[serde(default)]
    pub memory: MemorySettings,

    /// Webhook listener defaults
    #[serde(default)]
    pub webhook: WebhookSettings,
}

/// Core runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

/// Agent identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// On-chain agent ID used for the registry lookup during initialize
    pub agent_id: String,

    /// Display name
    pub name: String,

    /// What the agent is for; used as the base goal for scheduled runs
    #[serde(default)]
    pub description: String,

    /// Capability tags
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Executor tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt handler timeout, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Run independent tasks concurrently
    #[serde(default)]
    pub parallel: bool,

    /// Upper bound on in-flight handlers when parallel is enabled
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Ask handlers to skip real side effects
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            parallel: false,
            max_concurrency: default_max_concurrency(),
            dry_run: false,
        }
    }
}

impl ExecutorSettings {
    /// Convert the TOML settings into the executor's runtime configuration
    pub fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            parallel: self.parallel,
            max_concurrency: self.max_concurrency,
            dry_run: self.dry_run,
        }
    }
}

/// Memory retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Maximum records retained by the in-process backend before
    /// oldest-first eviction. Zero disables eviction.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// File used by the JSONL backend, relative to `core.data_dir`
    #[serde(default = "default_memory_file")]
    pub file: PathBuf,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            file: default_memory_file(),
        }
    }
}

/// Webhook listener defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// Bind host
    #[serde(default = "default_webhook_host")]
    pub host: String,

    /// Bind port; 0 picks an ephemeral port
    #[serde(default = "default_webhook_port")]
    pub port: u16,

    /// Request path deliveries are posted to
    #[serde(default = "default_webhook_path")]
    pub path: String,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            host: default_webhook_host(),
            port: default_webhook_port(),
            path: default_webhook_path(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.drover/data")
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_records() -> usize {
    1000
}

fn default_memory_file() -> PathBuf {
    PathBuf::from("memory.jsonl")
}

fn default_webhook_host() -> String {
    "127.0.0.1".to_string()
}

fn default_webhook_port() -> u16 {
    8787
}

fn default_webhook_path() -> String {
    "/hooks/drover".to_string()
}

impl RuntimeConfig {
    /// Load configuration from the default location, creating a starter
    /// file if none exists
    pub fn load_or_create() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            let config = Self::starter();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| AgentError::Config(format!("failed to render config: {}", e)))?;
            fs::write(&path, rendered)?;
            tracing::info!("Created starter config at {:?}", path);
            return Ok(config);
        }
        Self::load_from_path(&path)
    }

    /// Load configuration from an explicit path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let mut config: RuntimeConfig = toml::from_str(&raw)
            .map_err(|e| AgentError::Config(format!("failed to parse {:?}: {}", path, e)))?;
        config.core.data_dir = expand_path(&config.core.data_dir)?;
        config.validate()?;
        Ok(config)
    }

    /// Absolute path to the memory file used by the JSONL backend
    pub fn memory_file_path(&self) -> PathBuf {
        if self.memory.file.is_absolute() {
            self.memory.file.clone()
        } else {
            self.core.data_dir.join(&self.memory.file)
        }
    }

    fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AgentError::Config("could not determine home directory".to_string()))?;
        Ok(home.join(".drover").join("config.toml"))
    }

    fn starter() -> Self {
        Self {
            core: CoreConfig::default(),
            agent: AgentConfig {
                agent_id: String::new(),
                name: "drover-agent".to_string(),
                description: String::new(),
                capabilities: Vec::new(),
            },
            executor: ExecutorSettings::default(),
            memory: MemorySettings::default(),
            webhook: WebhookSettings::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.agent.name.is_empty() {
            return Err(AgentError::Config("agent.name must not be empty".to_string()));
        }
        if self.executor.max_concurrency == 0 {
            return Err(AgentError::Config(
                "executor.max_concurrency must be at least 1".to_string(),
            ));
        }
        if !self.webhook.path.starts_with('/') {
            return Err(AgentError::Config(
                "webhook.path must start with '/'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory
fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| AgentError::Config("could not determine home directory".to_string()))?;
        return Ok(home.join(rest));
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[agent]
agent_id = "0x01"
name = "trader"
"#;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: RuntimeConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.agent.name, "trader");
        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.executor.max_retries, 2);
        assert_eq!(config.executor.max_concurrency, 4);
        assert!(!config.executor.parallel);
        assert_eq!(config.memory.max_records, 1000);
        assert_eq!(config.webhook.host, "127.0.0.1");
        assert_eq!(config.webhook.path, "/hooks/drover");
    }

    #[test]
    fn test_executor_settings_conversion() {
        let settings = ExecutorSettings {
            max_retries: 3,
            retry_delay_ms: 250,
            timeout_secs: 10,
            parallel: true,
            max_concurrency: 8,
            dry_run: true,
        };
        let config = settings.to_executor_config();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.parallel);
        assert_eq!(config.max_concurrency, 8);
        assert!(config.dry_run);
    }

    #[test]
    fn test_invalid_webhook_path_rejected() {
        let raw = r#"
[agent]
agent_id = "0x01"
name = "trader"

[webhook]
path = "no-slash"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, raw).unwrap();
        let err = RuntimeConfig::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("webhook.path"));
    }

    #[test]
    fn test_memory_file_path_respects_absolute() {
        let mut config: RuntimeConfig = toml::from_str(MINIMAL).unwrap();
        config.core.data_dir = PathBuf::from("/var/lib/drover");
        assert_eq!(
            config.memory_file_path(),
            PathBuf::from("/var/lib/drover/memory.jsonl")
        );

        config.memory.file = PathBuf::from("/tmp/mem.jsonl");
        assert_eq!(config.memory_file_path(), PathBuf::from("/tmp/mem.jsonl"));
    }
}
