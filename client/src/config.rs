//! # Client Configuration
//!
//! Configuration is kept in a single YAML file, `config.yaml`, at the root of
//! the client data directory.
//!
//! ```yaml
//! api_base_url: "http://localhost:3000/api/v1"
//! request_timeout_secs: 30
//! query_retries: 2
//! retry_base_delay_ms: 1000
//! query_stale_secs: 60
//! link_token_stale_secs: 300
//! notification_duration_ms: 5000
//! plaid_environment: sandbox
//! ```
//!
//! A missing file is created with defaults. Environment variables override
//! the file: `FINANCE_TRACKER_API_URL`, `FINANCE_TRACKER_PLAID_ENV` and
//! `FINANCE_TRACKER_DATA_DIR` (the latter selects the directory itself).

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.yaml";
const DATA_DIR_ENV: &str = "FINANCE_TRACKER_DATA_DIR";
const API_URL_ENV: &str = "FINANCE_TRACKER_API_URL";
const PLAID_ENV_ENV: &str = "FINANCE_TRACKER_PLAID_ENV";

/// Environment of the bank-link provider the widget talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaidEnvironment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl std::str::FromStr for PlaidEnvironment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(PlaidEnvironment::Sandbox),
            "development" => Ok(PlaidEnvironment::Development),
            "production" => Ok(PlaidEnvironment::Production),
            other => Err(anyhow!("Unknown Plaid environment: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Automatic retries for query-type calls; mutations never retry
    pub query_retries: u32,
    pub retry_base_delay_ms: u64,
    /// How long a cached account, transaction or category query is reused
    pub query_stale_secs: u64,
    /// How long a fetched link token is reused
    pub link_token_stale_secs: u64,
    /// Lifetime of notifications raised without an explicit duration
    pub notification_duration_ms: i64,
    pub plaid_environment: PlaidEnvironment,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api/v1".to_string(),
            request_timeout_secs: 30,
            query_retries: 2,
            retry_base_delay_ms: 1000,
            query_stale_secs: 60,
            link_token_stale_secs: 5 * 60,
            notification_duration_ms: shared::DEFAULT_NOTIFICATION_DURATION_MS,
            plaid_environment: PlaidEnvironment::Sandbox,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn query_stale_time(&self) -> Duration {
        Duration::from_secs(self.query_stale_secs)
    }

    pub fn link_token_stale_time(&self) -> Duration {
        Duration::from_secs(self.link_token_stale_secs)
    }

    /// Load `config.yaml` from `data_dir`, writing defaults if it does not exist,
    /// then apply environment overrides
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            let yaml_content = fs::read_to_string(&config_path)?;
            let config: ClientConfig = serde_yaml::from_str(&yaml_content)?;
            debug!("Loaded client config from {:?}", config_path);
            config
        } else {
            let config = ClientConfig::default();
            config.save(data_dir)?;
            info!("Created default client config at {:?}", config_path);
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Write the config atomically: temp file, then rename
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        if !data_dir.exists() {
            fs::create_dir_all(data_dir)?;
            info!("Created data directory: {:?}", data_dir);
        }

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        let yaml_content = serde_yaml::to_string(self)?;
        let temp_path = config_path.with_extension("tmp");
        fs::write(&temp_path, yaml_content)?;
        fs::rename(&temp_path, &config_path)?;

        debug!("Saved client config to {:?}", config_path);
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                debug!("Overriding API base URL from {}", API_URL_ENV);
                self.api_base_url = url.trim().to_string();
            }
        }

        if let Ok(env) = std::env::var(PLAID_ENV_ENV) {
            match env.parse() {
                Ok(parsed) => self.plaid_environment = parsed,
                Err(e) => warn!("Ignoring {}: {}", PLAID_ENV_ENV, e),
            }
        }
    }
}

/// Directory holding `config.yaml` and the persisted client state
pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir.trim()));
        }
    }

    dirs::data_dir()
        .map(|dir| dir.join("finance-tracker"))
        .ok_or_else(|| anyhow!("Could not determine the user data directory"))
}
