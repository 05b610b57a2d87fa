use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::DEFAULT_POLL_INTERVAL;
use crate::infrastructure::ethereum::contracts::MULTICALL3_ADDRESS;
use crate::infrastructure::ethereum::BatchStrategy;

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: Option<String>,
    pub rpc: Option<String>,
    pub ws: Option<String>,
    pub ipc: Option<String>,
}

/// An account offered as a watch-only connector
#[derive(Debug, Clone, Deserialize)]
pub struct WatchAccount {
    pub address: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: Vec<EndpointConfig>,
    pub watch_accounts: Vec<WatchAccount>,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub batch: BatchStrategy,
    pub multicall_address: String,
    pub resolve_ens: bool,
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            watch_accounts: Vec::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            request_timeout_secs: 8,
            batch: BatchStrategy::default(),
            multicall_address: MULTICALL3_ADDRESS.to_string(),
            resolve_ens: true,
            log_file: None,
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid config file")
    }

    /// Zero is treated as unset
    pub fn poll_interval(&self) -> Duration {
        match self.poll_interval_secs {
            0 => DEFAULT_POLL_INTERVAL,
            secs => Duration::from_secs(secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn multicall(&self) -> Result<alloy::primitives::Address> {
        self.multicall_address
            .trim()
            .parse()
            .with_context(|| format!("Invalid multicall_address {}", self.multicall_address))
    }
}

/// Load the config file; a missing file yields defaults.
pub fn load() -> Result<Config> {
    let Some(path) = config_path() else {
        return Ok(Config::default());
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Ok(Config::default()),
    };
    Config::parse(&content).with_context(|| format!("Failed to load {}", path.display()))
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("TOKENBOARD_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("tokenboard").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("tokenboard").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "tokenboard", "tokenboard")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Default log location when neither CLI nor config name one
pub fn default_log_path() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME").map(PathBuf::from) {
        return Some(xdg.join("tokenboard").join("tokenboard.log"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(
            home.join(".local")
                .join("state")
                .join("tokenboard")
                .join("tokenboard.log"),
        );
    }
    directories::ProjectDirs::from("io", "tokenboard", "tokenboard")
        .map(|dirs| dirs.data_local_dir().join("tokenboard.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(8));
        assert_eq!(config.batch, BatchStrategy::Multicall);
        assert!(config.resolve_ens);
        assert_eq!(
            config.multicall().unwrap(),
            MULTICALL3_ADDRESS.parse::<alloy::primitives::Address>().unwrap()
        );
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            poll_interval_secs = 30
            batch = "individual"
            resolve_ens = false
            log_file = "/tmp/tokenboard.log"

            [[endpoints]]
            name = "local"
            rpc = "http://127.0.0.1:8545"

            [[endpoints]]
            ws = "ws://127.0.0.1:8546"

            [[watch_accounts]]
            address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
            label = "treasury"
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].name.as_deref(), Some("local"));
        assert_eq!(config.endpoints[1].ws.as_deref(), Some("ws://127.0.0.1:8546"));
        assert_eq!(config.watch_accounts[0].label.as_deref(), Some("treasury"));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.batch, BatchStrategy::Individual);
        assert!(!config.resolve_ens);
        assert_eq!(config.log_file.as_deref(), Some("/tmp/tokenboard.log"));
    }

    #[test]
    fn test_zero_interval_falls_back() {
        let config = Config::parse("poll_interval_secs = 0").unwrap();
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(Config::parse(r#"batch = "parallel""#).is_err());
    }
}
