//! Configuration management for PhysicsCoin state storage

use crate::codec::DEFAULT_WALLET_SLACK;
use crate::error::{Result, StateError};
use crate::network::MAX_PEERS;
use crate::snapshot::MAX_WALLETS;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Spare wallet slots reserved when a snapshot is loaded.
    #[serde(default = "default_wallet_slack")]
    pub wallet_slack: usize,
    /// Write to a temporary file and rename it over the target.
    #[serde(default)]
    pub atomic_save: bool,
    /// Flush file contents to disk before `save` returns.
    #[serde(default)]
    pub sync_on_save: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            wallet_slack: default_wallet_slack(),
            atomic_save: false,
            sync_on_save: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_peers: default_max_peers(),
            poll_timeout_ms: default_poll_timeout_ms(),
            bootstrap_peers: Vec::new(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state.pcs")
}

fn default_wallet_slack() -> usize {
    DEFAULT_WALLET_SLACK
}

fn default_port() -> u16 {
    9333
}

fn default_max_peers() -> usize {
    MAX_PEERS
}

fn default_poll_timeout_ms() -> u64 {
    100
}

/// Parses a TOML document into a validated [`Config`].
pub fn parse_config(source: &str) -> Result<Config> {
    let config: Config = toml::from_str(source)?;
    validate(&config)?;
    Ok(config)
}

/// Loads configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    match fs::read_to_string(path.as_ref()) {
        Ok(source) => parse_config(&source),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.store.state_path.as_os_str().is_empty() {
        return Err(StateError::Config("store.state_path must be set".to_string()));
    }

    if config.store.wallet_slack > MAX_WALLETS {
        return Err(StateError::Config(format!(
            "store.wallet_slack must not exceed {}",
            MAX_WALLETS
        )));
    }

    if config.network.max_peers == 0 {
        return Err(StateError::Config(
            "network.max_peers must be at least 1".to_string(),
        ));
    }

    Ok(())
}
