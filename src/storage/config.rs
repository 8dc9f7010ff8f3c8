//! TOML Configuration Management
//!
//! Reads config.toml (writing defaults when it does not exist yet) and applies
//! environment overrides on top.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::ServerConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, default_database_path, ensure_parent_dir};

/// Environment variables that override config file values
const ENV_LISTEN_ADDR: &str = "PAPERDESK_LISTEN_ADDR";
const ENV_DATABASE_PATH: &str = "PAPERDESK_DATABASE_PATH";
const ENV_GATEWAY_URL: &str = "PAPERDESK_GATEWAY_URL";
const ENV_GATEWAY_API_KEY: &str = "PAPERDESK_GATEWAY_API_KEY";
const ENV_XTRAMCP_URL: &str = "PAPERDESK_XTRAMCP_URL";
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Configuration service for the server
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: ServerConfig,
}

impl ConfigService {
    /// Load from the default location and apply process environment overrides
    pub fn new() -> AppResult<Self> {
        let path = config_path()?;
        let mut service = Self::load_or_init(&path)?;
        apply_env_overrides(&mut service.config, |key| std::env::var(key).ok());
        service.config.validate().map_err(AppError::config)?;
        Ok(service)
    }

    /// Load a config file, creating it with defaults if missing
    pub fn load_or_init(path: &Path) -> AppResult<Self> {
        let config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            let default_config = ServerConfig::default();
            Self::save_to_file(path, &default_config)?;
            default_config
        };

        Ok(Self {
            config_path: path.to_path_buf(),
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<ServerConfig> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?;
        config.validate().map_err(AppError::config)?;
        Ok(config)
    }

    /// Save configuration to a file
    fn save_to_file(path: &Path, config: &ServerConfig) -> AppResult<()> {
        config.validate().map_err(AppError::config)?;
        let content = toml::to_string_pretty(config).map_err(|e| AppError::config(e.to_string()))?;
        ensure_parent_dir(path)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn into_config(self) -> ServerConfig {
        self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Database file to open: the configured path or the default one
    pub fn database_path(&self) -> AppResult<PathBuf> {
        if self.config.database_path.trim().is_empty() {
            default_database_path()
        } else {
            Ok(PathBuf::from(&self.config.database_path))
        }
    }
}

/// Apply environment overrides. Blank values are ignored.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(addr) = get(ENV_LISTEN_ADDR) {
        config.listen_addr = addr;
    }
    if let Some(path) = get(ENV_DATABASE_PATH) {
        config.database_path = path;
    }
    if let Some(url) = get(ENV_GATEWAY_URL) {
        config.provider.gateway_base_url = url;
    }
    if let Some(key) = get(ENV_GATEWAY_API_KEY) {
        config.provider.gateway_api_key = Some(key);
    } else if config.provider.gateway_api_key.is_none() {
        config.provider.gateway_api_key = get(ENV_OPENAI_API_KEY);
    }
    if let Some(url) = get(ENV_XTRAMCP_URL) {
        config.remote_tools.url = Some(url);
    }
}
