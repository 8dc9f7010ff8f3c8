//! Settings Models
//!
//! Server configuration (config.toml) and per-user settings records.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use paperdesk_llm::{ProviderEndpoints, DEFAULT_MAX_COMPLETION_TOKENS, DEFAULT_OPENAI_BASE_URL};

/// Server configuration stored in config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    pub listen_addr: String,
    /// SQLite database file. Empty means ~/.paperdesk/paperdesk.db
    pub database_path: String,
    /// "pretty" or "json"
    pub log_format: String,
    pub provider: ProviderSection,
    pub remote_tools: RemoteToolsSection,
    pub conversation: ConversationSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderSection {
    pub gateway_base_url: String,
    pub gateway_api_key: Option<String>,
    pub openai_base_url: String,
    pub max_completion_tokens: u32,
    pub request_timeout_secs: u64,
    /// Model used for the startup ping
    pub ping_model_slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteToolsSection {
    /// Remote tool server endpoint. None disables remote tools.
    pub url: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversationSection {
    pub title_timeout_secs: u64,
    pub title_model_slug: String,
    pub project_stale_after_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:6060".to_string(),
            database_path: String::new(),
            log_format: "pretty".to_string(),
            provider: ProviderSection::default(),
            remote_tools: RemoteToolsSection::default(),
            conversation: ConversationSection::default(),
        }
    }
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            gateway_base_url: "http://127.0.0.1:4000/v1".to_string(),
            gateway_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            request_timeout_secs: 120,
            ping_model_slug: "gpt-4.1-mini".to_string(),
        }
    }
}

impl Default for RemoteToolsSection {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_secs: 60,
        }
    }
}

impl Default for ConversationSection {
    fn default() -> Self {
        Self {
            title_timeout_secs: 30,
            title_model_slug: "gpt-4.1-mini".to_string(),
            project_stale_after_secs: 1800,
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.trim().is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if !["pretty", "json"].contains(&self.log_format.as_str()) {
            return Err(format!("Invalid log_format: {}", self.log_format));
        }
        check_http_url("provider.gateway_base_url", &self.provider.gateway_base_url)?;
        check_http_url("provider.openai_base_url", &self.provider.openai_base_url)?;
        if let Some(url) = &self.remote_tools.url {
            check_http_url("remote_tools.url", url)?;
        }
        if self.provider.max_completion_tokens == 0 {
            return Err("provider.max_completion_tokens must be positive".to_string());
        }
        let timeouts = [
            ("provider.request_timeout_secs", self.provider.request_timeout_secs),
            ("remote_tools.request_timeout_secs", self.remote_tools.request_timeout_secs),
            ("conversation.title_timeout_secs", self.conversation.title_timeout_secs),
            ("conversation.project_stale_after_secs", self.conversation.project_stale_after_secs),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(format!("{} must be positive", name));
            }
        }
        Ok(())
    }

    /// Endpoint set handed to the provider factory
    pub fn provider_endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints {
            gateway_base_url: self.provider.gateway_base_url.clone(),
            gateway_api_key: self.provider.gateway_api_key.clone(),
            openai_base_url: self.provider.openai_base_url.clone(),
            max_completion_tokens: self.provider.max_completion_tokens,
            request_timeout: Duration::from_secs(self.provider.request_timeout_secs),
        }
    }

    pub fn title_timeout(&self) -> Duration {
        Duration::from_secs(self.conversation.title_timeout_secs)
    }

    pub fn project_stale_after(&self) -> Duration {
        Duration::from_secs(self.conversation.project_stale_after_secs)
    }

    pub fn remote_tools_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_tools.request_timeout_secs)
    }
}

fn check_http_url(field: &str, value: &str) -> Result<(), String> {
    let parsed = url::Url::parse(value).map_err(|e| format!("{} is not a valid URL: {}", field, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{} must use http or https, got {}", field, other)),
    }
}

/// Per-user settings, replaced as a whole by `PUT /users/me/settings`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserSettings {
    /// Personal provider key. When set, turns go to the provider directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    /// Free-form instructions appended to every system prompt
    #[serde(default)]
    pub instructions: String,
}

impl UserSettings {
    /// The override key, if one is actually set.
    pub fn api_key_override(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Copy safe to return to clients: the key is masked.
    pub fn redacted(&self) -> Self {
        Self {
            openai_api_key: self.api_key_override().map(mask_key),
            instructions: self.instructions.clone(),
        }
    }
}

fn mask_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}
