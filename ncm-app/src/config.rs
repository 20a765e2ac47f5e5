//! ncm-directlink configuration loader.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_SEARCH_LIMIT: u32 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Root of the search / direct-link endpoints.
    pub api_base_url: String,
    /// Forwarded verbatim as the `cookie` query parameter.
    #[serde(default)]
    pub cookie: Option<String>,
    /// Requested quality tier, e.g. "standard", "exhigh", "lossless".
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_search_limit() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionConfig {
    #[serde(default = "default_commands")]
    pub commands: Vec<String>,
    #[serde(default = "default_selection_ttl_secs")]
    pub selection_ttl_secs: u64,
}

fn default_commands() -> Vec<String> {
    vec![
        "/music".to_string(),
        "/ncm".to_string(),
        "下载音乐".to_string(),
    ]
}

fn default_selection_ttl_secs() -> u64 {
    30
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            commands: default_commands(),
            selection_ttl_secs: default_selection_ttl_secs(),
        }
    }
}

impl InteractionConfig {
    pub fn selection_ttl(&self) -> Duration {
        Duration::from_secs(self.selection_ttl_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_console_sender")]
    pub sender_id: String,
}

fn default_console_sender() -> String {
    "console".to_string()
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sender_id: default_console_sender(),
        }
    }
}

impl AppConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(default_config_path);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;

        let mut cfg: AppConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?;

        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("NCM_API_BASE_URL") {
            self.catalog.api_base_url = v;
        }
        if let Some(v) = non_empty("NCM_COOKIE") {
            self.catalog.cookie = Some(v);
        }
        if let Some(v) = non_empty("NCM_LEVEL") {
            self.catalog.level = Some(v);
        }
        if let Some(v) = non_empty("NCM_TOKEN") {
            self.catalog.token = Some(v);
        }
        if let Some(v) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.channels.telegram.bot_token = v;
            self.channels.telegram.enabled = true;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        let base = self.catalog.api_base_url.trim();
        if base.is_empty() {
            return Err(anyhow::anyhow!("catalog.api_base_url is required"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "catalog.api_base_url must start with http:// or https://"
            ));
        }
        if self.catalog.limit == 0 || self.catalog.limit > MAX_SEARCH_LIMIT {
            return Err(anyhow::anyhow!(
                "catalog.limit must be between 1 and {MAX_SEARCH_LIMIT}"
            ));
        }
        if self.interaction.selection_ttl_secs == 0 {
            return Err(anyhow::anyhow!("interaction.selection_ttl_secs must be > 0"));
        }
        if self
            .interaction
            .commands
            .iter()
            .all(|c| c.trim().is_empty())
        {
            return Err(anyhow::anyhow!(
                "interaction.commands must contain at least one command"
            ));
        }
        if self.channels.telegram.enabled && self.channels.telegram.bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "channels.telegram.bot_token is required when telegram is enabled"
            ));
        }
        Ok(())
    }

    /// Command prefixes with surrounding whitespace removed and blanks dropped.
    pub fn command_prefixes(&self) -> Vec<String> {
        self.interaction
            .commands
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".ncm-directlink").join("config.toml")
}
