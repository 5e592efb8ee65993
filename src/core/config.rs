//! # Configuration
//!
//! Settings resolve in layers: defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.dify-chat/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ResponseMode;
use crate::api::client::DEFAULT_BASE_URL;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chat: SessionConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    pub user: Option<String>,
    pub response_mode: Option<ResponseMode>,
}

/// Values given on the command line; `None` means "not specified".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub user: Option<String>,
    pub response_mode: Option<ResponseMode>,
}

pub const DEFAULT_USER: &str = "dify-chat";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub user: String,
    pub response_mode: ResponseMode,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// A setting with no usable default was not provided anywhere.
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Missing(what) => write!(f, "missing setting: {what}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ResolvedConfig {
    /// The API key, or a `ConfigError::Missing` naming where to set it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing(
                "API key (set [api] api_key in ~/.dify-chat/config.toml or DIFY_API_KEY)",
            ))
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.dify-chat/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".dify-chat").join("config.toml"))
}

/// Load config from `~/.dify-chat/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ChatConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ChatConfig::default());
        }
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<ChatConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(ChatConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ChatConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    // api_key stays out of the log
    debug!(
        "Config: base_url={:?}, user={:?}, response_mode={:?}",
        config.api.base_url, config.chat.user, config.chat.response_mode
    );
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# dify-chat configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [api]
# base_url = "https://api.dify.ai/v1"   # Or set DIFY_BASE_URL
# api_key = "app-..."                   # Or set DIFY_API_KEY

# [chat]
# user = "dify-chat"                    # End-user id sent with every request (DIFY_USER)
# response_mode = "streaming"           # "streaming" or "blocking"
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &ChatConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

/// [`resolve`] with an injectable environment lookup.
pub fn resolve_with_env(
    config: &ChatConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Base URL: CLI → env → config → default
    let base_url = cli
        .base_url
        .clone()
        .or_else(|| env("DIFY_BASE_URL"))
        .or_else(|| config.api.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    // API key: env → config (never a CLI flag, it would land in shell history)
    let api_key = env("DIFY_API_KEY").or_else(|| config.api.api_key.clone());

    let user = cli
        .user
        .clone()
        .or_else(|| env("DIFY_USER"))
        .or_else(|| config.chat.user.clone())
        .unwrap_or_else(|| DEFAULT_USER.to_string());

    let response_mode = cli
        .response_mode
        .or(config.chat.response_mode)
        .unwrap_or_default();

    ResolvedConfig {
        base_url,
        api_key,
        user,
        response_mode,
    }
}
