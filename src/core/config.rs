//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.murmur/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::DirectoryId;
use crate::transport::ReconnectPolicy;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MurmurConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub typing: TypingConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub username: Option<String>,
    pub default_thread: Option<DirectoryId>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    /// `host[:port]`, no scheme.
    pub address: Option<String>,
    pub secure: Option<bool>,
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CacheConfig {
    pub gc_horizon_minutes: Option<u64>,
    pub max_threads: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TypingConfig {
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TransportConfig {
    pub reconnect_min_ms: Option<u64>,
    pub reconnect_max_ms: Option<u64>,
    pub inbound_capacity: Option<usize>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_SERVER_ADDRESS: &str = "localhost:3000";
pub const DEFAULT_GC_HORIZON_MINUTES: u64 = 30;
pub const DEFAULT_MAX_THREADS: usize = 32;
pub const DEFAULT_TYPING_IDLE_MS: u64 = 3000;
pub const DEFAULT_RECONNECT_MIN_MS: u64 = 500;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;
pub const DEFAULT_INBOUND_CAPACITY: usize = 256;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub username: Option<String>,
    pub default_thread: Option<DirectoryId>,
    pub server_address: String,
    pub secure: bool,
    pub token: Option<String>,
    pub cache_horizon: Duration,
    pub max_threads: usize,
    pub typing_idle_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub inbound_capacity: usize,
}

impl ResolvedConfig {
    /// REST root, e.g. `http://localhost:3000/api`.
    pub fn http_base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}/api", self.server_address)
    }

    /// Socket URL with the token as a query parameter.
    pub fn ws_url(&self, token: &str) -> Result<String, ConfigError> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let base = format!("{scheme}://{}/api/ws", self.server_address);
        let url = reqwest::Url::parse_with_params(&base, &[("token", token)])
            .map_err(|e| ConfigError::Invalid(format!("server address '{}': {e}", self.server_address)))?;
        Ok(url.to_string())
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.murmur/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".murmur").join("config.toml"))
}

/// Load config from `~/.murmur/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `MurmurConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<MurmurConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(MurmurConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(MurmurConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: MurmurConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &PathBuf) {
    let default_content = r#"# Murmur Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# username = "ann"                   # Or set MURMUR_USERNAME / --username
# default_thread = 1                 # Opened when no thread was used before

# [server]
# address = "localhost:3000"         # Or set MURMUR_SERVER / --server
# secure = false                     # true → https:// and wss://
# token = "..."                      # Or set MURMUR_TOKEN; logs in by username if unset

# [cache]
# gc_horizon_minutes = 30            # Forget threads unused this long
# max_threads = 32

# [typing]
# idle_timeout_ms = 3000             # Send stop_typing after this much inactivity

# [transport]
# reconnect_min_ms = 500
# reconnect_max_ms = 30000
# inbound_capacity = 256             # Frames buffered per subscriber
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// CLI flags that override everything else (None = not specified).
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub server: Option<String>,
    pub username: Option<String>,
}

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &MurmurConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

fn resolve_with_env(
    config: &MurmurConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Server: CLI → env → config → default
    let server_address = cli
        .server
        .clone()
        .or_else(|| env("MURMUR_SERVER"))
        .or_else(|| config.server.address.clone())
        .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());

    // Username: CLI → env → config
    let username = cli
        .username
        .clone()
        .or_else(|| env("MURMUR_USERNAME"))
        .or_else(|| config.general.username.clone());

    // Token: env → config
    let token = env("MURMUR_TOKEN").or_else(|| config.server.token.clone());

    let defaults = ReconnectPolicy::default();
    let reconnect = ReconnectPolicy {
        min: config
            .transport
            .reconnect_min_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.min),
        max: config
            .transport
            .reconnect_max_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max),
    };

    ResolvedConfig {
        username,
        default_thread: config.general.default_thread,
        server_address,
        secure: config.server.secure.unwrap_or(false),
        token,
        cache_horizon: Duration::from_secs(
            config
                .cache
                .gc_horizon_minutes
                .unwrap_or(DEFAULT_GC_HORIZON_MINUTES)
                * 60,
        ),
        max_threads: config.cache.max_threads.unwrap_or(DEFAULT_MAX_THREADS),
        typing_idle_timeout: Duration::from_millis(
            config.typing.idle_timeout_ms.unwrap_or(DEFAULT_TYPING_IDLE_MS),
        ),
        reconnect,
        inbound_capacity: config
            .transport
            .inbound_capacity
            .unwrap_or(DEFAULT_INBOUND_CAPACITY),
    }
}
