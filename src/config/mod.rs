//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "strato";
const DEFAULT_LISTEN: &str = "127.0.0.1:7420";
const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 60;
const DEFAULT_MEMORY_MAX_ENTRIES: usize = 500;
const DEFAULT_TTL_SECS: u64 = 300;
const DEFAULT_STALE_GRACE_SECS: u64 = 0;
const DEFAULT_DEBOUNCE_MS: u64 = 100;
const DEFAULT_TAG_BATCH_SIZE: usize = 10;
const DEFAULT_PATH_BATCH_SIZE: usize = 5;
const DEFAULT_INTER_BATCH_PAUSE_MS: u64 = 25;
const DEFAULT_REMOTE_OP_TIMEOUT_MS: u64 = 250;
const DEFAULT_REMOTE_RETRY_COOLDOWN_SECS: u64 = 30;

/// Command-line arguments for the Strato binary.
#[derive(Debug, Default, Parser)]
#[command(name = "strato", version, about = "Strato cache service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "STRATO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override the operational listener address.
    #[arg(long = "listen", value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Override the remote cache connection URL.
    #[arg(long = "remote-url", value_name = "URL")]
    pub remote_url: Option<String>,

    /// Toggle the remote cache layer.
    #[arg(
        long = "remote-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub remote_enabled: Option<bool>,

    /// Override the memory layer capacity.
    #[arg(long = "memory-max-entries", value_name = "N")]
    pub memory_max_entries: Option<usize>,

    /// Override the default entry TTL.
    #[arg(long = "default-ttl-secs", value_name = "SECONDS")]
    pub default_ttl_secs: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub remote: RemoteSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the operational HTTP surface binds to.
    pub listen: SocketAddr,
    /// Cadence of the maintenance sweep (expired-entry purge, remote probe).
    pub maintenance_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.parse().expect("default listen address"),
            maintenance_interval_secs: DEFAULT_MAINTENANCE_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub memory_max_entries: usize,
    pub default_ttl_secs: u64,
    pub stale_grace_secs: u64,
    pub debounce_ms: u64,
    pub tag_batch_size: usize,
    pub path_batch_size: usize,
    pub inter_batch_pause_ms: u64,
    pub remote_op_timeout_ms: u64,
    pub remote_retry_cooldown_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_max_entries: DEFAULT_MEMORY_MAX_ENTRIES,
            default_ttl_secs: DEFAULT_TTL_SECS,
            stale_grace_secs: DEFAULT_STALE_GRACE_SECS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            tag_batch_size: DEFAULT_TAG_BATCH_SIZE,
            path_batch_size: DEFAULT_PATH_BATCH_SIZE,
            inter_batch_pause_ms: DEFAULT_INTER_BATCH_PAUSE_MS,
            remote_op_timeout_ms: DEFAULT_REMOTE_OP_TIMEOUT_MS,
            remote_retry_cooldown_secs: DEFAULT_REMOTE_RETRY_COOLDOWN_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Enable the remote cache layer. Requires `url` when true.
    pub enabled: bool,
    /// Redis connection URL (`redis://` or `rediss://`).
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Base log level; overridable per target via `RUST_LOG`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid remote cache url `{url}`: {reason}")]
    RemoteUrl { url: String, reason: String },
    #[error("remote cache enabled but no url configured")]
    RemoteUrlMissing,
}

/// Load settings with layered precedence: bundled defaults, then a local
/// `strato.toml`, then an explicit `--config-file`, then `STRATO__*`
/// environment variables, then CLI flags.
pub fn load(cli: &CliArgs) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = &cli.config_file {
        builder = builder.add_source(File::from(path.clone()));
    }

    let raw = builder
        .add_source(Environment::with_prefix("STRATO").separator("__"))
        .build()?;
    let mut settings: Settings = raw.try_deserialize()?;

    if let Some(listen) = cli.listen {
        settings.server.listen = listen;
    }
    if let Some(url) = &cli.remote_url {
        settings.remote.url = Some(url.clone());
    }
    if let Some(enabled) = cli.remote_enabled {
        settings.remote.enabled = enabled;
    }
    if let Some(max_entries) = cli.memory_max_entries {
        settings.cache.memory_max_entries = max_entries;
    }
    if let Some(ttl) = cli.default_ttl_secs {
        settings.cache.default_ttl_secs = ttl;
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
    }
    if let Some(json) = cli.log_json {
        settings.logging.format = if json { LogFormat::Json } else { LogFormat::Compact };
    }

    validate_remote(&settings)?;
    Ok(settings)
}

fn validate_remote(settings: &Settings) -> Result<(), ConfigError> {
    if !settings.remote.enabled {
        return Ok(());
    }
    let Some(url) = &settings.remote.url else {
        return Err(ConfigError::RemoteUrlMissing);
    };
    let parsed = url::Url::from_str(url).map_err(|err| ConfigError::RemoteUrl {
        url: url.clone(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "redis" | "rediss") {
        return Err(ConfigError::RemoteUrl {
            url: url.clone(),
            reason: format!("unsupported scheme `{}`", parsed.scheme()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
