//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `DATAPUSH_DB_PATH`, `DATAPUSH_DB_POOL_SIZE`
//! - `DATAPUSH_TENANT_ID`
//! - `DATAPUSH_SYNC_ENGINE_URL`, `DATAPUSH_TYPE_MAPPING_URL`,
//!   `DATAPUSH_AUDIT_URL`, `DATAPUSH_MASKING_URL`, `DATAPUSH_CALLBACK_URL`
//!
//! Optional (defaults from [`Config::default`]):
//! - `DATAPUSH_HTTP_TIMEOUT_SECS`, `DATAPUSH_API_TOKEN`
//! - `DATAPUSH_POLL_INTERVAL_SECS`, `DATAPUSH_QUEUE_CAPACITY`,
//!   `DATAPUSH_HISTORY_PAGE_SIZE`, `DATAPUSH_QUERY_TIMEOUT_SECS`,
//!   `DATAPUSH_JOIN_TIMEOUT_SECS`
//! - `DATAPUSH_ONE_SHOT_COMPLETION` (`any_terminal` or `success_only`)
//!
//! ## File Locations
//! The loader probes `config.{json,toml}` and `datapush.{json,toml}` in the
//! working directory, its parent and grandparent, then the same names next
//! to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use datapush_domain::{
    Config, DataPushError, DatabaseConfig, ReconcilerConfig, Result, ServicesConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `DataPushError::Config` if configuration cannot be loaded from
/// either source or a value is malformed.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `DataPushError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let database = DatabaseConfig {
        path: env_var("DATAPUSH_DB_PATH")?,
        pool_size: env_var("DATAPUSH_DB_POOL_SIZE").and_then(|s| parse_value(&s, "pool size"))?,
    };

    let services = ServicesConfig {
        sync_engine_url: env_var("DATAPUSH_SYNC_ENGINE_URL")?,
        type_mapping_url: env_var("DATAPUSH_TYPE_MAPPING_URL")?,
        audit_url: env_var("DATAPUSH_AUDIT_URL")?,
        masking_url: env_var("DATAPUSH_MASKING_URL")?,
        callback_url: env_var("DATAPUSH_CALLBACK_URL")?,
        timeout_secs: env_or("DATAPUSH_HTTP_TIMEOUT_SECS", defaults.services.timeout_secs)?,
        api_token: std::env::var("DATAPUSH_API_TOKEN").ok().filter(|t| !t.trim().is_empty()),
    };

    let fallback = ReconcilerConfig::default();
    let reconciler = ReconcilerConfig {
        poll_interval_secs: env_or("DATAPUSH_POLL_INTERVAL_SECS", fallback.poll_interval_secs)?,
        queue_capacity: env_or("DATAPUSH_QUEUE_CAPACITY", fallback.queue_capacity)?,
        history_page_size: env_or("DATAPUSH_HISTORY_PAGE_SIZE", fallback.history_page_size)?,
        query_timeout_secs: env_or("DATAPUSH_QUERY_TIMEOUT_SECS", fallback.query_timeout_secs)?,
        join_timeout_secs: env_or("DATAPUSH_JOIN_TIMEOUT_SECS", fallback.join_timeout_secs)?,
        one_shot_completion: env_or(
            "DATAPUSH_ONE_SHOT_COMPLETION",
            fallback.one_shot_completion,
        )?,
    };

    let config =
        Config { database, reconciler, services, tenant_id: env_var("DATAPUSH_TENANT_ID")? };
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `DataPushError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DataPushError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DataPushError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DataPushError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from string content, format chosen by extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DataPushError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DataPushError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(DataPushError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Reject values the workers cannot run with.
fn validate(config: &Config) -> Result<()> {
    if config.database.pool_size == 0 {
        return Err(DataPushError::Config("pool_size must be at least 1".into()));
    }
    if config.reconciler.poll_interval_secs == 0 {
        return Err(DataPushError::Config("poll_interval_secs must be at least 1".into()));
    }
    if config.reconciler.queue_capacity == 0 {
        return Err(DataPushError::Config("queue_capacity must be at least 1".into()));
    }
    if config.reconciler.history_page_size == 0 {
        return Err(DataPushError::Config("history_page_size must be at least 1".into()));
    }
    if config.tenant_id.trim().is_empty() {
        return Err(DataPushError::Config("tenant_id must not be blank".into()));
    }
    Ok(())
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.json", "config.toml", "datapush.json", "datapush.toml"];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.extend([exe_dir.clone(), exe_dir.join(".."), exe_dir.join("../..")]);
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        DataPushError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Optional environment variable parsed into `T`, falling back to `default`.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(&raw, key),
        _ => Ok(default),
    }
}

fn parse_value<T>(raw: &str, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| DataPushError::Config(format!("Invalid {what}: {e}")))
}
