use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("ORDSYNC_ENV", "development"));
    let log_level = or_default("ORDSYNC_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("ORDSYNC_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("ORDSYNC_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("ORDSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let write_batch_size = parse_usize("ORDSYNC_WRITE_BATCH_SIZE", "500")?;
    if write_batch_size == 0 {
        return Err(invalid(
            "ORDSYNC_WRITE_BATCH_SIZE",
            "must be greater than zero".to_string(),
        ));
    }
    let db_max_retries = parse_u32("ORDSYNC_DB_MAX_RETRIES", "3")?;
    let db_retry_backoff_base_ms = parse_u64("ORDSYNC_DB_RETRY_BACKOFF_BASE_MS", "500")?;

    let feed_path = lookup("ORDSYNC_FEED_PATH")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let upload_cron = or_default("ORDSYNC_UPLOAD_CRON", "0 */30 * * * *");
    let catalog_path = PathBuf::from(or_default("ORDSYNC_CATALOG_PATH", "./config/catalog.yaml"));

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        write_batch_size,
        db_max_retries,
        db_retry_backoff_base_ms,
        feed_path,
        upload_cron,
        catalog_path,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
