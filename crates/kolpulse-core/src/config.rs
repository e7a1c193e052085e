use std::env::VarError;
use std::str::FromStr;

use crate::app_config::{AppConfig, Environment, StoreBackend};
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
/// Does not read `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let env = parse_environment(&or_default("KOLPULSE_ENV", "development"))?;
    let bind_addr = parse_or(&lookup, "KOLPULSE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("KOLPULSE_LOG_LEVEL", "info");
    let api_keys = parse_list(&or_default("KOLPULSE_API_KEYS", ""));

    let store = parse_store(&or_default("KOLPULSE_STORE", "postgres"))?;
    let database_url = lookup("DATABASE_URL").ok();
    if store == StoreBackend::Postgres && database_url.is_none() {
        return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
    }

    let db_max_connections = parse_or(&lookup, "KOLPULSE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_or(&lookup, "KOLPULSE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_or(&lookup, "KOLPULSE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let analyzer_url = lookup("KOLPULSE_ANALYZER_URL").ok();
    let analyzer_timeout_secs = parse_or(&lookup, "KOLPULSE_ANALYZER_TIMEOUT_SECS", "10")?;

    let feed_url = lookup("KOLPULSE_FEED_URL").ok();
    let feed_timeout_secs = parse_or(&lookup, "KOLPULSE_FEED_TIMEOUT_SECS", "30")?;
    let feed_max_retries = parse_or(&lookup, "KOLPULSE_FEED_MAX_RETRIES", "3")?;
    let feed_retry_backoff_base_ms = parse_or(&lookup, "KOLPULSE_FEED_RETRY_BACKOFF_BASE_MS", "500")?;

    let inter_kol_delay_ms = parse_or(&lookup, "KOLPULSE_INTER_KOL_DELAY_MS", "2000")?;
    let event_poll_interval_secs: u64 = parse_or(&lookup, "KOLPULSE_EVENT_POLL_INTERVAL_SECS", "300")?;
    if event_poll_interval_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "KOLPULSE_EVENT_POLL_INTERVAL_SECS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    let activity_coefficient: f64 = parse_or(&lookup, "KOLPULSE_ACTIVITY_COEFFICIENT", "1.0")?;
    if !activity_coefficient.is_finite() || activity_coefficient < 0.0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "KOLPULSE_ACTIVITY_COEFFICIENT".to_string(),
            reason: format!("must be a non-negative number, got {activity_coefficient}"),
        });
    }

    let kol_sweep_cron = or_default("KOLPULSE_KOL_SWEEP_CRON", "0 */10 * * * *");
    let event_status_cron = or_default("KOLPULSE_EVENT_STATUS_CRON", "0 */5 * * * *");
    let event_metrics_cron = or_default("KOLPULSE_EVENT_METRICS_CRON", "0 */30 * * * *");

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        api_keys,
        store,
        database_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        analyzer_url,
        analyzer_timeout_secs,
        feed_url,
        feed_timeout_secs,
        feed_max_retries,
        feed_retry_backoff_base_ms,
        inter_kol_delay_ms,
        event_poll_interval_secs,
        activity_coefficient,
        kol_sweep_cron,
        event_status_cron,
        event_metrics_cron,
    })
}

/// Parse `var` from the lookup, falling back to `default` when unset.
fn parse_or<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

/// Split a comma-separated list, dropping blank entries.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "KOLPULSE_ENV".to_string(),
            reason: format!("expected development, test, or production; got {other}"),
        }),
    }
}

fn parse_store(s: &str) -> Result<StoreBackend, ConfigError> {
    match s {
        "postgres" => Ok(StoreBackend::Postgres),
        "memory" => Ok(StoreBackend::Memory),
        other => Err(ConfigError::InvalidEnvVar {
            var: "KOLPULSE_STORE".to_string(),
            reason: format!("expected postgres or memory; got {other}"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
