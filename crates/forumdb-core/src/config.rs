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
/// Decoupled from the real environment so it can be tested with a plain
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

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("FORUMDB_ENV", "development"))?;
    let log_level = or_default("FORUMDB_LOG_LEVEL", "info");
    let communities_path = PathBuf::from(or_default(
        "FORUMDB_COMMUNITIES_PATH",
        "./config/communities.yaml",
    ));

    let db_max_connections = parse_u32("FORUMDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("FORUMDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("FORUMDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "FORUMDB_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "{db_min_connections} exceeds FORUMDB_DB_MAX_CONNECTIONS ({db_max_connections})"
            ),
        });
    }

    let stale_run_after_mins = parse_u64("FORUMDB_STALE_RUN_AFTER_MINS", "120")?;
    let ingest_concurrency = parse_usize("FORUMDB_INGEST_CONCURRENCY", "4")?.max(1);

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        communities_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        stale_run_after_mins,
        ingest_concurrency,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FORUMDB_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}
