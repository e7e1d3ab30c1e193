use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Minimum JWT secret length accepted outside development.
const MIN_JWT_SECRET_LEN: usize = 32;

const DEFAULT_ALLOWED_ORIGINS: &str =
    "http://localhost:5173,http://localhost:3000,http://127.0.0.1:5173";

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

/// Build application configuration using the provided env-var lookup function,
/// so parsing can be tested against a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let database_url = require("DATABASE_URL")?;
    let jwt_secret = require("VENDMAP_JWT_SECRET")?;

    let env = parse_environment(&or_default("VENDMAP_ENV", "development"))?;

    let bind_addr = or_default("VENDMAP_BIND_ADDR", "0.0.0.0:3001")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("VENDMAP_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("VENDMAP_LOG_LEVEL", "info");
    let buildings_path = PathBuf::from(or_default(
        "VENDMAP_BUILDINGS_PATH",
        "./config/buildings.yaml",
    ));
    let map_api_key = lookup("GOOGLE_MAPS_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());

    let session_ttl_secs = or_default("VENDMAP_SESSION_TTL_SECS", "604800")
        .parse::<u64>()
        .map_err(|e| invalid("VENDMAP_SESSION_TTL_SECS", e.to_string()))?;
    if session_ttl_secs == 0 {
        return Err(invalid(
            "VENDMAP_SESSION_TTL_SECS",
            "must be greater than zero".to_string(),
        ));
    }

    let db_max_connections = or_default("VENDMAP_DB_MAX_CONNECTIONS", "10")
        .parse::<u32>()
        .map_err(|e| invalid("VENDMAP_DB_MAX_CONNECTIONS", e.to_string()))?;
    let db_min_connections = or_default("VENDMAP_DB_MIN_CONNECTIONS", "1")
        .parse::<u32>()
        .map_err(|e| invalid("VENDMAP_DB_MIN_CONNECTIONS", e.to_string()))?;
    let db_acquire_timeout_secs = or_default("VENDMAP_DB_ACQUIRE_TIMEOUT_SECS", "10")
        .parse::<u64>()
        .map_err(|e| invalid("VENDMAP_DB_ACQUIRE_TIMEOUT_SECS", e.to_string()))?;

    if db_min_connections > db_max_connections {
        return Err(invalid(
            "VENDMAP_DB_MIN_CONNECTIONS",
            format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        ));
    }

    let image_dir = PathBuf::from(or_default("VENDMAP_IMAGE_DIR", "./data/images"));
    let public_base_url = or_default("VENDMAP_PUBLIC_BASE_URL", "http://localhost:3001")
        .trim_end_matches('/')
        .to_string();
    let allowed_origins = or_default("VENDMAP_ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    let max_image_bytes = or_default("VENDMAP_MAX_IMAGE_BYTES", "5242880")
        .parse::<usize>()
        .map_err(|e| invalid("VENDMAP_MAX_IMAGE_BYTES", e.to_string()))?;

    if env != Environment::Development && jwt_secret.len() < MIN_JWT_SECRET_LEN {
        return Err(invalid(
            "VENDMAP_JWT_SECRET",
            format!("must be at least {MIN_JWT_SECRET_LEN} bytes outside development"),
        ));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        buildings_path,
        jwt_secret,
        session_ttl_secs,
        map_api_key,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        image_dir,
        public_base_url,
        allowed_origins,
        max_image_bytes,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(ConfigError::InvalidEnvVar {
            var: "VENDMAP_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
