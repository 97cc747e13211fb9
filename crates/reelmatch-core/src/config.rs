use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does not load `.env` files. Used in tests
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

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

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("REELMATCH_ENV", "development"))?;

    let bind_addr = or_default("REELMATCH_BIND_ADDR", "0.0.0.0:5000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("REELMATCH_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("REELMATCH_LOG_LEVEL", "info");

    // An empty token is treated the same as an unset one.
    let apify_token = lookup("APIFY_TOKEN")
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let apify_base_url = or_default("REELMATCH_APIFY_BASE_URL", "https://api.apify.com/v2")
        .trim_end_matches('/')
        .to_string();

    let scraper_timeout_secs = parse_u64("REELMATCH_SCRAPER_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default(
        "REELMATCH_SCRAPER_USER_AGENT",
        "reelmatch/0.1 (post-matcher)",
    );

    let fetch_timeout_secs = parse_u64("REELMATCH_FETCH_TIMEOUT_SECS", "120")?;

    let max_workers = parse_positive_usize("REELMATCH_MAX_WORKERS", "5")?;
    let max_retries = parse_u32("REELMATCH_MAX_RETRIES", "10")?;
    let retry_backoff_base_ms = parse_u64("REELMATCH_RETRY_BACKOFF_BASE_MS", "500")?;
    let default_max_posts = parse_positive_usize("REELMATCH_DEFAULT_MAX_POSTS", "10")?;
    let pipeline_deadline_secs = parse_u64("REELMATCH_PIPELINE_DEADLINE_SECS", "300")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        apify_token,
        apify_base_url,
        scraper_timeout_secs,
        scraper_user_agent,
        fetch_timeout_secs,
        max_workers,
        max_retries,
        retry_backoff_base_ms,
        default_max_posts,
        pipeline_deadline_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "REELMATCH_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
