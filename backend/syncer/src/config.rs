//! Application configuration loaded from environment variables.

use kanemane_core::entitlement::{DEFAULT_PROFILE_PATH, DEFAULT_SUBSCRIPTION_PATH};

use crate::errors::{Result, SyncError};

#[derive(Debug, Clone)]
pub struct Config {
    /// Kanemane backend base URL (e.g. https://kanemane.com/api)
    pub api_url: String,
    /// Bearer token sent with every backend request
    pub auth_token: String,
    /// Port for the local REST API server
    pub api_port: u16,
    /// How often (in seconds) to re-fetch status and data from the backend
    pub poll_interval_secs: u64,
    /// Per-request timeout for backend calls
    pub request_timeout_secs: u64,
    /// First delay before retrying a failed read; doubles on each retry
    pub retry_backoff_secs: u64,
    /// Where users without a plan are sent
    pub subscription_path: String,
    /// Paths that never redirect, even without a plan
    pub exempt_paths: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            api_url: env_var("API_URL")
                .unwrap_or_else(|_| "https://kanemane.com/api".to_string())
                .trim_end_matches('/')
                .to_string(),
            auth_token: env_var("AUTH_TOKEN").map_err(|_| {
                SyncError::Config("AUTH_TOKEN environment variable is required".to_string())
            })?,
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| SyncError::Config("Invalid API_PORT".to_string()))?,
            poll_interval_secs: parse_secs(
                "POLL_INTERVAL_SECS",
                &env_var("POLL_INTERVAL_SECS").unwrap_or_else(|_| "30".to_string()),
            )?,
            request_timeout_secs: parse_secs(
                "REQUEST_TIMEOUT_SECS",
                &env_var("REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string()),
            )?,
            retry_backoff_secs: parse_secs(
                "RETRY_BACKOFF_SECS",
                &env_var("RETRY_BACKOFF_SECS").unwrap_or_else(|_| "2".to_string()),
            )?,
            subscription_path: env_var("SUBSCRIPTION_PATH")
                .unwrap_or_else(|_| DEFAULT_SUBSCRIPTION_PATH.to_string()),
            exempt_paths: env_var("EXEMPT_PATHS")
                .map(|raw| parse_path_list(&raw))
                .unwrap_or_else(|_| {
                    vec![
                        DEFAULT_SUBSCRIPTION_PATH.to_string(),
                        DEFAULT_PROFILE_PATH.to_string(),
                    ]
                }),
        })
    }
}

/// Split a comma-separated path list, dropping blanks.
pub fn parse_path_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// A whole number of seconds, at least 1.
pub fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(SyncError::Config(format!("{key} must be at least 1"))),
        Ok(secs) => Ok(secs),
        Err(_) => Err(SyncError::Config(format!("Invalid {key}: {raw:?}"))),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| SyncError::Config(format!("Missing env var: {key}")))
}
