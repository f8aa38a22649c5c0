//! Cart store configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PANTRY_API_BASE_URL` - Base URL of the backend REST API (e.g., `https://api.example.com/api/`)
//!
//! ## Optional
//! - `PANTRY_STORAGE_DIR` - Directory for persisted cart and credential files (default: `.pantry`)
//! - `PANTRY_NOTIFICATION_SECS` - Seconds before an add-to-cart notification auto-dismisses (default: 3)
//! - `PANTRY_REQUEST_TIMEOUT_SECS` - Per-request timeout for backend calls (default: none)
//! - `PANTRY_CURRENCY` - ISO currency code used for display (default: INR)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use pantry_core::CurrencyCode;
use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_DIR: &str = ".pantry";
const DEFAULT_NOTIFICATION_SECS: u64 = 3;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart store configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Backend REST API base URL, always ending in `/`
    pub api_base_url: Url,
    /// Directory holding the persisted cart snapshot and auth token
    pub storage_dir: PathBuf,
    /// How long an add-to-cart notification stays visible
    pub notification_ttl: Duration,
    /// Optional timeout applied to every backend request
    pub request_timeout: Option<Duration>,
    /// Currency used when formatting totals
    pub currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_base_url = lookup("PANTRY_API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("PANTRY_API_BASE_URL".to_string()))?;
        let api_base_url = parse_base_url(&raw_base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("PANTRY_API_BASE_URL".to_string(), e)
        })?;

        let storage_dir = PathBuf::from(
            lookup("PANTRY_STORAGE_DIR").unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string()),
        );

        let notification_secs = match lookup("PANTRY_NOTIFICATION_SECS") {
            Some(raw) => parse_secs("PANTRY_NOTIFICATION_SECS", &raw)?,
            None => DEFAULT_NOTIFICATION_SECS,
        };

        let request_timeout = lookup("PANTRY_REQUEST_TIMEOUT_SECS")
            .map(|raw| parse_secs("PANTRY_REQUEST_TIMEOUT_SECS", &raw))
            .transpose()?
            .map(Duration::from_secs);

        let currency = match lookup("PANTRY_CURRENCY") {
            Some(raw) => raw.parse::<CurrencyCode>().map_err(|e| {
                ConfigError::InvalidEnvVar("PANTRY_CURRENCY".to_string(), e.to_string())
            })?,
            None => CurrencyCode::default(),
        };

        Ok(Self {
            api_base_url,
            storage_dir,
            notification_ttl: Duration::from_secs(notification_secs),
            request_timeout,
            currency,
            sentry_dsn: lookup("SENTRY_DSN").filter(|v| !v.is_empty()),
        })
    }

    /// Configuration pointing at `api_base_url` with all defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL cannot be parsed.
    pub fn with_base_url(api_base_url: &str) -> Result<Self, ConfigError> {
        let owned = api_base_url.to_string();
        Self::from_source(move |key| (key == "PANTRY_API_BASE_URL").then(|| owned.clone()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a base URL and make sure relative joins append to its path.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err("URL cannot be used as a base".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_secs(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CartConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CartConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("PANTRY_API_BASE_URL", "http://localhost:5000/api")]).unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:5000/api/");
        assert_eq!(config.storage_dir, PathBuf::from(".pantry"));
        assert_eq!(config.notification_ttl, Duration::from_secs(3));
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.currency, CurrencyCode::INR);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_base_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "PANTRY_API_BASE_URL"));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = load(&[("PANTRY_API_BASE_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PANTRY_API_BASE_URL", "https://api.example.com/"),
            ("PANTRY_STORAGE_DIR", "/tmp/cart"),
            ("PANTRY_NOTIFICATION_SECS", "5"),
            ("PANTRY_REQUEST_TIMEOUT_SECS", "10"),
            ("PANTRY_CURRENCY", "usd"),
            ("SENTRY_DSN", "https://key@sentry.example.com/1"),
        ])
        .unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://api.example.com/");
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/cart"));
        assert_eq!(config.notification_ttl, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.currency, CurrencyCode::USD);
        assert!(config.sentry_dsn.is_some());
    }

    #[test]
    fn test_invalid_numbers() {
        let err = load(&[
            ("PANTRY_API_BASE_URL", "http://localhost/"),
            ("PANTRY_NOTIFICATION_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "PANTRY_NOTIFICATION_SECS"));
    }

    #[test]
    fn test_with_base_url() {
        let config = CartConfig::with_base_url("http://127.0.0.1:9000").unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://127.0.0.1:9000/");
        assert!(CartConfig::with_base_url("::").is_err());
    }
}
