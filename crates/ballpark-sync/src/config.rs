//! Configuration management
//!
//! Store endpoint and credential come from the environment (a `.env` file is
//! honoured) and are never compiled in. Batch bounds have defaults that match
//! the store's request limits.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Environment variable holding the store base URL.
pub const STORE_URL_ENV: &str = "SUPABASE_URL";

/// Environment variable holding the service credential.
pub const STORE_KEY_ENV: &str = "SUPABASE_SERVICE_KEY";

/// Records per upsert/insert request.
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 500;

/// Keys per existence lookup; bounded by the store's `in (...)` limit.
pub const DEFAULT_LOOKUP_BATCH_SIZE: usize = 100;

/// Default HTTP timeout for store requests in seconds.
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 300;

/// Default directory of master/reference snapshots.
pub const DEFAULT_INPUT_DIR: &str = "input";

/// Default directory of scraped transaction snapshots.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// A credential that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Remote store connection settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: Secret,
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_key: Secret::new(service_key),
            timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
        }
    }

    /// Load from `SUPABASE_URL`, `SUPABASE_SERVICE_KEY` and
    /// `BALLPARK_STORE_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(STORE_URL_ENV).unwrap_or_default();
        let key = std::env::var(STORE_KEY_ENV).unwrap_or_default();

        let config = Self {
            url: url.trim().to_string(),
            service_key: Secret::new(key.trim()),
            timeout_secs: std::env::var("BALLPARK_STORE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_STORE_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() || self.service_key.expose().is_empty() {
            return Err(SyncError::config(format!(
                "{STORE_URL_ENV} and {STORE_KEY_ENV} must both be set"
            )));
        }

        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(SyncError::config(format!(
                "{STORE_URL_ENV} must be an http(s) URL, got '{}'",
                self.url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(SyncError::config("store timeout must be greater than 0"));
        }

        Ok(())
    }
}

/// Batch bounds for writes and existence lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub write_batch_size: usize,
    pub lookup_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
            lookup_batch_size: DEFAULT_LOOKUP_BATCH_SIZE,
        }
    }
}

impl BatchConfig {
    /// Load from `BALLPARK_WRITE_BATCH_SIZE` and `BALLPARK_LOOKUP_BATCH_SIZE`
    pub fn from_env() -> Result<Self> {
        let config = Self {
            write_batch_size: std::env::var("BALLPARK_WRITE_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WRITE_BATCH_SIZE),
            lookup_batch_size: std::env::var("BALLPARK_LOOKUP_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LOOKUP_BATCH_SIZE),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.write_batch_size == 0 {
            return Err(SyncError::config("write batch size must be greater than 0"));
        }

        if self.lookup_batch_size == 0 {
            return Err(SyncError::config("lookup batch size must be greater than 0"));
        }

        Ok(())
    }
}

/// Everything a sync run needs besides the table catalog
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub store: StoreConfig,
    pub batch: BatchConfig,
}

impl SyncConfig {
    /// Load `.env`, then read store and batch settings from the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            store: StoreConfig::from_env()?,
            batch: BatchConfig::from_env()?,
        })
    }
}
