//! Configuration for the request core.

use crate::error::{Error, Result};
use std::env;

/// Default name of the local collection holding pending sync operations.
pub const DEFAULT_SYNC_COLLECTION: &str = "sync";

/// Default cap on the serialized custom-request-properties header, in bytes.
pub const DEFAULT_MAX_CUSTOM_PROPS_BYTES: usize = 2000;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default maximum number of entity ids per delta-set batch request.
pub const DEFAULT_MAX_IDS_PER_REQUEST: usize = 200;

/// Default backend API version.
pub const DEFAULT_API_VERSION: u32 = 3;

/// Tunables for request execution, loaded from the environment or defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Local collection name for pending sync operations
    pub sync_collection: String,
    /// Cap on the serialized custom-request-properties header, in bytes
    pub max_custom_props_bytes: usize,
    /// Timeout applied to requests that do not set their own, in milliseconds
    pub default_timeout_ms: u64,
    /// Maximum entity ids per delta-set batch request
    pub max_ids_per_request: usize,
    /// Backend API version sent with every request
    pub api_version: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_collection: DEFAULT_SYNC_COLLECTION.to_string(),
            max_custom_props_bytes: DEFAULT_MAX_CUSTOM_PROPS_BYTES,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_ids_per_request: DEFAULT_MAX_IDS_PER_REQUEST,
            api_version: DEFAULT_API_VERSION,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let sync_collection = env::var("SYNC_COLLECTION_NAME")
            .unwrap_or_else(|_| DEFAULT_SYNC_COLLECTION.to_string());

        let max_custom_props_bytes =
            parse_var("MAX_CUSTOM_PROPS_BYTES", DEFAULT_MAX_CUSTOM_PROPS_BYTES)?;
        let default_timeout_ms = parse_var("DEFAULT_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let max_ids_per_request =
            parse_var("MAX_IDS_PER_REQUEST", DEFAULT_MAX_IDS_PER_REQUEST)?;
        let api_version = parse_var("API_VERSION", DEFAULT_API_VERSION)?;

        Ok(Self {
            sync_collection,
            max_custom_props_bytes,
            default_timeout_ms,
            max_ids_per_request,
            api_version,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid value for {}: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
