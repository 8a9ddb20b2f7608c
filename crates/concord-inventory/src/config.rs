//! Inventory adapter configuration.

use serde::Deserialize;

use concord_core::{AdapterError, AdapterResult};

use crate::rate_limit::RateLimit;

/// Connection settings for the asset-inventory API.
#[derive(Clone, Deserialize)]
pub struct InventoryConfig {
    /// Base URL of the inventory server, without the API prefix.
    pub base_url: String,
    /// API token used as a bearer credential.
    pub token: String,
    /// Rows requested per page on list endpoints.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Inventory accounts that must never be treated as synchronized
    /// users (local service accounts).
    #[serde(default = "default_ignored_usernames")]
    pub ignored_usernames: Vec<String>,
    /// Read quota of the API.
    #[serde(default = "RateLimit::reads")]
    pub read_limit: RateLimit,
    /// Write quota of the API.
    #[serde(default = "RateLimit::writes")]
    pub write_limit: RateLimit,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_page_size() -> u32 {
    50
}

fn default_ignored_usernames() -> Vec<String> {
    vec!["administrator".to_string(), "sccm".to_string()]
}

fn default_timeout_secs() -> u64 {
    30
}

impl InventoryConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            page_size: default_page_size(),
            ignored_usernames: default_ignored_usernames(),
            read_limit: RateLimit::reads(),
            write_limit: RateLimit::writes(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn validate(&self) -> AdapterResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AdapterError::invalid_configuration(format!(
                "inventory base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.token.is_empty() {
            return Err(AdapterError::invalid_configuration(
                "inventory token must not be empty",
            ));
        }
        if self.page_size == 0 {
            return Err(AdapterError::invalid_configuration(
                "inventory page_size must be at least 1",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for InventoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryConfig")
            .field("base_url", &self.base_url)
            .field("token", &"***")
            .field("page_size", &self.page_size)
            .field("ignored_usernames", &self.ignored_usernames)
            .finish()
    }
}
