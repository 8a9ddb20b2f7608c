//! Directory adapter configuration.

use concord_core::{AdapterError, AdapterResult};

/// Connection and search settings for the directory service.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Server URL, e.g. `ldap://dc01.example.edu:389` or `ldaps://...`.
    pub url: String,
    /// DN used for the service bind.
    pub bind_dn: String,
    /// Password for the service bind.
    pub bind_password: String,
    /// Search base for the user subtree.
    pub search_base: String,
    /// Filter selecting the accounts to synchronize.
    pub search_filter: String,
}

impl DirectoryConfig {
    pub fn validate(&self) -> AdapterResult<()> {
        if !self.url.starts_with("ldap://") && !self.url.starts_with("ldaps://") {
            return Err(AdapterError::invalid_configuration(format!(
                "directory url must start with ldap:// or ldaps://, got '{}'",
                self.url
            )));
        }
        for (name, value) in [
            ("bind_dn", &self.bind_dn),
            ("search_base", &self.search_base),
            ("search_filter", &self.search_filter),
        ] {
            if value.is_empty() {
                return Err(AdapterError::invalid_configuration(format!(
                    "directory {name} must not be empty"
                )));
            }
        }
        Ok(())
    }
}
