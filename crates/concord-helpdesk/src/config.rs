//! Helpdesk adapter configuration.

use serde::Deserialize;

use concord_core::fields::{
    default_asset_fields, default_user_fields, FieldTable, ASSET_FIELD_NAMES, USER_FIELD_NAMES,
};
use concord_core::{AdapterError, AdapterResult};

/// Connection and schema settings for the helpdesk database.
#[derive(Clone, Deserialize)]
pub struct HelpdeskConfig {
    /// MySQL connection URL.
    pub database_url: String,
    /// Custom list holding the asset register.
    #[serde(default = "default_asset_list_id")]
    pub asset_list_id: u32,
    /// Form whose entries hold the per-user custom attributes.
    #[serde(default = "default_contact_form_id")]
    pub contact_form_id: u32,
    /// Organization every synchronized user belongs to.
    #[serde(default = "default_org_id")]
    pub org_id: u64,
    /// Timezone written onto created accounts.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Authentication backend written onto created accounts; accounts
    /// log in against the directory, never with a local password.
    #[serde(default = "default_auth_backend")]
    pub auth_backend: String,
    /// Field-id table for asset list-item properties.
    #[serde(default = "default_asset_fields")]
    pub asset_fields: FieldTable,
    /// Field-id table for the user contact form.
    #[serde(default = "default_user_fields")]
    pub user_fields: FieldTable,
    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_asset_list_id() -> u32 {
    3
}

fn default_contact_form_id() -> u32 {
    1
}

fn default_org_id() -> u64 {
    2
}

fn default_timezone() -> String {
    "Australia/Brisbane".to_string()
}

fn default_auth_backend() -> String {
    "ldap.client".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl HelpdeskConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            asset_list_id: default_asset_list_id(),
            contact_form_id: default_contact_form_id(),
            org_id: default_org_id(),
            timezone: default_timezone(),
            auth_backend: default_auth_backend(),
            asset_fields: default_asset_fields(),
            user_fields: default_user_fields(),
            max_connections: default_max_connections(),
        }
    }

    /// Static validation. The field tables are additionally checked
    /// against the live schema when the store connects.
    pub fn validate(&self) -> AdapterResult<()> {
        if !self.database_url.starts_with("mysql://") {
            return Err(AdapterError::invalid_configuration(
                "helpdesk database_url must start with mysql://",
            ));
        }
        self.asset_fields.require(ASSET_FIELD_NAMES)?;
        self.user_fields.require(USER_FIELD_NAMES)?;
        Ok(())
    }
}

impl std::fmt::Debug for HelpdeskConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelpdeskConfig")
            .field("database_url", &"mysql://***")
            .field("asset_list_id", &self.asset_list_id)
            .field("contact_form_id", &self.contact_form_id)
            .field("org_id", &self.org_id)
            .field("timezone", &self.timezone)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::record::field;

    #[test]
    fn defaults_pass_validation() {
        HelpdeskConfig::new("mysql://sync:pw@db/helpdesk")
            .validate()
            .unwrap();
    }

    #[test]
    fn non_mysql_url_is_rejected() {
        let cfg = HelpdeskConfig::new("postgres://db/helpdesk");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn incomplete_user_field_table_is_rejected() {
        let mut cfg = HelpdeskConfig::new("mysql://db/helpdesk");
        cfg.user_fields = FieldTable::from_pairs(&[(field::DN, 51)]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_redacts_credentials() {
        let cfg = HelpdeskConfig::new("mysql://sync:hunter2@db/helpdesk");
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
