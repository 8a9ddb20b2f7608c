//! Environment-driven configuration for the sync runner.
//!
//! Everything comes from the environment (or a `.env` file next to the
//! binary), the way the job runs under cron: no flags carry secrets.

use thiserror::Error;

use concord_core::fields::FieldTable;
use concord_directory::DirectoryConfig;
use concord_helpdesk::HelpdeskConfig;
use concord_inventory::InventoryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Full runner configuration, one section per system.
#[derive(Debug)]
pub struct AppConfig {
    pub directory: DirectoryConfig,
    pub inventory: InventoryConfig,
    pub helpdesk: HelpdeskConfig,
}

const DEFAULT_SEARCH_FILTER: &str = "(&(objectClass=user)(employeeID=*))";

fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name,
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            directory: directory_from_env()?,
            inventory: inventory_from_env()?,
            helpdesk: helpdesk_from_env()?,
        })
    }
}

fn directory_from_env() -> Result<DirectoryConfig, ConfigError> {
    Ok(DirectoryConfig {
        url: required("DIRECTORY_URL")?,
        bind_dn: required("DIRECTORY_BIND_DN")?,
        bind_password: required("DIRECTORY_BIND_PASSWORD")?,
        search_base: required("DIRECTORY_SEARCH_BASE")?,
        search_filter: optional("DIRECTORY_SEARCH_FILTER")
            .unwrap_or_else(|| DEFAULT_SEARCH_FILTER.to_string()),
    })
}

fn inventory_from_env() -> Result<InventoryConfig, ConfigError> {
    let mut config = InventoryConfig::new(required("INVENTORY_URL")?, required("INVENTORY_TOKEN")?);
    if let Some(raw) = optional("INVENTORY_IGNORED_USERNAMES") {
        config.ignored_usernames = raw
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }
    if let Some(page_size) = parsed::<u32>("INVENTORY_PAGE_SIZE")? {
        config.page_size = page_size;
    }
    Ok(config)
}

fn helpdesk_from_env() -> Result<HelpdeskConfig, ConfigError> {
    let host = required("HELPDESK_DB_HOST")?;
    let port = parsed::<u16>("HELPDESK_DB_PORT")?.unwrap_or(3306);
    let name = required("HELPDESK_DB_NAME")?;
    let user = required("HELPDESK_DB_USER")?;
    let password = required("HELPDESK_DB_PASS")?;

    let mut config =
        HelpdeskConfig::new(format!("mysql://{user}:{password}@{host}:{port}/{name}"));

    if let Some(list_id) = parsed::<u32>("HELPDESK_ASSET_LIST_ID")? {
        config.asset_list_id = list_id;
    }
    if let Some(form_id) = parsed::<u32>("HELPDESK_CONTACT_FORM_ID")? {
        config.contact_form_id = form_id;
    }
    if let Some(org_id) = parsed::<u64>("HELPDESK_ORG_ID")? {
        config.org_id = org_id;
    }
    if let Some(timezone) = optional("HELPDESK_TIMEZONE") {
        config.timezone = timezone;
    }
    if let Some(raw) = optional("HELPDESK_ASSET_FIELD_IDS") {
        config.asset_fields = field_table("HELPDESK_ASSET_FIELD_IDS", &raw)?;
    }
    if let Some(raw) = optional("HELPDESK_USER_FIELD_IDS") {
        config.user_fields = field_table("HELPDESK_USER_FIELD_IDS", &raw)?;
    }
    Ok(config)
}

fn field_table(name: &'static str, raw: &str) -> Result<FieldTable, ConfigError> {
    FieldTable::from_json(raw).map_err(|e| ConfigError::Invalid {
        name,
        message: e.to_string(),
    })
}
