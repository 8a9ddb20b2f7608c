//! Connection pool and startup schema validation.

use std::collections::BTreeSet;

use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySqlPool, Row};
use tracing::{debug, info};

use concord_core::{AdapterError, AdapterResult};

use crate::config::HelpdeskConfig;

/// Shared handle to the helpdesk database.
pub struct HelpdeskStore {
    pub(crate) pool: MySqlPool,
    pub(crate) config: HelpdeskConfig,
}

impl HelpdeskStore {
    /// Connect and verify that the configured field ids exist in the
    /// live schema. Writing under a wrong field id corrupts forms
    /// silently, so a mismatch refuses to start.
    pub async fn connect(config: HelpdeskConfig) -> AdapterResult<Self> {
        config.validate()?;

        debug!(
            max_connections = config.max_connections,
            "connecting to helpdesk database"
        );
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| AdapterError::database("connecting to helpdesk database", e))?;

        let store = Self { pool, config };
        store.validate_schema().await?;
        Ok(store)
    }

    pub fn config(&self) -> &HelpdeskConfig {
        &self.config
    }

    async fn validate_schema(&self) -> AdapterResult<()> {
        let rows = sqlx::query("SELECT id FROM ost_form_field")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AdapterError::database("loading form field ids", e))?;

        let mut live_ids = BTreeSet::new();
        for row in &rows {
            let id: u32 = row
                .try_get("id")
                .map_err(|e| AdapterError::database("decoding form field id", e))?;
            live_ids.insert(id);
        }

        for (table_name, table) in [
            ("asset", &self.config.asset_fields),
            ("user", &self.config.user_fields),
        ] {
            for (name, id) in table.iter() {
                if !live_ids.contains(&id) {
                    return Err(AdapterError::field_table(format!(
                        "{table_name} field '{name}' is mapped to id {id}, \
                         which does not exist in ost_form_field"
                    )));
                }
            }
        }

        let list = sqlx::query("SELECT id FROM ost_list WHERE id = ?")
            .bind(self.config.asset_list_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AdapterError::database("checking asset list", e))?;
        if list.is_none() {
            return Err(AdapterError::field_table(format!(
                "asset list {} does not exist in ost_list",
                self.config.asset_list_id
            )));
        }

        info!(
            form_fields = live_ids.len(),
            asset_list_id = self.config.asset_list_id,
            "helpdesk schema validated"
        );
        Ok(())
    }
}

/// Timestamp in the helpdesk's expected local format.
pub(crate) fn now_str() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
