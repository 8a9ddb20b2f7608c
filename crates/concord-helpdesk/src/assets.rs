//! Asset register: custom list items in the helpdesk.
//!
//! Each asset is one `ost_list_items` row. The canonical fields live
//! in the `properties` column as a JSON object keyed by numeric field
//! id; `value` and `extra` are human-readable composites derived from
//! the same fields.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;
use tracing::{info, warn};

use concord_core::fields::FieldTable;
use concord_core::record::field;
use concord_core::{
    mapper, Action, ActionSink, AdapterError, AdapterResult, AssetRecord, FieldMap, Snapshot,
    SnapshotSource, TargetEntry,
};

use crate::store::HelpdeskStore;

/// List-item row id.
pub type HelpdeskItemId = u64;

/// Enabled list-item status.
const ITEM_STATUS_ENABLED: i32 = 1;

/// Render the properties JSON for one asset: `{"<field id>": value}`.
pub fn encode_properties(record: &AssetRecord, table: &FieldTable) -> AdapterResult<String> {
    let mut object = serde_json::Map::new();
    for (name, value) in concord_core::FieldView::fields(record) {
        let id = table.id(name)?;
        object.insert(id.to_string(), serde_json::Value::String(value));
    }
    serde_json::to_string(&serde_json::Value::Object(object)).map_err(|e| {
        AdapterError::Serialization {
            message: format!("encoding asset properties: {e}"),
        }
    })
}

/// Parse a properties JSON object back into canonical fields. Ids not
/// present in the table belong to other forms and are skipped.
pub fn decode_properties(raw: &str, table: &FieldTable) -> AdapterResult<FieldMap> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| AdapterError::Serialization {
            message: format!("asset properties are not valid JSON: {e}"),
        })?;
    let object = value
        .as_object()
        .ok_or_else(|| AdapterError::Serialization {
            message: "asset properties are not a JSON object".to_string(),
        })?;

    let mut fields = FieldMap::new();
    for (key, value) in object {
        let Ok(id) = key.parse::<u32>() else {
            warn!(key = %key, "non-numeric asset property id, skipping");
            continue;
        };
        let Some(name) = table.name_for(id) else {
            continue;
        };
        // Field names come from the table, which only maps canonical
        // constants, so interning back to 'static is safe.
        let name = field_by_name(name).ok_or_else(|| AdapterError::Serialization {
            message: format!("unknown canonical field '{name}'"),
        })?;
        fields.insert(name, value.as_str().unwrap_or_default().to_string());
    }
    Ok(fields)
}

fn field_by_name(name: &str) -> Option<&'static str> {
    [
        field::INVENTORY_ID,
        field::MANUFACTURER,
        field::MODEL,
        field::STATUS,
        field::SERIAL_NUMBER,
        field::ASSET_TAG,
        field::ITEM_TYPE,
    ]
    .into_iter()
    .find(|candidate| *candidate == name)
}

fn item_value(record: &AssetRecord) -> String {
    mapper::asset_description(
        &record.item_type,
        &record.manufacturer,
        &record.model,
        &record.asset_tag,
        &record.serial_number,
    )
}

impl HelpdeskStore {
    /// Fetch the asset register as a target snapshot. Rows whose
    /// properties carry no inventory id cannot be matched and are
    /// skipped with a warning.
    pub async fn fetch_assets(&self) -> AdapterResult<Snapshot<TargetEntry<HelpdeskItemId>>> {
        let rows = sqlx::query("SELECT id, properties FROM ost_list_items WHERE list_id = ?")
            .bind(self.config.asset_list_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AdapterError::database("fetching asset list items", e))?;

        let mut snapshot = Snapshot::new();
        let mut skipped = 0usize;

        for row in &rows {
            let id: u64 = row
                .try_get("id")
                .map_err(|e| AdapterError::database("decoding list item id", e))?;
            let properties: Option<String> = row
                .try_get("properties")
                .map_err(|e| AdapterError::database("decoding list item properties", e))?;

            let fields = match properties
                .as_deref()
                .map(|raw| decode_properties(raw, &self.config.asset_fields))
            {
                Some(Ok(fields)) => fields,
                Some(Err(e)) => {
                    warn!(item_id = id, error = %e, "unreadable asset properties, skipping row");
                    skipped += 1;
                    continue;
                }
                None => {
                    warn!(item_id = id, "asset row has no properties, skipping");
                    skipped += 1;
                    continue;
                }
            };

            let Some(key) = fields.get(field::INVENTORY_ID).filter(|v| !v.is_empty()) else {
                warn!(item_id = id, "asset row has no inventory id, skipping");
                skipped += 1;
                continue;
            };

            let mut entry = TargetEntry::new(key.clone(), id);
            entry.fields = fields;
            let key = entry.key.clone();
            if snapshot.insert(entry).is_some() {
                warn!(key = %key, "duplicate inventory id in helpdesk, keeping last row");
            }
        }

        info!(
            assets = snapshot.len(),
            skipped, "helpdesk asset snapshot loaded"
        );
        Ok(snapshot)
    }

    pub async fn create_asset(&self, record: &AssetRecord) -> AdapterResult<()> {
        let properties = encode_properties(record, &self.config.asset_fields)?;
        sqlx::query(
            "INSERT INTO ost_list_items (list_id, status, value, extra, sort, properties) \
             VALUES (?, ?, ?, ?, 1, ?)",
        )
        .bind(self.config.asset_list_id)
        .bind(ITEM_STATUS_ENABLED)
        .bind(item_value(record))
        .bind(mapper::asset_extra(&record.manufacturer, &record.model))
        .bind(properties)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AdapterError::database(format!("creating asset {}", record.inventory_id), e)
        })?;
        Ok(())
    }

    pub async fn update_asset(&self, id: HelpdeskItemId, record: &AssetRecord) -> AdapterResult<()> {
        let properties = encode_properties(record, &self.config.asset_fields)?;
        sqlx::query("UPDATE ost_list_items SET value = ?, extra = ?, properties = ? WHERE id = ?")
            .bind(item_value(record))
            .bind(mapper::asset_extra(&record.manufacturer, &record.model))
            .bind(properties)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AdapterError::database(format!("updating asset {}", record.inventory_id), e)
            })?;
        Ok(())
    }

    pub async fn delete_asset(&self, id: HelpdeskItemId) -> AdapterResult<()> {
        sqlx::query("DELETE FROM ost_list_items WHERE id = ? AND list_id = ?")
            .bind(id)
            .bind(self.config.asset_list_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AdapterError::database(format!("deleting asset item {id}"), e))?;
        Ok(())
    }
}

/// Target-side view of the helpdesk asset register.
pub struct HelpdeskAssetSource {
    store: Arc<HelpdeskStore>,
}

impl HelpdeskAssetSource {
    pub fn new(store: Arc<HelpdeskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SnapshotSource for HelpdeskAssetSource {
    type Record = TargetEntry<HelpdeskItemId>;

    fn system(&self) -> &'static str {
        "helpdesk"
    }

    async fn fetch_all(&self) -> AdapterResult<Snapshot<TargetEntry<HelpdeskItemId>>> {
        self.store.fetch_assets().await
    }
}

/// Applies asset actions against the helpdesk list. Assets that left
/// the inventory are hard-deleted, so disable is not supported.
pub struct HelpdeskAssetSink {
    store: Arc<HelpdeskStore>,
}

impl HelpdeskAssetSink {
    pub fn new(store: Arc<HelpdeskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionSink<AssetRecord, HelpdeskItemId> for HelpdeskAssetSink {
    fn system(&self) -> &'static str {
        "helpdesk"
    }

    async fn apply(&self, action: &Action<AssetRecord, HelpdeskItemId>) -> AdapterResult<()> {
        match action {
            Action::Create { record } => self.store.create_asset(record).await,
            Action::Update {
                linkage, record, ..
            } => self.store.update_asset(*linkage, record).await,
            Action::Remove { linkage, .. } => self.store.delete_asset(*linkage).await,
            Action::Disable { .. } => Err(AdapterError::UnsupportedAction {
                system: "helpdesk",
                operation: "disable (assets are removed, not disabled)",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::fields::default_asset_fields;

    fn asset() -> AssetRecord {
        AssetRecord {
            inventory_id: 17,
            manufacturer: "Dell".into(),
            model: "Latitude 5420".into(),
            status: "Deployed".into(),
            serial_number: "ABC123".into(),
            asset_tag: "T-001".into(),
            item_type: "Laptop".into(),
        }
    }

    #[test]
    fn properties_round_trip_through_field_ids() {
        let table = default_asset_fields();
        let encoded = encode_properties(&asset(), &table).unwrap();

        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["42"], "17");
        assert_eq!(value["44"], "Latitude 5420");

        let fields = decode_properties(&encoded, &table).unwrap();
        assert_eq!(fields.get(field::INVENTORY_ID).unwrap(), "17");
        assert_eq!(fields.get(field::ASSET_TAG).unwrap(), "T-001");
        assert_eq!(fields.len(), 7);
    }

    #[test]
    fn unknown_property_ids_are_skipped() {
        let table = default_asset_fields();
        let fields =
            decode_properties(r#"{"42": "17", "99": "other form", "abc": "junk"}"#, &table)
                .unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get(field::INVENTORY_ID).unwrap(), "17");
    }

    #[test]
    fn malformed_properties_are_an_error() {
        let table = default_asset_fields();
        assert!(decode_properties("not json", &table).is_err());
        assert!(decode_properties("[1,2]", &table).is_err());
    }

    #[test]
    fn item_value_uses_the_description_rules() {
        assert_eq!(item_value(&asset()), "Latitude 5420 (T-001) (ABC123)");

        let mut charger = asset();
        charger.item_type = "Charger".into();
        charger.model = "65W USB-C".into();
        assert_eq!(item_value(&charger), "Dell Charger: 65W USB-C - T-001");
    }
}
