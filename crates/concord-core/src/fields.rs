//! Field-id tables for the helpdesk's custom-form storage.
//!
//! The helpdesk stores custom attributes under numeric field ids, not
//! names. The mapping between those ids and canonical attribute names
//! is configuration, not logic: it has to agree exactly with the live
//! form configuration, so it is supplied externally (JSON) and
//! validated at startup. A mismatch here silently corrupts data, which
//! is why coverage and duplicate ids are checked before any pass runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};
use crate::record::field;

/// Canonical names the asset properties table must cover.
pub const ASSET_FIELD_NAMES: &[&str] = &[
    field::INVENTORY_ID,
    field::MANUFACTURER,
    field::MODEL,
    field::STATUS,
    field::SERIAL_NUMBER,
    field::ASSET_TAG,
    field::ITEM_TYPE,
];

/// Canonical names the user contact-form table must cover.
pub const USER_FIELD_NAMES: &[&str] = &[
    field::DN,
    field::EMPLOYEE_ID,
    field::YEAR_OR_TYPE,
    field::TITLE,
];

/// Bidirectional canonical-name to numeric-field-id table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldTable {
    map: BTreeMap<String, u32>,
}

impl FieldTable {
    pub fn from_pairs(pairs: &[(&str, u32)]) -> Self {
        Self {
            map: pairs
                .iter()
                .map(|(name, id)| ((*name).to_string(), *id))
                .collect(),
        }
    }

    /// Parse from a JSON object of `{"canonical_name": id}`.
    pub fn from_json(json: &str) -> AdapterResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            AdapterError::field_table(format!("field table is not a name-to-id JSON object: {e}"))
        })
    }

    /// Numeric id for a canonical name.
    pub fn id(&self, name: &str) -> AdapterResult<u32> {
        self.map.get(name).copied().ok_or_else(|| {
            AdapterError::field_table(format!("no field id configured for '{name}'"))
        })
    }

    /// Canonical name for a numeric id.
    pub fn name_for(&self, id: u32) -> Option<&str> {
        self.map
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }

    /// All configured ids.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.map.values().copied()
    }

    /// Iterate name/id pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.map.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Validate that every required canonical name is present and that
    /// no two names share an id.
    pub fn require(&self, names: &[&str]) -> AdapterResult<()> {
        for name in names {
            if !self.map.contains_key(*name) {
                return Err(AdapterError::field_table(format!(
                    "field table is missing required attribute '{name}'"
                )));
            }
        }
        let mut seen = BTreeMap::new();
        for (name, id) in &self.map {
            if let Some(other) = seen.insert(*id, name.as_str()) {
                return Err(AdapterError::field_table(format!(
                    "field id {id} is mapped to both '{other}' and '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// Observed live ids for the helpdesk asset list properties.
pub fn default_asset_fields() -> FieldTable {
    FieldTable::from_pairs(&[
        (field::INVENTORY_ID, 42),
        (field::MANUFACTURER, 43),
        (field::MODEL, 44),
        (field::STATUS, 45),
        (field::SERIAL_NUMBER, 46),
        (field::ASSET_TAG, 47),
        (field::ITEM_TYPE, 48),
    ])
}

/// Observed live ids for the helpdesk user contact form.
pub fn default_user_fields() -> FieldTable {
    FieldTable::from_pairs(&[
        (field::DN, 51),
        (field::EMPLOYEE_ID, 52),
        (field::YEAR_OR_TYPE, 53),
        (field::TITLE, 54),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_required_names() {
        default_asset_fields().require(ASSET_FIELD_NAMES).unwrap();
        default_user_fields().require(USER_FIELD_NAMES).unwrap();
    }

    #[test]
    fn lookup_both_directions() {
        let table = default_user_fields();
        assert_eq!(table.id(field::EMPLOYEE_ID).unwrap(), 52);
        assert_eq!(table.name_for(54), Some(field::TITLE));
        assert_eq!(table.name_for(99), None);
        assert!(table.id("nonexistent").is_err());
    }

    #[test]
    fn json_round_trip() {
        let table = FieldTable::from_json(r#"{"dn": 51, "employee_id": 52}"#).unwrap();
        assert_eq!(table.id("dn").unwrap(), 51);
        assert_eq!(table.len(), 2);
        assert!(FieldTable::from_json("[1,2,3]").is_err());
    }

    #[test]
    fn missing_required_name_is_rejected() {
        let table = FieldTable::from_pairs(&[(field::DN, 51)]);
        let err = table.require(USER_FIELD_NAMES).unwrap_err();
        assert!(err.to_string().contains("employee_id"));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let table = FieldTable::from_pairs(&[(field::DN, 51), (field::TITLE, 51)]);
        let err = table.require(&[field::DN]).unwrap_err();
        assert!(err.to_string().contains("51"));
    }
}
