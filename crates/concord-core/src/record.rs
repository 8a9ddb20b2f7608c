//! Canonical records and per-run snapshots.
//!
//! Every system of record is normalized into one of two canonical
//! shapes before reconciliation: [`AssetRecord`] for physical assets
//! and [`UserRecord`] for people. Records fetched from a *target*
//! system additionally carry the linkage identifiers needed to address
//! them for update/disable/remove; those are held in a
//! [`TargetEntry`] so the reconciler never has to know what a linkage
//! looks like.

use std::collections::BTreeMap;

/// Canonical field names shared by every adapter.
///
/// Diffing, field-id tables and target field maps all key on these
/// constants, so a typo in one adapter becomes a compile error or an
/// obvious test failure instead of a silent mismatch.
pub mod field {
    // Asset fields.
    pub const INVENTORY_ID: &str = "inventory_id";
    pub const MANUFACTURER: &str = "manufacturer";
    pub const MODEL: &str = "model";
    pub const STATUS: &str = "status";
    pub const SERIAL_NUMBER: &str = "serial_number";
    pub const ASSET_TAG: &str = "asset_tag";
    pub const ITEM_TYPE: &str = "item_type";

    // User fields.
    pub const GIVEN_NAME: &str = "given_name";
    pub const FAMILY_NAME: &str = "family_name";
    pub const ACCOUNT_NAME: &str = "account_name";
    pub const EMAIL: &str = "email";
    pub const EMPLOYEE_ID: &str = "employee_id";
    pub const CLASSIFICATION: &str = "classification";
    pub const YEAR_OR_TYPE: &str = "year_or_type";
    pub const TITLE: &str = "title";
    pub const DN: &str = "dn";
    pub const DISPLAY_LABEL: &str = "display_label";
}

/// A canonical-name-to-value map used for diffing.
pub type FieldMap = BTreeMap<&'static str, String>;

/// Anything addressable by a business key.
pub trait Keyed {
    /// The stable identifier used to match this record across systems.
    fn business_key(&self) -> String;
}

/// Anything that can expose its diffable fields.
pub trait FieldView {
    /// Canonical field map for structural diffing.
    fn fields(&self) -> FieldMap;
}

/// Canonical representation of one physical asset.
///
/// The business key is the authoritative inventory id rendered as a
/// string; it uniquely identifies the asset in both systems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub inventory_id: u64,
    pub manufacturer: String,
    pub model: String,
    pub status: String,
    pub serial_number: String,
    pub asset_tag: String,
    pub item_type: String,
}

impl Keyed for AssetRecord {
    fn business_key(&self) -> String {
        self.inventory_id.to_string()
    }
}

impl FieldView for AssetRecord {
    fn fields(&self) -> FieldMap {
        FieldMap::from([
            (field::INVENTORY_ID, self.inventory_id.to_string()),
            (field::MANUFACTURER, self.manufacturer.clone()),
            (field::MODEL, self.model.clone()),
            (field::STATUS, self.status.clone()),
            (field::SERIAL_NUMBER, self.serial_number.clone()),
            (field::ASSET_TAG, self.asset_tag.clone()),
            (field::ITEM_TYPE, self.item_type.clone()),
        ])
    }
}

/// Canonical representation of one person.
///
/// Stored values keep the directory's casing; the business key is the
/// employee id lowercased so matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub given_name: String,
    pub family_name: String,
    pub account_name: String,
    pub email: String,
    pub employee_id: String,
    pub classification: String,
    pub year_or_type: String,
    pub title: String,
    pub dn: String,
    pub display_label: String,
}

impl Keyed for UserRecord {
    fn business_key(&self) -> String {
        self.employee_id.to_lowercase()
    }
}

impl FieldView for UserRecord {
    fn fields(&self) -> FieldMap {
        FieldMap::from([
            (field::GIVEN_NAME, self.given_name.clone()),
            (field::FAMILY_NAME, self.family_name.clone()),
            (field::ACCOUNT_NAME, self.account_name.clone()),
            (field::EMAIL, self.email.clone()),
            (field::EMPLOYEE_ID, self.employee_id.clone()),
            (field::CLASSIFICATION, self.classification.clone()),
            (field::YEAR_OR_TYPE, self.year_or_type.clone()),
            (field::TITLE, self.title.clone()),
            (field::DN, self.dn.clone()),
            (field::DISPLAY_LABEL, self.display_label.clone()),
        ])
    }
}

/// A record fetched from a target system: its diffable fields plus the
/// linkage identifiers needed to address it again.
#[derive(Debug, Clone)]
pub struct TargetEntry<L> {
    /// Business key, already normalized by the adapter.
    pub key: String,
    /// Canonical fields this target actually stores. Fields the target
    /// does not store simply never participate in a diff.
    pub fields: FieldMap,
    /// Target-internal identifiers (row/entry ids).
    pub linkage: L,
    /// Whether the record is currently active in the target. Inactive
    /// entries force an update (needs-refresh) and are skipped when
    /// emitting disables.
    pub active: bool,
}

impl<L> TargetEntry<L> {
    /// Create an active entry with no fields yet.
    pub fn new(key: impl Into<String>, linkage: L) -> Self {
        Self {
            key: key.into(),
            fields: FieldMap::new(),
            linkage,
            active: true,
        }
    }

    /// Add a canonical field.
    #[must_use]
    pub fn with_field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.insert(name, value.into());
        self
    }

    /// Mark the entry inactive (disabled in the target).
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

impl<L> Keyed for TargetEntry<L> {
    fn business_key(&self) -> String {
        self.key.clone()
    }
}

impl<L> FieldView for TargetEntry<L> {
    fn fields(&self) -> FieldMap {
        self.fields.clone()
    }
}

/// A full set of canonical records from one system, keyed by business
/// key and owned by exactly one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Snapshot<R> {
    records: BTreeMap<String, R>,
}

impl<R> Default for Snapshot<R> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }
}

impl<R> Snapshot<R> {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate in business-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &R)> {
        self.records.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }
}

impl<R: Keyed> Snapshot<R> {
    /// Insert a record under its own business key. If the key is
    /// already present the previous record is displaced and returned
    /// (last write wins); callers log the collision.
    pub fn insert(&mut self, record: R) -> Option<R> {
        self.records.insert(record.business_key(), record)
    }
}

impl<R: Keyed> FromIterator<R> for Snapshot<R> {
    fn from_iter<T: IntoIterator<Item = R>>(iter: T) -> Self {
        let mut snapshot = Self::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}
