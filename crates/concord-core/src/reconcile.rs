//! The reconciliation decision engine.
//!
//! Given an authoritative snapshot and a target snapshot, compute the
//! per-key actions that make the target converge on the authoritative
//! state. The engine never touches either system; it only decides.

use std::collections::BTreeSet;

use tracing::debug;

use crate::diff::changed_fields;
use crate::error::{AdapterError, AdapterResult};
use crate::record::{FieldView, Keyed, Snapshot, TargetEntry};

/// What to do with target records whose key no longer exists in the
/// authoritative snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsencePolicy {
    /// Hard-delete the target record (asset lists).
    Remove,
    /// Soft-disable the target record so historical references stay
    /// valid (user accounts).
    Disable,
}

/// Options for one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Fields skipped during diffing: target-internal, derived, or
    /// intentionally volatile.
    pub excluded_fields: BTreeSet<String>,
    /// Policy for keys present only in the target.
    pub absence: AbsencePolicy,
    /// Minimum number of authoritative records required before the
    /// engine will emit any absence actions against a non-empty
    /// target. A failed source fetch must never read as "authoritative
    /// has zero records".
    pub min_authoritative: usize,
    /// Explicit operator confirmation that tearing the target down is
    /// intended, overriding `min_authoritative`.
    pub allow_teardown: bool,
}

impl ReconcileOptions {
    pub fn new(absence: AbsencePolicy) -> Self {
        Self {
            excluded_fields: BTreeSet::new(),
            absence,
            min_authoritative: 1,
            allow_teardown: false,
        }
    }

    /// Exclude fields from diffing.
    #[must_use]
    pub fn exclude(mut self, fields: &[&str]) -> Self {
        self.excluded_fields
            .extend(fields.iter().map(|f| (*f).to_string()));
        self
    }

    /// Allow a full teardown of the target.
    #[must_use]
    pub fn allow_teardown(mut self, allow: bool) -> Self {
        self.allow_teardown = allow;
        self
    }
}

/// One independently applicable, independently failable change.
#[derive(Debug, Clone)]
pub enum Action<A, L> {
    /// Create a new target record from the authoritative one.
    Create { record: A },
    /// Rewrite an existing target record: the target's linkage merged
    /// with the authoritative field values.
    Update { key: String, linkage: L, record: A },
    /// Soft-disable an existing target record.
    Disable { key: String, linkage: L },
    /// Hard-delete an existing target record.
    Remove { key: String, linkage: L },
}

impl<A: Keyed, L> Action<A, L> {
    /// Business key this action addresses.
    pub fn key(&self) -> String {
        match self {
            Action::Create { record } => record.business_key(),
            Action::Update { key, .. } | Action::Disable { key, .. } | Action::Remove { key, .. } => {
                key.clone()
            }
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Create { .. } => ActionKind::Create,
            Action::Update { .. } => ActionKind::Update,
            Action::Disable { .. } => ActionKind::Disable,
            Action::Remove { .. } => ActionKind::Remove,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Disable,
    Remove,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Create => write!(f, "create"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Disable => write!(f, "disable"),
            ActionKind::Remove => write!(f, "remove"),
        }
    }
}

/// Compute the actions that converge `target` on `authoritative`.
///
/// Output is deterministic: creates and updates in business-key order,
/// then disables/removes in business-key order.
pub fn reconcile<A, L>(
    authoritative: &Snapshot<A>,
    target: &Snapshot<TargetEntry<L>>,
    options: &ReconcileOptions,
) -> AdapterResult<Vec<Action<A, L>>>
where
    A: Keyed + FieldView + Clone,
    L: Clone,
{
    if authoritative.len() < options.min_authoritative
        && !target.is_empty()
        && !options.allow_teardown
    {
        return Err(AdapterError::TeardownRefused {
            authoritative: authoritative.len(),
            target: target.len(),
        });
    }

    let mut actions = Vec::new();

    for (key, record) in authoritative.iter() {
        match target.get(key) {
            Some(entry) => {
                let record_fields = record.fields();
                let changed =
                    changed_fields(&record_fields, &entry.fields, &options.excluded_fields);
                if !changed.is_empty() || !entry.active {
                    debug!(
                        key = %key,
                        changed = ?changed,
                        needs_refresh = !entry.active,
                        "record differs from target"
                    );
                    actions.push(Action::Update {
                        key: key.clone(),
                        linkage: entry.linkage.clone(),
                        record: record.clone(),
                    });
                }
            }
            None => actions.push(Action::Create {
                record: record.clone(),
            }),
        }
    }

    for (key, entry) in target.iter() {
        if authoritative.contains_key(key) {
            continue;
        }
        match options.absence {
            AbsencePolicy::Remove => actions.push(Action::Remove {
                key: key.clone(),
                linkage: entry.linkage.clone(),
            }),
            AbsencePolicy::Disable => {
                if entry.active {
                    actions.push(Action::Disable {
                        key: key.clone(),
                        linkage: entry.linkage.clone(),
                    });
                }
            }
        }
    }

    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{field, AssetRecord, TargetEntry, UserRecord};

    fn asset(id: u64, model: &str, tag: &str) -> AssetRecord {
        AssetRecord {
            inventory_id: id,
            manufacturer: "Dell".into(),
            model: model.into(),
            status: "Deployed".into(),
            serial_number: "ABC123".into(),
            asset_tag: tag.into(),
            item_type: "Laptop".into(),
        }
    }

    /// Target entry mirroring an authoritative asset exactly.
    fn mirror(record: &AssetRecord, item_id: u64) -> TargetEntry<u64> {
        let mut entry = TargetEntry::new(record.business_key(), item_id);
        entry.fields = crate::record::FieldView::fields(record);
        entry
    }

    fn remove_opts() -> ReconcileOptions {
        ReconcileOptions::new(AbsencePolicy::Remove)
    }

    fn disable_opts() -> ReconcileOptions {
        ReconcileOptions::new(AbsencePolicy::Disable)
    }

    #[test]
    fn key_only_in_authoritative_yields_one_create() {
        let auth: Snapshot<AssetRecord> =
            [asset(1, "Latitude 5420", "T-001")].into_iter().collect();
        let target: Snapshot<TargetEntry<u64>> = Snapshot::new();

        let actions = reconcile(&auth, &target, &remove_opts()).unwrap();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Create { record } => {
                assert_eq!(record.model, "Latitude 5420");
                assert_eq!(record.asset_tag, "T-001");
            }
            other => panic!("expected create, got {:?}", other.kind()),
        }
    }

    #[test]
    fn key_only_in_target_yields_one_remove() {
        let auth: Snapshot<AssetRecord> = [asset(1, "Latitude 5420", "T-001")].into_iter().collect();
        let stray = mirror(&asset(2, "XPS 13", "T-002"), 77);
        let target: Snapshot<TargetEntry<u64>> = [mirror(&asset(1, "Latitude 5420", "T-001"), 5), stray]
            .into_iter()
            .collect();

        let actions = reconcile(&auth, &target, &remove_opts()).unwrap();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Remove { key, linkage } => {
                assert_eq!(key, "2");
                assert_eq!(*linkage, 77);
            }
            other => panic!("expected remove, got {:?}", other.kind()),
        }
    }

    #[test]
    fn reconcile_twice_is_idempotent() {
        let auth: Snapshot<AssetRecord> = [
            asset(1, "Latitude 5420", "T-001"),
            asset(2, "XPS 13", "T-002"),
        ]
        .into_iter()
        .collect();
        // Target already converged.
        let target: Snapshot<TargetEntry<u64>> = auth
            .iter()
            .enumerate()
            .map(|(i, (_, r))| mirror(r, i as u64))
            .collect();

        let actions = reconcile(&auth, &target, &remove_opts()).unwrap();
        assert!(actions.is_empty(), "second run must be a no-op");
    }

    #[test]
    fn case_only_difference_is_a_no_op() {
        let auth: Snapshot<AssetRecord> = [asset(1, "Latitude 5420", "T-001")].into_iter().collect();
        let mut entry = mirror(&asset(1, "Latitude 5420", "T-001"), 5);
        entry.fields.insert(field::MANUFACTURER, "DELL".into());

        let target: Snapshot<TargetEntry<u64>> = [entry].into_iter().collect();
        let actions = reconcile(&auth, &target, &remove_opts()).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn excluded_field_difference_is_a_no_op() {
        let auth: Snapshot<AssetRecord> = [asset(1, "Latitude 5420", "T-001")].into_iter().collect();
        let mut entry = mirror(&asset(1, "Latitude 5420", "T-001"), 5);
        entry.fields.insert(field::STATUS, "Archived".into());

        let target: Snapshot<TargetEntry<u64>> = [entry].into_iter().collect();
        let opts = remove_opts().exclude(&[field::STATUS]);
        assert!(reconcile(&auth, &target, &opts).unwrap().is_empty());
    }

    #[test]
    fn real_difference_yields_update_with_target_linkage() {
        let auth: Snapshot<AssetRecord> = [asset(1, "Latitude 5430", "T-001")].into_iter().collect();
        let target: Snapshot<TargetEntry<u64>> =
            [mirror(&asset(1, "Latitude 5420", "T-001"), 41)].into_iter().collect();

        let actions = reconcile(&auth, &target, &remove_opts()).unwrap();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Update { key, linkage, record } => {
                assert_eq!(key, "1");
                assert_eq!(*linkage, 41);
                assert_eq!(record.model, "Latitude 5430");
            }
            other => panic!("expected update, got {:?}", other.kind()),
        }
    }

    #[test]
    fn inactive_target_forces_update_even_without_diff() {
        let record = asset(1, "Latitude 5420", "T-001");
        let auth: Snapshot<AssetRecord> = [record.clone()].into_iter().collect();
        let target: Snapshot<TargetEntry<u64>> =
            [mirror(&record, 5).inactive()].into_iter().collect();

        let actions = reconcile(&auth, &target, &remove_opts()).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind(), ActionKind::Update);
    }

    #[test]
    fn disable_policy_skips_already_disabled_entries() {
        let auth: Snapshot<UserRecord> = Snapshot::new();
        let active = TargetEntry::new("e1", 1u64);
        let disabled = TargetEntry::new("e2", 2u64).inactive();
        let target: Snapshot<TargetEntry<u64>> = [active, disabled].into_iter().collect();

        let opts = disable_opts().allow_teardown(true);
        let actions = reconcile(&auth, &target, &opts).unwrap();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Disable { key, .. } => assert_eq!(key, "e1"),
            other => panic!("expected disable, got {:?}", other.kind()),
        }
    }

    #[test]
    fn empty_authoritative_refuses_teardown_by_default() {
        let auth: Snapshot<AssetRecord> = Snapshot::new();
        let target: Snapshot<TargetEntry<u64>> =
            [mirror(&asset(1, "Latitude 5420", "T-001"), 5)].into_iter().collect();

        let err = reconcile(&auth, &target, &remove_opts()).unwrap_err();
        assert!(matches!(err, AdapterError::TeardownRefused { target: 1, .. }));
    }

    #[test]
    fn confirmed_teardown_removes_every_target_key() {
        let auth: Snapshot<AssetRecord> = Snapshot::new();
        let target: Snapshot<TargetEntry<u64>> = [
            mirror(&asset(1, "A", "T-001"), 5),
            mirror(&asset(2, "B", "T-002"), 6),
        ]
        .into_iter()
        .collect();

        let opts = remove_opts().allow_teardown(true);
        let actions = reconcile(&auth, &target, &opts).unwrap();
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| a.kind() == ActionKind::Remove));
    }

    #[test]
    fn both_snapshots_empty_is_a_no_op() {
        let auth: Snapshot<AssetRecord> = Snapshot::new();
        let target: Snapshot<TargetEntry<u64>> = Snapshot::new();
        assert!(reconcile(&auth, &target, &remove_opts()).unwrap().is_empty());
    }

    #[test]
    fn output_order_is_deterministic() {
        let auth: Snapshot<AssetRecord> = [
            asset(3, "C", "T-003"),
            asset(1, "A", "T-001"),
        ]
        .into_iter()
        .collect();
        let target: Snapshot<TargetEntry<u64>> =
            [mirror(&asset(2, "B", "T-002"), 9)].into_iter().collect();

        let actions = reconcile(&auth, &target, &remove_opts()).unwrap();
        let kinds: Vec<_> = actions.iter().map(|a| (a.kind(), a.key())).collect();
        assert_eq!(
            kinds,
            vec![
                (ActionKind::Create, "1".to_string()),
                (ActionKind::Create, "3".to_string()),
                (ActionKind::Remove, "2".to_string()),
            ]
        );
    }
}
