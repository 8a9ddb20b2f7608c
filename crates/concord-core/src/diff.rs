//! Structural field diffing.

use std::collections::BTreeSet;

use crate::record::FieldMap;

/// Names of fields whose values differ between the authoritative and
/// target maps.
///
/// Rules:
/// - comparison is case-insensitive; field order is irrelevant,
/// - fields in `excluded` never count,
/// - only fields present on **both** sides participate. A field the
///   target does not store can never mark a record changed, which is
///   what keeps records from flapping on systems with narrower
///   schemas.
pub fn changed_fields<'a>(
    authoritative: &'a FieldMap,
    target: &FieldMap,
    excluded: &BTreeSet<String>,
) -> Vec<&'a str> {
    authoritative
        .iter()
        .filter(|(name, value)| {
            if excluded.contains(**name) {
                return false;
            }
            match target.get(*name) {
                Some(target_value) => value.to_lowercase() != target_value.to_lowercase(),
                None => false,
            }
        })
        .map(|(name, _)| *name)
        .collect()
}
