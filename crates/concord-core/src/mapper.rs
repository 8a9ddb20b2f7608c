//! Per-field transforms between the three schemas.
//!
//! These are the normalization rules the reconciler depends on:
//! get any of them wrong and records start flapping between "changed"
//! and "unchanged" on every run.

use std::borrow::Cow;

/// Employee classification that switches the year-or-type rule.
pub const STUDENT_CLASSIFICATION: &str = "STUDENT";

/// Item type that switches the asset description format.
pub const CHARGER_ITEM_TYPE: &str = "Charger";

/// Compute the year-or-type attribute: students carry their year level
/// zero-padded to two digits, everyone else carries the classification
/// itself.
pub fn year_or_type(classification: &str, year_level: &str) -> String {
    if classification == STUDENT_CLASSIFICATION {
        zero_pad2(year_level)
    } else {
        classification.to_string()
    }
}

/// Left-pad with zeroes to at least two characters.
pub fn zero_pad2(value: &str) -> String {
    format!("{value:0>2}")
}

/// Composite display label: `"{commonName} ({yearOrType})"`.
pub fn display_label(common_name: &str, year_or_type: &str) -> String {
    format!("{common_name} ({year_or_type})")
}

/// Composite asset description used as the helpdesk list-item value.
///
/// Chargers get a distinct format so technicians can tell them apart
/// from the devices they belong to.
pub fn asset_description(
    item_type: &str,
    manufacturer: &str,
    model: &str,
    asset_tag: &str,
    serial_number: &str,
) -> String {
    if item_type == CHARGER_ITEM_TYPE {
        format!("{manufacturer} Charger: {model} - {asset_tag}")
    } else {
        format!("{model} ({asset_tag}) ({serial_number})")
    }
}

/// Secondary asset description: `"{manufacturer} {model}"`.
pub fn asset_extra(manufacturer: &str, model: &str) -> String {
    format!("{manufacturer} {model}")
}

/// Title-case a string: the first letter of every alphabetic run is
/// uppercased, the rest lowercased. Non-alphabetic characters are word
/// boundaries.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Decode HTML entities in text fields sourced from the inventory API,
/// which escapes names and titles in its JSON payloads.
pub fn unescape_html(value: &str) -> String {
    match html_escape::decode_html_entities(value) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}
