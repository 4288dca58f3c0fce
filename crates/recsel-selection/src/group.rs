//! Tri-state group maps
//!
//! A group map assigns every known item name one of three states:
//! `true` (selected), `false` (known but inactive) or `null` (undetermined).

use indexmap::IndexMap;

/// Ordered map from item name to tri-state membership
pub type GroupMap = IndexMap<String, Option<bool>>;

/// Whether a group map entry takes part in validation
///
/// Only explicitly deselected (`false`) entries are skipped; undetermined
/// entries are still candidates.
#[inline]
#[must_use]
pub fn is_active(state: Option<bool>) -> bool {
    state != Some(false)
}

/// Names of all active entries, in map order
#[must_use]
pub fn active_names(map: &GroupMap) -> Vec<String> {
    map.iter()
        .filter(|(_, state)| is_active(**state))
        .map(|(name, _)| name.clone())
        .collect()
}
