//! Structural reshaping between plain and tri-state group fields
//!
//! Older schemas stored membership either as a list of names or as a plain
//! `name -> bool` map. The current schema uses tri-state group maps. The
//! forward transforms are total; the backward transforms lose the
//! distinction between `false` and `null`.

use recsel_selection::{GroupMap, SelectionError, SelectionRecord};
use serde_json::{Map, Value};

/// Names to tri-state map: every listed name becomes `true`
#[must_use]
pub fn list_to_tri(names: &[String]) -> GroupMap {
    names.iter().map(|n| (n.clone(), Some(true))).collect()
}

/// Tri-state map to names: keys whose value is `true`
#[must_use]
pub fn tri_to_list(map: &GroupMap) -> Vec<String> {
    map.iter()
        .filter(|(_, state)| **state == Some(true))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Plain map to tri-state map: `true` stays `true`, anything else is `null`
#[must_use]
pub fn bool_map_to_tri(map: &GroupMap) -> GroupMap {
    map.iter()
        .map(|(name, state)| (name.clone(), (*state == Some(true)).then_some(true)))
        .collect()
}

/// Tri-state map to plain map: determined entries are `true`
#[must_use]
pub fn tri_to_bool_map(map: &GroupMap) -> Map<String, Value> {
    map.iter()
        .map(|(name, state)| (name.clone(), Value::Bool(state.is_some())))
        .collect()
}

/// Reshape a list field into a tri-state map field, in place
pub(crate) fn field_list_to_tri(
    record: &mut SelectionRecord,
    field: &str,
) -> Result<(), SelectionError> {
    if record.contains(field) {
        let names = record.string_list(field)?;
        record.set_group_map(field, &list_to_tri(&names));
    }
    Ok(())
}

/// Reshape a tri-state map field into a list field, in place
pub(crate) fn field_tri_to_list(
    record: &mut SelectionRecord,
    field: &str,
) -> Result<(), SelectionError> {
    if record.contains(field) {
        let map = record.group_map(field)?;
        record.set_string_list(field, &tri_to_list(&map));
    }
    Ok(())
}

/// Reshape a plain map field into a tri-state map field, in place
pub(crate) fn field_bool_map_to_tri(
    record: &mut SelectionRecord,
    field: &str,
) -> Result<(), SelectionError> {
    if record.contains(field) {
        let map = record.group_map(field)?;
        record.set_group_map(field, &bool_map_to_tri(&map));
    }
    Ok(())
}

/// Reshape a tri-state map field into a plain map field, in place
pub(crate) fn field_tri_to_bool_map(
    record: &mut SelectionRecord,
    field: &str,
) -> Result<(), SelectionError> {
    if record.contains(field) {
        let map = record.group_map(field)?;
        record.set_json_object(field, &tri_to_bool_map(&map));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn group(entries: &[(&str, Option<bool>)]) -> GroupMap {
        entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn bool_map_forward_uses_null_for_false() {
        let plain = group(&[("a", Some(true)), ("b", Some(false))]);
        assert_eq!(bool_map_to_tri(&plain), group(&[("a", Some(true)), ("b", None)]));
    }

    #[test]
    fn tri_backward_to_bool_map() {
        let tri = group(&[("a", Some(true)), ("b", None)]);
        let plain = tri_to_bool_map(&tri);
        assert_eq!(plain.get("a"), Some(&Value::Bool(true)));
        assert_eq!(plain.get("b"), Some(&Value::Bool(false)));
    }

    #[test]
    fn tri_backward_to_list_keeps_true_only() {
        let tri = group(&[("a", Some(true)), ("b", None), ("c", Some(false))]);
        assert_eq!(tri_to_list(&tri), vec!["a".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_list_round_trip_preserves_set(names in proptest::collection::vec("[a-z]{1,6}", 0..20)) {
            let back = tri_to_list(&list_to_tri(&names));
            let original: BTreeSet<_> = names.into_iter().collect();
            let restored: BTreeSet<_> = back.into_iter().collect();
            prop_assert_eq!(original, restored);
        }

        #[test]
        fn prop_bool_map_round_trip(entries in proptest::collection::btree_map("[a-z]{1,6}", any::<bool>(), 0..20)) {
            let plain: GroupMap = entries.iter().map(|(k, v)| (k.clone(), Some(*v))).collect();
            let restored = tri_to_bool_map(&bool_map_to_tri(&plain));
            prop_assert_eq!(restored.len(), entries.len());
            for (name, value) in &entries {
                prop_assert_eq!(restored.get(name), Some(&Value::Bool(*value)));
            }
        }
    }
}
