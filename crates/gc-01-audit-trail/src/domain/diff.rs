//! # Diff Engine
//!
//! Field-level before/after comparison of two states of one entity.
//!
//! - Equality is value equality ([`FieldValue`] compares numerics by value).
//! - An absent field and an explicit [`FieldValue::Null`] are different states.
//! - Output is ordered by field name.

use std::collections::BTreeSet;

use shared_types::{ChangeSet, FieldChange, FieldMap, FieldValue};

/// Fields whose values differ between `old` and `new`.
///
/// `old = None` describes a creation and `new = None` a deletion, so every
/// field of the other side appears in the result.
pub fn diff(old: Option<&FieldMap>, new: Option<&FieldMap>) -> ChangeSet {
    let empty = FieldMap::new();
    let old_fields = old.unwrap_or(&empty);
    let new_fields = new.unwrap_or(&empty);

    let names: BTreeSet<&String> = old_fields.keys().chain(new_fields.keys()).collect();
    names
        .into_iter()
        .filter_map(|name| {
            let before = old_fields.get(name);
            let after = new_fields.get(name);
            changed(before, after).then(|| {
                (
                    name.clone(),
                    FieldChange::new(before.cloned(), after.cloned()),
                )
            })
        })
        .collect()
}

/// Fields of `requested` whose value differs from `current`.
///
/// Fields absent from `requested` are left out: a partial update says nothing
/// about them.
pub fn diff_partial(current: &FieldMap, requested: &FieldMap) -> ChangeSet {
    requested
        .iter()
        .filter_map(|(name, value)| {
            let before = current.get(name);
            changed(before, Some(value)).then(|| {
                (
                    name.clone(),
                    FieldChange::new(before.cloned(), Some(value.clone())),
                )
            })
        })
        .collect()
}

/// `changes` without the fields named in `ignored`.
pub fn without_fields(changes: &ChangeSet, ignored: &BTreeSet<String>) -> ChangeSet {
    changes
        .iter()
        .filter(|(name, _)| !ignored.contains(*name))
        .map(|(name, change)| (name.to_string(), change.clone()))
        .collect()
}

fn changed(before: Option<&FieldValue>, after: Option<&FieldValue>) -> bool {
    match (before, after) {
        (Some(a), Some(b)) => !a.same_value(b),
        (None, None) => false,
        _ => true,
    }
}
