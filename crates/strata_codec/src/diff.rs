//! Field-level diffs between two field maps.

use crate::value::{FieldMap, Value};

/// Computes the changes that turn `before` into `after`.
///
/// The result maps each changed or added field to its new value. Fields
/// present in `before` but gone from `after` map to [`Value::Null`].
/// Unchanged fields are omitted, so identical maps give an empty diff.
#[must_use]
pub fn diff_fields(before: &FieldMap, after: &FieldMap) -> FieldMap {
    let mut changes = FieldMap::new();

    for (field, value) in after {
        if before.get(field) != Some(value) {
            changes.insert(field.clone(), value.clone());
        }
    }

    for field in before.keys() {
        if !after.contains_key(field) {
            changes.insert(field.clone(), Value::Null);
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(pairs: &[(&str, Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn changed_field_carries_new_value() {
        let before = map(&[("title", "A".into()), ("done", false.into())]);
        let after = map(&[("title", "B".into()), ("done", false.into())]);

        assert_eq!(diff_fields(&before, &after), map(&[("title", "B".into())]));
    }

    #[test]
    fn added_and_removed_fields() {
        let before = map(&[("title", "A".into()), ("note", "x".into())]);
        let after = map(&[("title", "A".into()), ("due", 5.into())]);

        assert_eq!(
            diff_fields(&before, &after),
            map(&[("due", 5.into()), ("note", Value::Null)])
        );
    }

    #[test]
    fn creation_diff_is_whole_state() {
        let after = map(&[("title", "A".into())]);
        assert_eq!(diff_fields(&FieldMap::new(), &after), after);
    }

    fn field_map_strategy() -> impl Strategy<Value = FieldMap> {
        prop::collection::btree_map(
            "[a-e]",
            prop_oneof![
                any::<i64>().prop_map(Value::Integer),
                "[a-z]{0,4}".prop_map(Value::Text),
                any::<bool>().prop_map(Value::Bool),
            ],
            0..5,
        )
    }

    proptest! {
        #[test]
        fn applying_diff_reproduces_target(
            before in field_map_strategy(),
            after in field_map_strategy(),
        ) {
            let changes = diff_fields(&before, &after);
            let mut rebuilt = before.clone();
            for (field, value) in changes {
                if value.is_null() && !after.contains_key(&field) {
                    rebuilt.remove(&field);
                } else {
                    rebuilt.insert(field, value);
                }
            }
            prop_assert_eq!(rebuilt, after);
        }

        #[test]
        fn self_diff_is_empty(map in field_map_strategy()) {
            prop_assert!(diff_fields(&map, &map).is_empty());
        }
    }
}
