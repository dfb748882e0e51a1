use super::array::marshal_string;
use crate::error::MarshalError;
use crate::managed::{ManagedEnv, ObjectRef};
use crate::native::StringArrayHandle;
use crate::schema::Schema;

/// Localized action names, flattened row-major: row = locale, column = action.
#[derive(Debug, Default)]
pub struct ActionMap {
    pub locales: StringArrayHandle,
    pub names: StringArrayHandle,
}

impl ActionMap {
    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }

    /// Name of `action` in the `locale`-th row.
    pub fn name(&self, locale: usize, action: usize, action_count: usize) -> Option<String> {
        if action >= action_count {
            return None;
        }
        self.names
            .get(locale * action_count + action)
            .map(|s| s.to_string_lossy())
    }

    /// Rebuilds the `locale -> names` rows from the flat arrays.
    pub fn rows(&self, action_count: usize) -> Vec<(String, Vec<String>)> {
        self.locales
            .iter()
            .enumerate()
            .map(|(row, locale)| {
                let names = (0..action_count)
                    .filter_map(|col| self.name(row, col, action_count))
                    .collect();
                (locale.to_string_lossy(), names)
            })
            .collect()
    }
}

/// Converts a managed `ActionNameMap[]` into parallel native arrays.
///
/// Every map must carry exactly `action_count` names; a mismatch is rejected
/// with [`MarshalError::ActionNameCount`] before anything is decoded for that
/// row. On any failure everything decoded so far, across both arrays, is
/// released.
pub fn marshal_action_map(
    env: &dyn ManagedEnv,
    schema: &Schema,
    maps: Option<ObjectRef>,
    action_count: usize,
) -> Result<ActionMap, MarshalError> {
    let Some(maps) = maps else {
        return Ok(ActionMap::default());
    };
    let len = env.array_len(maps);
    if len == 0 {
        return Ok(ActionMap::default());
    }

    let total = len
        .checked_mul(action_count)
        .ok_or(MarshalError::oom("action names"))?;
    let mut out = ActionMap {
        locales: StringArrayHandle::with_capacity(len, "locales")?,
        names: StringArrayHandle::with_capacity(total, "action names")?,
    };

    for row in 0..len {
        let map = env
            .array_element(maps, row)
            .ok_or(MarshalError::oom("action name map"))?;

        let locale = env.object_field(map, schema.map_locale);
        out.locales.push(marshal_string(env, locale, "locale")?);

        let names = env.object_field(map, schema.map_action_names);
        let found = names.map_or(0, |n| env.array_len(n));
        if found != action_count {
            return Err(MarshalError::ActionNameCount {
                locale: row,
                expected: action_count,
                found,
            });
        }
        for col in 0..action_count {
            let name = names.and_then(|n| env.array_element(n, col));
            out.names.push(marshal_string(env, name, "action name")?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::{ManagedHeap, Value};
    use crate::native::ledger;
    use crate::schema::{bind, ACTION_MAP_CLASS};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn map_array(heap: &ManagedHeap, rows: &[(String, Vec<String>)]) -> ObjectRef {
        let class = heap.find_class(ACTION_MAP_CLASS).unwrap();
        let mut maps = Vec::new();
        for (locale, names) in rows {
            let m = heap.new_object(class).unwrap();
            let l = heap.string(locale);
            let n = heap.string_array(names);
            heap.set_field(m, "locale", Value::Ref(Some(l)));
            heap.set_field(m, "actionnames", Value::Ref(Some(n)));
            maps.push(Some(m));
        }
        heap.array(maps)
    }

    #[test]
    fn null_map_array_is_empty() {
        let heap = ManagedHeap::with_handler_classes();
        let schema = bind(&heap).unwrap();
        let before = ledger::snapshot();
        let m = marshal_action_map(&heap, &schema, None, 3).unwrap();
        assert!(m.is_empty() && m.names.is_empty());
        assert_eq!(ledger::snapshot().since(&before), Default::default());
    }

    #[test]
    fn flattens_row_major() {
        let heap = ManagedHeap::with_handler_classes();
        let schema = bind(&heap).unwrap();
        let rows = vec![
            ("en".to_string(), vec!["View".to_string(), "Edit".to_string()]),
            ("de".to_string(), vec!["Ansehen".to_string(), "Bearbeiten".to_string()]),
        ];
        let arr = map_array(&heap, &rows);
        let m = marshal_action_map(&heap, &schema, Some(arr), 2).unwrap();

        assert_eq!(m.locales.to_strings(), vec!["en", "de"]);
        assert_eq!(
            m.names.to_strings(),
            vec!["View", "Edit", "Ansehen", "Bearbeiten"]
        );
        assert_eq!(m.name(1, 0, 2).as_deref(), Some("Ansehen"));
        assert_eq!(m.name(0, 2, 2), None);
    }

    #[test]
    fn short_row_is_rejected_and_unwound() {
        let heap = ManagedHeap::with_handler_classes();
        let schema = bind(&heap).unwrap();
        let rows = vec![
            ("en".to_string(), vec!["View".to_string(), "Edit".to_string()]),
            ("fr".to_string(), vec!["Voir".to_string()]),
        ];
        let arr = map_array(&heap, &rows);

        let before = ledger::snapshot();
        let err = marshal_action_map(&heap, &schema, Some(arr), 2).unwrap_err();
        assert_eq!(
            err,
            MarshalError::ActionNameCount {
                locale: 1,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(ledger::snapshot().since(&before).live(), 0);
    }

    #[test]
    fn undecodable_name_releases_both_arrays() {
        let heap = ManagedHeap::with_handler_classes();
        let schema = bind(&heap).unwrap();
        let class = heap.find_class(ACTION_MAP_CLASS).unwrap();
        let m = heap.new_object(class).unwrap();
        let l = heap.string("en");
        let ok = heap.string("View");
        let bad = heap.undecodable_string("Edit");
        let names = heap.array(vec![Some(ok), Some(bad)]);
        heap.set_field(m, "locale", Value::Ref(Some(l)));
        heap.set_field(m, "actionnames", Value::Ref(Some(names)));
        let arr = heap.array(vec![Some(m)]);

        let before = ledger::snapshot();
        let err = marshal_action_map(&heap, &schema, Some(arr), 2).unwrap_err();
        assert!(err.is_out_of_memory());
        let d = ledger::snapshot().since(&before);
        assert_eq!(d.total().acquired, 4); // 2 buffers, locale, first name
        assert_eq!(d.live(), 0);
    }

    proptest! {
        #[test]
        fn flatten_then_rows_reconstructs_mapping(
            actions in 1usize..4,
            rows in prop::collection::vec(("[a-z]{2}", prop::collection::vec("[A-Za-z ]{0,8}", 3)), 0..5),
        ) {
            let rows: Vec<(String, Vec<String>)> = rows
                .into_iter()
                .map(|(l, mut n)| { n.truncate(actions); (l, n) })
                .collect();
            let heap = ManagedHeap::with_handler_classes();
            let schema = bind(&heap).unwrap();
            let arr = map_array(&heap, &rows);

            let m = marshal_action_map(&heap, &schema, Some(arr), actions).unwrap();
            prop_assert_eq!(m.names.len(), rows.len() * actions);
            prop_assert_eq!(m.rows(actions), rows);
        }
    }
}
