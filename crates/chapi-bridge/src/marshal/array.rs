use crate::error::MarshalError;
use crate::managed::{ManagedEnv, ObjectRef};
use crate::native::{NativeString, StringArrayHandle};

/// Decodes one managed string. A null reference or a string the runtime
/// cannot hand out is reported as an allocation failure.
pub fn marshal_string(
    env: &dyn ManagedEnv,
    string: Option<ObjectRef>,
    what: &'static str,
) -> Result<NativeString, MarshalError> {
    let units = string
        .and_then(|s| env.string_units(s))
        .ok_or(MarshalError::oom(what))?;
    NativeString::from_units(&units, what)
}

/// Converts a managed `String[]` into an owned native array.
///
/// A null or empty array yields an empty handle without allocating. If any
/// element fails to decode, the elements decoded so far are released before
/// the error is returned.
pub fn marshal_string_array(
    env: &dyn ManagedEnv,
    array: Option<ObjectRef>,
    what: &'static str,
) -> Result<StringArrayHandle, MarshalError> {
    let Some(array) = array else {
        return Ok(StringArrayHandle::empty());
    };
    let n = env.array_len(array);
    if n == 0 {
        return Ok(StringArrayHandle::empty());
    }

    let mut out = StringArrayHandle::with_capacity(n, what)?;
    for i in 0..n {
        // `out` drops on the error path, releasing elements 0..i.
        let s = marshal_string(env, env.array_element(array, i), what)?;
        out.push(s);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::ManagedHeap;
    use crate::native::{ledger, AllocKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn null_and_empty_arrays_allocate_nothing() {
        let heap = ManagedHeap::new();
        let empty = heap.string_array::<&str>(&[]);
        let before = ledger::snapshot();

        assert!(marshal_string_array(&heap, None, "types").unwrap().is_empty());
        assert!(marshal_string_array(&heap, Some(empty), "types").unwrap().is_empty());

        assert_eq!(ledger::snapshot().since(&before), Default::default());
    }

    #[test]
    fn decodes_in_order() {
        let heap = ManagedHeap::new();
        let arr = heap.string_array(&["text/plain", "image/png"]);
        let h = marshal_string_array(&heap, Some(arr), "types").unwrap();
        assert_eq!(h.to_strings(), vec!["text/plain", "image/png"]);
    }

    #[test]
    fn failure_at_k_releases_exactly_k() {
        let heap = ManagedHeap::new();
        let a = heap.string("a");
        let b = heap.string("b");
        let bad = heap.undecodable_string("c");
        let d = heap.string("d");
        let arr = heap.array(vec![Some(a), Some(b), Some(bad), Some(d)]);

        let before = ledger::snapshot();
        let err = marshal_string_array(&heap, Some(arr), "suffixes").unwrap_err();
        assert_eq!(err, MarshalError::OutOfMemory { what: "suffixes" });

        let delta = ledger::snapshot().since(&before);
        assert_eq!(delta.of(AllocKind::String).acquired, 2);
        assert_eq!(delta.of(AllocKind::String).released, 2);
        assert_eq!(delta.of(AllocKind::ArrayBuffer).acquired, 1);
        assert_eq!(delta.of(AllocKind::ArrayBuffer).released, 1);
        assert_eq!(delta.live(), 0);
    }

    #[test]
    fn null_element_fails_the_whole_array() {
        let heap = ManagedHeap::new();
        let a = heap.string("a");
        let arr = heap.array(vec![Some(a), None]);
        let before = ledger::snapshot();
        assert!(marshal_string_array(&heap, Some(arr), "actions")
            .unwrap_err()
            .is_out_of_memory());
        assert_eq!(ledger::snapshot().since(&before).live(), 0);
    }
}
