use chapi_abi::SuiteId;

use super::HandlerRecord;
use crate::error::BuildError;
use crate::managed::{ManagedEnv, ObjectRef};
use crate::marshal::{marshal_action_map, marshal_string, marshal_string_array};
use crate::schema::SchemaBinder;

/// Populates `record` from a managed `ContentHandlerRegData`.
///
/// Steps run in field order and stop at the first failure. Whatever was
/// decoded before the failure stays in `record`; the caller releases it.
/// Nothing reaches the registry from here.
pub fn fill(
    env: &dyn ManagedEnv,
    binder: &SchemaBinder,
    handler: ObjectRef,
    suite_id: SuiteId,
    class_name: Option<ObjectRef>,
    record: &mut HandlerRecord,
) -> Result<(), BuildError> {
    let schema = binder.get_or_bind(env)?;

    let id = env
        .object_field(handler, schema.id)
        .ok_or(BuildError::MissingId)?;
    let id = marshal_string(env, Some(id), "handler ID")?;
    if id.is_empty() {
        return Err(BuildError::MissingId);
    }
    record.id = Some(id);
    record.suite_id = suite_id;

    let class_name = class_name.ok_or(BuildError::MissingClassName)?;
    record.class_name = Some(marshal_string(env, Some(class_name), "class name")?);

    record.registration_method = env.int_field(handler, schema.registration_method);

    record.types = marshal_string_array(env, env.object_field(handler, schema.types), "types")?;
    record.suffixes =
        marshal_string_array(env, env.object_field(handler, schema.suffixes), "suffixes")?;
    record.actions =
        marshal_string_array(env, env.object_field(handler, schema.actions), "actions")?;

    if !record.actions.is_empty() {
        let maps = env.object_field(handler, schema.action_names);
        let map = marshal_action_map(env, &schema, maps, record.actions.len())?;
        record.locales = map.locales;
        record.action_names = map.names;
    }

    record.accesses = marshal_string_array(
        env,
        env.object_field(handler, schema.accesses),
        "access restrictions",
    )?;

    #[cfg(feature = "ffi-trace")]
    tracing::trace!(?record, "handler record marshaled");

    Ok(())
}

/// Builds a fresh record. On failure the partial record is released before
/// the error is returned.
pub fn build(
    env: &dyn ManagedEnv,
    binder: &SchemaBinder,
    handler: ObjectRef,
    suite_id: SuiteId,
    class_name: Option<ObjectRef>,
) -> Result<HandlerRecord, BuildError> {
    let mut record = HandlerRecord::default();
    fill(env, binder, handler, suite_id, class_name, &mut record)?;
    Ok(record)
}
