//! Field locations of the managed handler record and action-name map types.
//!
//! Resolved lazily on first use and cached. A failed bind is not cached, so
//! the next call tries again once the managed classes are loaded. Field ids
//! belong to the classes that produced them; the cache is reused only while
//! the environment still resolves the same classes.

use parking_lot::RwLock;

use crate::error::BindError;
use crate::managed::{ClassRef, FieldId, ManagedEnv, STRING_ARRAY_SIG, STRING_SIG};

pub const HANDLER_CLASS: &str = "com/sun/j2me/content/ContentHandlerRegData";
pub const ACTION_MAP_CLASS: &str = "javax/microedition/content/ActionNameMap";
pub const ACTION_MAP_ARRAY_SIG: &str = "[Ljavax/microedition/content/ActionNameMap;";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub handler_class: ClassRef,
    pub map_class: ClassRef,

    pub id: FieldId,
    pub registration_method: FieldId,
    pub types: FieldId,
    pub suffixes: FieldId,
    pub actions: FieldId,
    pub action_names: FieldId,
    pub accesses: FieldId,

    pub map_locale: FieldId,
    pub map_action_names: FieldId,
}

fn field(
    env: &dyn ManagedEnv,
    class: ClassRef,
    class_name: &'static str,
    name: &'static str,
    signature: &'static str,
) -> Result<FieldId, BindError> {
    env.field_id(class, name, signature)
        .ok_or(BindError::FieldNotFound {
            class: class_name,
            field: name,
            signature,
        })
}

/// Resolves every field the bridge reads. No caching.
pub fn bind(env: &dyn ManagedEnv) -> Result<Schema, BindError> {
    let ch = env
        .find_class(HANDLER_CLASS)
        .ok_or(BindError::ClassNotFound(HANDLER_CLASS))?;
    let id = field(env, ch, HANDLER_CLASS, "ID", STRING_SIG)?;
    let registration_method = field(env, ch, HANDLER_CLASS, "registrationMethod", "I")?;
    let types = field(env, ch, HANDLER_CLASS, "types", STRING_ARRAY_SIG)?;
    let suffixes = field(env, ch, HANDLER_CLASS, "suffixes", STRING_ARRAY_SIG)?;
    let actions = field(env, ch, HANDLER_CLASS, "actions", STRING_ARRAY_SIG)?;
    let action_names = field(env, ch, HANDLER_CLASS, "actionnames", ACTION_MAP_ARRAY_SIG)?;
    let accesses = field(env, ch, HANDLER_CLASS, "accessRestricted", STRING_ARRAY_SIG)?;

    let anm = env
        .find_class(ACTION_MAP_CLASS)
        .ok_or(BindError::ClassNotFound(ACTION_MAP_CLASS))?;
    let map_locale = field(env, anm, ACTION_MAP_CLASS, "locale", STRING_SIG)?;
    let map_action_names = field(env, anm, ACTION_MAP_CLASS, "actionnames", STRING_ARRAY_SIG)?;

    Ok(Schema {
        handler_class: ch,
        map_class: anm,
        id,
        registration_method,
        types,
        suffixes,
        actions,
        action_names,
        accesses,
        map_locale,
        map_action_names,
    })
}

impl Schema {
    /// Whether `env` resolves the classes these field ids were taken from.
    pub fn belongs_to(&self, env: &dyn ManagedEnv) -> bool {
        env.find_class(HANDLER_CLASS) == Some(self.handler_class)
            && env.find_class(ACTION_MAP_CLASS) == Some(self.map_class)
    }
}

/// Lazily bound, cached [`Schema`].
#[derive(Default)]
pub struct SchemaBinder {
    cached: RwLock<Option<Schema>>,
}

impl SchemaBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached schema when it belongs to `env`, otherwise a fresh bind
    /// against `env` that replaces the cache on success.
    pub fn get_or_bind(&self, env: &dyn ManagedEnv) -> Result<Schema, BindError> {
        if let Some(schema) = *self.cached.read() {
            if schema.belongs_to(env) {
                return Ok(schema);
            }
            tracing::debug!("handler classes differ from cached schema, rebinding");
        }
        match bind(env) {
            Ok(schema) => {
                *self.cached.write() = Some(schema);
                tracing::debug!("handler schema bound");
                Ok(schema)
            }
            Err(e) => {
                tracing::warn!("handler schema bind failed: {e}");
                Err(e)
            }
        }
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.cached.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::ManagedHeap;

    #[test]
    fn missing_class_is_reported_and_retried() {
        let heap = ManagedHeap::new();
        let binder = SchemaBinder::new();

        assert_eq!(
            binder.get_or_bind(&heap),
            Err(BindError::ClassNotFound(HANDLER_CLASS))
        );
        assert!(!binder.is_bound());

        heap.define_handler_classes();
        assert!(binder.get_or_bind(&heap).is_ok());
        assert!(binder.is_bound());
    }

    #[test]
    fn missing_field_names_the_field() {
        let heap = ManagedHeap::new();
        heap.define_class(HANDLER_CLASS, &[("ID", STRING_SIG)]);
        assert_eq!(
            bind(&heap),
            Err(BindError::FieldNotFound {
                class: HANDLER_CLASS,
                field: "registrationMethod",
                signature: "I",
            })
        );
    }

    #[test]
    fn missing_action_map_class() {
        let heap = ManagedHeap::new();
        heap.define_class(
            HANDLER_CLASS,
            &[
                ("ID", STRING_SIG),
                ("registrationMethod", "I"),
                ("types", STRING_ARRAY_SIG),
                ("suffixes", STRING_ARRAY_SIG),
                ("actions", STRING_ARRAY_SIG),
                ("actionnames", ACTION_MAP_ARRAY_SIG),
                ("accessRestricted", STRING_ARRAY_SIG),
            ],
        );
        assert_eq!(bind(&heap), Err(BindError::ClassNotFound(ACTION_MAP_CLASS)));
    }

    #[test]
    fn same_environment_reuses_cached_schema() {
        let heap = ManagedHeap::with_handler_classes();
        let binder = SchemaBinder::new();
        let a = binder.get_or_bind(&heap).unwrap();
        let b = binder.get_or_bind(&heap).unwrap();
        assert_eq!(a, b);
        assert!(a.belongs_to(&heap));
    }

    #[test]
    fn other_environment_gets_its_own_field_ids() {
        let first = ManagedHeap::with_handler_classes();
        let second = ManagedHeap::new();
        second.define_class("com/example/Other", &[("count", "I")]);
        second.define_handler_classes();

        let binder = SchemaBinder::new();
        let a = binder.get_or_bind(&first).unwrap();
        let b = binder.get_or_bind(&second).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(b, bind(&second).unwrap());
        assert!(!a.belongs_to(&second));

        // back on the first environment the ids follow it again
        assert_eq!(binder.get_or_bind(&first).unwrap(), a);
    }

    #[test]
    fn unloaded_environment_is_not_served_from_cache() {
        let binder = SchemaBinder::new();
        binder
            .get_or_bind(&ManagedHeap::with_handler_classes())
            .unwrap();
        assert_eq!(
            binder.get_or_bind(&ManagedHeap::new()),
            Err(BindError::ClassNotFound(HANDLER_CLASS))
        );
    }
}
