//! Managed-runtime object model as seen by the bridge.
//!
//! The bridge never owns managed objects; it reads them through
//! [`ManagedEnv`], a JNI-shaped accessor. Handles are opaque and a null
//! reference is `None`.

pub mod heap;

pub use heap::{HandlerData, ManagedHeap, Value};

/// Opaque reference to a managed object (string, array or instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub u64);

/// Opaque reference to a managed class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassRef(pub u64);

/// Resolved location of an instance field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub u64);

pub const STRING_SIG: &str = "Ljava/lang/String;";
pub const STRING_ARRAY_SIG: &str = "[Ljava/lang/String;";

pub trait ManagedEnv {
    fn find_class(&self, name: &str) -> Option<ClassRef>;

    fn field_id(&self, class: ClassRef, name: &str, signature: &str) -> Option<FieldId>;

    /// Reads a reference-typed field; `None` when the field holds null.
    fn object_field(&self, obj: ObjectRef, field: FieldId) -> Option<ObjectRef>;

    fn int_field(&self, obj: ObjectRef, field: FieldId) -> i32;

    fn array_len(&self, array: ObjectRef) -> usize;

    fn array_element(&self, array: ObjectRef, index: usize) -> Option<ObjectRef>;

    /// Characters of a managed string, or `None` if the runtime could not
    /// produce them.
    fn string_units(&self, string: ObjectRef) -> Option<Vec<u16>>;

    /// Allocates a managed string; `None` signals allocation failure.
    fn new_string(&self, units: &[u16]) -> Option<ObjectRef>;
}
