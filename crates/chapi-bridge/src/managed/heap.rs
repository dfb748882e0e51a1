//! In-process managed heap implementing [`ManagedEnv`].
//!
//! Lets embedders without a JVM hand handler objects to the bridge, and gives
//! tests control over decode and allocation failures.

use parking_lot::RwLock;

use super::{ClassRef, FieldId, ManagedEnv, ObjectRef, STRING_ARRAY_SIG, STRING_SIG};
use crate::schema::{ACTION_MAP_ARRAY_SIG, ACTION_MAP_CLASS, HANDLER_CLASS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Ref(Option<ObjectRef>),
}

struct ClassDef {
    name: String,
    fields: Vec<(String, String)>,
}

enum Object {
    Instance { class: usize, fields: Vec<Value> },
    Str { units: Vec<u16>, decodable: bool },
    Array(Vec<Option<ObjectRef>>),
}

#[derive(Default)]
struct Inner {
    classes: Vec<ClassDef>,
    objects: Vec<Object>,
    /// Remaining `new_string` allocations before they start failing.
    string_budget: Option<usize>,
}

impl Inner {
    fn alloc(&mut self, obj: Object) -> ObjectRef {
        self.objects.push(obj);
        ObjectRef((self.objects.len() - 1) as u64)
    }

    fn get(&self, r: ObjectRef) -> Option<&Object> {
        self.objects.get(r.0 as usize)
    }

    fn slot_of(&self, obj: ObjectRef, name: &str) -> Option<usize> {
        match self.get(obj)? {
            Object::Instance { class, .. } => self.classes[*class]
                .fields
                .iter()
                .position(|(n, _)| n == name),
            _ => None,
        }
    }
}

fn pack(class: usize, slot: usize) -> FieldId {
    FieldId(((class as u64) << 32) | slot as u64)
}

fn unpack(field: FieldId) -> (usize, usize) {
    ((field.0 >> 32) as usize, (field.0 & 0xffff_ffff) as usize)
}

#[derive(Default)]
pub struct ManagedHeap {
    inner: RwLock<Inner>,
}

impl ManagedHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A heap with the handler record and action-name map classes loaded.
    pub fn with_handler_classes() -> Self {
        let heap = Self::new();
        heap.define_handler_classes();
        heap
    }

    pub fn define_handler_classes(&self) {
        self.define_class(
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
        self.define_class(
            ACTION_MAP_CLASS,
            &[("locale", STRING_SIG), ("actionnames", STRING_ARRAY_SIG)],
        );
    }

    pub fn define_class(&self, name: &str, fields: &[(&str, &str)]) -> ClassRef {
        let mut inner = self.inner.write();
        inner.classes.push(ClassDef {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(n, s)| (n.to_string(), s.to_string()))
                .collect(),
        });
        ClassRef((inner.classes.len() - 1) as u64)
    }

    /// New instance with every field zeroed (0 or null).
    pub fn new_object(&self, class: ClassRef) -> Option<ObjectRef> {
        let mut inner = self.inner.write();
        let def = inner.classes.get(class.0 as usize)?;
        let fields = def
            .fields
            .iter()
            .map(|(_, sig)| match sig.as_str() {
                "I" => Value::Int(0),
                _ => Value::Ref(None),
            })
            .collect();
        Some(inner.alloc(Object::Instance {
            class: class.0 as usize,
            fields,
        }))
    }

    /// Overwrites a field by name. Returns false if the object has no such field.
    pub fn set_field(&self, obj: ObjectRef, name: &str, value: Value) -> bool {
        let mut inner = self.inner.write();
        let Some(slot) = inner.slot_of(obj, name) else {
            return false;
        };
        match inner.objects.get_mut(obj.0 as usize) {
            Some(Object::Instance { fields, .. }) => {
                fields[slot] = value;
                true
            }
            _ => false,
        }
    }

    pub fn string(&self, s: &str) -> ObjectRef {
        self.inner.write().alloc(Object::Str {
            units: s.encode_utf16().collect(),
            decodable: true,
        })
    }

    /// A string whose characters the runtime refuses to hand out.
    pub fn undecodable_string(&self, s: &str) -> ObjectRef {
        self.inner.write().alloc(Object::Str {
            units: s.encode_utf16().collect(),
            decodable: false,
        })
    }

    pub fn array(&self, items: Vec<Option<ObjectRef>>) -> ObjectRef {
        self.inner.write().alloc(Object::Array(items))
    }

    pub fn string_array<S: AsRef<str>>(&self, items: &[S]) -> ObjectRef {
        let refs = items.iter().map(|s| Some(self.string(s.as_ref()))).collect();
        self.array(refs)
    }

    /// Caps the number of further `new_string` calls that succeed.
    pub fn limit_new_strings(&self, budget: Option<usize>) {
        self.inner.write().string_budget = budget;
    }

    pub fn read_string(&self, s: ObjectRef) -> Option<String> {
        match self.inner.read().get(s)? {
            Object::Str { units, .. } => Some(String::from_utf16_lossy(units)),
            _ => None,
        }
    }

    pub fn object_count(&self) -> usize {
        self.inner.read().objects.len()
    }

    /// Allocates a handler record object from plain data.
    /// Returns `None` if the handler classes are not defined.
    pub fn alloc_handler(&self, data: &HandlerData) -> Option<ObjectRef> {
        let handler_class = self.find_class(HANDLER_CLASS)?;
        let map_class = self.find_class(ACTION_MAP_CLASS)?;

        let obj = self.new_object(handler_class)?;
        let id = data.id.as_deref().map(|s| self.string(s));
        self.set_field(obj, "ID", Value::Ref(id));
        self.set_field(obj, "registrationMethod", Value::Int(data.registration_method));

        let types = self.string_array(&data.types);
        let suffixes = self.string_array(&data.suffixes);
        let actions = self.string_array(&data.actions);
        let accesses = self.string_array(&data.accesses);
        self.set_field(obj, "types", Value::Ref(Some(types)));
        self.set_field(obj, "suffixes", Value::Ref(Some(suffixes)));
        self.set_field(obj, "actions", Value::Ref(Some(actions)));
        self.set_field(obj, "accessRestricted", Value::Ref(Some(accesses)));

        let mut maps = Vec::with_capacity(data.action_names.len());
        for (locale, names) in &data.action_names {
            let map = self.new_object(map_class)?;
            let locale = self.string(locale);
            let names = self.string_array(names);
            self.set_field(map, "locale", Value::Ref(Some(locale)));
            self.set_field(map, "actionnames", Value::Ref(Some(names)));
            maps.push(Some(map));
        }
        let maps = self.array(maps);
        self.set_field(obj, "actionnames", Value::Ref(Some(maps)));

        Some(obj)
    }
}

/// Plain description of a handler record, for building managed objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerData {
    pub id: Option<String>,
    pub registration_method: i32,
    pub types: Vec<String>,
    pub suffixes: Vec<String>,
    pub actions: Vec<String>,
    /// `(locale, names)` with one name per action.
    pub action_names: Vec<(String, Vec<String>)>,
    pub accesses: Vec<String>,
}

impl ManagedEnv for ManagedHeap {
    fn find_class(&self, name: &str) -> Option<ClassRef> {
        self.inner
            .read()
            .classes
            .iter()
            .position(|c| c.name == name)
            .map(|i| ClassRef(i as u64))
    }

    fn field_id(&self, class: ClassRef, name: &str, signature: &str) -> Option<FieldId> {
        let inner = self.inner.read();
        let def = inner.classes.get(class.0 as usize)?;
        def.fields
            .iter()
            .position(|(n, s)| n == name && s == signature)
            .map(|slot| pack(class.0 as usize, slot))
    }

    fn object_field(&self, obj: ObjectRef, field: FieldId) -> Option<ObjectRef> {
        let (class, slot) = unpack(field);
        match self.inner.read().get(obj)? {
            Object::Instance { class: c, fields } if *c == class => match fields.get(slot)? {
                Value::Ref(r) => *r,
                Value::Int(_) => None,
            },
            _ => None,
        }
    }

    fn int_field(&self, obj: ObjectRef, field: FieldId) -> i32 {
        let (class, slot) = unpack(field);
        match self.inner.read().get(obj) {
            Some(Object::Instance { class: c, fields }) if *c == class => match fields.get(slot) {
                Some(Value::Int(v)) => *v,
                _ => 0,
            },
            _ => 0,
        }
    }

    fn array_len(&self, array: ObjectRef) -> usize {
        match self.inner.read().get(array) {
            Some(Object::Array(items)) => items.len(),
            _ => 0,
        }
    }

    fn array_element(&self, array: ObjectRef, index: usize) -> Option<ObjectRef> {
        match self.inner.read().get(array)? {
            Object::Array(items) => items.get(index).copied().flatten(),
            _ => None,
        }
    }

    fn string_units(&self, string: ObjectRef) -> Option<Vec<u16>> {
        match self.inner.read().get(string)? {
            Object::Str {
                units,
                decodable: true,
            } => Some(units.clone()),
            _ => None,
        }
    }

    fn new_string(&self, units: &[u16]) -> Option<ObjectRef> {
        let mut inner = self.inner.write();
        if let Some(budget) = inner.string_budget.as_mut() {
            if *budget == 0 {
                return None;
            }
            *budget -= 1;
        }
        Some(inner.alloc(Object::Str {
            units: units.to_vec(),
            decodable: true,
        }))
    }
}
