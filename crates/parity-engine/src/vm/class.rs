//! Runtime class representation

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::value::Value;
use crate::classfile::{access, BinaryClass, ClassFileError};

static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a defined runtime class
///
/// Two classes with the same name in different spaces have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

impl ClassId {
    fn next() -> Self {
        ClassId(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeField {
    /// Field name
    pub name: String,
    /// Field descriptor
    pub descriptor: String,
    /// Access flags
    pub access: u16,
}

impl RuntimeField {
    /// Whether the field is static
    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    /// Whether the field is public
    pub fn is_public(&self) -> bool {
        self.access & access::PUBLIC != 0
    }
}

/// How a method is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodBody {
    /// Bytecode: index into the class's binary method table
    Bytecode(usize),
    /// No body
    Abstract,
    /// Dispatched to the receiver's method handler
    Intercepted,
}

/// A declared method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeMethod {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Access flags
    pub access: u16,
    /// Execution strategy
    pub body: MethodBody,
}

impl RuntimeMethod {
    /// Whether the method is static
    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    /// Whether the method is public
    pub fn is_public(&self) -> bool {
        self.access & access::PUBLIC != 0
    }

    /// Whether a subtype may override the method
    pub fn is_overridable(&self) -> bool {
        self.access & (access::STATIC | access::FINAL | access::PRIVATE) == 0
            && self.name != "<init>"
            && self.name != "<clinit>"
    }
}

/// A linked, defined class
pub struct RuntimeClass {
    id: ClassId,
    name: String,
    access: u16,
    superclass: Option<Arc<RuntimeClass>>,
    fields: Vec<RuntimeField>,
    methods: Vec<RuntimeMethod>,
    statics: Mutex<FxHashMap<String, Value>>,
    binary: Option<Arc<BinaryClass>>,
}

impl RuntimeClass {
    /// Link a decoded class against its already-defined superclass
    pub fn link(
        binary: Arc<BinaryClass>,
        superclass: Option<Arc<RuntimeClass>>,
    ) -> Result<Self, ClassFileError> {
        let mut fields = Vec::with_capacity(binary.fields.len());
        for field in &binary.fields {
            let (name, descriptor) = binary.field_signature(field)?;
            fields.push(RuntimeField {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                access: field.access,
            });
        }

        let mut methods = Vec::with_capacity(binary.methods.len());
        for (index, method) in binary.methods.iter().enumerate() {
            let (name, descriptor) = binary.method_signature(method)?;
            let body = if method.access & access::ABSTRACT != 0 || method.code.is_empty() {
                MethodBody::Abstract
            } else {
                MethodBody::Bytecode(index)
            };
            methods.push(RuntimeMethod {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                access: method.access,
                body,
            });
        }

        let name = binary.name()?.to_string();
        Ok(Self::assemble(
            name,
            binary.access,
            superclass,
            fields,
            methods,
            Some(binary),
        ))
    }

    /// Create a class with no binary form, e.g. a generated proxy subtype
    pub fn synthesize(
        name: impl Into<String>,
        superclass: Arc<RuntimeClass>,
        methods: Vec<RuntimeMethod>,
    ) -> Self {
        Self::assemble(
            name.into(),
            access::PUBLIC | access::SYNTHETIC,
            Some(superclass),
            Vec::new(),
            methods,
            None,
        )
    }

    fn assemble(
        name: String,
        access: u16,
        superclass: Option<Arc<RuntimeClass>>,
        fields: Vec<RuntimeField>,
        methods: Vec<RuntimeMethod>,
        binary: Option<Arc<BinaryClass>>,
    ) -> Self {
        let statics = fields
            .iter()
            .filter(|f| f.is_static())
            .map(|f| (f.name.clone(), Value::default_for(&f.descriptor)))
            .collect();
        Self {
            id: ClassId::next(),
            name,
            access,
            superclass,
            fields,
            methods,
            statics: Mutex::new(statics),
            binary,
        }
    }

    /// Process-unique id
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Internal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class access flags
    pub fn access(&self) -> u16 {
        self.access
    }

    /// Superclass
    pub fn superclass(&self) -> Option<&Arc<RuntimeClass>> {
        self.superclass.as_ref()
    }

    /// Declared fields
    pub fn fields(&self) -> &[RuntimeField] {
        &self.fields
    }

    /// Declared methods
    pub fn methods(&self) -> &[RuntimeMethod] {
        &self.methods
    }

    /// Declared method by index
    pub fn method(&self, index: usize) -> Option<&RuntimeMethod> {
        self.methods.get(index)
    }

    /// Binary form, for bytecode methods
    pub fn binary(&self) -> Option<&Arc<BinaryClass>> {
        self.binary.as_ref()
    }

    /// Index of a declared method
    pub fn declared_method(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name == name && m.descriptor == descriptor)
    }

    /// Resolve a method through the superclass chain
    pub fn find_method(
        self: &Arc<Self>,
        name: &str,
        descriptor: &str,
    ) -> Option<(Arc<RuntimeClass>, usize)> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(index) = class.declared_method(name, descriptor) {
                return Some((Arc::clone(class), index));
            }
            current = class.superclass.as_ref();
        }
        None
    }

    /// Resolve a field through the superclass chain
    pub fn find_field(self: &Arc<Self>, name: &str) -> Option<(Arc<RuntimeClass>, RuntimeField)> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(field) = class.fields.iter().find(|f| f.name == name) {
                return Some((Arc::clone(class), field.clone()));
            }
            current = class.superclass.as_ref();
        }
        None
    }

    /// Whether this class is `name` or inherits from it
    pub fn is_subclass_of(&self, name: &str) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name == name {
                return true;
            }
            current = class.superclass.as_deref();
        }
        false
    }

    /// Instance fields of the whole hierarchy, superclass fields first
    pub fn instance_fields(&self) -> Vec<RuntimeField> {
        let mut fields = match &self.superclass {
            Some(superclass) => superclass.instance_fields(),
            None => Vec::new(),
        };
        fields.extend(self.fields.iter().filter(|f| !f.is_static()).cloned());
        fields
    }

    /// Public instance fields of the whole hierarchy
    pub fn public_instance_fields(&self) -> Vec<RuntimeField> {
        self.instance_fields()
            .into_iter()
            .filter(RuntimeField::is_public)
            .collect()
    }

    /// Overridable methods visible on this class, most-derived declaration wins
    pub fn overridable_methods(&self) -> Vec<RuntimeMethod> {
        let mut methods = match &self.superclass {
            Some(superclass) => superclass.overridable_methods(),
            None => Vec::new(),
        };
        for method in &self.methods {
            methods.retain(|m| !(m.name == method.name && m.descriptor == method.descriptor));
            if method.is_overridable() {
                methods.push(method.clone());
            }
        }
        methods
    }

    /// Read a static field declared on this class
    pub fn get_static(&self, name: &str) -> Option<Value> {
        self.statics.lock().get(name).cloned()
    }

    /// Write a static field declared on this class
    pub fn set_static(&self, name: &str, value: Value) -> bool {
        match self.statics.lock().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for RuntimeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeClass")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|s| s.name()))
            .finish()
    }
}
