//! Heap objects and constructor-free allocation

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::class::{RuntimeClass, RuntimeMethod};
use super::interpreter::Interpreter;
use super::value::Value;
use super::VmResult;

/// Receives calls to intercepted methods
pub trait MethodHandler: Send + Sync {
    /// Handle `method` invoked on `receiver`
    fn invoke(
        &self,
        interpreter: &Interpreter,
        receiver: &ObjectRef,
        method: &RuntimeMethod,
        args: Vec<Value>,
    ) -> VmResult<Value>;
}

/// Object storage
pub struct Object {
    class: Arc<RuntimeClass>,
    fields: Mutex<FxHashMap<String, Value>>,
    handler: OnceCell<Arc<dyn MethodHandler>>,
}

/// Shared object reference
#[derive(Clone)]
pub struct ObjectRef(Arc<Object>);

impl ObjectRef {
    /// Runtime class of the object
    pub fn class(&self) -> &Arc<RuntimeClass> {
        &self.0.class
    }

    /// Read an instance field; None if the object has no such field
    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.0.fields.lock().get(name).cloned()
    }

    /// Write an instance field; false if the object has no such field
    pub fn set_field(&self, name: &str, value: Value) -> bool {
        match self.0.fields.lock().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Installed method handler
    pub fn handler(&self) -> Option<&Arc<dyn MethodHandler>> {
        self.0.handler.get()
    }

    /// Install the method handler; a handler can be installed once
    pub fn set_handler(&self, handler: Arc<dyn MethodHandler>) -> bool {
        self.0.handler.set(handler).is_ok()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address for diagnostics
    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", Value::Object(self.clone()))
    }
}

/// Allocates instances of one class without running any constructor
///
/// Every instance field starts at the default value for its descriptor.
pub struct Instantiator {
    class: Arc<RuntimeClass>,
    layout: Vec<(String, Value)>,
}

impl Instantiator {
    /// Precompute the field layout of `class`
    pub fn new(class: Arc<RuntimeClass>) -> Self {
        let layout = class
            .instance_fields()
            .into_iter()
            .map(|field| {
                let initial = Value::default_for(&field.descriptor);
                (field.name, initial)
            })
            .collect();
        Self { class, layout }
    }

    /// Class this instantiator allocates
    pub fn class(&self) -> &Arc<RuntimeClass> {
        &self.class
    }

    /// Allocate a fresh instance
    pub fn new_instance(&self) -> ObjectRef {
        ObjectRef(Arc::new(Object {
            class: Arc::clone(&self.class),
            fields: Mutex::new(self.layout.iter().cloned().collect()),
            handler: OnceCell::new(),
        }))
    }
}
