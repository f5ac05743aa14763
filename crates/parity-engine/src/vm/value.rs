//! Runtime values

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use super::object::ObjectRef;
use crate::classfile::{BaseType, TypeDescriptor};

/// A value on the operand stack, in a local, a field or an array slot
#[derive(Clone, Default)]
pub enum Value {
    /// The null reference (also the result of a void call)
    #[default]
    Null,
    /// Any integer-like primitive
    Int(i32),
    /// String literal
    Str(Arc<str>),
    /// Object reference
    Object(ObjectRef),
    /// Array reference
    Array(ArrayRef),
}

impl Value {
    /// Initial value of a field or array slot of the given descriptor
    pub fn default_for(descriptor: &str) -> Self {
        match TypeDescriptor::parse(descriptor) {
            Ok(ty) if !ty.is_reference() && ty.base != BaseType::Void => Value::Int(0),
            _ => Value::Null,
        }
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Object payload
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Array payload
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Branch truthiness: zero and null are false
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Int(0))
    }
}

/// Primitives and strings compare by value, references by identity
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Object(obj) => write!(f, "<{}@{:x}>", obj.class().name(), obj.address()),
            Value::Array(array) => write!(f, "<{}; {}>", array.descriptor(), array.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// Array storage
pub struct ArrayObject {
    descriptor: String,
    elements: Mutex<Vec<Value>>,
}

/// Shared array reference
#[derive(Clone)]
pub struct ArrayRef(Arc<ArrayObject>);

impl ArrayRef {
    /// Allocate an array of `length` default elements
    ///
    /// `descriptor` is the array type descriptor, e.g. `[[LWidget;`.
    pub fn new(descriptor: impl Into<String>, length: usize) -> Self {
        let descriptor = descriptor.into();
        let element = Value::default_for(&descriptor[1.min(descriptor.len())..]);
        Self(Arc::new(ArrayObject {
            elements: Mutex::new(vec![element; length]),
            descriptor,
        }))
    }

    /// Array type descriptor
    pub fn descriptor(&self) -> &str {
        &self.0.descriptor
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.0.elements.lock().len()
    }

    /// Whether the array has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.elements.lock().get(index).cloned()
    }

    /// Store at `index`; false when out of bounds
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.elements.lock().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
