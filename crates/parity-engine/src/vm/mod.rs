//! Execution runtime for binary classes
//!
//! Classes are defined into isolated [`ClassSpace`]s by a [`BytesClassLoader`]
//! and executed by the [`Interpreter`]. Objects may carry a [`MethodHandler`]
//! that receives calls to intercepted methods, which is how proxies forward.

mod class;
mod interpreter;
mod loader;
mod object;
mod value;

pub use class::{ClassId, MethodBody, RuntimeClass, RuntimeField, RuntimeMethod};
pub use interpreter::{Interpreter, DEFAULT_MAX_DEPTH};
pub use loader::{BytesClassLoader, ClassSpace, LoadError, LoadFailure};
pub use object::{Instantiator, MethodHandler, ObjectRef};
pub use value::{ArrayRef, Value};

use thiserror::Error;

use crate::classfile::ClassFileError;
use crate::proxy::ForwardingFailure;

/// Runtime failure
#[derive(Debug, Error)]
pub enum VmError {
    /// Pop from an empty operand stack
    #[error("Operand stack underflow")]
    StackUnderflow,

    /// Call depth exceeded
    #[error("Call stack overflow")]
    StackOverflow,

    /// Execution ran past the last instruction
    #[error("Execution fell off the end of the method")]
    FellOffEnd,

    /// Dereference of null
    #[error("Null pointer dereference")]
    NullPointer,

    /// Operand of the wrong kind
    #[error("Type error: {0}")]
    TypeError(String),

    /// Class not visible from the interpreter's space
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// Field resolution failed
    #[error("No such field: {class}.{name}")]
    NoSuchField {
        /// Class searched
        class: String,
        /// Field name
        name: String,
    },

    /// Method resolution failed
    #[error("No such method: {class}.{name}{descriptor}")]
    NoSuchMethod {
        /// Class searched
        class: String,
        /// Method name
        name: String,
        /// Method descriptor
        descriptor: String,
    },

    /// Call to a method without a body
    #[error("Abstract method called: {class}.{name}")]
    AbstractMethod {
        /// Declaring class
        class: String,
        /// Method name
        name: String,
    },

    /// Intercepted method called on an object without a handler
    #[error("No method handler installed on instance of {0}")]
    NoHandler(String),

    /// Integer division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Array index outside the array
    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// Requested index
        index: i32,
        /// Array length
        length: usize,
    },

    /// Failed CheckCast
    #[error("Cannot cast {value} to {target}")]
    ClassCast {
        /// Offending value
        value: String,
        /// Target type
        target: String,
    },

    /// Value thrown by executed code and not caught
    #[error("Uncaught throw: {0}")]
    Thrown(Value),

    /// Proxy forwarding failed
    #[error(transparent)]
    Forwarding(#[from] ForwardingFailure),

    /// Malformed class data met at run time
    #[error(transparent)]
    ClassFile(#[from] ClassFileError),
}

/// Result type for runtime operations
pub type VmResult<T> = Result<T, VmError>;
