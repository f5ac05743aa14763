//! Call forwarding with field synchronization

use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use super::cache::instantiator_for;
use crate::vm::{
    Interpreter, MethodHandler, ObjectRef, RuntimeClass, RuntimeMethod, Value, VmResult,
};

/// Structural mismatch between a proxy and its backing instance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardingFailure {
    /// A public field of the backing type has no counterpart on the proxy
    #[error("Field {field} of {class} is missing on the proxy")]
    MissingField {
        /// Backing class
        class: String,
        /// Field name
        field: String,
    },

    /// The backing type has no public instance method for a proxied call
    #[error("Backing type {class} has no public method {name}{descriptor}")]
    MissingMethod {
        /// Backing class
        class: String,
        /// Method name
        name: String,
        /// Method descriptor
        descriptor: String,
    },

    /// The backing value is not an object
    #[error("Cannot proxy to non-object value {0}")]
    NotAnObject(String),
}

/// Forwards every intercepted call to one backing instance
///
/// Public instance fields of the backing type are copied into the backing
/// object before the call and back into the proxy after it.
pub struct ForwardingHandler {
    backing: ObjectRef,
    fields: Vec<String>,
}

impl ForwardingHandler {
    /// Handler forwarding to `backing`
    pub fn new(backing: ObjectRef) -> Self {
        let fields = backing
            .class()
            .public_instance_fields()
            .into_iter()
            .map(|field| field.name)
            .collect();
        Self { backing, fields }
    }

    /// The backing instance
    pub fn backing(&self) -> &ObjectRef {
        &self.backing
    }

    fn copy_fields(&self, from: &ObjectRef, to: &ObjectRef) -> Result<(), ForwardingFailure> {
        for name in &self.fields {
            let value = from.get_field(name).ok_or_else(|| self.missing_field(name))?;
            if !to.set_field(name, value) {
                return Err(self.missing_field(name));
            }
        }
        Ok(())
    }

    fn missing_field(&self, name: &str) -> ForwardingFailure {
        ForwardingFailure::MissingField {
            class: self.backing.class().name().to_string(),
            field: name.to_string(),
        }
    }

    fn resolve(
        &self,
        method: &RuntimeMethod,
    ) -> Result<(Arc<RuntimeClass>, usize), ForwardingFailure> {
        let class = self.backing.class();
        class
            .find_method(&method.name, &method.descriptor)
            .filter(|(owner, index)| {
                owner
                    .method(*index)
                    .map_or(false, |m| m.is_public() && !m.is_static())
            })
            .ok_or_else(|| ForwardingFailure::MissingMethod {
                class: class.name().to_string(),
                name: method.name.clone(),
                descriptor: method.descriptor.clone(),
            })
    }
}

impl MethodHandler for ForwardingHandler {
    fn invoke(
        &self,
        interpreter: &Interpreter,
        receiver: &ObjectRef,
        method: &RuntimeMethod,
        args: Vec<Value>,
    ) -> VmResult<Value> {
        trace!(
            proxy = receiver.class().name(),
            backing = self.backing.class().name(),
            method = %method.name,
            "forwarding call"
        );
        self.copy_fields(receiver, &self.backing)?;
        let (owner, index) = self.resolve(method)?;
        let result = interpreter.invoke(&owner, index, Some(&self.backing), args)?;
        self.copy_fields(&self.backing, receiver)?;
        Ok(result)
    }
}

/// Create a proxy of `supertype` forwarding to `backing`
///
/// The proxy is allocated without running a constructor and its fields are
/// seeded from the backing instance.
pub fn create_proxy(
    supertype: &Arc<RuntimeClass>,
    backing: &Value,
    excluded: &[String],
) -> Result<ObjectRef, ForwardingFailure> {
    let backing = backing
        .as_object()
        .cloned()
        .ok_or_else(|| ForwardingFailure::NotAnObject(format!("{:?}", backing)))?;
    let instantiator = instantiator_for(supertype, excluded);
    let proxy = instantiator.new_instance();
    let handler = ForwardingHandler::new(backing);
    handler.copy_fields(&handler.backing, &proxy)?;
    proxy.set_handler(Arc::new(handler));
    Ok(proxy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{access, ClassBuilder};
    use crate::vm::{BytesClassLoader, ClassSpace, VmError};

    /// Abstract `Box` with a public `count` and an implementation that bumps it
    fn setup() -> (Interpreter, Arc<RuntimeClass>) {
        let space = ClassSpace::new();
        let loader = BytesClassLoader::new(space.clone());

        let mut shape = ClassBuilder::new("fwd/Box");
        shape.access(access::PUBLIC | access::ABSTRACT);
        shape.field(access::PUBLIC, "count", "I");
        shape.abstract_method(access::PUBLIC | access::ABSTRACT, "bump", "(I)I");
        shape.abstract_method(access::PUBLIC | access::ABSTRACT, "fail", "()V");
        shape.abstract_method(access::PUBLIC | access::ABSTRACT, "absent", "()V");
        let shape = loader.define_class(&shape.build().encode()).unwrap();

        let mut impl_class = ClassBuilder::new("fwd/BoxImpl");
        impl_class.field(access::PUBLIC, "count", "I");
        impl_class
            .method(access::PUBLIC, "bump", "(I)I")
            .load(0)
            .load(0)
            .get_field("fwd/BoxImpl", "count", "I")
            .load(1)
            .iadd()
            .put_field("fwd/BoxImpl", "count", "I")
            .load(0)
            .get_field("fwd/BoxImpl", "count", "I")
            .ret()
            .finish();
        impl_class
            .method(access::PUBLIC, "fail", "()V")
            .ldc_str("bad")
            .throw()
            .finish();
        loader.define_class(&impl_class.build().encode()).unwrap();

        (Interpreter::new(space), shape)
    }

    #[test]
    fn test_fields_flow_both_ways() {
        let (interp, shape) = setup();
        let backing = interp.allocate("fwd/BoxImpl").unwrap();
        backing.set_field("count", Value::Int(4));

        let proxy = create_proxy(&shape, &Value::Object(backing.clone()), &[]).unwrap();
        assert_eq!(proxy.get_field("count"), Some(Value::Int(4)));

        proxy.set_field("count", Value::Int(10));
        let result = interp
            .invoke_virtual(&proxy, "bump", "(I)I", vec![Value::Int(5)])
            .unwrap();
        assert_eq!(result, Value::Int(15));
        assert_eq!(backing.get_field("count"), Some(Value::Int(15)));
        assert_eq!(proxy.get_field("count"), Some(Value::Int(15)));
    }

    #[test]
    fn test_thrown_value_propagates_unchanged() {
        let (interp, shape) = setup();
        let backing = interp.allocate("fwd/BoxImpl").unwrap();
        let proxy = create_proxy(&shape, &Value::Object(backing), &[]).unwrap();
        let err = interp.invoke_virtual(&proxy, "fail", "()V", vec![]).unwrap_err();
        assert!(matches!(err, VmError::Thrown(Value::Str(ref s)) if &**s == "bad"));
    }

    #[test]
    fn test_missing_backing_method() {
        let (interp, shape) = setup();
        let backing = interp.allocate("fwd/BoxImpl").unwrap();
        let proxy = create_proxy(&shape, &Value::Object(backing), &[]).unwrap();
        let err = interp
            .invoke_virtual(&proxy, "absent", "()V", vec![])
            .unwrap_err();
        assert!(matches!(
            err,
            VmError::Forwarding(ForwardingFailure::MissingMethod { ref name, .. })
                if name == "absent"
        ));
    }

    #[test]
    fn test_non_object_backing() {
        let (_, shape) = setup();
        assert!(matches!(
            create_proxy(&shape, &Value::Int(3), &[]),
            Err(ForwardingFailure::NotAnObject(_))
        ));
    }
}
