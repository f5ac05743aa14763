//! Proxies forwarding to submission instances

mod common;

use std::sync::Arc;
use std::thread;

use common::Fixture;
use parity_engine::classfile::{access, ClassBuilder};
use parity_engine::proxy::{instantiator_for, PROXY_SUFFIX};
use parity_engine::{
    create_proxy, ClassSpace, EngineError, ForwardingFailure, Interpreter, Value, VmError,
};

/// `lab/Account` with an overridable `deposit` and a `fail` that throws,
/// plus a submission type sharing its public state
fn account_space() -> Arc<ClassSpace> {
    let mut reference = ClassBuilder::new("lab/Account");
    reference.field(access::PUBLIC, "balance", "I");
    reference
        .method(access::PUBLIC, "deposit", "(I)I")
        .const_i32(0)
        .ret()
        .finish();
    reference
        .method(access::PUBLIC, "fail", "()V")
        .ret_void()
        .finish();
    reference
        .method(access::PUBLIC, "audit", "()V")
        .ret_void()
        .finish();

    let mut submission = ClassBuilder::new("student/Account");
    submission.field(access::PUBLIC, "balance", "I");
    submission
        .method(access::PUBLIC, "deposit", "(I)I")
        .load(0)
        .load(0)
        .get_field("student/Account", "balance", "I")
        .load(1)
        .iadd()
        .put_field("student/Account", "balance", "I")
        .load(0)
        .get_field("student/Account", "balance", "I")
        .ret()
        .finish();
    submission
        .method(access::PUBLIC, "fail", "()V")
        .load(0)
        .const_i32(-1)
        .put_field("student/Account", "balance", "I")
        .ldc_str("overdrawn")
        .throw()
        .finish();

    // Public state the reference type does not declare
    let mut wider = ClassBuilder::new("student/Wider");
    wider
        .field(access::PUBLIC, "balance", "I")
        .field(access::PUBLIC, "owner", "I");

    let mut fixture = Fixture::new();
    fixture.add(reference).add(submission).add(wider);
    fixture.space()
}

fn excluded() -> Vec<String> {
    vec!["finalize".to_string()]
}

#[test]
fn test_calls_and_state_flow_through_the_proxy() {
    let space = account_space();
    let interpreter = Interpreter::new(space);
    let reference = interpreter.resolve_class("lab/Account").unwrap();
    let account = interpreter.allocate("student/Account").unwrap();
    account.set_field("balance", Value::Int(10));

    let proxy = create_proxy(&reference, &Value::Object(account.clone()), &excluded()).unwrap();
    assert_eq!(proxy.class().name(), format!("lab/Account{}", PROXY_SUFFIX));
    assert_eq!(proxy.get_field("balance"), Some(Value::Int(10)));

    let result = interpreter
        .invoke_virtual(&proxy, "deposit", "(I)I", vec![Value::Int(5)])
        .unwrap();
    assert_eq!(result, Value::Int(15));
    assert_eq!(proxy.get_field("balance"), Some(Value::Int(15)));
    assert_eq!(account.get_field("balance"), Some(Value::Int(15)));
}

#[test]
fn test_thrown_values_propagate_without_copy_back() {
    let space = account_space();
    let interpreter = Interpreter::new(space);
    let reference = interpreter.resolve_class("lab/Account").unwrap();
    let account = interpreter.allocate("student/Account").unwrap();
    let proxy = create_proxy(&reference, &Value::Object(account.clone()), &excluded()).unwrap();
    proxy.set_field("balance", Value::Int(3));

    let err = interpreter
        .invoke_virtual(&proxy, "fail", "()V", vec![])
        .unwrap_err();
    assert!(matches!(err, VmError::Thrown(Value::Str(ref text)) if &**text == "overdrawn"));
    assert_eq!(account.get_field("balance"), Some(Value::Int(-1)));
    assert_eq!(proxy.get_field("balance"), Some(Value::Int(3)));
}

#[test]
fn test_missing_backing_method_is_reported() {
    let space = account_space();
    let interpreter = Interpreter::new(space);
    let reference = interpreter.resolve_class("lab/Account").unwrap();
    let account = interpreter.allocate("student/Account").unwrap();
    let proxy = create_proxy(&reference, &Value::Object(account), &excluded()).unwrap();

    let err = interpreter
        .invoke_virtual(&proxy, "audit", "()V", vec![])
        .unwrap_err();
    assert!(matches!(
        err,
        VmError::Forwarding(ForwardingFailure::MissingMethod { ref name, .. }) if name == "audit"
    ));
}

#[test]
fn test_unmatched_public_field_fails_creation() {
    let space = account_space();
    let interpreter = Interpreter::new(space);
    let reference = interpreter.resolve_class("lab/Account").unwrap();
    let wider = interpreter.allocate("student/Wider").unwrap();

    let err = create_proxy(&reference, &Value::Object(wider), &excluded()).unwrap_err();
    assert_eq!(
        err,
        ForwardingFailure::MissingField {
            class: "student/Wider".to_string(),
            field: "owner".to_string(),
        }
    );
}

#[test]
fn test_session_rejects_non_object_backing() {
    let mut fixture = Fixture::new();
    fixture.add(ClassBuilder::new("lab/Empty"));
    let session = fixture.session();
    let err = session.proxy("lab/Empty", &Value::Int(1)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Forwarding(ForwardingFailure::NotAnObject(_))
    ));
}

#[test]
fn test_one_subtype_per_supertype_across_threads() {
    let space = account_space();
    let interpreter = Interpreter::new(space);
    let reference = interpreter.resolve_class("lab/Account").unwrap();

    let generated: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| instantiator_for(&reference, &excluded())))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for instantiator in &generated[1..] {
        assert!(Arc::ptr_eq(instantiator, &generated[0]));
    }

    // A class redefined elsewhere under the same name is a different supertype
    let other = account_space();
    let twin = Interpreter::new(other).resolve_class("lab/Account").unwrap();
    let separate = instantiator_for(&twin, &excluded());
    assert!(!Arc::ptr_eq(&separate, &generated[0]));
    assert!(!Arc::ptr_eq(separate.proxy_class(), generated[0].proxy_class()));
}
