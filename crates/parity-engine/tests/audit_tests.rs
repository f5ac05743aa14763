//! Member access audits of reference types

mod common;

use common::{tags, Fixture};
use parity_engine::classfile::{access, ClassBuilder};
use parity_engine::{
    AccessedMember, AuditError, AuditViolation, Auditor, ConstructionError, EngineConfig,
};

fn audit(fixture: &Fixture, reference: &str) -> Result<(), AuditError> {
    let source = fixture.source();
    let config = EngineConfig::default();
    Auditor::new(&*source, &config).audit(reference)
}

fn violation(fixture: &Fixture, reference: &str) -> AuditViolation {
    match audit(fixture, reference) {
        Err(AuditError::Violation(violation)) => violation,
        other => panic!("expected a violation, got {:?}", other),
    }
}

fn single(builder: ClassBuilder) -> Fixture {
    let mut fixture = Fixture::new();
    fixture.add(builder);
    fixture
}

#[test]
fn test_public_surface_passes() {
    let tags = tags();
    let mut polite = ClassBuilder::new("lab/Polite");
    polite
        .field(access::PUBLIC, "value", "I")
        .field(access::PRIVATE, "hidden", "I");
    polite
        .method(access::PUBLIC, "value", "()I")
        .load(0)
        .get_field("lab/Polite", "value", "I")
        .ret()
        .finish();
    polite
        .method(access::PRIVATE, "hiddenValue", "()I")
        .load(0)
        .get_field("lab/Polite", "hidden", "I")
        .ret()
        .finish();
    polite
        .method(access::PUBLIC | access::STATIC, "check", "(Llab/Polite;)I")
        .tag(&tags.verify)
        .load(0)
        .invoke_virtual("lab/Polite", "value", "()I")
        .ret()
        .finish();

    assert_eq!(audit(&single(polite), "lab/Polite"), Ok(()));
}

#[test]
fn test_private_call_is_blamed_on_the_caller() {
    let tags = tags();
    let mut sneaky = ClassBuilder::new("lab/Sneaky");
    sneaky
        .method(access::PRIVATE, "secret", "()I")
        .const_i32(42)
        .ret()
        .finish();
    sneaky
        .method(access::PUBLIC | access::STATIC, "check", "(Llab/Sneaky;)I")
        .tag(&tags.verify)
        .load(0)
        .invoke_virtual("lab/Sneaky", "secret", "()I")
        .ret()
        .finish();

    let violation = violation(&single(sneaky), "lab/Sneaky");
    assert_eq!(violation.blame_method, "check");
    assert_eq!(violation.blame_class, "lab/Sneaky");
    assert_eq!(
        violation.member,
        AccessedMember::Method {
            name: "secret".to_string(),
            descriptor: "()I".to_string(),
        }
    );
    assert!(violation.cause.is_none());
}

#[test]
fn test_private_field_read_is_blamed() {
    let tags = tags();
    let mut peek = ClassBuilder::new("lab/Peek");
    peek.field(access::PRIVATE, "secretField", "I");
    peek.method(access::PUBLIC | access::STATIC, "check", "(Llab/Peek;Llab/Peek;)I")
        .tag(&tags.verify)
        .load(1)
        .get_field("lab/Peek", "secretField", "I")
        .ret()
        .finish();

    let violation = violation(&single(peek), "lab/Peek");
    assert_eq!(violation.blame_method, "check");
    assert_eq!(violation.member, AccessedMember::Field("secretField".to_string()));
    assert!(violation.to_string().contains("field secretField"));
}

#[test]
fn test_helpers_may_reach_private_members() {
    let tags = tags();
    let mut setup = ClassBuilder::new("lab/Setup");
    setup
        .tagged_field(access::STATIC, "pool", "I", &[tags.helper.as_str()])
        .field(access::PRIVATE, "state", "I");
    setup.method(access::PRIVATE, "secret", "()V").ret_void().finish();
    setup
        .method(access::STATIC, "prepare", "(Llab/Setup;)V")
        .tag(&tags.helper)
        .load(0)
        .invoke_virtual("lab/Setup", "secret", "()V")
        .load(0)
        .const_i32(1)
        .put_field("lab/Setup", "state", "I")
        .ret_void()
        .finish();
    setup
        .method(access::PUBLIC | access::STATIC, "check", "(Llab/Setup;)I")
        .tag(&tags.verify)
        .load(0)
        .invoke_static("lab/Setup", "prepare", "(Llab/Setup;)V")
        .get_static("lab/Setup", "pool", "I")
        .ret()
        .finish();

    assert_eq!(audit(&single(setup), "lab/Setup"), Ok(()));
}

#[test]
fn test_untagged_methods_are_not_walked() {
    let tags = tags();
    let mut quiet = ClassBuilder::new("lab/Quiet");
    quiet.field(access::PRIVATE, "secret", "I");
    quiet
        .method(access::PUBLIC, "peek", "()I")
        .load(0)
        .get_field("lab/Quiet", "secret", "I")
        .ret()
        .finish();
    quiet
        .method(access::PUBLIC | access::STATIC, "check", "()I")
        .tag(&tags.verify)
        .const_i32(0)
        .ret()
        .finish();

    assert_eq!(audit(&single(quiet), "lab/Quiet"), Ok(()));
}

#[test]
fn test_violation_through_private_nested_type() {
    let tags = tags();
    let mut outer = ClassBuilder::new("lab/Outer");
    outer.field(access::PRIVATE, "secret", "I").inner_class(
        "lab/Outer$Helper",
        Some("lab/Outer"),
        Some("Helper"),
        access::PRIVATE | access::STATIC,
    );
    outer
        .method(access::PUBLIC | access::STATIC, "check", "(Llab/Outer;)I")
        .tag(&tags.verify)
        .new_object("lab/Outer$Helper")
        .dup()
        .invoke_special("lab/Outer$Helper", "<init>", "()V")
        .load(0)
        .invoke_virtual("lab/Outer$Helper", "poke", "(Llab/Outer;)I")
        .ret()
        .finish();

    let mut helper = ClassBuilder::new("lab/Outer$Helper");
    helper.access(access::PRIVATE | access::STATIC);
    helper.method(access::PUBLIC, "<init>", "()V").ret_void().finish();
    helper
        .method(access::PUBLIC, "poke", "(Llab/Outer;)I")
        .load(1)
        .get_field("lab/Outer", "secret", "I")
        .ret()
        .finish();

    let mut fixture = Fixture::new();
    fixture.add(outer).add(helper);
    let violation = violation(&fixture, "lab/Outer");

    assert_eq!(violation.blame_method, "check");
    assert_eq!(violation.blame_class, "lab/Outer");
    assert_eq!(violation.member, AccessedMember::Field("secret".to_string()));
    let root = violation.root();
    assert_eq!(root.blame_method, "poke");
    assert_eq!(root.blame_class, "lab/Outer$Helper");
    assert_eq!(violation.chain().count(), 2);
}

#[test]
fn test_clean_nested_type_passes() {
    let tags = tags();
    let mut outer = ClassBuilder::new("lab/Tidy");
    outer.field(access::PUBLIC, "open", "I").inner_class(
        "lab/Tidy$Step",
        Some("lab/Tidy"),
        Some("Step"),
        access::STATIC,
    );
    outer
        .method(access::PUBLIC | access::STATIC, "check", "(Llab/Tidy;)I")
        .tag(&tags.verify)
        .load(0)
        .invoke_static("lab/Tidy$Step", "run", "(Llab/Tidy;)I")
        .ret()
        .finish();
    let mut step = ClassBuilder::new("lab/Tidy$Step");
    step.method(access::STATIC, "run", "(Llab/Tidy;)I")
        .load(0)
        .get_field("lab/Tidy", "open", "I")
        .ret()
        .finish();

    let mut fixture = Fixture::new();
    fixture.add(outer).add(step);
    assert_eq!(audit(&fixture, "lab/Tidy"), Ok(()));
}

#[test]
fn test_accessor_call_replays_its_violation() {
    let tags = tags();
    let mut bridge = ClassBuilder::new("lab/Bridge");
    bridge.field(access::PRIVATE, "secret", "I");
    // Declared before the accessor it calls
    bridge
        .method(access::PUBLIC | access::STATIC, "check", "(Llab/Bridge;)I")
        .tag(&tags.verify)
        .load(0)
        .invoke_static("lab/Bridge", "access$000", "(Llab/Bridge;)I")
        .ret()
        .finish();
    bridge
        .method(access::STATIC | access::SYNTHETIC, "access$000", "(Llab/Bridge;)I")
        .load(0)
        .get_field("lab/Bridge", "secret", "I")
        .ret()
        .finish();

    let violation = violation(&single(bridge), "lab/Bridge");
    assert_eq!(violation.blame_method, "check");
    assert_eq!(violation.member, AccessedMember::Field("secret".to_string()));
    assert_eq!(violation.root().blame_method, "access$000");
}

#[test]
fn test_accessor_chain_declared_caller_first() {
    let tags = tags();
    let mut chain = ClassBuilder::new("lab/Chain");
    chain.field(access::PRIVATE, "secret", "I");
    chain
        .method(access::PUBLIC | access::STATIC, "check", "(Llab/Chain;)I")
        .tag(&tags.verify)
        .load(0)
        .invoke_static("lab/Chain", "access$000", "(Llab/Chain;)I")
        .ret()
        .finish();
    // Each accessor is declared before the one it calls
    chain
        .method(access::STATIC | access::SYNTHETIC, "access$000", "(Llab/Chain;)I")
        .load(0)
        .invoke_static("lab/Chain", "access$001", "(Llab/Chain;)I")
        .ret()
        .finish();
    chain
        .method(access::STATIC | access::SYNTHETIC, "access$001", "(Llab/Chain;)I")
        .load(0)
        .get_field("lab/Chain", "secret", "I")
        .ret()
        .finish();

    let violation = violation(&single(chain), "lab/Chain");
    assert_eq!(violation.blame_method, "check");
    assert_eq!(violation.member, AccessedMember::Field("secret".to_string()));
    let blamed: Vec<&str> = violation.chain().map(|v| v.blame_method.as_str()).collect();
    assert_eq!(blamed, ["check", "access$000", "access$001"]);
}

#[test]
fn test_uncalled_accessor_is_harmless() {
    let tags = tags();
    let mut bridge = ClassBuilder::new("lab/Unused");
    bridge.field(access::PRIVATE, "secret", "I");
    bridge
        .method(access::STATIC | access::SYNTHETIC, "access$000", "(Llab/Unused;)I")
        .load(0)
        .get_field("lab/Unused", "secret", "I")
        .ret()
        .finish();
    bridge
        .method(access::PUBLIC | access::STATIC, "check", "()I")
        .tag(&tags.verify)
        .const_i32(1)
        .ret()
        .finish();

    assert_eq!(audit(&single(bridge), "lab/Unused"), Ok(()));
}

#[test]
fn test_missing_nested_type_is_a_construction_error() {
    let tags = tags();
    let mut outer = ClassBuilder::new("lab/Hollow");
    outer.inner_class("lab/Hollow$Gone", Some("lab/Hollow"), Some("Gone"), access::STATIC);
    outer
        .method(access::PUBLIC | access::STATIC, "check", "()I")
        .tag(&tags.verify)
        .invoke_static("lab/Hollow$Gone", "run", "()I")
        .ret()
        .finish();

    let err = audit(&single(outer), "lab/Hollow").unwrap_err();
    assert_eq!(
        err,
        AuditError::Construction(ConstructionError::UnresolvableNested {
            nested: "lab/Hollow$Gone".to_string(),
            reference: "lab/Hollow".to_string(),
        })
    );
}
