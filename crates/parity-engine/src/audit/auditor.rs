//! Member access auditing
//!
//! Proves that the mirrorable surface of a reference type (its verification
//! entry point and tagged methods) only reaches public or trusted members of
//! the type itself. Nested types of the reference reached from that surface
//! are audited with their whole method surface.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use super::violation::{AccessedMember, AuditError, AuditViolation};
use crate::classfile::{
    decode_instructions, BinaryClass, ClassFileError, ClassSymbol, MethodInfo, TypeDescriptor,
};
use crate::config::EngineConfig;
use crate::mirror::ConstructionError;
use crate::reflect::{ClassInfo, Tag};
use crate::source::ClassSource;

/// Tags whose bodies are held to the access rules
const RULED_TAGS: [Tag; 3] = [Tag::Verify, Tag::Generator, Tag::Next];

/// Audits reference types read from a class source
pub struct Auditor<'a> {
    source: &'a dyn ClassSource,
    config: &'a EngineConfig,
}

impl<'a> Auditor<'a> {
    /// Auditor reading classes from `source`
    pub fn new(source: &'a dyn ClassSource, config: &'a EngineConfig) -> Self {
        Self { source, config }
    }

    /// Audit `reference`
    pub fn audit(&self, reference: &str) -> Result<(), AuditError> {
        let bytes = self
            .source
            .bytecode_for(reference)
            .ok_or_else(|| ConstructionError::MissingClass(reference.to_string()))?;
        let loaded = LoadedClass::decode(reference, &bytes, self.config)?;

        let mut walk = AuditWalk {
            source: self.source,
            separator: self.config.synthetic_separator,
            config: self.config,
            reference: &loaded,
            checked: FxHashSet::default(),
            danger: FxHashMap::default(),
        };
        match walk.run() {
            Ok(()) => {
                debug!(reference, nested = walk.checked.len() - 1, "audit passed");
                Ok(())
            }
            Err(AuditError::Violation(violation)) => {
                warn!(reference, %violation, "audit failed");
                Err(violation.into())
            }
            Err(other) => Err(other),
        }
    }
}

struct LoadedClass {
    binary: BinaryClass,
    info: ClassInfo,
}

impl LoadedClass {
    fn decode(name: &str, bytes: &[u8], config: &EngineConfig) -> Result<Self, ConstructionError> {
        let binary = BinaryClass::decode(bytes).map_err(|e| malformed(name, e))?;
        let info = ClassInfo::new(&binary, &config.tags).map_err(|e| malformed(name, e))?;
        Ok(Self { binary, info })
    }

    fn name(&self) -> &str {
        self.info.name()
    }
}

/// State of one audit call
struct AuditWalk<'a> {
    source: &'a dyn ClassSource,
    config: &'a EngineConfig,
    separator: char,
    reference: &'a LoadedClass,
    /// Classes already audited (or being audited)
    checked: FxHashSet<String>,
    /// Violations found inside synthesized accessors, by name and descriptor
    danger: FxHashMap<(String, String), AuditViolation>,
}

impl AuditWalk<'_> {
    fn run(&mut self) -> Result<(), AuditError> {
        let reference = self.reference;
        self.checked.insert(reference.name().to_string());

        // Accessors first, so a call to one anywhere replays what it reaches.
        // Accessors may call each other, so repeat until nothing new is found.
        loop {
            let mut grew = false;
            for (method, info) in reference.binary.methods.iter().zip(reference.info.methods()) {
                let key = (info.name.clone(), info.descriptor.clone());
                if !info.is_synthetic_name(self.separator) || self.danger.contains_key(&key) {
                    continue;
                }
                match self.walk_method(reference, method, true, false) {
                    Ok(()) => {}
                    Err(AuditError::Violation(violation)) => {
                        self.danger.insert(key, violation);
                        grew = true;
                    }
                    Err(other) => return Err(other),
                }
            }
            if !grew {
                break;
            }
        }

        for (method, info) in reference.binary.methods.iter().zip(reference.info.methods()) {
            let ruled = info.has_any_tag(&RULED_TAGS);
            // Helper bodies always run as the reference's own code
            if !ruled && !info.has_tag(Tag::Helper) {
                continue;
            }
            self.walk_method(reference, method, ruled, true)?;
        }
        Ok(())
    }

    fn walk_method(
        &mut self,
        current: &LoadedClass,
        method: &MethodInfo,
        ruled: bool,
        check_inner: bool,
    ) -> Result<(), AuditError> {
        let fail = |e: ClassFileError| AuditError::from(malformed(current.name(), e));
        let symbols = &current.binary.symbols;
        let (method_name, _) = current.binary.method_signature(method).map_err(fail)?;
        let instructions =
            decode_instructions(&method.code).map_err(|e| fail(ClassFileError::from(e)))?;

        for instruction in &instructions {
            let Some(index) = instruction.symbol() else {
                continue;
            };
            let opcode = instruction.opcode;
            if opcode.is_field_access() || opcode.is_invoke() {
                let member = symbols.member_ref(index).map_err(fail)?;
                if check_inner {
                    self.visit_nested(current, method_name, member.class_name)?;
                }
                if ruled && member.class_name == self.reference.name() {
                    if opcode.is_field_access() {
                        self.check_field(current, method_name, member.name)?;
                    } else {
                        self.check_call(current, method_name, member.name, member.descriptor)?;
                    }
                }
            } else if opcode.takes_class_operand() && check_inner {
                let named = match symbols.class_symbol(index).map_err(fail)? {
                    ClassSymbol::Class(name) => Some(name.to_string()),
                    ClassSymbol::Array { element, .. } => TypeDescriptor::parse(element)
                        .ok()
                        .and_then(|ty| ty.object_name().map(str::to_string)),
                };
                if let Some(name) = named {
                    self.visit_nested(current, method_name, &name)?;
                }
            }
        }
        Ok(())
    }

    fn check_field(
        &self,
        current: &LoadedClass,
        caller: &str,
        name: &str,
    ) -> Result<(), AuditViolation> {
        // Inherited fields are not declared on the reference type
        let Some(field) = self.reference.info.field(name) else {
            return Ok(());
        };
        if field.is_public() || (field.is_static() && field.has_tag(Tag::Helper)) {
            return Ok(());
        }
        Err(AuditViolation::new(
            caller,
            current.name(),
            AccessedMember::Field(name.to_string()),
        ))
    }

    fn check_call(
        &self,
        current: &LoadedClass,
        caller: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), AuditViolation> {
        let candidates = self.reference.info.methods_named(name).filter(|m| {
            m.descriptor == descriptor
                && !m.is_public()
                && (!m.has_any_tag(&Tag::TRUSTED) || !m.is_static())
        });
        for candidate in candidates {
            let key = (candidate.name.clone(), candidate.descriptor.clone());
            if let Some(cause) = self.danger.get(&key) {
                return Err(AuditViolation::chained(caller, current.name(), cause.clone()));
            }
            if !candidate.is_synthetic_name(self.separator) {
                return Err(AuditViolation::new(
                    caller,
                    current.name(),
                    AccessedMember::Method {
                        name: name.to_string(),
                        descriptor: descriptor.to_string(),
                    },
                ));
            }
        }
        Ok(())
    }

    /// Audit `name` if it is a nested type of `current` not yet checked
    fn visit_nested(
        &mut self,
        current: &LoadedClass,
        caller: &str,
        name: &str,
    ) -> Result<(), AuditError> {
        let is_member_type = name
            .strip_prefix(current.name())
            .map_or(false, |rest| rest.starts_with(self.separator) && rest.len() > 1);
        if !is_member_type
            || !current.info.inner_class_names().iter().any(|inner| inner == name)
            || !self.checked.insert(name.to_string())
        {
            return Ok(());
        }

        let bytes = self.source.bytecode_for(name).ok_or_else(|| {
            ConstructionError::UnresolvableNested {
                nested: name.to_string(),
                reference: self.reference.name().to_string(),
            }
        })?;
        let nested = LoadedClass::decode(name, &bytes, self.config)?;
        for method in &nested.binary.methods {
            self.walk_method(&nested, method, true, true)
                .map_err(|e| match e {
                    AuditError::Violation(violation) => {
                        AuditViolation::chained(caller, current.name(), violation).into()
                    }
                    other => other,
                })?;
        }
        Ok(())
    }
}

fn malformed(class: &str, source: ClassFileError) -> ConstructionError {
    ConstructionError::MalformedClass {
        class: class.to_string(),
        source,
    }
}
