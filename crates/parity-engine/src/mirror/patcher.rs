//! Symbol table patching
//!
//! A mirror is the reference class (or one of its nested types) with every
//! self-reference redirected. Only symbol-table entries and symbol operands
//! change: code is never moved, untouched entries keep their indices, and
//! every new symbol is appended.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeSet, VecDeque};
use thiserror::Error;
use tracing::{debug, trace};

use super::memo::{MirrorMemo, MirroredClass};
use super::names::{top_level_mirror_name, NameMap};
use crate::classfile::{
    decode_instructions, patch_symbol, BinaryClass, ClassFileError, DescriptorError, MemberKind,
    Symbol, VerificationType,
};
use crate::config::EngineConfig;
use crate::reflect::{ClassInfo, TrustedMembers};
use crate::source::ClassSource;

/// Mirror construction failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// The class source cannot provide the reference type
    #[error("Class {0} is not available from the class source")]
    MissingClass(String),

    /// A nested type reached during rewriting cannot be provided
    #[error("Nested type {nested} of {reference} cannot be resolved")]
    UnresolvableNested {
        /// Nested type name
        nested: String,
        /// Reference type being mirrored
        reference: String,
    },

    /// Class bytes or symbols are malformed
    #[error("Malformed class {class}: {source}")]
    MalformedClass {
        /// Class being rewritten
        class: String,
        /// Underlying failure
        #[source]
        source: ClassFileError,
    },

    /// A descriptor does not parse
    #[error("Malformed descriptor in {class}: {source}")]
    MalformedDescriptor {
        /// Class being rewritten
        class: String,
        /// Underlying failure
        #[source]
        source: DescriptorError,
    },
}

/// The classes produced by one top-level mirror call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    name: String,
    classes: Vec<MirroredClass>,
}

impl Mirror {
    /// Name of the top-level mirror
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every produced class, top-level mirror first
    pub fn classes(&self) -> &[MirroredClass] {
        &self.classes
    }

    /// A produced class by mirror name
    pub fn class(&self, name: &str) -> Option<&MirroredClass> {
        self.classes.iter().find(|class| class.name == name)
    }

    /// The top-level mirror
    pub fn top(&self) -> Option<&MirroredClass> {
        self.class(&self.name)
    }
}

/// Produces mirrors of reference types from a class source
pub struct Patcher<'a> {
    source: &'a dyn ClassSource,
    config: &'a EngineConfig,
}

impl<'a> Patcher<'a> {
    /// Patcher reading classes from `source`
    pub fn new(source: &'a dyn ClassSource, config: &'a EngineConfig) -> Self {
        Self { source, config }
    }

    /// Mirror `reference` onto `target` under a freshly generated name
    pub fn mirror(&self, reference: &str, target: &str) -> Result<Mirror, ConstructionError> {
        let name = top_level_mirror_name(self.config);
        self.mirror_named(reference, target, &name)
    }

    /// Mirror `reference` onto `target` as `mirror_name`
    ///
    /// Nested types of the reference reached from the mirror are mirrored
    /// too, each at most once.
    pub fn mirror_named(
        &self,
        reference: &str,
        target: &str,
        mirror_name: &str,
    ) -> Result<Mirror, ConstructionError> {
        let bytes = self
            .source
            .bytecode_for(reference)
            .ok_or_else(|| ConstructionError::MissingClass(reference.to_string()))?;
        let class = decode(reference, &bytes)?;
        let info =
            ClassInfo::new(&class, &self.config.tags).map_err(|e| malformed(reference, e))?;

        let rewrite = Rewrite {
            names: NameMap::new(
                reference,
                target,
                mirror_name,
                self.config.synthetic_separator,
            ),
            trusted: TrustedMembers::collect(&info),
            verify_method: info
                .verify_method()
                .map(|m| (m.name.clone(), m.descriptor.clone())),
        };

        let mut memo = MirrorMemo::new();
        let mut queue = VecDeque::new();
        memo.reserve(mirror_name, reference);
        let (top, discovered) = rewrite.patch(class, true)?;
        memo.fill(mirror_name, top);
        rewrite.enqueue(discovered, &mut memo, &mut queue);

        while let Some((nested, nested_mirror)) = queue.pop_front() {
            let bytes = self.source.bytecode_for(&nested).ok_or_else(|| {
                ConstructionError::UnresolvableNested {
                    nested: nested.clone(),
                    reference: reference.to_string(),
                }
            })?;
            let class = decode(&nested, &bytes)?;
            let (patched, discovered) = rewrite.patch(class, false)?;
            memo.fill(&nested_mirror, patched);
            rewrite.enqueue(discovered, &mut memo, &mut queue);
        }

        let classes = memo.into_classes();
        debug!(
            reference,
            target,
            mirror = mirror_name,
            classes = classes.len(),
            "mirror complete"
        );
        Ok(Mirror {
            name: mirror_name.to_string(),
            classes,
        })
    }
}

/// State shared by every class rewritten within one top-level call
struct Rewrite {
    names: NameMap,
    trusted: TrustedMembers,
    verify_method: Option<(String, String)>,
}

impl Rewrite {
    fn enqueue(
        &self,
        discovered: BTreeSet<String>,
        memo: &mut MirrorMemo,
        queue: &mut VecDeque<(String, String)>,
    ) {
        for nested in discovered {
            if let Some(mirror) = self.names.nested_mirror_name(&nested) {
                if memo.reserve(&mirror, &nested) {
                    queue.push_back((nested, mirror));
                }
            }
        }
    }

    fn is_trusted(&self, kind: MemberKind, name: &str) -> bool {
        match kind {
            MemberKind::Method => self.trusted.is_trusted_method(name),
            MemberKind::Field => self.trusted.is_trusted_field(name),
        }
    }

    fn rename(
        &self,
        class: &str,
        descriptor: &str,
        discovered: &mut BTreeSet<String>,
    ) -> Result<Option<String>, ConstructionError> {
        self.names
            .rename_descriptor(descriptor, discovered)
            .map_err(|source| ConstructionError::MalformedDescriptor {
                class: class.to_string(),
                source,
            })
    }

    /// Rewrite one class; returns its bytes and the nested types it reaches
    fn patch(
        &self,
        mut class: BinaryClass,
        top_level: bool,
    ) -> Result<(Vec<u8>, BTreeSet<String>), ConstructionError> {
        let base = class.name().map_err(|e| malformed("<unknown>", e))?.to_string();
        let fail = |e: ClassFileError| malformed(&base, e);
        let reference = self.names.reference();
        let separator = self.names.separator();
        let mut discovered = BTreeSet::new();

        // Snapshot the original entries before anything is appended
        let mut class_entries = Vec::new();
        let mut array_entries = Vec::new();
        let mut name_and_types = Vec::new();
        let mut redirected = Vec::new();
        let mut elsewhere = Vec::new();
        let mut pinned = FxHashSet::default();
        for (index, symbol) in class.symbols.iter() {
            match *symbol {
                Symbol::Class { name } => {
                    let name = class.symbols.utf8(name).map_err(fail)?;
                    class_entries.push((index, name.to_string()));
                }
                Symbol::ArrayClass { element, dims } => {
                    let element = class.symbols.utf8(element).map_err(fail)?;
                    array_entries.push((index, element.to_string(), dims));
                }
                Symbol::NameAndType { name, descriptor } => {
                    let descriptor = class.symbols.utf8(descriptor).map_err(fail)?;
                    name_and_types.push((index, name, descriptor.to_string()));
                }
                Symbol::FieldRef {
                    class: owner,
                    name_and_type,
                }
                | Symbol::MethodRef {
                    class: owner,
                    name_and_type,
                } => {
                    let member = class.symbols.member_ref(index).map_err(fail)?;
                    if member.class_name != reference {
                        elsewhere.push((index, member.kind, owner, name_and_type));
                    } else if self.is_trusted(member.kind, member.name) {
                        pinned.insert(name_and_type);
                    } else {
                        redirected.push((
                            index,
                            member.kind,
                            name_and_type,
                            member.name.to_string(),
                        ));
                    }
                }
                _ => {}
            }
        }

        let symbols = &mut class.symbols;

        // Member descriptors. An entry a trusted reference uses stays as it
        // is, and every other reference sharing it moves to a renamed copy.
        let mut split: FxHashMap<u32, u32> = FxHashMap::default();
        for (index, name, descriptor) in name_and_types {
            let Some(renamed) = self.rename(&base, &descriptor, &mut discovered)? else {
                continue;
            };
            let descriptor = symbols.add_utf8(&renamed);
            let renamed = Symbol::NameAndType { name, descriptor };
            if pinned.contains(&index) {
                split.insert(index, symbols.push(renamed));
            } else {
                symbols.replace(index, renamed).map_err(fail)?;
            }
        }

        // Member references on the reference type
        for (index, kind, name_and_type, name) in redirected {
            let owner = if name.contains(separator) {
                self.names.mirror()
            } else {
                self.names.target()
            };
            let class_index = symbols.add_class(owner);
            let name_and_type = split.get(&name_and_type).copied().unwrap_or(name_and_type);
            trace!(class = %base, member = %name, owner, "redirected member reference");
            symbols
                .replace(index, member_symbol(kind, class_index, name_and_type))
                .map_err(fail)?;
        }
        for (index, kind, owner, name_and_type) in elsewhere {
            if let Some(&renamed) = split.get(&name_and_type) {
                symbols
                    .replace(index, member_symbol(kind, owner, renamed))
                    .map_err(fail)?;
            }
        }

        // Class operands: the reference type is repointed per use, nested
        // types of the reference are renamed in place
        let mut replacements: FxHashMap<u32, u32> = FxHashMap::default();
        let mut base_entries = FxHashSet::default();
        for (index, name) in &class_entries {
            if *name == base {
                base_entries.insert(*index);
            }
            if name == reference {
                replacements.insert(*index, symbols.add_class(self.names.target()));
            } else if let Some(mirror) = self.names.nested_mirror_name(name) {
                discovered.insert(name.clone());
                let utf8 = symbols.add_utf8(&mirror);
                symbols
                    .replace(*index, Symbol::Class { name: utf8 })
                    .map_err(fail)?;
            }
        }
        for (index, element, dims) in array_entries {
            if let Some(renamed) = self.rename(&base, &element, &mut discovered)? {
                replacements.insert(index, symbols.add_array_class(&renamed, dims));
            }
        }

        if top_level {
            class.this_class = class.symbols.add_class(self.names.mirror());
        }
        let this_class = class.this_class;

        // Decide which methods survive before their descriptors change
        let mut kept = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            let keep = !top_level || method.is_static() || {
                let (name, descriptor) = class.method_signature(method).map_err(fail)?;
                self.verify_method
                    .as_ref()
                    .map_or(false, |(n, d)| n == name && d == descriptor)
            };
            kept.push(keep);
        }
        let mut keep_flags = kept.into_iter();
        class
            .methods
            .retain(|_| keep_flags.next().unwrap_or(false));

        let symbols = &mut class.symbols;
        for method in &mut class.methods {
            let descriptor = symbols.utf8(method.descriptor).map_err(fail)?.to_string();
            if let Some(renamed) = self.rename(&base, &descriptor, &mut discovered)? {
                method.descriptor = symbols.add_utf8(&renamed);
            }

            for local in &mut method.local_variables {
                let descriptor = symbols.utf8(local.descriptor).map_err(fail)?.to_string();
                if let Some(renamed) = self.rename(&base, &descriptor, &mut discovered)? {
                    local.descriptor = symbols.add_utf8(&renamed);
                }
            }

            let instructions =
                decode_instructions(&method.code).map_err(|e| fail(ClassFileError::from(e)))?;
            for instruction in &instructions {
                let replacement = instruction
                    .symbol()
                    .and_then(|index| replacements.get(&index));
                if let Some(&replacement) = replacement {
                    patch_symbol(&mut method.code, instruction.offset, replacement)
                        .map_err(|e| fail(ClassFileError::from(e)))?;
                }
            }

            for frame in method.stack_frames.iter_mut().flatten() {
                for slot in frame.locals.iter_mut().chain(frame.stack.iter_mut()) {
                    if let VerificationType::Object(index) = slot {
                        if let Some(&replacement) = replacements.get(&*index) {
                            *index = replacement;
                        }
                    }
                }
            }
        }

        for field in &mut class.fields {
            let descriptor = symbols.utf8(field.descriptor).map_err(fail)?.to_string();
            if let Some(renamed) = self.rename(&base, &descriptor, &mut discovered)? {
                field.descriptor = symbols.add_utf8(&renamed);
            }
        }

        for entry in &mut class.inner_classes {
            if entry.outer.map_or(false, |outer| base_entries.contains(&outer)) {
                entry.outer = Some(this_class);
            }
        }

        let mirror = class.name().map_err(fail)?.to_string();
        debug!(
            base = %base,
            mirror = %mirror,
            methods_kept = class.methods.len(),
            nested = discovered.len(),
            "produced mirror class"
        );
        Ok((class.encode(), discovered))
    }
}

fn member_symbol(kind: MemberKind, class: u32, name_and_type: u32) -> Symbol {
    match kind {
        MemberKind::Field => Symbol::FieldRef {
            class,
            name_and_type,
        },
        MemberKind::Method => Symbol::MethodRef {
            class,
            name_and_type,
        },
    }
}

fn decode(name: &str, bytes: &[u8]) -> Result<BinaryClass, ConstructionError> {
    BinaryClass::decode(bytes).map_err(|e| malformed(name, e))
}

fn malformed(class: &str, source: ClassFileError) -> ConstructionError {
    ConstructionError::MalformedClass {
        class: class.to_string(),
        source,
    }
}
