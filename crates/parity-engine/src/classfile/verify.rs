//! Structural verification of binary classes
//!
//! Run by the class loader before a class is defined. Rewritten classes go
//! through the same checks as any other input.

use super::class::{BinaryClass, ClassFileError, MethodInfo, VerificationType};
use super::code::{decode_instructions, Instruction};
use super::descriptor::{validate_descriptor, MethodDescriptor, TypeDescriptor};
use super::opcode::Opcode;
use super::symbols::Symbol;
use rustc_hash::FxHashMap;
use std::collections::HashSet;

const MAX_STACK_DEPTH: i32 = 1024;

/// Class verification errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// Invalid opcode
    #[error("Invalid opcode {opcode:#x} at offset {offset}")]
    InvalidOpcode {
        /// The invalid opcode byte
        opcode: u8,
        /// Offset in bytecode
        offset: usize,
    },

    /// Stack underflow
    #[error("Stack underflow at offset {0}")]
    StackUnderflow(usize),

    /// Stack overflow
    #[error("Stack overflow at offset {0} (depth: {1})")]
    StackOverflow(usize, i32),

    /// Invalid jump target
    #[error("Invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget {
        /// The invalid jump target
        target: usize,
        /// Offset of the jump
        offset: usize,
    },

    /// Symbol index that is missing or of the wrong kind
    #[error("Invalid symbol reference {index} at offset {offset}: expected {expected}")]
    InvalidSymbolRef {
        /// The offending index
        index: u32,
        /// Offset in bytecode
        offset: usize,
        /// Kinds allowed here
        expected: &'static str,
    },

    /// Invalid local variable reference
    #[error("Invalid local variable reference: index {index} (max {max}) at offset {offset}")]
    InvalidLocalRef {
        /// The invalid local slot
        index: usize,
        /// Number of local slots
        max: usize,
        /// Offset in bytecode
        offset: usize,
    },

    /// Execution falls off end
    #[error("Execution falls off end of method at offset {0}")]
    FallOffEnd(usize),

    /// Malformed type or method descriptor
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Class-level structure problem (header, fields, tables)
    #[error("Class structure error: {0}")]
    ClassStructure(String),

    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Error inside a specific method
    #[error("In method {method}: {source}")]
    Method {
        /// `name descriptor` of the method
        method: String,
        /// What went wrong
        #[source]
        source: Box<VerifyError>,
    },
}

impl From<ClassFileError> for VerifyError {
    fn from(err: ClassFileError) -> Self {
        VerifyError::ClassStructure(err.to_string())
    }
}

/// Verify a class before it is defined
pub fn verify_class(class: &BinaryClass) -> Result<(), VerifyError> {
    class.name()?;
    class.super_name()?;

    for field in &class.fields {
        let (_, descriptor) = class.field_signature(field)?;
        TypeDescriptor::parse(descriptor)
            .map_err(|e| VerifyError::InvalidDescriptor(e.to_string()))?;
        for &tag in &field.annotations {
            class.symbols.utf8(tag)?;
        }
    }

    for entry in &class.inner_classes {
        class.symbols.class_name(entry.inner)?;
        if let Some(outer) = entry.outer {
            class.symbols.class_name(outer)?;
        }
        if let Some(simple_name) = entry.simple_name {
            class.symbols.utf8(simple_name)?;
        }
    }

    for method in &class.methods {
        let (name, descriptor) = class.method_signature(method)?;
        verify_method(method, class).map_err(|source| VerifyError::Method {
            method: format!("{}{}", name, descriptor),
            source: Box::new(source),
        })?;
    }

    Ok(())
}

fn verify_method(method: &MethodInfo, class: &BinaryClass) -> Result<(), VerifyError> {
    let (_, descriptor) = class.method_signature(method)?;
    MethodDescriptor::parse(descriptor)
        .map_err(|e| VerifyError::InvalidDescriptor(e.to_string()))?;
    for &tag in &method.annotations {
        class.symbols.utf8(tag)?;
    }

    for local in &method.local_variables {
        class.symbols.utf8(local.name)?;
        let descriptor = class.symbols.utf8(local.descriptor)?;
        TypeDescriptor::parse(descriptor)
            .map_err(|e| VerifyError::InvalidDescriptor(e.to_string()))?;
        if local.slot >= method.max_locals {
            return Err(VerifyError::InvalidLocalRef {
                index: local.slot as usize,
                max: method.max_locals as usize,
                offset: local.start as usize,
            });
        }
    }

    for frame in method.stack_frames.iter().flatten() {
        for ty in frame.locals.iter().chain(&frame.stack) {
            if let VerificationType::Object(index) = *ty {
                class
                    .symbols
                    .class_symbol(index)
                    .map_err(|_| VerifyError::InvalidSymbolRef {
                        index,
                        offset: frame.offset as usize,
                        expected: "Class or ArrayClass",
                    })?;
            }
        }
    }

    // Abstract and intercepted methods have no body
    if method.code.is_empty() {
        return Ok(());
    }

    let instructions = decode_instructions(&method.code).map_err(|e| match e {
        super::encoder::DecodeError::InvalidOpcode(opcode, offset) => {
            VerifyError::InvalidOpcode { opcode, offset }
        }
        other => VerifyError::DecodeError(other.to_string()),
    })?;
    let boundaries: HashSet<usize> = instructions.iter().map(|i| i.offset).collect();

    for instr in &instructions {
        if let Some(target) = instr.jump_target() {
            if !boundaries.contains(&target) {
                return Err(VerifyError::InvalidJumpTarget {
                    target,
                    offset: instr.offset,
                });
            }
        } else if instr.opcode.is_jump() {
            return Err(VerifyError::InvalidJumpTarget {
                target: 0,
                offset: instr.offset,
            });
        }
    }

    verify_symbol_refs(&instructions, class)?;
    verify_local_refs(&instructions, method)?;
    verify_stack_depth(&instructions, class)?;

    if let Some(last) = instructions.last() {
        if !last.opcode.is_terminator() {
            return Err(VerifyError::FallOffEnd(last.offset));
        }
    }

    Ok(())
}

/// Check that every symbol operand resolves to an entry of the right kind
fn verify_symbol_refs(
    instructions: &[Instruction],
    class: &BinaryClass,
) -> Result<(), VerifyError> {
    for instr in instructions {
        let Some(index) = instr.symbol() else {
            continue;
        };
        let symbol = class.symbols.get(index);
        let expected = match instr.opcode {
            Opcode::Ldc => "Integer or String",
            Opcode::InvokeVirtual | Opcode::InvokeStatic | Opcode::InvokeSpecial => "MethodRef",
            Opcode::InvokeDynamic => "NameAndType",
            op if op.is_field_access() => "FieldRef",
            Opcode::New => "Class",
            Opcode::MultiNewArray => "ArrayClass",
            _ => "Class or ArrayClass",
        };
        let kind_ok = match (instr.opcode, symbol) {
            (Opcode::Ldc, Some(Symbol::Integer(_) | Symbol::String { .. })) => true,
            (op, Some(Symbol::MethodRef { .. })) if op.is_invoke() => true,
            (Opcode::InvokeDynamic, Some(Symbol::NameAndType { .. })) => true,
            (op, Some(Symbol::FieldRef { .. })) if op.is_field_access() => true,
            (Opcode::New, Some(Symbol::Class { .. })) => true,
            (Opcode::MultiNewArray, Some(Symbol::ArrayClass { dims, .. })) => {
                instr.dims().is_some_and(|wanted| wanted >= 1 && wanted <= *dims)
            }
            (
                Opcode::CheckCast | Opcode::InstanceOf | Opcode::NewArray,
                Some(Symbol::Class { .. } | Symbol::ArrayClass { .. }),
            ) => true,
            _ => false,
        };
        let invalid = || VerifyError::InvalidSymbolRef {
            index,
            offset: instr.offset,
            expected,
        };
        if !kind_ok {
            return Err(invalid());
        }

        // Nested entries must resolve too
        match symbol {
            Some(Symbol::FieldRef { .. }) => {
                let member = class.symbols.member_ref(index).map_err(|_| invalid())?;
                TypeDescriptor::parse(member.descriptor)
                    .map_err(|e| VerifyError::InvalidDescriptor(e.to_string()))?;
            }
            Some(Symbol::MethodRef { .. }) => {
                let member = class.symbols.member_ref(index).map_err(|_| invalid())?;
                MethodDescriptor::parse(member.descriptor)
                    .map_err(|e| VerifyError::InvalidDescriptor(e.to_string()))?;
            }
            Some(Symbol::NameAndType { .. }) => {
                let (_, descriptor) = class.symbols.name_and_type(index).map_err(|_| invalid())?;
                validate_descriptor(descriptor)
                    .map_err(|e| VerifyError::InvalidDescriptor(e.to_string()))?;
            }
            Some(Symbol::ArrayClass { .. }) => {
                if let Ok(super::symbols::ClassSymbol::Array { element, .. }) =
                    class.symbols.class_symbol(index)
                {
                    TypeDescriptor::parse(element)
                        .map_err(|e| VerifyError::InvalidDescriptor(e.to_string()))?;
                } else {
                    return Err(invalid());
                }
            }
            Some(Symbol::Class { .. }) => {
                class.symbols.class_name(index).map_err(|_| invalid())?;
            }
            Some(Symbol::String { utf8 }) => {
                class.symbols.utf8(*utf8).map_err(|_| invalid())?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Verify local variable references
fn verify_local_refs(instructions: &[Instruction], method: &MethodInfo) -> Result<(), VerifyError> {
    let max = method.max_locals as usize;
    for instr in instructions {
        if let Some(slot) = instr.local() {
            if slot as usize >= max {
                return Err(VerifyError::InvalidLocalRef {
                    index: slot as usize,
                    max,
                    offset: instr.offset,
                });
            }
        }
    }
    Ok(())
}

/// Stack effect (pops, pushes) of an instruction
fn stack_effect(instr: &Instruction, class: &BinaryClass) -> Result<(i32, i32), VerifyError> {
    let effect = match instr.opcode {
        Opcode::Nop | Opcode::Jmp | Opcode::ReturnVoid => (0, 0),
        Opcode::Pop | Opcode::StoreLocal | Opcode::JmpIfFalse | Opcode::JmpIfTrue => (1, 0),
        Opcode::Return | Opcode::Throw | Opcode::PutStatic => (1, 0),
        Opcode::Dup => (1, 2),
        Opcode::Swap => (2, 2),
        Opcode::ConstNull | Opcode::ConstI32 | Opcode::Ldc | Opcode::LoadLocal => (0, 1),
        Opcode::New | Opcode::GetStatic => (0, 1),
        Opcode::Iadd
        | Opcode::Isub
        | Opcode::Imul
        | Opcode::Idiv
        | Opcode::Irem
        | Opcode::Ieq
        | Opcode::Ilt
        | Opcode::Igt
        | Opcode::LoadElem => (2, 1),
        Opcode::Ineg
        | Opcode::GetField
        | Opcode::CheckCast
        | Opcode::InstanceOf
        | Opcode::NewArray
        | Opcode::ArrayLen => (1, 1),
        Opcode::PutField => (2, 0),
        Opcode::StoreElem => (3, 0),
        Opcode::MultiNewArray => (instr.dims().unwrap_or(0) as i32, 1),
        Opcode::InvokeVirtual
        | Opcode::InvokeStatic
        | Opcode::InvokeSpecial
        | Opcode::InvokeDynamic => {
            let index = instr.symbol().unwrap_or(u32::MAX);
            let descriptor = if instr.opcode == Opcode::InvokeDynamic {
                class.symbols.name_and_type(index)?.1
            } else {
                class.symbols.member_ref(index)?.descriptor
            };
            let desc = MethodDescriptor::parse(descriptor)
                .map_err(|e| VerifyError::InvalidDescriptor(e.to_string()))?;
            let receiver = matches!(
                instr.opcode,
                Opcode::InvokeVirtual | Opcode::InvokeSpecial
            ) as i32;
            (
                desc.params.len() as i32 + receiver,
                desc.returns_value() as i32,
            )
        }
    };
    Ok(effect)
}

/// Straight-line stack depth walk
///
/// Forward jumps record the depth at their target; code after a terminator
/// resumes from the recorded depth, or zero when nothing jumps there.
fn verify_stack_depth(
    instructions: &[Instruction],
    class: &BinaryClass,
) -> Result<(), VerifyError> {
    let mut known: FxHashMap<usize, i32> = FxHashMap::default();
    let mut depth = 0i32;
    let mut reachable = true;

    for instr in instructions {
        if !reachable {
            depth = known.get(&instr.offset).copied().unwrap_or(0);
        }

        let (pops, pushes) = stack_effect(instr, class)?;
        if depth < pops {
            return Err(VerifyError::StackUnderflow(instr.offset));
        }
        depth = depth - pops + pushes;
        if depth > MAX_STACK_DEPTH {
            return Err(VerifyError::StackOverflow(instr.offset, depth));
        }

        if let Some(target) = instr.jump_target() {
            if target > instr.offset {
                known.entry(target).or_insert(depth);
            }
        }
        reachable = !instr.opcode.is_terminator();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::builder::ClassBuilder;
    use crate::classfile::class::access;

    #[test]
    fn test_valid_class_passes() {
        let mut builder = ClassBuilder::new("Counter");
        builder.field(access::PUBLIC, "value", "I");
        builder
            .method(access::PUBLIC, "bump", "()V")
            .load(0)
            .load(0)
            .get_field("Counter", "value", "I")
            .const_i32(1)
            .iadd()
            .put_field("Counter", "value", "I")
            .ret_void()
            .finish();
        let mut code = builder.method(access::PUBLIC | access::STATIC, "abs", "(I)I");
        let negative = code.new_label();
        code.load(0)
            .const_i32(0)
            .ilt()
            .jmp_if_true(negative)
            .load(0)
            .ret()
            .bind(negative)
            .load(0)
            .ineg()
            .ret()
            .finish();
        assert_eq!(verify_class(&builder.build()), Ok(()));
    }

    #[test]
    fn test_stack_underflow() {
        let mut builder = ClassBuilder::new("Bad");
        builder
            .method(access::STATIC, "f", "()I")
            .iadd()
            .ret()
            .finish();
        let err = verify_class(&builder.build()).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Method { ref source, .. } if **source == VerifyError::StackUnderflow(0)
        ));
    }

    #[test]
    fn test_falls_off_end() {
        let mut builder = ClassBuilder::new("Bad");
        builder.method(access::STATIC, "f", "()V").nop().finish();
        let err = verify_class(&builder.build()).unwrap_err();
        assert!(err.to_string().contains("falls off end"));
    }

    #[test]
    fn test_wrong_symbol_kind() {
        let mut builder = ClassBuilder::new("Bad");
        // GetStatic pointing at a Class entry instead of a FieldRef
        let mut code = builder.method(access::STATIC, "f", "()I");
        let class_index = code.symbols_mut().add_class("Bad");
        code.const_i32(0).pop();
        code.finish();
        let mut class = builder.build();
        let mut body = vec![Opcode::GetStatic.to_u8()];
        body.extend_from_slice(&class_index.to_le_bytes());
        body.push(Opcode::Return.to_u8());
        class.methods[0].code = body;

        let err = verify_class(&class).unwrap_err();
        assert!(err.to_string().contains("expected FieldRef"));
    }

    #[test]
    fn test_local_out_of_range() {
        let mut builder = ClassBuilder::new("Bad");
        builder
            .method(access::STATIC, "f", "()I")
            .load(0)
            .ret()
            .finish();
        let mut class = builder.build();
        class.methods[0].max_locals = 0;
        assert!(verify_class(&class)
            .unwrap_err()
            .to_string()
            .contains("Invalid local variable reference"));
    }
}
