//! Binary class format
//!
//! This module provides the in-memory class model, its checksummed binary
//! codec, the instruction set, type descriptors and the structural verifier
//! the class loader runs before defining a class.

pub mod builder;
pub mod class;
pub mod code;
pub mod descriptor;
pub mod encoder;
pub mod opcode;
pub mod symbols;
pub mod verify;

pub use builder::{ClassBuilder, CodeBuilder, Label};
pub use class::{
    access, BinaryClass, ClassFileError, FieldInfo, InnerClassEntry, LocalVariable, MethodInfo,
    StackFrame, VerificationType,
};
pub use code::{decode_instructions, patch_symbol, Instruction};
pub use descriptor::{BaseType, DescriptorError, MethodDescriptor, TypeDescriptor};
pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use opcode::Opcode;
pub use symbols::{ClassSymbol, MemberKind, MemberRef, Symbol, SymbolTable};
pub use verify::{verify_class, VerifyError};
