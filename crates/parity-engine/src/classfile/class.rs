//! Binary class format

use super::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use super::symbols::SymbolTable;
use thiserror::Error;

/// Magic number for binary class files: "PRTY"
pub const MAGIC: [u8; 4] = *b"PRTY";

/// Current format version
pub const VERSION: u32 = 1;

/// Header size: magic + version + access + crc32 + sha256
const HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 32;

/// Class-file encoding/decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFileError {
    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected PRTY, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Stored CRC32
        expected: u32,
        /// Calculated CRC32
        actual: u32,
    },

    /// Symbol index out of range
    #[error("Symbol index {0} out of range")]
    BadSymbolIndex(u32),

    /// Symbol has the wrong kind
    #[error("Symbol {index} is {found}, expected {expected}")]
    WrongSymbolKind {
        /// Index of the symbol
        index: u32,
        /// Expected kind
        expected: &'static str,
        /// Actual kind
        found: &'static str,
    },
}

/// Access flags for classes, fields and methods
pub mod access {
    /// Visible everywhere
    pub const PUBLIC: u16 = 0x0001;
    /// Visible only inside the declaring class
    pub const PRIVATE: u16 = 0x0002;
    /// Visible to subclasses and the package
    pub const PROTECTED: u16 = 0x0004;
    /// Class-level member
    pub const STATIC: u16 = 0x0008;
    /// Cannot be overridden / reassigned
    pub const FINAL: u16 = 0x0010;
    /// Interface type
    pub const INTERFACE: u16 = 0x0200;
    /// No body
    pub const ABSTRACT: u16 = 0x0400;
    /// Compiler-generated
    pub const SYNTHETIC: u16 = 0x1000;
}

/// Field declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Access flags
    pub access: u16,
    /// Utf8 index of the name
    pub name: u32,
    /// Utf8 index of the descriptor
    pub descriptor: u32,
    /// Utf8 indices of the annotation type names
    pub annotations: Vec<u32>,
}

/// One row of a method's local-variable type table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// First code offset where the variable is live
    pub start: u32,
    /// Length of the live range in bytes
    pub length: u32,
    /// Utf8 index of the variable name
    pub name: u32,
    /// Utf8 index of the variable's descriptor
    pub descriptor: u32,
    /// Local slot
    pub slot: u16,
}

/// Verification type of one stack-frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType {
    /// Unusable slot
    Top,
    /// Integer-like value
    Integer,
    /// The null reference
    Null,
    /// Reference to an instance of a Class/ArrayClass symbol
    Object(u32),
    /// Result of `New` at a code offset, before its constructor ran
    Uninitialized(u32),
}

/// Stack-frame type metadata at a code offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Code offset the frame describes
    pub offset: u32,
    /// Types of the locals
    pub locals: Vec<VerificationType>,
    /// Types of the operand stack, bottom first
    pub stack: Vec<VerificationType>,
}

/// Method declaration and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Access flags
    pub access: u16,
    /// Utf8 index of the name
    pub name: u32,
    /// Utf8 index of the descriptor
    pub descriptor: u32,
    /// Utf8 indices of the annotation type names
    pub annotations: Vec<u32>,
    /// Number of local slots (parameters included)
    pub max_locals: u16,
    /// Instruction bytes (empty for abstract methods)
    pub code: Vec<u8>,
    /// Local-variable type table
    pub local_variables: Vec<LocalVariable>,
    /// Optional stack-frame type metadata
    pub stack_frames: Option<Vec<StackFrame>>,
}

impl MethodInfo {
    /// Whether the method is static
    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }
}

/// Inner-class relationship row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    /// Class index of the nested type
    pub inner: u32,
    /// Class index of the enclosing type, if it is a member type
    pub outer: Option<u32>,
    /// Utf8 index of the simple name, if not anonymous
    pub simple_name: Option<u32>,
    /// Access flags of the nested type
    pub access: u16,
}

/// A decoded binary class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryClass {
    /// Format version
    pub version: u32,
    /// Class access flags
    pub access: u16,
    /// Symbol table
    pub symbols: SymbolTable,
    /// Class index naming this class
    pub this_class: u32,
    /// Class index naming the superclass
    pub super_class: Option<u32>,
    /// Declared fields
    pub fields: Vec<FieldInfo>,
    /// Declared methods
    pub methods: Vec<MethodInfo>,
    /// Inner-class relationship table
    pub inner_classes: Vec<InnerClassEntry>,
}

impl BinaryClass {
    /// Internal name of this class
    pub fn name(&self) -> Result<&str, ClassFileError> {
        self.symbols.class_name(self.this_class)
    }

    /// Internal name of the superclass
    pub fn super_name(&self) -> Result<Option<&str>, ClassFileError> {
        self.super_class
            .map(|index| self.symbols.class_name(index))
            .transpose()
    }

    /// Name and descriptor of a method
    pub fn method_signature(&self, method: &MethodInfo) -> Result<(&str, &str), ClassFileError> {
        Ok((
            self.symbols.utf8(method.name)?,
            self.symbols.utf8(method.descriptor)?,
        ))
    }

    /// Name and descriptor of a field
    pub fn field_signature(&self, field: &FieldInfo) -> Result<(&str, &str), ClassFileError> {
        Ok((
            self.symbols.utf8(field.name)?,
            self.symbols.utf8(field.descriptor)?,
        ))
    }

    /// Encode to binary format
    ///
    /// Format:
    /// - Header: magic (4 bytes) + version (u32) + access (u32) + crc32 (u32) + sha256 (32 bytes)
    /// - Symbol table
    /// - this_class (u32), super_class (u32, `u32::MAX` for none)
    /// - Field table
    /// - Method table
    /// - Inner-class table
    pub fn encode(&self) -> Vec<u8> {
        use sha2::{Digest, Sha256};

        let mut writer = BytecodeWriter::new();
        writer.emit_bytes(&MAGIC);
        writer.emit_u32(self.version);
        writer.emit_u32(self.access as u32);
        let crc32_offset = writer.offset();
        writer.emit_u32(0); // Placeholder for CRC32
        let sha256_offset = writer.offset();
        writer.emit_bytes(&[0u8; 32]); // Placeholder for SHA-256

        self.symbols.encode(&mut writer);
        writer.emit_u32(self.this_class);
        writer.emit_u32(self.super_class.unwrap_or(u32::MAX));

        writer.emit_u32(self.fields.len() as u32);
        for field in &self.fields {
            writer.emit_u16(field.access);
            writer.emit_u32(field.name);
            writer.emit_u32(field.descriptor);
            encode_indices(&mut writer, &field.annotations);
        }

        writer.emit_u32(self.methods.len() as u32);
        for method in &self.methods {
            encode_method(&mut writer, method);
        }

        writer.emit_u32(self.inner_classes.len() as u32);
        for entry in &self.inner_classes {
            writer.emit_u32(entry.inner);
            writer.emit_u32(entry.outer.unwrap_or(u32::MAX));
            writer.emit_u32(entry.simple_name.unwrap_or(u32::MAX));
            writer.emit_u16(entry.access);
        }

        let payload = &writer.buffer[HEADER_SIZE..];
        let crc32 = crc32fast::hash(payload);
        let sha256: [u8; 32] = Sha256::digest(payload).into();
        writer.patch_u32(crc32_offset, crc32);
        writer.buffer[sha256_offset..sha256_offset + 32].copy_from_slice(&sha256);

        writer.into_bytes()
    }

    /// Decode from binary format
    pub fn decode(data: &[u8]) -> Result<Self, ClassFileError> {
        use sha2::{Digest, Sha256};

        let mut reader = BytecodeReader::new(data);

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&reader.read_bytes(4)?);
        if magic != MAGIC {
            return Err(ClassFileError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ClassFileError::UnsupportedVersion(version));
        }
        let access = reader.read_u32()? as u16;
        let stored_crc32 = reader.read_u32()?;
        let stored_sha256 = reader.read_bytes(32)?;

        let payload = &data[HEADER_SIZE..];
        let calculated_crc32 = crc32fast::hash(payload);
        if stored_crc32 != calculated_crc32 || Sha256::digest(payload).as_slice() != stored_sha256 {
            return Err(ClassFileError::ChecksumMismatch {
                expected: stored_crc32,
                actual: calculated_crc32,
            });
        }

        let symbols = SymbolTable::decode(&mut reader)?;
        let this_class = reader.read_u32()?;
        let super_class = optional_index(reader.read_u32()?);

        let field_count = reader.read_u32()? as usize;
        let mut fields = Vec::with_capacity(field_count.min(reader.remaining()));
        for _ in 0..field_count {
            fields.push(FieldInfo {
                access: reader.read_u16()?,
                name: reader.read_u32()?,
                descriptor: reader.read_u32()?,
                annotations: decode_indices(&mut reader)?,
            });
        }

        let method_count = reader.read_u32()? as usize;
        let mut methods = Vec::with_capacity(method_count.min(reader.remaining()));
        for _ in 0..method_count {
            methods.push(decode_method(&mut reader)?);
        }

        let inner_count = reader.read_u32()? as usize;
        let mut inner_classes = Vec::with_capacity(inner_count.min(reader.remaining()));
        for _ in 0..inner_count {
            inner_classes.push(InnerClassEntry {
                inner: reader.read_u32()?,
                outer: optional_index(reader.read_u32()?),
                simple_name: optional_index(reader.read_u32()?),
                access: reader.read_u16()?,
            });
        }

        Ok(Self {
            version,
            access,
            symbols,
            this_class,
            super_class,
            fields,
            methods,
            inner_classes,
        })
    }
}

fn optional_index(raw: u32) -> Option<u32> {
    (raw != u32::MAX).then_some(raw)
}

fn encode_indices(writer: &mut BytecodeWriter, indices: &[u32]) {
    writer.emit_u32(indices.len() as u32);
    for &index in indices {
        writer.emit_u32(index);
    }
}

fn decode_indices(reader: &mut BytecodeReader<'_>) -> Result<Vec<u32>, DecodeError> {
    let count = reader.read_u32()? as usize;
    let mut indices = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        indices.push(reader.read_u32()?);
    }
    Ok(indices)
}

const VT_TOP: u8 = 0;
const VT_INTEGER: u8 = 1;
const VT_NULL: u8 = 5;
const VT_OBJECT: u8 = 7;
const VT_UNINITIALIZED: u8 = 8;

fn encode_verification_types(writer: &mut BytecodeWriter, types: &[VerificationType]) {
    writer.emit_u32(types.len() as u32);
    for ty in types {
        match *ty {
            VerificationType::Top => writer.emit_u8(VT_TOP),
            VerificationType::Integer => writer.emit_u8(VT_INTEGER),
            VerificationType::Null => writer.emit_u8(VT_NULL),
            VerificationType::Object(index) => {
                writer.emit_u8(VT_OBJECT);
                writer.emit_u32(index);
            }
            VerificationType::Uninitialized(offset) => {
                writer.emit_u8(VT_UNINITIALIZED);
                writer.emit_u32(offset);
            }
        }
    }
}

fn decode_verification_types(
    reader: &mut BytecodeReader<'_>,
) -> Result<Vec<VerificationType>, DecodeError> {
    let count = reader.read_u32()? as usize;
    let mut types = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        let offset = reader.position();
        let ty = match reader.read_u8()? {
            VT_TOP => VerificationType::Top,
            VT_INTEGER => VerificationType::Integer,
            VT_NULL => VerificationType::Null,
            VT_OBJECT => VerificationType::Object(reader.read_u32()?),
            VT_UNINITIALIZED => VerificationType::Uninitialized(reader.read_u32()?),
            tag => {
                return Err(DecodeError::UnknownTag {
                    kind: "verification type",
                    tag,
                    offset,
                })
            }
        };
        types.push(ty);
    }
    Ok(types)
}

fn encode_method(writer: &mut BytecodeWriter, method: &MethodInfo) {
    writer.emit_u16(method.access);
    writer.emit_u32(method.name);
    writer.emit_u32(method.descriptor);
    encode_indices(writer, &method.annotations);
    writer.emit_u16(method.max_locals);

    writer.emit_u32(method.code.len() as u32);
    writer.emit_bytes(&method.code);

    writer.emit_u32(method.local_variables.len() as u32);
    for local in &method.local_variables {
        writer.emit_u32(local.start);
        writer.emit_u32(local.length);
        writer.emit_u32(local.name);
        writer.emit_u32(local.descriptor);
        writer.emit_u16(local.slot);
    }

    match &method.stack_frames {
        Some(frames) => {
            writer.emit_u8(1);
            writer.emit_u32(frames.len() as u32);
            for frame in frames {
                writer.emit_u32(frame.offset);
                encode_verification_types(writer, &frame.locals);
                encode_verification_types(writer, &frame.stack);
            }
        }
        None => writer.emit_u8(0),
    }
}

fn decode_method(reader: &mut BytecodeReader<'_>) -> Result<MethodInfo, DecodeError> {
    let access = reader.read_u16()?;
    let name = reader.read_u32()?;
    let descriptor = reader.read_u32()?;
    let annotations = decode_indices(reader)?;
    let max_locals = reader.read_u16()?;

    let code_len = reader.read_u32()? as usize;
    let code = reader.read_bytes(code_len)?;

    let local_count = reader.read_u32()? as usize;
    let mut local_variables = Vec::with_capacity(local_count.min(reader.remaining()));
    for _ in 0..local_count {
        local_variables.push(LocalVariable {
            start: reader.read_u32()?,
            length: reader.read_u32()?,
            name: reader.read_u32()?,
            descriptor: reader.read_u32()?,
            slot: reader.read_u16()?,
        });
    }

    let stack_frames = match reader.read_u8()? {
        0 => None,
        _ => {
            let frame_count = reader.read_u32()? as usize;
            let mut frames = Vec::with_capacity(frame_count.min(reader.remaining()));
            for _ in 0..frame_count {
                frames.push(StackFrame {
                    offset: reader.read_u32()?,
                    locals: decode_verification_types(reader)?,
                    stack: decode_verification_types(reader)?,
                });
            }
            Some(frames)
        }
    };

    Ok(MethodInfo {
        access,
        name,
        descriptor,
        annotations,
        max_locals,
        code,
        local_variables,
        stack_frames,
    })
}
