//! Symbol table for binary classes
//!
//! An ordered, index-addressed table of the entries a class refers to.
//! Entries are only ever appended or replaced in place; nothing is removed
//! and no existing index is ever renumbered, so every index held by a method
//! body stays valid across a rewrite.

use super::class::ClassFileError;
use super::encoder::{BytecodeReader, BytecodeWriter, DecodeError};

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELD_REF: u8 = 9;
const TAG_METHOD_REF: u8 = 10;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_ARRAY_CLASS: u8 = 20;

/// One symbol-table entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// Raw text used by other entries
    Utf8(String),
    /// Integer literal
    Integer(i32),
    /// String literal (index of a Utf8)
    String {
        /// Utf8 index of the text
        utf8: u32,
    },
    /// Class reference (index of a Utf8 holding the internal name)
    Class {
        /// Utf8 index of the internal name
        name: u32,
    },
    /// Array class reference
    ArrayClass {
        /// Utf8 index of the element type's field descriptor
        element: u32,
        /// Number of array dimensions (at least 1)
        dims: u8,
    },
    /// Field reference
    FieldRef {
        /// Index of the owning Class
        class: u32,
        /// Index of the NameAndType
        name_and_type: u32,
    },
    /// Method reference
    MethodRef {
        /// Index of the owning Class
        class: u32,
        /// Index of the NameAndType
        name_and_type: u32,
    },
    /// Member name and descriptor
    NameAndType {
        /// Utf8 index of the member name
        name: u32,
        /// Utf8 index of the descriptor
        descriptor: u32,
    },
}

impl Symbol {
    /// Short kind name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Symbol::Utf8(_) => "Utf8",
            Symbol::Integer(_) => "Integer",
            Symbol::String { .. } => "String",
            Symbol::Class { .. } => "Class",
            Symbol::ArrayClass { .. } => "ArrayClass",
            Symbol::FieldRef { .. } => "FieldRef",
            Symbol::MethodRef { .. } => "MethodRef",
            Symbol::NameAndType { .. } => "NameAndType",
        }
    }

    /// Symbol indices this entry refers to
    pub fn references(&self) -> Vec<u32> {
        match *self {
            Symbol::Utf8(_) | Symbol::Integer(_) => Vec::new(),
            Symbol::String { utf8 } => vec![utf8],
            Symbol::Class { name } => vec![name],
            Symbol::ArrayClass { element, .. } => vec![element],
            Symbol::FieldRef {
                class,
                name_and_type,
            }
            | Symbol::MethodRef {
                class,
                name_and_type,
            } => vec![class, name_and_type],
            Symbol::NameAndType { name, descriptor } => vec![name, descriptor],
        }
    }
}

/// Whether a member reference names a field or a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// FieldRef
    Field,
    /// MethodRef
    Method,
}

/// A resolved FieldRef/MethodRef
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef<'a> {
    /// Field or method
    pub kind: MemberKind,
    /// Index of the owning Class entry
    pub class_index: u32,
    /// Internal name of the owning class
    pub class_name: &'a str,
    /// Member name
    pub name: &'a str,
    /// Member descriptor
    pub descriptor: &'a str,
}

/// The class a Class or ArrayClass symbol denotes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassSymbol<'a> {
    /// Plain class, by internal name
    Class(&'a str),
    /// Array class: element descriptor and dimensions
    Array {
        /// Field descriptor of the element type
        element: &'a str,
        /// Number of dimensions
        dims: u8,
    },
}

/// Ordered symbol table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Vec<Symbol>,
}

impl SymbolTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries with their indices
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Symbol)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, symbol)| (index as u32, symbol))
    }

    /// Get an entry by index
    pub fn get(&self, index: u32) -> Option<&Symbol> {
        self.entries.get(index as usize)
    }

    /// Append an entry unconditionally and return its index
    pub fn push(&mut self, symbol: Symbol) -> u32 {
        let index = self.entries.len() as u32;
        self.entries.push(symbol);
        index
    }

    /// Replace the entry at `index` in place
    pub fn replace(&mut self, index: u32, symbol: Symbol) -> Result<(), ClassFileError> {
        let slot = self
            .entries
            .get_mut(index as usize)
            .ok_or(ClassFileError::BadSymbolIndex(index))?;
        *slot = symbol;
        Ok(())
    }

    /// Index of an identical entry, appending one if none exists
    pub fn intern(&mut self, symbol: Symbol) -> u32 {
        match self.entries.iter().position(|existing| *existing == symbol) {
            Some(index) => index as u32,
            None => self.push(symbol),
        }
    }

    /// Intern a Utf8 entry
    pub fn add_utf8(&mut self, text: &str) -> u32 {
        match self
            .entries
            .iter()
            .position(|existing| matches!(existing, Symbol::Utf8(s) if s == text))
        {
            Some(index) => index as u32,
            None => self.push(Symbol::Utf8(text.to_string())),
        }
    }

    /// Intern an Integer entry
    pub fn add_integer(&mut self, value: i32) -> u32 {
        self.intern(Symbol::Integer(value))
    }

    /// Intern a String literal entry
    pub fn add_string(&mut self, text: &str) -> u32 {
        let utf8 = self.add_utf8(text);
        self.intern(Symbol::String { utf8 })
    }

    /// Intern a Class entry for an internal name
    pub fn add_class(&mut self, internal_name: &str) -> u32 {
        let name = self.add_utf8(internal_name);
        self.intern(Symbol::Class { name })
    }

    /// Intern an ArrayClass entry for an element descriptor and dimensions
    pub fn add_array_class(&mut self, element_descriptor: &str, dims: u8) -> u32 {
        let element = self.add_utf8(element_descriptor);
        self.intern(Symbol::ArrayClass { element, dims })
    }

    /// Intern a NameAndType entry
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> u32 {
        let name = self.add_utf8(name);
        let descriptor = self.add_utf8(descriptor);
        self.intern(Symbol::NameAndType { name, descriptor })
    }

    /// Intern a FieldRef entry
    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u32 {
        let class = self.add_class(class);
        let name_and_type = self.add_name_and_type(name, descriptor);
        self.intern(Symbol::FieldRef {
            class,
            name_and_type,
        })
    }

    /// Intern a MethodRef entry
    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u32 {
        let class = self.add_class(class);
        let name_and_type = self.add_name_and_type(name, descriptor);
        self.intern(Symbol::MethodRef {
            class,
            name_and_type,
        })
    }

    // ===== Typed lookups =====

    fn mismatch(&self, index: u32, expected: &'static str) -> ClassFileError {
        match self.get(index) {
            Some(found) => ClassFileError::WrongSymbolKind {
                index,
                expected,
                found: found.kind(),
            },
            None => ClassFileError::BadSymbolIndex(index),
        }
    }

    /// Text of a Utf8 entry
    pub fn utf8(&self, index: u32) -> Result<&str, ClassFileError> {
        match self.get(index) {
            Some(Symbol::Utf8(text)) => Ok(text),
            _ => Err(self.mismatch(index, "Utf8")),
        }
    }

    /// Internal name of a Class entry
    pub fn class_name(&self, index: u32) -> Result<&str, ClassFileError> {
        match self.get(index) {
            Some(Symbol::Class { name }) => self.utf8(*name),
            _ => Err(self.mismatch(index, "Class")),
        }
    }

    /// What a Class or ArrayClass entry denotes
    pub fn class_symbol(&self, index: u32) -> Result<ClassSymbol<'_>, ClassFileError> {
        match self.get(index) {
            Some(Symbol::Class { name }) => Ok(ClassSymbol::Class(self.utf8(*name)?)),
            Some(Symbol::ArrayClass { element, dims }) => Ok(ClassSymbol::Array {
                element: self.utf8(*element)?,
                dims: *dims,
            }),
            Some(other) => Err(ClassFileError::WrongSymbolKind {
                index,
                expected: "Class",
                found: other.kind(),
            }),
            None => Err(ClassFileError::BadSymbolIndex(index)),
        }
    }

    /// Name and descriptor of a NameAndType entry
    pub fn name_and_type(&self, index: u32) -> Result<(&str, &str), ClassFileError> {
        match self.get(index) {
            Some(Symbol::NameAndType { name, descriptor }) => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(self.mismatch(index, "NameAndType")),
        }
    }

    /// Resolve a FieldRef or MethodRef entry
    pub fn member_ref(&self, index: u32) -> Result<MemberRef<'_>, ClassFileError> {
        let (kind, class, name_and_type) = match self.get(index) {
            Some(Symbol::FieldRef {
                class,
                name_and_type,
            }) => (MemberKind::Field, *class, *name_and_type),
            Some(Symbol::MethodRef {
                class,
                name_and_type,
            }) => (MemberKind::Method, *class, *name_and_type),
            Some(other) => {
                return Err(ClassFileError::WrongSymbolKind {
                    index,
                    expected: "FieldRef or MethodRef",
                    found: other.kind(),
                })
            }
            None => return Err(ClassFileError::BadSymbolIndex(index)),
        };
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            kind,
            class_index: class,
            class_name: self.class_name(class)?,
            name,
            descriptor,
        })
    }

    // ===== Encoding =====

    /// Encode the table
    ///
    /// Format: entry count (u32), then per entry a tag byte and its payload.
    pub fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_u32(self.entries.len() as u32);
        for symbol in &self.entries {
            match symbol {
                Symbol::Utf8(text) => {
                    writer.emit_u8(TAG_UTF8);
                    writer.emit_string(text);
                }
                Symbol::Integer(value) => {
                    writer.emit_u8(TAG_INTEGER);
                    writer.emit_i32(*value);
                }
                Symbol::String { utf8 } => {
                    writer.emit_u8(TAG_STRING);
                    writer.emit_u32(*utf8);
                }
                Symbol::Class { name } => {
                    writer.emit_u8(TAG_CLASS);
                    writer.emit_u32(*name);
                }
                Symbol::ArrayClass { element, dims } => {
                    writer.emit_u8(TAG_ARRAY_CLASS);
                    writer.emit_u32(*element);
                    writer.emit_u8(*dims);
                }
                Symbol::FieldRef {
                    class,
                    name_and_type,
                } => {
                    writer.emit_u8(TAG_FIELD_REF);
                    writer.emit_u32(*class);
                    writer.emit_u32(*name_and_type);
                }
                Symbol::MethodRef {
                    class,
                    name_and_type,
                } => {
                    writer.emit_u8(TAG_METHOD_REF);
                    writer.emit_u32(*class);
                    writer.emit_u32(*name_and_type);
                }
                Symbol::NameAndType { name, descriptor } => {
                    writer.emit_u8(TAG_NAME_AND_TYPE);
                    writer.emit_u32(*name);
                    writer.emit_u32(*descriptor);
                }
            }
        }
    }

    /// Decode the table
    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u32()? as usize;
        let mut entries = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            let offset = reader.position();
            let symbol = match reader.read_u8()? {
                TAG_UTF8 => Symbol::Utf8(reader.read_string()?),
                TAG_INTEGER => Symbol::Integer(reader.read_i32()?),
                TAG_STRING => Symbol::String {
                    utf8: reader.read_u32()?,
                },
                TAG_CLASS => Symbol::Class {
                    name: reader.read_u32()?,
                },
                TAG_ARRAY_CLASS => Symbol::ArrayClass {
                    element: reader.read_u32()?,
                    dims: reader.read_u8()?,
                },
                TAG_FIELD_REF => Symbol::FieldRef {
                    class: reader.read_u32()?,
                    name_and_type: reader.read_u32()?,
                },
                TAG_METHOD_REF => Symbol::MethodRef {
                    class: reader.read_u32()?,
                    name_and_type: reader.read_u32()?,
                },
                TAG_NAME_AND_TYPE => Symbol::NameAndType {
                    name: reader.read_u32()?,
                    descriptor: reader.read_u32()?,
                },
                tag => {
                    return Err(DecodeError::UnknownTag {
                        kind: "symbol",
                        tag,
                        offset,
                    })
                }
            };
            entries.push(symbol);
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_reuses_entries() {
        let mut table = SymbolTable::new();
        let a = table.add_class("pkg/Widget");
        let b = table.add_class("pkg/Widget");
        assert_eq!(a, b);
        assert_eq!(table.len(), 2); // Utf8 + Class

        let field = table.add_field_ref("pkg/Widget", "count", "I");
        let member = table.member_ref(field).unwrap();
        assert_eq!(member.kind, MemberKind::Field);
        assert_eq!(member.class_name, "pkg/Widget");
        assert_eq!(member.name, "count");
        assert_eq!(member.descriptor, "I");
        assert_eq!(member.class_index, a);
    }

    #[test]
    fn test_push_never_renumbers() {
        let mut table = SymbolTable::new();
        let first = table.add_utf8("first");
        let class = table.add_class("Ref");
        let snapshot: Vec<Symbol> = table.iter().map(|(_, s)| s.clone()).collect();

        table.add_class("Sub");
        table.add_array_class("LSub;", 3);

        for (index, symbol) in snapshot.iter().enumerate() {
            assert_eq!(table.get(index as u32), Some(symbol));
        }
        assert_eq!(table.utf8(first).unwrap(), "first");
        assert_eq!(table.class_name(class).unwrap(), "Ref");
    }

    #[test]
    fn test_typed_lookup_errors() {
        let mut table = SymbolTable::new();
        let utf8 = table.add_utf8("x");
        assert!(matches!(
            table.class_name(utf8),
            Err(ClassFileError::WrongSymbolKind { expected: "Class", .. })
        ));
        assert!(matches!(
            table.utf8(99),
            Err(ClassFileError::BadSymbolIndex(99))
        ));
    }

    #[test]
    fn test_array_class_symbol() {
        let mut table = SymbolTable::new();
        let idx = table.add_array_class("LRef;", 2);
        assert_eq!(
            table.class_symbol(idx).unwrap(),
            ClassSymbol::Array {
                element: "LRef;",
                dims: 2
            }
        );
    }

    #[test]
    fn test_decode_unknown_tag() {
        let bytes = [1u8, 0, 0, 0, 0xEE];
        let mut reader = BytecodeReader::new(&bytes);
        assert!(matches!(
            SymbolTable::decode(&mut reader),
            Err(DecodeError::UnknownTag { tag: 0xEE, .. })
        ));
    }
}
