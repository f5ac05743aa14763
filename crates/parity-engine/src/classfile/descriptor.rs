//! Type and method descriptors
//!
//! Descriptors use the JVM notation: `I` (int), `Z` (boolean), `V` (void),
//! `LName;` for a class type and a leading `[` per array dimension. Method
//! descriptors are `(params)return`. Internal class names use `/` between
//! package segments and `$` before a nested type's simple name.

use std::fmt;
use thiserror::Error;

/// Descriptor parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Descriptor text is empty where a type was expected
    #[error("Empty descriptor")]
    Empty,

    /// Unrecognized type character
    #[error("Invalid descriptor `{descriptor}` at position {position}")]
    Invalid {
        /// The offending descriptor
        descriptor: String,
        /// Byte position of the problem
        position: usize,
    },

    /// Trailing characters after a complete descriptor
    #[error("Trailing characters in descriptor `{0}`")]
    Trailing(String),
}

/// Non-array part of a type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseType {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `V` (return types only)
    Void,
    /// `LName;` with the internal name
    Object(String),
}

/// A field type: base type plus array dimensionality
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    /// Element type
    pub base: BaseType,
    /// Number of array dimensions (0 for non-arrays)
    pub dims: u8,
}

impl TypeDescriptor {
    /// A class type with no array dimensions
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            base: BaseType::Object(name.into()),
            dims: 0,
        }
    }

    /// The `int` type
    pub fn int() -> Self {
        Self {
            base: BaseType::Int,
            dims: 0,
        }
    }

    /// The `void` return type
    pub fn void() -> Self {
        Self {
            base: BaseType::Void,
            dims: 0,
        }
    }

    /// Same base type with the given number of dimensions
    pub fn with_dims(mut self, dims: u8) -> Self {
        self.dims = dims;
        self
    }

    /// Parse a complete field descriptor
    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        let (ty, used) = Self::parse_prefix(text, 0)?;
        if used != text.len() {
            return Err(DescriptorError::Trailing(text.to_string()));
        }
        Ok(ty)
    }

    /// Parse one descriptor starting at `start`, returning it and the end position
    fn parse_prefix(text: &str, start: usize) -> Result<(Self, usize), DescriptorError> {
        let bytes = text.as_bytes();
        if start >= bytes.len() {
            return Err(if text.is_empty() {
                DescriptorError::Empty
            } else {
                DescriptorError::Invalid {
                    descriptor: text.to_string(),
                    position: start,
                }
            });
        }

        let mut pos = start;
        let mut dims: u8 = 0;
        while pos < bytes.len() && bytes[pos] == b'[' {
            dims = dims.checked_add(1).ok_or_else(|| DescriptorError::Invalid {
                descriptor: text.to_string(),
                position: pos,
            })?;
            pos += 1;
        }

        let invalid = |position| DescriptorError::Invalid {
            descriptor: text.to_string(),
            position,
        };

        let base = match bytes.get(pos) {
            Some(b'Z') => BaseType::Boolean,
            Some(b'B') => BaseType::Byte,
            Some(b'C') => BaseType::Char,
            Some(b'S') => BaseType::Short,
            Some(b'I') => BaseType::Int,
            Some(b'J') => BaseType::Long,
            Some(b'F') => BaseType::Float,
            Some(b'D') => BaseType::Double,
            Some(b'V') if dims == 0 => BaseType::Void,
            Some(b'L') => {
                let end = text[pos..].find(';').map(|i| pos + i).ok_or(invalid(pos))?;
                let name = &text[pos + 1..end];
                if name.is_empty() {
                    return Err(invalid(pos));
                }
                return Ok((
                    Self {
                        base: BaseType::Object(name.to_string()),
                        dims,
                    },
                    end + 1,
                ));
            }
            _ => return Err(invalid(pos)),
        };
        Ok((Self { base, dims }, pos + 1))
    }

    /// Internal class name of the element type, if it is a class type
    pub fn object_name(&self) -> Option<&str> {
        match &self.base {
            BaseType::Object(name) => Some(name),
            _ => None,
        }
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        self.dims > 0
    }

    /// Whether this denotes a reference (class or array) value
    pub fn is_reference(&self) -> bool {
        self.dims > 0 || matches!(self.base, BaseType::Object(_))
    }

    /// Descriptor of the element type, without array dimensions
    pub fn element_descriptor(&self) -> String {
        Self {
            base: self.base.clone(),
            dims: 0,
        }
        .to_string()
    }

    /// Apply a class-name mapping to the element type
    pub fn rename(&self, map: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let name = self.object_name()?;
        map(name).map(|renamed| Self {
            base: BaseType::Object(renamed),
            dims: self.dims,
        })
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.dims {
            f.write_str("[")?;
        }
        match &self.base {
            BaseType::Boolean => f.write_str("Z"),
            BaseType::Byte => f.write_str("B"),
            BaseType::Char => f.write_str("C"),
            BaseType::Short => f.write_str("S"),
            BaseType::Int => f.write_str("I"),
            BaseType::Long => f.write_str("J"),
            BaseType::Float => f.write_str("F"),
            BaseType::Double => f.write_str("D"),
            BaseType::Void => f.write_str("V"),
            BaseType::Object(name) => write!(f, "L{};", name),
        }
    }
}

/// A method signature: parameter types and return type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Parameter types in order
    pub params: Vec<TypeDescriptor>,
    /// Return type (`V` for none)
    pub ret: TypeDescriptor,
}

impl MethodDescriptor {
    /// Parse `(params)return`
    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        if text.is_empty() {
            return Err(DescriptorError::Empty);
        }
        if !text.starts_with('(') {
            return Err(DescriptorError::Invalid {
                descriptor: text.to_string(),
                position: 0,
            });
        }
        let mut pos = 1;
        let mut params = Vec::new();
        while text.as_bytes().get(pos) != Some(&b')') {
            let (param, next) = TypeDescriptor::parse_prefix(text, pos)?;
            if param.base == BaseType::Void {
                return Err(DescriptorError::Invalid {
                    descriptor: text.to_string(),
                    position: pos,
                });
            }
            params.push(param);
            pos = next;
        }
        let ret = TypeDescriptor::parse(&text[pos + 1..]).map_err(|_| DescriptorError::Invalid {
            descriptor: text.to_string(),
            position: pos + 1,
        })?;
        Ok(Self { params, ret })
    }

    /// Whether the method returns a value
    pub fn returns_value(&self) -> bool {
        self.ret.base != BaseType::Void
    }

    /// Apply a class-name mapping to every parameter and the return type
    pub fn rename(&self, map: impl Fn(&str) -> Option<String>) -> Self {
        let fix = |ty: &TypeDescriptor| ty.rename(&map).unwrap_or_else(|| ty.clone());
        Self {
            params: self.params.iter().map(fix).collect(),
            ret: fix(&self.ret),
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            write!(f, "{}", param)?;
        }
        write!(f, "){}", self.ret)
    }
}

/// Descriptor text of either kind (field or method)
pub fn validate_descriptor(text: &str) -> Result<(), DescriptorError> {
    if text.starts_with('(') {
        MethodDescriptor::parse(text).map(|_| ())
    } else {
        TypeDescriptor::parse(text).map(|_| ())
    }
}

/// Simple name of a class: the part after the last `/` and `$`
pub fn simple_name(internal_name: &str, separator: char) -> &str {
    let after_package = internal_name.rsplit('/').next().unwrap_or(internal_name);
    after_package.rsplit(separator).next().unwrap_or(after_package)
}
