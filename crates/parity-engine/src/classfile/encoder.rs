//! Little-endian byte streams for the class codec
//!
//! Strings are a u32 byte length followed by UTF-8.

use super::opcode::Opcode;
use thiserror::Error;

/// Failure reading class-file bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Ran out of input
    #[error("Unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),

    /// String bytes are not UTF-8
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Byte is not an opcode
    #[error("Invalid opcode {0:#04x} at offset {1}")]
    InvalidOpcode(u8, usize),

    /// Unknown tag byte for a tagged structure
    #[error("Unknown {kind} tag {tag} at offset {offset}")]
    UnknownTag {
        /// What was being decoded
        kind: &'static str,
        /// The tag byte
        tag: u8,
        /// Offset of the tag
        offset: usize,
    },
}

/// Growable output for class files and method bodies
#[derive(Default)]
pub struct BytecodeWriter {
    pub(crate) buffer: Vec<u8>,
}

impl BytecodeWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Bytes written so far
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Append one byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Append a u16
    pub fn emit_u16(&mut self, value: u16) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a u32
    pub fn emit_u32(&mut self, value: u32) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append an i32
    pub fn emit_i32(&mut self, value: i32) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a length-prefixed string
    pub fn emit_string(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.emit_bytes(value.as_bytes());
    }

    /// Append raw bytes
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Append an opcode byte
    pub fn emit_opcode(&mut self, opcode: Opcode) {
        self.emit_u8(opcode.to_u8());
    }

    /// Placeholder for a jump offset filled in by [`Self::patch_i32`]
    pub fn reserve_i32(&mut self) -> usize {
        let at = self.offset();
        self.emit_i32(0);
        at
    }

    /// Overwrite four bytes at `at`
    pub fn patch_i32(&mut self, at: usize, value: i32) {
        self.buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Overwrite four bytes at `at`
    pub fn patch_u32(&mut self, at: usize, value: u32) {
        self.buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Cursor over class-file bytes
pub struct BytecodeReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Reader at the start of `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Offset of the next byte
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Whether any byte is left
    pub fn has_more(&self) -> bool {
        self.remaining() > 0
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        let bytes = &self.buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Read a u16
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.fixed().map(u16::from_le_bytes)
    }

    /// Read a u32
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.fixed().map(u32::from_le_bytes)
    }

    /// Read an i32
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.fixed().map(i32::from_le_bytes)
    }

    /// Read a length-prefixed string
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let start = self.position;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8(start))
    }

    /// Read `count` raw bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        Ok(self.take(count)?.to_vec())
    }

    /// Read an opcode byte
    pub fn read_opcode(&mut self) -> Result<Opcode, DecodeError> {
        let at = self.position;
        let byte = self.read_u8()?;
        Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut writer = BytecodeWriter::new();
        writer.emit_u8(0x42);
        writer.emit_u16(0x1234);
        writer.emit_u32(0xABCD_EF01);
        assert_eq!(
            writer.into_bytes(),
            [0x42, 0x34, 0x12, 0x01, 0xEF, 0xCD, 0xAB]
        );
    }

    #[test]
    fn test_truncated_string() {
        let mut writer = BytecodeWriter::new();
        writer.emit_u32(10);
        writer.emit_bytes(b"abc");
        let bytes = writer.into_bytes();

        let mut reader = BytecodeReader::new(&bytes);
        assert_eq!(reader.read_string(), Err(DecodeError::UnexpectedEnd(4)));
    }

    #[test]
    fn test_short_integer() {
        let mut reader = BytecodeReader::new(&[0x01, 0x02]);
        assert_eq!(reader.read_u32(), Err(DecodeError::UnexpectedEnd(0)));
        assert_eq!(reader.read_u16(), Ok(0x0201));
        assert!(!reader.has_more());
    }

    #[test]
    fn test_reserved_jump_is_patched() {
        let mut writer = BytecodeWriter::new();
        writer.emit_u8(0);
        let at = writer.reserve_i32();
        writer.patch_i32(at, -7);

        let mut reader = BytecodeReader::new(&writer.buffer);
        reader.read_u8().unwrap();
        assert_eq!(reader.read_i32().unwrap(), -7);
    }

    #[test]
    fn test_bad_opcode_offset() {
        let mut reader = BytecodeReader::new(&[0xFF]);
        assert_eq!(reader.read_opcode(), Err(DecodeError::InvalidOpcode(0xFF, 0)));
    }
}
