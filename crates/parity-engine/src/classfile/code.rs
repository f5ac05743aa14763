//! Instruction decoding and in-place operand patching

use super::encoder::{BytecodeReader, DecodeError};
use super::opcode::Opcode;

/// A decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode byte
    pub offset: usize,
    /// The opcode
    pub opcode: Opcode,
    operands: Vec<u8>,
}

impl Instruction {
    /// Total encoded size including the opcode byte
    pub fn len(&self) -> usize {
        1 + self.operands.len()
    }

    /// Offset of the next instruction
    pub fn next_offset(&self) -> usize {
        self.offset + self.len()
    }

    fn operand_u32(&self) -> Option<u32> {
        let bytes = self.operands.get(0..4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Symbol-table index operand, for symbol instructions
    pub fn symbol(&self) -> Option<u32> {
        if self.opcode.has_symbol_operand() {
            self.operand_u32()
        } else {
            None
        }
    }

    /// Local slot operand of `LoadLocal`/`StoreLocal`
    pub fn local(&self) -> Option<u16> {
        match self.opcode {
            Opcode::LoadLocal | Opcode::StoreLocal => {
                Some(u16::from_le_bytes([self.operands[0], self.operands[1]]))
            }
            _ => None,
        }
    }

    /// Immediate operand of `ConstI32`
    pub fn immediate(&self) -> Option<i32> {
        match self.opcode {
            Opcode::ConstI32 => self.operand_u32().map(|raw| raw as i32),
            _ => None,
        }
    }

    /// Dimension count of `MultiNewArray`
    pub fn dims(&self) -> Option<u8> {
        match self.opcode {
            Opcode::MultiNewArray => self.operands.get(4).copied(),
            _ => None,
        }
    }

    /// Absolute jump target, relative to the end of the instruction
    pub fn jump_target(&self) -> Option<usize> {
        if !self.opcode.is_jump() {
            return None;
        }
        let relative = self.operand_u32()? as i32 as i64;
        let target = self.next_offset() as i64 + relative;
        usize::try_from(target).ok()
    }
}

/// Decode a method body into instructions
pub fn decode_instructions(code: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut instructions = Vec::new();
    let mut reader = BytecodeReader::new(code);

    while reader.has_more() {
        let offset = reader.position();
        let opcode = reader.read_opcode()?;
        let operand_size = opcode.operand_size();
        let operands = if operand_size > 0 {
            reader.read_bytes(operand_size)?
        } else {
            Vec::new()
        };
        instructions.push(Instruction {
            offset,
            opcode,
            operands,
        });
    }

    Ok(instructions)
}

/// Overwrite the symbol operand of the instruction at `offset`
///
/// The instruction keeps its size, so no other offset in the body moves.
pub fn patch_symbol(code: &mut [u8], offset: usize, index: u32) -> Result<(), DecodeError> {
    let byte = *code.get(offset).ok_or(DecodeError::UnexpectedEnd(offset))?;
    let opcode = Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, offset))?;
    if !opcode.has_symbol_operand() {
        return Err(DecodeError::InvalidOpcode(byte, offset));
    }
    let operand = code
        .get_mut(offset + 1..offset + 5)
        .ok_or(DecodeError::UnexpectedEnd(offset + 1))?;
    operand.copy_from_slice(&index.to_le_bytes());
    Ok(())
}
