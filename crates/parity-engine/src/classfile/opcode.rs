//! Instruction set for method bodies
//!
//! All opcodes are single-byte instructions. Operands follow the opcode byte
//! in little-endian order. Every instruction that refers to the symbol table
//! carries its u32 symbol index immediately after the opcode, so the index
//! can be patched in place without moving any code.
//!
//! Opcodes are organized into categories:
//! - 0x00-0x0F: Stack manipulation & constants
//! - 0x10-0x1F: Local variables
//! - 0x20-0x2F: Integer arithmetic
//! - 0x50-0x5F: Integer comparison
//! - 0x90-0x9F: Control flow
//! - 0xA0-0xAF: Method invocation
//! - 0xB0-0xBF: Object operations
//! - 0xC0-0xCF: Array operations

/// Bytecode opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation & Constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Duplicate top stack value
    Dup = 0x02,
    /// Swap top two stack values
    Swap = 0x03,
    /// Push null
    ConstNull = 0x04,
    /// Push 32-bit integer constant (operand: i32)
    ConstI32 = 0x07,
    /// Push an Integer or String symbol (operand: u32 symbol)
    Ldc = 0x0A,

    // ===== Local Variables (0x10-0x1F) =====
    /// Load local variable (operand: u16 slot)
    LoadLocal = 0x10,
    /// Store top of stack to local variable (operand: u16 slot)
    StoreLocal = 0x11,

    // ===== Integer Arithmetic (0x20-0x2F) =====
    /// pop b, pop a, push a + b
    Iadd = 0x20,
    /// pop b, pop a, push a - b
    Isub = 0x21,
    /// pop b, pop a, push a * b
    Imul = 0x22,
    /// pop b, pop a, push a / b
    Idiv = 0x23,
    /// pop b, pop a, push a % b
    Irem = 0x24,
    /// pop a, push -a
    Ineg = 0x25,

    // ===== Integer Comparison (0x50-0x5F) =====
    /// pop b, pop a, push a == b
    Ieq = 0x50,
    /// pop b, pop a, push a < b
    Ilt = 0x52,
    /// pop b, pop a, push a > b
    Igt = 0x54,

    // ===== Control Flow (0x90-0x9F) =====
    /// Unconditional jump (operand: i32 relative to the next instruction)
    Jmp = 0x90,
    /// Jump if top of stack is zero/null (operand: i32)
    JmpIfFalse = 0x91,
    /// Jump if top of stack is non-zero (operand: i32)
    JmpIfTrue = 0x92,
    /// Return top of stack
    Return = 0x98,
    /// Return without a value
    ReturnVoid = 0x99,
    /// Throw top of stack
    Throw = 0x9A,

    // ===== Method Invocation (0xA0-0xAF) =====
    /// Virtual call through the receiver's class (operand: u32 MethodRef)
    InvokeVirtual = 0xA0,
    /// Static call (operand: u32 MethodRef)
    InvokeStatic = 0xA1,
    /// Non-virtual instance call: constructors and private methods (operand: u32 MethodRef)
    InvokeSpecial = 0xA2,
    /// Dynamically bound call site (operand: u32 NameAndType)
    InvokeDynamic = 0xA3,

    // ===== Object Operations (0xB0-0xBF) =====
    /// Allocate an instance (operand: u32 Class)
    New = 0xB0,
    /// Read an instance field (operand: u32 FieldRef)
    GetField = 0xB1,
    /// Write an instance field (operand: u32 FieldRef)
    PutField = 0xB2,
    /// Read a static field (operand: u32 FieldRef)
    GetStatic = 0xB3,
    /// Write a static field (operand: u32 FieldRef)
    PutStatic = 0xB4,
    /// Checked cast (operand: u32 Class or ArrayClass)
    CheckCast = 0xB5,
    /// Type test (operand: u32 Class or ArrayClass)
    InstanceOf = 0xB6,

    // ===== Array Operations (0xC0-0xCF) =====
    /// pop length, push new array of the component type (operand: u32 Class or ArrayClass)
    NewArray = 0xC0,
    /// pop `dims` lengths, push nested arrays (operands: u32 ArrayClass, u8 dims)
    MultiNewArray = 0xC1,
    /// pop array, push length
    ArrayLen = 0xC2,
    /// pop index, pop array, push element
    LoadElem = 0xC3,
    /// pop value, pop index, pop array
    StoreElem = 0xC4,
}

impl Opcode {
    /// Convert a byte to an opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        let opcode = match byte {
            0x00 => Self::Nop,
            0x01 => Self::Pop,
            0x02 => Self::Dup,
            0x03 => Self::Swap,
            0x04 => Self::ConstNull,
            0x07 => Self::ConstI32,
            0x0A => Self::Ldc,
            0x10 => Self::LoadLocal,
            0x11 => Self::StoreLocal,
            0x20 => Self::Iadd,
            0x21 => Self::Isub,
            0x22 => Self::Imul,
            0x23 => Self::Idiv,
            0x24 => Self::Irem,
            0x25 => Self::Ineg,
            0x50 => Self::Ieq,
            0x52 => Self::Ilt,
            0x54 => Self::Igt,
            0x90 => Self::Jmp,
            0x91 => Self::JmpIfFalse,
            0x92 => Self::JmpIfTrue,
            0x98 => Self::Return,
            0x99 => Self::ReturnVoid,
            0x9A => Self::Throw,
            0xA0 => Self::InvokeVirtual,
            0xA1 => Self::InvokeStatic,
            0xA2 => Self::InvokeSpecial,
            0xA3 => Self::InvokeDynamic,
            0xB0 => Self::New,
            0xB1 => Self::GetField,
            0xB2 => Self::PutField,
            0xB3 => Self::GetStatic,
            0xB4 => Self::PutStatic,
            0xB5 => Self::CheckCast,
            0xB6 => Self::InstanceOf,
            0xC0 => Self::NewArray,
            0xC1 => Self::MultiNewArray,
            0xC2 => Self::ArrayLen,
            0xC3 => Self::LoadElem,
            0xC4 => Self::StoreElem,
            _ => return None,
        };
        Some(opcode)
    }

    /// Convert opcode to byte
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Size in bytes of the operands following the opcode
    pub fn operand_size(self) -> usize {
        match self {
            Self::LoadLocal | Self::StoreLocal => 2,
            Self::ConstI32 | Self::Jmp | Self::JmpIfFalse | Self::JmpIfTrue => 4,
            Self::MultiNewArray => 5,
            op if op.has_symbol_operand() => 4,
            _ => 0,
        }
    }

    /// Whether the first operand is a u32 symbol-table index
    pub fn has_symbol_operand(self) -> bool {
        matches!(
            self,
            Self::Ldc
                | Self::InvokeVirtual
                | Self::InvokeStatic
                | Self::InvokeSpecial
                | Self::InvokeDynamic
                | Self::New
                | Self::GetField
                | Self::PutField
                | Self::GetStatic
                | Self::PutStatic
                | Self::CheckCast
                | Self::InstanceOf
                | Self::NewArray
                | Self::MultiNewArray
        )
    }

    /// Whether this opcode reads or writes a field
    pub fn is_field_access(self) -> bool {
        matches!(
            self,
            Self::GetField | Self::PutField | Self::GetStatic | Self::PutStatic
        )
    }

    /// Whether this opcode invokes a method through a MethodRef
    pub fn is_invoke(self) -> bool {
        matches!(
            self,
            Self::InvokeVirtual | Self::InvokeStatic | Self::InvokeSpecial
        )
    }

    /// Whether this opcode's symbol operand names a class
    pub fn takes_class_operand(self) -> bool {
        matches!(
            self,
            Self::New | Self::CheckCast | Self::InstanceOf | Self::NewArray | Self::MultiNewArray
        )
    }

    /// Check if this is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::JmpIfFalse | Self::JmpIfTrue)
    }

    /// Check if this instruction ends straight-line execution
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Self::Return | Self::ReturnVoid | Self::Throw | Self::Jmp
        )
    }

    /// Get the mnemonic name for this opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::ConstNull => "CONST_NULL",
            Self::ConstI32 => "CONST_I32",
            Self::Ldc => "LDC",
            Self::LoadLocal => "LOAD_LOCAL",
            Self::StoreLocal => "STORE_LOCAL",
            Self::Iadd => "IADD",
            Self::Isub => "ISUB",
            Self::Imul => "IMUL",
            Self::Idiv => "IDIV",
            Self::Irem => "IREM",
            Self::Ineg => "INEG",
            Self::Ieq => "IEQ",
            Self::Ilt => "ILT",
            Self::Igt => "IGT",
            Self::Jmp => "JMP",
            Self::JmpIfFalse => "JMP_IF_FALSE",
            Self::JmpIfTrue => "JMP_IF_TRUE",
            Self::Return => "RETURN",
            Self::ReturnVoid => "RETURN_VOID",
            Self::Throw => "THROW",
            Self::InvokeVirtual => "INVOKE_VIRTUAL",
            Self::InvokeStatic => "INVOKE_STATIC",
            Self::InvokeSpecial => "INVOKE_SPECIAL",
            Self::InvokeDynamic => "INVOKE_DYNAMIC",
            Self::New => "NEW",
            Self::GetField => "GET_FIELD",
            Self::PutField => "PUT_FIELD",
            Self::GetStatic => "GET_STATIC",
            Self::PutStatic => "PUT_STATIC",
            Self::CheckCast => "CHECK_CAST",
            Self::InstanceOf => "INSTANCE_OF",
            Self::NewArray => "NEW_ARRAY",
            Self::MultiNewArray => "MULTI_NEW_ARRAY",
            Self::ArrayLen => "ARRAY_LEN",
            Self::LoadElem => "LOAD_ELEM",
            Self::StoreElem => "STORE_ELEM",
        }
    }
}
