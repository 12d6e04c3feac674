//! Instruction and opcode definitions for method bodies.
//!
//! The instruction set is a compact CIL-like subset. Every instruction is an opcode byte plus
//! an operand whose shape is fixed per opcode (see [`OperandKind`]). Member operands are
//! indices into the owning module's reference tables; branch operands are instruction indices
//! within the owning body, not byte offsets.

use std::fmt;

/// The opcodes supported in method bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// No operation.
    Nop,
    /// Return from the current method.
    Ret,
    /// Discard the top stack value.
    Pop,
    /// Duplicate the top stack value.
    Dup,
    /// Push a 32-bit integer constant.
    LdcI4,
    /// Push a string literal.
    LdStr,
    /// Push an argument by slot.
    Ldarg,
    /// Push a local variable by slot.
    Ldloc,
    /// Pop into a local variable by slot.
    Stloc,
    /// Call a method (method reference operand).
    Call,
    /// Call a virtual method (method reference operand).
    Callvirt,
    /// Allocate an object and call its constructor (method reference operand).
    Newobj,
    /// Push an instance field value (field reference operand).
    Ldfld,
    /// Pop into an instance field (field reference operand).
    Stfld,
    /// Push a static field value (field reference operand).
    Ldsfld,
    /// Pop into a static field (field reference operand).
    Stsfld,
    /// Test whether the top stack value is an instance of a type (type reference operand).
    Isinst,
    /// Cast the top stack value to a type (type reference operand).
    Castclass,
    /// Unconditional branch (instruction index operand).
    Br,
    /// Branch if the top stack value is true/non-zero (instruction index operand).
    Brtrue,
    /// Branch if the top stack value is false/zero (instruction index operand).
    Brfalse,
}

/// The operand shape required by an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand.
    None,
    /// A 32-bit signed integer immediate.
    Int32,
    /// A string literal.
    String,
    /// An argument or local slot index.
    Slot,
    /// An index into the method reference table.
    Method,
    /// An index into the field reference table.
    Field,
    /// An index into the type reference table.
    Type,
    /// An instruction index within the owning body.
    Target,
}

impl OpCode {
    /// The opcode's encoding byte in the module image format.
    #[must_use]
    pub fn byte(self) -> u8 {
        match self {
            OpCode::Nop => 0x00,
            OpCode::Ret => 0x01,
            OpCode::Pop => 0x02,
            OpCode::Dup => 0x03,
            OpCode::LdcI4 => 0x10,
            OpCode::LdStr => 0x11,
            OpCode::Ldarg => 0x12,
            OpCode::Ldloc => 0x13,
            OpCode::Stloc => 0x14,
            OpCode::Call => 0x20,
            OpCode::Callvirt => 0x21,
            OpCode::Newobj => 0x22,
            OpCode::Ldfld => 0x30,
            OpCode::Stfld => 0x31,
            OpCode::Ldsfld => 0x32,
            OpCode::Stsfld => 0x33,
            OpCode::Isinst => 0x40,
            OpCode::Castclass => 0x41,
            OpCode::Br => 0x50,
            OpCode::Brtrue => 0x51,
            OpCode::Brfalse => 0x52,
        }
    }

    /// Decode an opcode from its encoding byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown opcode byte.
    pub fn from_byte(byte: u8) -> crate::Result<Self> {
        Ok(match byte {
            0x00 => OpCode::Nop,
            0x01 => OpCode::Ret,
            0x02 => OpCode::Pop,
            0x03 => OpCode::Dup,
            0x10 => OpCode::LdcI4,
            0x11 => OpCode::LdStr,
            0x12 => OpCode::Ldarg,
            0x13 => OpCode::Ldloc,
            0x14 => OpCode::Stloc,
            0x20 => OpCode::Call,
            0x21 => OpCode::Callvirt,
            0x22 => OpCode::Newobj,
            0x30 => OpCode::Ldfld,
            0x31 => OpCode::Stfld,
            0x32 => OpCode::Ldsfld,
            0x33 => OpCode::Stsfld,
            0x40 => OpCode::Isinst,
            0x41 => OpCode::Castclass,
            0x50 => OpCode::Br,
            0x51 => OpCode::Brtrue,
            0x52 => OpCode::Brfalse,
            _ => return Err(malformed_error!("Unknown opcode byte - 0x{:02X}", byte)),
        })
    }

    /// The operand shape this opcode requires.
    #[must_use]
    pub fn operand_kind(self) -> OperandKind {
        match self {
            OpCode::Nop | OpCode::Ret | OpCode::Pop | OpCode::Dup => OperandKind::None,
            OpCode::LdcI4 => OperandKind::Int32,
            OpCode::LdStr => OperandKind::String,
            OpCode::Ldarg | OpCode::Ldloc | OpCode::Stloc => OperandKind::Slot,
            OpCode::Call | OpCode::Callvirt | OpCode::Newobj => OperandKind::Method,
            OpCode::Ldfld | OpCode::Stfld | OpCode::Ldsfld | OpCode::Stsfld => OperandKind::Field,
            OpCode::Isinst | OpCode::Castclass => OperandKind::Type,
            OpCode::Br | OpCode::Brtrue | OpCode::Brfalse => OperandKind::Target,
        }
    }

    /// The mnemonic used in disassembly output.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::Ret => "ret",
            OpCode::Pop => "pop",
            OpCode::Dup => "dup",
            OpCode::LdcI4 => "ldc.i4",
            OpCode::LdStr => "ldstr",
            OpCode::Ldarg => "ldarg",
            OpCode::Ldloc => "ldloc",
            OpCode::Stloc => "stloc",
            OpCode::Call => "call",
            OpCode::Callvirt => "callvirt",
            OpCode::Newobj => "newobj",
            OpCode::Ldfld => "ldfld",
            OpCode::Stfld => "stfld",
            OpCode::Ldsfld => "ldsfld",
            OpCode::Stsfld => "stsfld",
            OpCode::Isinst => "isinst",
            OpCode::Castclass => "castclass",
            OpCode::Br => "br",
            OpCode::Brtrue => "brtrue",
            OpCode::Brfalse => "brfalse",
        }
    }

    /// Whether this opcode invokes a method reference.
    #[must_use]
    pub fn is_call(self) -> bool {
        matches!(self, OpCode::Call | OpCode::Callvirt | OpCode::Newobj)
    }

    /// Whether this opcode branches to an instruction index.
    #[must_use]
    pub fn is_branch(self) -> bool {
        matches!(self, OpCode::Br | OpCode::Brtrue | OpCode::Brfalse)
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand.
    None,
    /// A 32-bit signed integer immediate.
    Int32(i32),
    /// A string literal.
    String(String),
    /// An argument or local slot index.
    Slot(u16),
    /// An index into the method reference table.
    Method(u32),
    /// An index into the field reference table.
    Field(u32),
    /// An index into the type reference table.
    Type(u32),
    /// An instruction index within the owning body.
    Target(u32),
}

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The opcode.
    pub opcode: OpCode,
    /// The operand; its variant must match [`OpCode::operand_kind`].
    pub operand: Operand,
}

impl Instruction {
    /// Create an instruction from an opcode and operand.
    #[must_use]
    pub fn new(opcode: OpCode, operand: Operand) -> Self {
        Instruction { opcode, operand }
    }

    /// A `nop` instruction.
    #[must_use]
    pub fn nop() -> Self {
        Instruction::new(OpCode::Nop, Operand::None)
    }

    /// A `ret` instruction.
    #[must_use]
    pub fn ret() -> Self {
        Instruction::new(OpCode::Ret, Operand::None)
    }

    /// An `ldc.i4` instruction pushing the given constant.
    #[must_use]
    pub fn ldc_i4(value: i32) -> Self {
        Instruction::new(OpCode::LdcI4, Operand::Int32(value))
    }

    /// An `ldstr` instruction pushing the given literal.
    #[must_use]
    pub fn ldstr(value: impl Into<String>) -> Self {
        Instruction::new(OpCode::LdStr, Operand::String(value.into()))
    }

    /// An `ldarg` instruction for the given slot.
    #[must_use]
    pub fn ldarg(slot: u16) -> Self {
        Instruction::new(OpCode::Ldarg, Operand::Slot(slot))
    }

    /// A `call` instruction for the given method reference index.
    #[must_use]
    pub fn call(method_ref: u32) -> Self {
        Instruction::new(OpCode::Call, Operand::Method(method_ref))
    }

    /// A `br` instruction targeting the given instruction index.
    #[must_use]
    pub fn br(target: u32) -> Self {
        Instruction::new(OpCode::Br, Operand::Target(target))
    }

    /// The method reference index, if this instruction invokes one.
    #[must_use]
    pub fn method_ref(&self) -> Option<u32> {
        match self.operand {
            Operand::Method(index) if self.opcode.is_call() => Some(index),
            _ => None,
        }
    }

    /// The field reference index, if this instruction accesses one.
    #[must_use]
    pub fn field_ref(&self) -> Option<u32> {
        match self.operand {
            Operand::Field(index) => Some(index),
            _ => None,
        }
    }

    /// The branch target instruction index, if this instruction branches.
    #[must_use]
    pub fn branch_target(&self) -> Option<u32> {
        match self.operand {
            Operand::Target(index) if self.opcode.is_branch() => Some(index),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::None => write!(f, "{}", self.opcode.mnemonic()),
            Operand::Int32(v) => write!(f, "{} {}", self.opcode.mnemonic(), v),
            Operand::String(s) => write!(f, "{} \"{}\"", self.opcode.mnemonic(), s),
            Operand::Slot(s) => write!(f, "{}.{}", self.opcode.mnemonic(), s),
            Operand::Method(i) => write!(f, "{} methodref[{}]", self.opcode.mnemonic(), i),
            Operand::Field(i) => write!(f, "{} fieldref[{}]", self.opcode.mnemonic(), i),
            Operand::Type(i) => write!(f, "{} typeref[{}]", self.opcode.mnemonic(), i),
            Operand::Target(i) => write!(f, "{} IL_{:04}", self.opcode.mnemonic(), i),
        }
    }
}
