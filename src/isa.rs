//! Instruction set of the zepa machine.
//!
//! Every instruction is a single 32-bit word. The top six bits hold the
//! opcode, the rest of the layout depends on the opcode's format:
//!
//! ```text
//!  31      26 25   21 20   16 15   11 10    6 5      0
//! | opcode   | rd    | rs1   | rs2   | funct5 | funct6 |   R-Type
//! | opcode   | reg   | immediate (16 bits)   |  unused |   I-Type
//! ```

use std::convert::TryFrom;
use std::error;
use std::fmt;

use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

pub type Word = u32;

pub const OPCODE_SHIFT: u32 = 26;
pub const OPCODE_MASK: Word = 0x3F;

pub const RD_SHIFT: u32 = 21;
pub const RS1_SHIFT: u32 = 16;
pub const RS2_SHIFT: u32 = 11;
pub const FUNCT5_SHIFT: u32 = 6;
pub const FUNCT6_SHIFT: u32 = 0;
pub const REGISTER_MASK: Word = 0x1F;
pub const FUNCT5_MASK: Word = 0x1F;
pub const FUNCT6_MASK: Word = 0x3F;

pub const REG_SHIFT: u32 = 21;
pub const IMM_SHIFT: u32 = 5;
pub const IMM_MASK: Word = 0xFFFF;

/// The word that stops the machine when fetched.
pub const HALT_WORD: Word = 0;

/// Instruction layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Destination and two source registers
    R,
    /// One register and a 16-bit immediate
    I,
}

macro_rules! opcodes {
    ( $( $( #[doc = $doc:expr] )+ $name:ident = $repr:literal => $format:ident , )+ ) => {
        /// Defines the opcodes. Numbering continues after the register
        /// indices, so the first opcode is 12.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Opcode {
            $(
                $( #[doc = $doc] )+
                $name = $repr,
            )+
        }

        impl Opcode {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }

            pub fn format(&self) -> Format {
                match self {
                    $( Self::$name => Format::$format , )+
                }
            }
        }

        impl ::std::fmt::Display for Opcode {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $( Self::$name => f.write_str(stringify!($name)) , )+
                }
            }
        }
    }
}

opcodes! {
    /// Move an immediate into a register
    MV = 12 => I,
    /// Add two registers
    ADD = 13 => R,
    /// Subtract two registers
    SUB = 14 => R,
    /// Compare two registers, result goes to SR
    CMP = 15 => R,
    /// Unconditional absolute jump
    JUMP = 16 => I,
    /// Load a register from an address
    LOAD = 17 => I,
    /// Store the low byte of a register to an address
    STORE = 18 => I,
}

impl Opcode {
    /// Case-insensitive mnemonic lookup.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let mnemonic = mnemonic.to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|opcode| opcode.name() == mnemonic)
    }
}

/// The register file. `W0`-`W5` are general purpose, the rest are special
/// purpose registers used by the machine itself.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(TryFromPrimitive, IntoPrimitive)]
pub enum Register {
    W0 = 0,
    W1 = 1,
    W2 = 2,
    W3 = 3,
    W4 = 4,
    W5 = 5,
    /// Program counter
    PC = 6,
    /// Stack pointer
    SP = 7,
    /// Instruction register
    IR = 8,
    /// Status register, written by CMP
    SR = 9,
    /// Memory data register
    MDR = 10,
    /// Memory address register
    MAR = 11,
}

impl Register {
    pub const COUNT: usize = 12;

    pub const ALL: [Self; Self::COUNT] = [
        Self::W0,
        Self::W1,
        Self::W2,
        Self::W3,
        Self::W4,
        Self::W5,
        Self::PC,
        Self::SP,
        Self::IR,
        Self::SR,
        Self::MDR,
        Self::MAR,
    ];

    /// Registers that may be named in assembly source.
    pub const GENERAL: [Self; 6] = [
        Self::W0,
        Self::W1,
        Self::W2,
        Self::W3,
        Self::W4,
        Self::W5,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::W0 => "w0",
            Self::W1 => "w1",
            Self::W2 => "w2",
            Self::W3 => "w3",
            Self::W4 => "w4",
            Self::W5 => "w5",
            Self::PC => "pc",
            Self::SP => "sp",
            Self::IR => "ir",
            Self::SR => "sr",
            Self::MDR => "mdr",
            Self::MAR => "mar",
        }
    }

    /// Resolves a general purpose register name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::GENERAL
            .iter()
            .copied()
            .find(|register| register.name().eq_ignore_ascii_case(name))
    }

    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Mv { rd: Register, imm: u16 },
    Add { rd: Register, rs1: Register, rs2: Register },
    Sub { rd: Register, rs1: Register, rs2: Register },
    Cmp { rs1: Register, rs2: Register },
    Jump { addr: u16 },
    Load { rd: Register, addr: u16 },
    Store { rs: Register, addr: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFault {
    InvalidOpcode { opcode: u8, word: Word },
    InvalidRegister { index: u8, word: Word },
}

impl fmt::Display for DecodeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeFault::InvalidOpcode { opcode, word } => {
                write!(f, "invalid opcode `{}` in word 0x{:08X}", opcode, word)
            }
            DecodeFault::InvalidRegister { index, word } => {
                write!(f, "invalid register `{}` in word 0x{:08X}", index, word)
            }
        }
    }
}

impl error::Error for DecodeFault {}

fn field(word: Word, shift: u32, mask: Word) -> Word {
    (word >> shift) & mask
}

fn register(word: Word, shift: u32) -> Result<Register, DecodeFault> {
    let index = field(word, shift, REGISTER_MASK) as u8;
    Register::try_from(index).map_err(|_| DecodeFault::InvalidRegister { index, word })
}

/// Extracts the opcode bits of `word` without validating them.
pub fn opcode_bits(word: Word) -> u8 {
    field(word, OPCODE_SHIFT, OPCODE_MASK) as u8
}

fn pack_r(opcode: Opcode, rd: Register, rs1: Register, rs2: Register) -> Word {
    // funct5 and funct6 are reserved and stay zero
    (u8::from(opcode) as Word & OPCODE_MASK) << OPCODE_SHIFT
        | (u8::from(rd) as Word & REGISTER_MASK) << RD_SHIFT
        | (u8::from(rs1) as Word & REGISTER_MASK) << RS1_SHIFT
        | (u8::from(rs2) as Word & REGISTER_MASK) << RS2_SHIFT
}

fn pack_i(opcode: Opcode, reg: Register, imm: u16) -> Word {
    (u8::from(opcode) as Word & OPCODE_MASK) << OPCODE_SHIFT
        | (u8::from(reg) as Word & REGISTER_MASK) << REG_SHIFT
        | (imm as Word & IMM_MASK) << IMM_SHIFT
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Mv { .. } => Opcode::MV,
            Instruction::Add { .. } => Opcode::ADD,
            Instruction::Sub { .. } => Opcode::SUB,
            Instruction::Cmp { .. } => Opcode::CMP,
            Instruction::Jump { .. } => Opcode::JUMP,
            Instruction::Load { .. } => Opcode::LOAD,
            Instruction::Store { .. } => Opcode::STORE,
        }
    }

    /// Packs the instruction into its machine word. Fields an instruction
    /// does not use (rd of CMP, the register of JUMP) are encoded as zero.
    pub fn encode(&self) -> Word {
        let opcode = self.opcode();
        match *self {
            Instruction::Mv { rd, imm } => pack_i(opcode, rd, imm),
            Instruction::Add { rd, rs1, rs2 } | Instruction::Sub { rd, rs1, rs2 } => {
                pack_r(opcode, rd, rs1, rs2)
            }
            Instruction::Cmp { rs1, rs2 } => pack_r(opcode, Register::W0, rs1, rs2),
            Instruction::Jump { addr } => pack_i(opcode, Register::W0, addr),
            Instruction::Load { rd, addr } => pack_i(opcode, rd, addr),
            Instruction::Store { rs, addr } => pack_i(opcode, rs, addr),
        }
    }

    /// Splits a machine word back into an instruction.
    ///
    /// # Errors
    ///
    /// Fails if the opcode bits name no opcode, or if a register field the
    /// opcode reads points past the register file. The reserved funct bits are
    /// not inspected.
    pub fn decode(word: Word) -> Result<Self, DecodeFault> {
        let bits = opcode_bits(word);
        let opcode = Opcode::try_from(bits)
            .map_err(|_| DecodeFault::InvalidOpcode { opcode: bits, word })?;

        let imm = field(word, IMM_SHIFT, IMM_MASK) as u16;

        let instruction = match opcode {
            Opcode::ADD => Instruction::Add {
                rd: register(word, RD_SHIFT)?,
                rs1: register(word, RS1_SHIFT)?,
                rs2: register(word, RS2_SHIFT)?,
            },
            Opcode::SUB => Instruction::Sub {
                rd: register(word, RD_SHIFT)?,
                rs1: register(word, RS1_SHIFT)?,
                rs2: register(word, RS2_SHIFT)?,
            },
            Opcode::CMP => Instruction::Cmp {
                rs1: register(word, RS1_SHIFT)?,
                rs2: register(word, RS2_SHIFT)?,
            },
            Opcode::MV => Instruction::Mv {
                rd: register(word, REG_SHIFT)?,
                imm,
            },
            Opcode::JUMP => Instruction::Jump { addr: imm },
            Opcode::LOAD => Instruction::Load {
                rd: register(word, REG_SHIFT)?,
                addr: imm,
            },
            Opcode::STORE => Instruction::Store {
                rs: register(word, REG_SHIFT)?,
                addr: imm,
            },
        };

        Ok(instruction)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opcode = self.opcode();
        match self {
            Instruction::Mv { rd, imm } => write!(f, "{} {}, #{}", opcode, rd, imm),
            Instruction::Add { rd, rs1, rs2 } | Instruction::Sub { rd, rs1, rs2 } => {
                write!(f, "{} {}, {}, {}", opcode, rd, rs1, rs2)
            }
            Instruction::Cmp { rs1, rs2 } => write!(f, "{} {}, {}", opcode, rs1, rs2),
            Instruction::Jump { addr } => write!(f, "{} 0x{:04X}", opcode, addr),
            Instruction::Load { rd, addr } => write!(f, "{} {}, 0x{:04X}", opcode, rd, addr),
            Instruction::Store { rs, addr } => write!(f, "{} {}, 0x{:04X}", opcode, rs, addr),
        }
    }
}
