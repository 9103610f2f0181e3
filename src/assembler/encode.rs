use crate::isa::{Format, Instruction, Opcode, Register, Word, HALT_WORD};

use super::{AssembleError, AssembleErrorKind, Result};

/// Mnemonic of the pseudo instruction that assembles to the halt word.
pub const HALT_MNEMONIC: &str = "HALT";

/// Encodes one tokenized line into its machine word.
///
/// # Errors
///
/// Fails on an unknown mnemonic, an unknown register, a wrong operand count
/// or an immediate that is not an unsigned 16-bit number. The error carries
/// `line_nr` and the tokens of the instruction.
pub fn encode(tokens: &[&str], line_nr: usize) -> Result<Word> {
    let (mnemonic, operands) = match tokens.split_first() {
        Some(split) => split,
        None => {
            return Err(AssembleError::new(
                AssembleErrorKind::InvalidOperandCount,
                "empty instruction",
                line_nr,
            ))
        }
    };

    let err = |kind: AssembleErrorKind, detail: String| {
        AssembleError::new(
            kind,
            format!("{} in `{}`", detail, tokens.join(" ")),
            line_nr,
        )
    };

    if mnemonic.eq_ignore_ascii_case(HALT_MNEMONIC) {
        if !operands.is_empty() {
            return Err(err(
                AssembleErrorKind::InvalidOperandCount,
                format!("HALT takes no operands, got {}", operands.len()),
            ));
        }
        return Ok(HALT_WORD);
    }

    let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| {
        err(
            AssembleErrorKind::InvalidOpcode,
            format!("unknown mnemonic `{}`", mnemonic),
        )
    })?;

    let register = |token: &str| {
        Register::from_name(token).ok_or_else(|| {
            err(
                AssembleErrorKind::InvalidRegister,
                format!("unknown register `{}`", token),
            )
        })
    };
    let immediate = |token: &str| {
        parse_immediate(token).ok_or_else(|| {
            err(
                AssembleErrorKind::InvalidImmediate,
                format!("`{}` is not an unsigned 16-bit number", token),
            )
        })
    };

    let instruction = match opcode.format() {
        Format::R => {
            let (rd, rs1, rs2) = match operands {
                [rd, rs1, rs2] => (register(*rd)?, register(*rs1)?, register(*rs2)?),
                [rs1, rs2] => (Register::W0, register(*rs1)?, register(*rs2)?),
                _ => {
                    return Err(err(
                        AssembleErrorKind::InvalidOperandCount,
                        format!("R-Type expects 2 or 3 operands, got {}", operands.len()),
                    ))
                }
            };

            match opcode {
                Opcode::ADD => Instruction::Add { rd, rs1, rs2 },
                Opcode::SUB => Instruction::Sub { rd, rs1, rs2 },
                _ => Instruction::Cmp { rs1, rs2 },
            }
        }
        Format::I => {
            let (reg, imm) = match operands {
                [reg, imm] => (register(*reg)?, immediate(*imm)?),
                [imm] => (Register::W0, immediate(*imm)?),
                _ => {
                    return Err(err(
                        AssembleErrorKind::InvalidOperandCount,
                        format!("I-Type expects 1 or 2 operands, got {}", operands.len()),
                    ))
                }
            };

            match opcode {
                Opcode::MV => Instruction::Mv { rd: reg, imm },
                Opcode::LOAD => Instruction::Load { rd: reg, addr: imm },
                Opcode::STORE => Instruction::Store { rs: reg, addr: imm },
                _ => Instruction::Jump { addr: imm },
            }
        }
    };

    log::debug!("[{}] Encoded {}", line_nr, instruction);

    Ok(instruction.encode())
}

/// Parses `#5`, `#0x10`, `5` or `0x10` as an unsigned 16-bit number.
pub fn parse_immediate(token: &str) -> Option<u16> {
    let token = token.strip_prefix('#').unwrap_or(token);

    let (digits, radix) = match token.as_bytes() {
        [b'0', b'x', ..] | [b'0', b'X', ..] => (&token[2..], 16),
        _ => (token, 10),
    };

    // from_str_radix accepts a leading `+`, the assembler does not
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    u16::from_str_radix(digits, radix).ok()
}
