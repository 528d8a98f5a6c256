//! Method body decoding.
//!
//! Only invocation instructions are materialized; every other opcode is
//! skipped using its encoded length. Skipping still validates the stream, so a
//! truncated body or an undefined opcode is reported as an error.

use crate::constant_pool::{BootstrapMethod, ConstantPool};
use crate::error::{Error, Result};
use crate::reader::Reader;

pub mod opcodes {
    pub const IINC: u8 = 0x84;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const WIDE: u8 = 0xc4;
}

/// Invocation instruction found in a method body.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `invokevirtual`, `invokespecial`, `invokestatic` or `invokeinterface`.
    Invoke {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
        is_interface: bool,
    },
    InvokeDynamic {
        name: String,
        descriptor: String,
        bootstrap: BootstrapMethod,
    },
}

/// Decodes the body of a `Code` attribute (starting at `max_stack`).
pub fn decode_code_attribute(attribute: &[u8], cp: &ConstantPool) -> Result<Vec<Instruction>> {
    let mut reader = Reader::new(attribute);
    let _max_stack = reader.read_u2()?;
    let _max_locals = reader.read_u2()?;
    let code_length = reader.read_u4()? as usize;
    if code_length == 0 {
        return Err(Error::MalformedAttribute("Code"));
    }
    let code = reader
        .read_bytes(code_length)
        .map_err(|_| Error::MalformedAttribute("Code"))?;
    decode_instructions(code, cp)
}

/// Decodes a raw bytecode array.
pub fn decode_instructions(code: &[u8], cp: &ConstantPool) -> Result<Vec<Instruction>> {
    let mut reader = Reader::new(code);
    let mut out = Vec::new();

    while reader.remaining() > 0 {
        let offset = reader.position();
        let opcode = reader.read_u1()?;
        match opcode {
            opcodes::INVOKEVIRTUAL | opcodes::INVOKESPECIAL | opcodes::INVOKESTATIC => {
                let member = cp.member_ref(reader.read_u2()?)?;
                out.push(Instruction::Invoke {
                    opcode,
                    owner: member.owner,
                    name: member.name,
                    descriptor: member.descriptor,
                    is_interface: member.is_interface,
                });
            }
            opcodes::INVOKEINTERFACE => {
                let member = cp.member_ref(reader.read_u2()?)?;
                // count, 0
                reader.skip(2)?;
                out.push(Instruction::Invoke {
                    opcode,
                    owner: member.owner,
                    name: member.name,
                    descriptor: member.descriptor,
                    is_interface: true,
                });
            }
            opcodes::INVOKEDYNAMIC => {
                let (bootstrap, name, descriptor) = cp.invoke_dynamic(reader.read_u2()?)?;
                reader.skip(2)?;
                out.push(Instruction::InvokeDynamic {
                    name,
                    descriptor,
                    bootstrap,
                });
            }
            opcodes::TABLESWITCH => {
                skip_padding(&mut reader)?;
                let _default = reader.read_i4()?;
                let low = reader.read_i4()?;
                let high = reader.read_i4()?;
                if high < low {
                    return Err(Error::InvalidSwitch { offset });
                }
                let entries = (high as i64 - low as i64 + 1) as usize;
                reader
                    .skip(entries * 4)
                    .map_err(|_| Error::InvalidSwitch { offset })?;
            }
            opcodes::LOOKUPSWITCH => {
                skip_padding(&mut reader)?;
                let _default = reader.read_i4()?;
                let pairs = reader.read_i4()?;
                if pairs < 0 {
                    return Err(Error::InvalidSwitch { offset });
                }
                reader
                    .skip(pairs as usize * 8)
                    .map_err(|_| Error::InvalidSwitch { offset })?;
            }
            opcodes::WIDE => {
                let widened = reader.read_u1()?;
                let operands = if widened == opcodes::IINC { 4 } else { 2 };
                reader.skip(operands)?;
            }
            _ => {
                let operands = operand_length(opcode).ok_or(Error::UnknownOpcode { opcode, offset })?;
                reader.skip(operands)?;
            }
        }
    }

    Ok(out)
}

/// Switch operands start at the next 4-byte boundary relative to the start of the code array.
fn skip_padding(reader: &mut Reader<'_>) -> Result<()> {
    let pad = (4 - reader.position() % 4) % 4;
    reader.skip(pad)
}

/// Number of operand bytes for fixed-length opcodes.
fn operand_length(opcode: u8) -> Option<usize> {
    Some(match opcode {
        // constants, loads/stores with implicit index, array ops, stack, arithmetic,
        // conversions and comparisons
        0x00..=0x0f => 0,
        0x10 => 1,
        0x11 => 2,
        0x12 => 1,
        0x13 | 0x14 => 2,
        0x15..=0x19 => 1,
        0x1a..=0x35 => 0,
        0x36..=0x3a => 1,
        0x3b..=0x83 => 0,
        opcodes::IINC => 2,
        0x85..=0x98 => 0,
        // branches, goto, jsr
        0x99..=0xa8 => 2,
        // ret
        0xa9 => 1,
        // returns
        0xac..=0xb1 => 0,
        // field access
        0xb2..=0xb5 => 2,
        // new
        0xbb => 2,
        // newarray
        0xbc => 1,
        // anewarray
        0xbd => 2,
        0xbe | 0xbf => 0,
        // checkcast, instanceof
        0xc0 | 0xc1 => 2,
        0xc2 | 0xc3 => 0,
        // multianewarray
        0xc5 => 3,
        // ifnull, ifnonnull
        0xc6 | 0xc7 => 2,
        // goto_w, jsr_w
        0xc8 | 0xc9 => 4,
        // breakpoint, impdep1, impdep2
        0xca | 0xfe | 0xff => 0,
        _ => return None,
    })
}
