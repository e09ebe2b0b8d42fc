use crate::descriptor::OperandKind;
use crate::flags::{Flags, MjoType};
use crate::instruction::{Instruction, Target};
use crate::opcode;
use crate::sjis;

/// Errors from [`decode`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Unknown opcode at the given byte offset.
    #[error("invalid opcode {opcode:#06x} at offset {offset:#x}")]
    InvalidOpcode { offset: usize, opcode: u16 },
    /// The instruction starting at the given offset runs past the end.
    #[error("truncated instruction at offset {0:#x}")]
    Truncated(usize),
    /// A string operand whose last byte is not NUL.
    #[error("string operand at offset {0:#x} is not NUL-terminated")]
    MissingTerminator(usize),
    /// The reserved field of a call at the given offset is not zero.
    #[error("reserved field at offset {0:#x} is not zero")]
    NonZeroReserved(usize),
    #[error("invalid type tag {tag:#04x} at offset {offset:#x}")]
    InvalidType { offset: usize, tag: u8 },
    /// An opcode whose encoding only exists in graph form.
    #[error("opcode {opcode:#06x} at offset {offset:#x} cannot appear in bytecode")]
    GraphOnly { offset: usize, opcode: u16 },
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Start of the instruction being read, reported on truncation.
    start: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::Truncated(self.start))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        self.array().map(u16::from_le_bytes)
    }

    fn i16(&mut self) -> Result<i16, DecodeError> {
        self.array().map(i16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, DecodeError> {
        self.array().map(i32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, DecodeError> {
        self.array().map(f32::from_le_bytes)
    }
}

/// Decode a code blob into instructions, each tagged with its byte offset
/// and size.
pub fn decode(bytes: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let insn = decode_one(bytes, offset)?;
        offset += insn.size.unwrap_or(0) as usize;
        instructions.push(insn);
    }
    Ok(instructions)
}

/// Decode the single instruction starting at `offset`.
pub fn decode_one(bytes: &[u8], offset: usize) -> Result<Instruction, DecodeError> {
    let mut r = Reader {
        bytes,
        pos: offset,
        start: offset,
    };
    let value = r.u16()?;
    let opcode = opcode::by_value(value)
        .map_err(|_| DecodeError::InvalidOpcode { offset, opcode: value })?;
    let mut insn = Instruction::new(opcode);

    for &kind in opcode.operands() {
        match kind {
            OperandKind::TypeList => {
                let count = r.u16()? as usize;
                let tags = r.take(count)?;
                insn.type_list = tags
                    .iter()
                    .enumerate()
                    .map(|(i, &tag)| {
                        MjoType::from_u8(tag).ok_or(DecodeError::InvalidType {
                            offset: r.pos - count + i,
                            tag,
                        })
                    })
                    .collect::<Result<_, _>>()?;
            }
            OperandKind::String => {
                let at = r.pos;
                let size = r.u16()? as usize;
                let raw = r.take(size)?;
                let (&last, text) = raw.split_last().ok_or(DecodeError::MissingTerminator(at))?;
                if last != 0 {
                    return Err(DecodeError::MissingTerminator(at));
                }
                match sjis::decode(text) {
                    Some(decoded) => insn.string = Some(decoded.into_owned()),
                    None => {
                        log::warn!("string operand at offset {at:#x} is not valid Shift-JIS, kept as raw bytes");
                        insn.string = Some(sjis::decode_lossy(text).into_owned());
                        insn.raw_string = Some(text.to_vec());
                    }
                }
            }
            OperandKind::Flags => insn.flags = Flags(r.u16()?),
            OperandKind::Hash => insn.hash = r.u32()?,
            OperandKind::VarOffset => insn.var_offset = r.i16()?,
            OperandKind::Reserved => {
                let at = r.pos;
                if r.u32()? != 0 {
                    return Err(DecodeError::NonZeroReserved(at));
                }
            }
            OperandKind::Int => insn.int_value = r.i32()?,
            OperandKind::Float => insn.float_value = r.f32()?,
            OperandKind::ArgCount => insn.arg_count = r.u16()?,
            OperandKind::Jump => insn.jump = Some(Target::Offset(r.i32()?)),
            OperandKind::Line => insn.line_number = r.u16()?,
            OperandKind::Switch => {
                let count = r.u16()? as usize;
                insn.switch_cases = (0..count)
                    .map(|_| r.i32().map(Target::Offset))
                    .collect::<Result<_, _>>()?;
            }
            OperandKind::Phi => return Err(DecodeError::GraphOnly { offset, opcode: value }),
        }
    }

    insn.offset = Some(offset as u32);
    insn.size = Some((r.pos - offset) as u32);
    Ok(insn)
}
