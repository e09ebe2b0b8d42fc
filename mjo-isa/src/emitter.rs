use crate::descriptor::OperandKind;
use crate::instruction::{Instruction, Target};
use crate::sjis;

/// Errors from [`encode`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Phi instructions only exist in graph form.
    #[error("`{0}` cannot be encoded")]
    Synthetic(String),
    /// A jump or switch still points at a block instead of a displacement.
    #[error("`{0}` has an unresolved branch target")]
    UnresolvedTarget(String),
    /// The string operand was replaced by an externalized key.
    #[error("`{mnemonic}` refers to externalized string `{key}`; internalize strings first")]
    Externalized { mnemonic: String, key: String },
    #[error("`{0}` is missing its string operand")]
    MissingString(String),
    #[error("string {0:?} has no Shift-JIS encoding")]
    Unencodable(String),
    #[error("{what} of `{mnemonic}` is too long ({len})")]
    TooLong {
        mnemonic: String,
        what: &'static str,
        len: usize,
    },
}

fn string_bytes(insn: &Instruction) -> Result<Vec<u8>, EncodeError> {
    let mnemonic = || insn.opcode.mnemonic.clone();
    let text = match (&insn.string, &insn.external_key) {
        (Some(text), _) => text,
        (None, Some(key)) => {
            return Err(EncodeError::Externalized {
                mnemonic: mnemonic(),
                key: key.clone(),
            });
        }
        (None, None) => return Err(EncodeError::MissingString(mnemonic())),
    };
    let mut bytes = match &insn.raw_string {
        Some(raw) if sjis::decode_lossy(raw) == text.as_str() => raw.clone(),
        _ => sjis::encode(text)
            .ok_or_else(|| EncodeError::Unencodable(text.clone()))?
            .into_owned(),
    };
    bytes.push(0);
    if bytes.len() > u16::MAX as usize {
        return Err(EncodeError::TooLong {
            mnemonic: mnemonic(),
            what: "string",
            len: bytes.len(),
        });
    }
    Ok(bytes)
}

fn count_u16(insn: &Instruction, what: &'static str, len: usize) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::TooLong {
        mnemonic: insn.opcode.mnemonic.clone(),
        what,
        len,
    })
}

fn displacement(insn: &Instruction, target: Option<&Target>) -> Result<i32, EncodeError> {
    match target {
        Some(Target::Offset(d)) => Ok(*d),
        _ => Err(EncodeError::UnresolvedTarget(insn.opcode.mnemonic.clone())),
    }
}

/// Encoded size of one instruction, including the opcode.
///
/// Branch targets need not be resolved yet, so the size can be computed
/// before displacements are known.
pub fn encoded_size(insn: &Instruction) -> Result<u32, EncodeError> {
    let mut size = 2u32;
    for &kind in insn.opcode.operands() {
        size += match kind.fixed_size() {
            Some(n) => n,
            None => match kind {
                OperandKind::TypeList => 2 + insn.type_list.len() as u32,
                OperandKind::String => 2 + string_bytes(insn)?.len() as u32,
                OperandKind::Switch => 2 + 4 * insn.switch_cases.len() as u32,
                _ => return Err(EncodeError::Synthetic(insn.opcode.mnemonic.clone())),
            },
        };
    }
    Ok(size)
}

/// Append one instruction to `out`.
pub fn encode_one(insn: &Instruction, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    if insn.opcode.is_phi() {
        return Err(EncodeError::Synthetic(insn.opcode.mnemonic.clone()));
    }
    out.extend_from_slice(&insn.opcode.value.to_le_bytes());
    for &kind in insn.opcode.operands() {
        match kind {
            OperandKind::TypeList => {
                let count = count_u16(insn, "type list", insn.type_list.len())?;
                out.extend_from_slice(&count.to_le_bytes());
                out.extend(insn.type_list.iter().map(|&t| t as u8));
            }
            OperandKind::String => {
                let bytes = string_bytes(insn)?;
                out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(&bytes);
            }
            OperandKind::Flags => out.extend_from_slice(&insn.flags.bits().to_le_bytes()),
            OperandKind::Hash => out.extend_from_slice(&insn.hash.to_le_bytes()),
            OperandKind::VarOffset => out.extend_from_slice(&insn.var_offset.to_le_bytes()),
            OperandKind::Reserved => out.extend_from_slice(&0u32.to_le_bytes()),
            OperandKind::Int => out.extend_from_slice(&insn.int_value.to_le_bytes()),
            OperandKind::Float => out.extend_from_slice(&insn.float_value.to_le_bytes()),
            OperandKind::ArgCount => out.extend_from_slice(&insn.arg_count.to_le_bytes()),
            OperandKind::Jump => {
                let d = displacement(insn, insn.jump.as_ref())?;
                out.extend_from_slice(&d.to_le_bytes());
            }
            OperandKind::Line => out.extend_from_slice(&insn.line_number.to_le_bytes()),
            OperandKind::Switch => {
                let count = count_u16(insn, "case list", insn.switch_cases.len())?;
                out.extend_from_slice(&count.to_le_bytes());
                for case in &insn.switch_cases {
                    out.extend_from_slice(&displacement(insn, Some(case))?.to_le_bytes());
                }
            }
            OperandKind::Phi => return Err(EncodeError::Synthetic(insn.opcode.mnemonic.clone())),
        }
    }
    Ok(())
}

/// Encode a sequence of instructions into a code blob.
///
/// ```
/// use mjo_isa::{Instruction, by_mnemonic, encode};
///
/// let mut ldc = Instruction::new(by_mnemonic("ldc.i")?);
/// ldc.int_value = 5;
/// let ret = Instruction::new(by_mnemonic("return")?);
/// let bytes = encode(&[ldc, ret])?;
/// assert_eq!(bytes, [0x00, 0x08, 0x05, 0x00, 0x00, 0x00, 0x2b, 0x08]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn encode(instructions: &[Instruction]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    for insn in instructions {
        encode_one(insn, &mut out)?;
    }
    Ok(out)
}
