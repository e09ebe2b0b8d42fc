//! Operand encodings and stack-transition descriptors.
//!
//! Every opcode carries two short descriptor strings. The encoding string
//! lists operand slots in wire order (`fho` = flags, hash, var offset). The
//! transition string is `pops.pushes`, for example `ii.i` or `[*#a].*`.
//! Both are compiled once, when the opcode table is built.

use crate::flags::{MjoType, TypeMask};
use crate::instruction::Instruction;

/// One operand slot of an encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// `t`: u16 count followed by one type byte per entry.
    TypeList,
    /// `s`: u16 size (including NUL), Shift-JIS bytes, NUL.
    String,
    /// `f`: u16 variable flags.
    Flags,
    /// `h`: u32 name hash.
    Hash,
    /// `o`: i16 variable offset.
    VarOffset,
    /// `0`: four reserved zero bytes.
    Reserved,
    /// `i`: i32 immediate.
    Int,
    /// `r`: f32 immediate.
    Float,
    /// `a`: u16 argument count.
    ArgCount,
    /// `j`: i32 jump displacement.
    Jump,
    /// `l`: u16 source line.
    Line,
    /// `c`: u16 count followed by one i32 displacement per case.
    Switch,
    /// `p`: phi predecessor edges. Never encoded.
    Phi,
}

impl OperandKind {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            't' => Self::TypeList,
            's' => Self::String,
            'f' => Self::Flags,
            'h' => Self::Hash,
            'o' => Self::VarOffset,
            '0' => Self::Reserved,
            'i' => Self::Int,
            'r' => Self::Float,
            'a' => Self::ArgCount,
            'j' => Self::Jump,
            'l' => Self::Line,
            'c' => Self::Switch,
            'p' => Self::Phi,
            _ => return None,
        })
    }

    /// Wire size for fixed-width operands; `None` for length-prefixed ones.
    pub fn fixed_size(self) -> Option<u32> {
        match self {
            Self::Flags | Self::VarOffset | Self::ArgCount | Self::Line => Some(2),
            Self::Hash | Self::Reserved | Self::Int | Self::Float | Self::Jump => Some(4),
            Self::TypeList | Self::String | Self::Switch | Self::Phi => None,
        }
    }
}

/// Errors from compiling a descriptor string.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("unknown operand letter `{0}` in encoding")]
    UnknownOperand(char),
    #[error("malformed transition `{desc}`: {reason}")]
    MalformedTransition { desc: String, reason: &'static str },
}

/// Repeat count source of a bracketed pop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatCount {
    /// `#a`: the instruction's argument count.
    ArgCount,
    /// `#d`: the dimension stored in the instruction's flags.
    Dimension,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopToken {
    Mask(TypeMask),
    /// Reuse the mask expected for the n-th pop (zero based).
    Backref(usize),
    Repeat(TypeMask, RepeatCount),
    /// `[#t]`: one pop per entry of the type list.
    TypeList,
    /// `[#s]`: the operand list of the string operand's control code.
    ControlCode,
    /// `[*]`: everything left on the temp stack.
    Drain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushToken {
    Type(MjoType),
    /// `#t`: the type stored in the flags.
    FlagType,
    /// `~#t`: element type of the array type stored in the flags.
    ElementType,
    /// `[#t]`: one value per type-list entry.
    TypeList,
    Unknown,
    /// Push the n-th popped value (zero based) back.
    Backref(usize),
}

/// Compiled transition descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackEffect {
    pub pops: Vec<PopToken>,
    pub pushes: Vec<PushToken>,
}

/// Errors from expanding a stack effect against a concrete instruction.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
    #[error("unknown control code `{0}`")]
    UnknownControlCode(String),
    #[error("control instruction has no control code string")]
    MissingControlCode,
    #[error("back-reference to value {0} which has not been popped")]
    DanglingBackref(usize),
}

pub fn compile_encoding(encoding: &str) -> Result<Vec<OperandKind>, DescriptorError> {
    encoding
        .chars()
        .map(|c| OperandKind::from_char(c).ok_or(DescriptorError::UnknownOperand(c)))
        .collect()
}

fn pop_mask(c: char) -> Option<TypeMask> {
    Some(match c {
        'b' | 'i' => TypeMask::INT,
        'f' => TypeMask::FLOAT,
        's' => TypeMask::STRING,
        'n' => TypeMask::NUMERIC,
        'p' => TypeMask::PRIMITIVE,
        'I' => TypeMask::INT_ARRAY,
        'F' => TypeMask::FLOAT_ARRAY,
        'S' => TypeMask::STRING_ARRAY,
        '*' => TypeMask::ALL,
        _ => return None,
    })
}

fn push_type(c: char) -> Option<MjoType> {
    Some(match c {
        'b' | 'i' => MjoType::Int,
        'f' => MjoType::Float,
        's' => MjoType::String,
        'I' => MjoType::IntArray,
        'F' => MjoType::FloatArray,
        'S' => MjoType::StringArray,
        _ => return None,
    })
}

fn digit_index(c: char) -> Option<usize> {
    match c.to_digit(10) {
        Some(d @ 1..=9) => Some(d as usize - 1),
        _ => None,
    }
}

impl StackEffect {
    pub fn compile(desc: &str) -> Result<Self, DescriptorError> {
        let malformed = |reason| DescriptorError::MalformedTransition {
            desc: desc.to_string(),
            reason,
        };
        if desc.is_empty() {
            return Ok(Self::default());
        }
        let (pop_part, push_part) = desc
            .split_once('.')
            .ok_or_else(|| malformed("missing `.` separator"))?;

        let mut pops = Vec::new();
        let mut chars = pop_part.chars();
        while let Some(c) = chars.next() {
            if pops.last() == Some(&PopToken::Drain) {
                return Err(malformed("`[*]` must be the last pop"));
            }
            let token = if c == '[' {
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                match inner.as_str() {
                    "*" => PopToken::Drain,
                    "#t" => PopToken::TypeList,
                    "#s" => PopToken::ControlCode,
                    _ => {
                        let (letter, count) = inner
                            .split_once('#')
                            .ok_or_else(|| malformed("bracketed pop without `#`"))?;
                        let mut letters = letter.chars();
                        let mask = match (letters.next(), letters.next()) {
                            (Some(l), None) => pop_mask(l),
                            _ => None,
                        }
                        .ok_or_else(|| malformed("bad mask in bracketed pop"))?;
                        let count = match count {
                            "a" => RepeatCount::ArgCount,
                            "d" => RepeatCount::Dimension,
                            _ => return Err(malformed("bad repeat count")),
                        };
                        PopToken::Repeat(mask, count)
                    }
                }
            } else if let Some(index) = digit_index(c) {
                PopToken::Backref(index)
            } else {
                PopToken::Mask(pop_mask(c).ok_or_else(|| malformed("bad pop letter"))?)
            };
            pops.push(token);
        }

        let mut pushes = Vec::new();
        let mut chars = push_part.chars().peekable();
        while let Some(c) = chars.next() {
            let token = match c {
                '[' => {
                    let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                    if inner != "#t" {
                        return Err(malformed("bad bracketed push"));
                    }
                    PushToken::TypeList
                }
                '#' => {
                    if chars.next() != Some('t') {
                        return Err(malformed("expected `#t`"));
                    }
                    PushToken::FlagType
                }
                '~' => {
                    if chars.next() != Some('#') || chars.next() != Some('t') {
                        return Err(malformed("expected `~#t`"));
                    }
                    PushToken::ElementType
                }
                '*' => PushToken::Unknown,
                c => match digit_index(c) {
                    Some(index) => PushToken::Backref(index),
                    None => PushToken::Type(push_type(c).ok_or_else(|| malformed("bad push letter"))?),
                },
            };
            pushes.push(token);
        }

        Ok(Self { pops, pushes })
    }

    /// Expand the pop tokens into one mask per popped value, deepest first.
    ///
    /// `depth` is the number of temporaries currently on the stack; it only
    /// matters for `[*]`.
    pub fn pop_masks(&self, insn: &Instruction, depth: usize) -> Result<Vec<TypeMask>, EffectError> {
        let mut masks: Vec<TypeMask> = Vec::new();
        for token in &self.pops {
            match *token {
                PopToken::Mask(mask) => masks.push(mask),
                PopToken::Backref(index) => {
                    let mask = *masks.get(index).ok_or(EffectError::DanglingBackref(index))?;
                    masks.push(mask);
                }
                PopToken::Repeat(mask, count) => {
                    let n = match count {
                        RepeatCount::ArgCount => insn.arg_count as usize,
                        RepeatCount::Dimension => insn.flags.dimension() as usize,
                    };
                    masks.extend(std::iter::repeat_n(mask, n));
                }
                PopToken::TypeList => masks.extend(insn.type_list.iter().map(|t| t.mask())),
                PopToken::ControlCode => {
                    let code = insn.string.as_deref().ok_or(EffectError::MissingControlCode)?;
                    let operands = control_code_operands(code)
                        .ok_or_else(|| EffectError::UnknownControlCode(code.to_string()))?;
                    masks.extend_from_slice(operands);
                }
                PopToken::Drain => {
                    let rest = depth.saturating_sub(masks.len());
                    masks.extend(std::iter::repeat_n(TypeMask::ALL, rest));
                }
            }
        }
        Ok(masks)
    }

    /// Number of values pushed, ignoring types.
    pub fn push_count(&self, insn: &Instruction) -> usize {
        self.pushes
            .iter()
            .map(|token| match token {
                PushToken::TypeList => insn.type_list.len(),
                _ => 1,
            })
            .sum()
    }
}

/// Operand masks for a `ctrl` control code, in push order.
pub fn control_code_operands(code: &str) -> Option<&'static [TypeMask]> {
    const INT: TypeMask = TypeMask::INT;
    Some(match code {
        "c" | "l" | "o" => &[INT, INT],
        "s" | "t" => &[INT],
        "x" => &[TypeMask::STRING],
        "d" => &[TypeMask::PRIMITIVE],
        "f" => &[INT, INT, INT, INT, TypeMask::STRING],
        "g" => &[INT, INT, INT, INT, INT, INT],
        "n" | "N" | "p" | "w" => &[],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_binary_transition() {
        let effect = StackEffect::compile("nn.f").unwrap();
        assert_eq!(
            effect.pops,
            vec![PopToken::Mask(TypeMask::NUMERIC), PopToken::Mask(TypeMask::NUMERIC)]
        );
        assert_eq!(effect.pushes, vec![PushToken::Type(MjoType::Float)]);
    }

    #[test]
    fn compiles_bracketed_tokens() {
        let effect = StackEffect::compile("i[i#d].~#t").unwrap();
        assert_eq!(
            effect.pops,
            vec![
                PopToken::Mask(TypeMask::INT),
                PopToken::Repeat(TypeMask::INT, RepeatCount::Dimension)
            ]
        );
        assert_eq!(effect.pushes, vec![PushToken::ElementType]);

        let effect = StackEffect::compile("[*#a].*").unwrap();
        assert_eq!(effect.pops, vec![PopToken::Repeat(TypeMask::ALL, RepeatCount::ArgCount)]);
        assert_eq!(effect.pushes, vec![PushToken::Unknown]);

        let effect = StackEffect::compile(".[#t]").unwrap();
        assert!(effect.pops.is_empty());
        assert_eq!(effect.pushes, vec![PushToken::TypeList]);
    }

    #[test]
    fn compiles_backref_push() {
        let effect = StackEffect::compile("p.1").unwrap();
        assert_eq!(effect.pushes, vec![PushToken::Backref(0)]);
    }

    #[test]
    fn drain_must_be_last() {
        assert!(StackEffect::compile("[*].").is_ok());
        assert!(matches!(
            StackEffect::compile("[*]i."),
            Err(DescriptorError::MalformedTransition { .. })
        ));
    }

    #[test]
    fn rejects_bad_letters() {
        assert_eq!(compile_encoding("fhx"), Err(DescriptorError::UnknownOperand('x')));
        assert!(StackEffect::compile("q.").is_err());
        assert!(StackEffect::compile("i").is_err());
    }

    #[test]
    fn control_codes() {
        assert_eq!(control_code_operands("f").map(|m| m.len()), Some(5));
        assert_eq!(control_code_operands("w").map(|m| m.len()), Some(0));
        assert_eq!(control_code_operands("z"), None);
    }
}
