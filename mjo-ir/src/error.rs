use mjo_file::FileError;
use mjo_isa::{EffectError, EncodeError, MjoType, TypeMask};

use crate::script::Representation;

/// Where in a function an instruction-level problem was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub function: u32,
    pub block: String,
    pub index: usize,
    pub mnemonic: String,
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "${:08x}/{}[{}] `{}`",
            self.function, self.block, self.index, self.mnemonic
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IrError {
    #[error("cannot go from {from} to {to}")]
    IllegalTransition {
        from: Representation,
        to: Representation,
    },
    #[error("function ${hash:08x} starts at {offset:#x}, which is not an instruction boundary")]
    InvalidFunctionOffset { hash: u32, offset: u32 },
    #[error("functions ${first:08x} and ${second:08x} share offset {offset:#x}")]
    DuplicateFunction { first: u32, second: u32, offset: u32 },
    #[error("instruction at {offset:#x} has invalid jump target {target:#x}")]
    InvalidJumpTarget { offset: u32, target: i64 },
    #[error("instruction `{0}` has no offset; the instruction list is not laid out")]
    MissingLayout(String),
    #[error("function ${function:08x}: branch to missing block {block}")]
    UnknownBlock { function: u32, block: usize },
    #[error("jump displacement from {offset:#x} does not fit in 32 bits")]
    DisplacementOverflow { offset: u32 },
    #[error("{site}: pops {needed} values, stack holds {available}")]
    StackUnderflow {
        site: Site,
        needed: usize,
        available: usize,
    },
    #[error("{site}: operand {operand} is {found}, expected {expected:?}")]
    TypeMismatch {
        site: Site,
        operand: usize,
        found: MjoType,
        expected: TypeMask,
    },
    #[error("{site}: {source}")]
    Effect {
        site: Site,
        #[source]
        source: EffectError,
    },
    #[error("function ${function:08x}: stack shapes disagree entering {block}: {detail}")]
    StackMismatch {
        function: u32,
        block: String,
        detail: String,
    },
    #[error("function ${function:08x}: slot {slot} entering {block} merges values of different categories")]
    CategoryMismatch {
        function: u32,
        block: String,
        slot: usize,
    },
    #[error("{0}")]
    Invariant(String),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    File(#[from] FileError),
}

pub type Result<T> = std::result::Result<T, IrError>;
