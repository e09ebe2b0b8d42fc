use mjo_ir::{IrError, Representation};
use mjo_isa::EncodeError;

#[derive(Debug, thiserror::Error)]
pub enum AsmError {
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("function ${function:08x}: unknown label `{label}`")]
    UnknownLabel { function: u32, label: String },
    #[error("function ${function:08x}: label `{label}` defined twice")]
    DuplicateLabel { function: u32, label: String },
    #[error("more than one entry point (${first:08x} and ${second:08x})")]
    MultipleEntryPoints { first: u32, second: u32 },
    #[error("a {0} has no assembly form")]
    Unprintable(Representation),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Ir(#[from] IrError),
}

pub type Result<T> = std::result::Result<T, AsmError>;
