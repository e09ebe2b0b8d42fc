use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Invalid magic: expected MajiroObjX1.000 or MajiroObjV1.000")]
    InvalidMagic,

    #[error("Header truncated at offset {0:#x}")]
    Truncated(usize),

    #[error("Negative {what} {value} at offset {offset:#x}")]
    NegativeCount {
        what: &'static str,
        value: i32,
        offset: usize,
    },

    #[error("Code blob: {0}")]
    Decode(#[from] mjo_isa::DecodeError),

    #[error("Code blob: {0}")]
    Encode(#[from] mjo_isa::EncodeError),

    #[error("Missing externalized string `{0}`")]
    MissingString(String),

    #[error("Identifier {0:?} has no Shift-JIS encoding")]
    UnhashableName(String),

    #[error("Invalid hash key `{0}` in symbol table")]
    InvalidHashKey(String),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, FileError>;
