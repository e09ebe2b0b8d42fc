use std::path::PathBuf;

use mjo_ir::Representation;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}: not UTF-8 text")]
    NotText(PathBuf),
    #[error("config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("ended in the {0} state")]
    UnexpectedState(Representation),
    #[error("{0:?} has no Shift-JIS encoding")]
    Unhashable(String),
    #[error("invalid hash {0:?}, expected hex digits")]
    InvalidHash(String),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error("{0} files failed")]
    Batch(usize),
    #[error(transparent)]
    File(#[from] mjo_file::FileError),
    #[error(transparent)]
    Ir(#[from] mjo_ir::IrError),
    #[error(transparent)]
    Asm(#[from] mjo_asm::AsmError),
}

pub type Result<T> = std::result::Result<T, CliError>;

pub fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    }
}
