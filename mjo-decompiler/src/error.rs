use mjo_ir::Site;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecompileError {
    #[error("{site}: no source form for this instruction")]
    Unsupported { site: Site },
    #[error("{site}: needs {needed} expressions, {available} available")]
    StackUnderflow {
        site: Site,
        needed: usize,
        available: usize,
    },
    #[error("{site}: branches do not reconverge (then ends at {then_end}, else at {else_end})")]
    NonConverging {
        site: Site,
        then_end: String,
        else_end: String,
    },
    #[error("{site}: join point {join} is not dominated by the branch")]
    NotDominated { site: Site, join: String },
    #[error("{site}: control flow re-enters decompiled code; loops are not recovered")]
    Loop { site: Site },
    #[error("function ${function:08x}: control runs past the last instruction")]
    FellOffEnd { function: u32 },
    #[error("function ${function:08x}: decompilation stops at {at}")]
    Unstructured { function: u32, at: String },
    #[error("{site}: {count} values left for return")]
    ReturnArity { site: Site, count: usize },
    #[error("{site}: unknown control code `{code}`")]
    UnknownControlCode { site: Site, code: String },
    #[error("{site}: {detail}")]
    Malformed { site: Site, detail: String },
}

pub type Result<T> = std::result::Result<T, DecompileError>;
