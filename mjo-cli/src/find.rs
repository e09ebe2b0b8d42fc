//! Cross-reference search: which functions declare, call, load or store a
//! given hash.

use std::fmt;
use std::path::{Path, PathBuf};

use mjo_ir::Function;
use mjo_isa::{Instruction, op};
use walkdir::WalkDir;

use crate::error::{CliError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Declaration,
    Call(u32),
    Syscall(u32),
    Load(u32),
    Store(u32),
    /// An `ldc.i` whose value equals a searched hash.
    Constant(u32),
}

impl Reference {
    /// The hash this reference names, if any.
    pub fn target(self) -> Option<u32> {
        match self {
            Reference::Declaration => None,
            Reference::Call(h)
            | Reference::Syscall(h)
            | Reference::Load(h)
            | Reference::Store(h)
            | Reference::Constant(h) => Some(h),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Declaration => f.write_str("declaration"),
            Reference::Call(h) => write!(f, "call ${h:08x}"),
            Reference::Syscall(h) => write!(f, "syscall ${h:08x}"),
            Reference::Load(h) => write!(f, "load ${h:08x}"),
            Reference::Store(h) => write!(f, "store ${h:08x}"),
            Reference::Constant(h) => write!(f, "constant {h:#010x}"),
        }
    }
}

/// Parse a search hash: hex digits, optionally prefixed by `$` or `0x`.
pub fn parse_hash(text: &str) -> Result<u32> {
    let digits = text
        .strip_prefix('$')
        .or_else(|| text.strip_prefix("0x"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).map_err(|_| CliError::InvalidHash(text.to_string()))
}

/// References to any of `hashes` inside one function, in instruction order.
pub fn references(function: &Function, hashes: &[u32]) -> Vec<Reference> {
    let mut found = Vec::new();
    if hashes.contains(&function.hash) {
        found.push(Reference::Declaration);
    }
    found.extend(function.instructions().filter_map(|insn| classify(insn, hashes)));
    found
}

fn classify(insn: &Instruction, hashes: &[u32]) -> Option<Reference> {
    let value = insn.value();
    if value == op::LDC_I {
        let constant = insn.int_value as u32;
        return hashes.contains(&constant).then_some(Reference::Constant(constant));
    }
    if !insn.opcode.encoding.contains('h') || !hashes.contains(&insn.hash) {
        return None;
    }
    let hash = insn.hash;
    match value {
        op::SYSCALL | op::SYSCALLP => Some(Reference::Syscall(hash)),
        op::CALL | op::CALLP => Some(Reference::Call(hash)),
        op::LD | op::LDELEM => Some(Reference::Load(hash)),
        _ if insn.opcode.is_store() => Some(Reference::Store(hash)),
        _ => None,
    }
}

/// The script files under `path`: the file itself, or every `.mjo` file in
/// the directory tree, sorted by path.
pub fn script_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        let is_script = entry.path().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("mjo"));
        if entry.file_type().is_file() && is_script {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
