//! `.mjo` script container: header, function index, optional encryption and
//! the code blob.

pub mod error;
pub mod strings;
pub mod symbols;

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use mjo_isa::{Instruction, crc};

pub use error::{FileError, Result};
pub use strings::StringTable;
pub use symbols::{SymbolResolver, SymbolTable};

pub const MAGIC_ENCRYPTED: &[u8; 16] = b"MajiroObjX1.000\0";
pub const MAGIC_PLAIN: &[u8; 16] = b"MajiroObjV1.000\0";

/// One entry of the function index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionEntry {
    pub hash: u32,
    /// Byte offset of the function's first instruction in the code blob.
    pub offset: u32,
}

/// A decoded `.mjo` file.
#[derive(Debug, Clone, PartialEq)]
pub struct MjoFile {
    pub encrypted: bool,
    /// Whether the header carries a read-mark size.
    pub read_mark: bool,
    /// Offset of the entry-point function.
    pub entry_offset: u32,
    pub functions: Vec<FunctionEntry>,
    pub instructions: Vec<Instruction>,
}

struct Header<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Header<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let slice = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or(FileError::Truncated(self.pos))?;
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn count(&mut self, what: &'static str) -> Result<usize> {
        let offset = self.pos;
        let value = self.u32()? as i32;
        usize::try_from(value).map_err(|_| FileError::NegativeCount { what, value, offset })
    }
}

impl MjoFile {
    /// Parse a complete file image.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut h = Header { data, pos: 0 };
        let encrypted = match h.take(16)? {
            m if m == MAGIC_ENCRYPTED => true,
            m if m == MAGIC_PLAIN => false,
            _ => return Err(FileError::InvalidMagic),
        };
        let entry_offset = h.u32()?;
        let read_mark_size = h.u32()?;

        let count = h.count("function count")?;
        let mut functions = Vec::with_capacity(count.min(data.len() / 8));
        for _ in 0..count {
            let hash = h.u32()?;
            let offset = h.u32()?;
            functions.push(FunctionEntry { hash, offset });
        }

        let code_len = h.count("code length")?;
        let mut code = h.take(code_len)?.to_vec();
        if h.pos < data.len() {
            log::warn!("{} trailing bytes after the code blob", data.len() - h.pos);
        }
        if encrypted {
            crc::crypt32(&mut code, 0);
        }
        let instructions = mjo_isa::decode(&code)?;

        log::debug!(
            "parsed {} functions, {} instructions, encrypted={encrypted}",
            functions.len(),
            instructions.len()
        );
        Ok(Self {
            encrypted,
            read_mark: read_mark_size != 0,
            entry_offset,
            functions,
            instructions,
        })
    }

    /// Open a file through a read-only memory map.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| FileError::Io(e.to_string()))?;
        // SAFETY: the map is read-only and dropped before this function
        // returns; concurrent truncation of the file is not supported.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| FileError::Io(e.to_string()))?;
        Self::parse(&map)
    }

    /// Header read-mark value: the highest `line` number, or 0 when
    /// read-marks are disabled.
    pub fn read_mark_size(&self) -> u32 {
        if !self.read_mark {
            return 0;
        }
        self.instructions
            .iter()
            .filter(|i| i.value() == mjo_isa::op::LINE)
            .map(|i| i.line_number as u32)
            .max()
            .unwrap_or(0)
    }

    pub fn entry_function(&self) -> Option<&FunctionEntry> {
        self.functions.iter().find(|f| f.offset == self.entry_offset)
    }

    /// Serialize to a complete file image.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut code = mjo_isa::encode(&self.instructions)?;
        if self.encrypted {
            crc::crypt32(&mut code, 0);
        }

        let mut out = Vec::with_capacity(16 + 12 + 8 * self.functions.len() + 4 + code.len());
        out.extend_from_slice(if self.encrypted { MAGIC_ENCRYPTED } else { MAGIC_PLAIN });
        out.extend_from_slice(&self.entry_offset.to_le_bytes());
        out.extend_from_slice(&self.read_mark_size().to_le_bytes());
        out.extend_from_slice(&(self.functions.len() as u32).to_le_bytes());
        for f in &self.functions {
            out.extend_from_slice(&f.hash.to_le_bytes());
            out.extend_from_slice(&f.offset.to_le_bytes());
        }
        out.extend_from_slice(&(code.len() as u32).to_le_bytes());
        out.extend_from_slice(&code);
        Ok(out)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?).map_err(|e| FileError::Io(e.to_string()))
    }
}
