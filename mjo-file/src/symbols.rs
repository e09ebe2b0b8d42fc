//! Hash → name resolution.
//!
//! Scripts only store CRC32 hashes of identifiers. Names are recovered on a
//! best-effort basis from a table of known names.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FileError, Result};

/// Looks up the source name behind an identifier hash.
pub trait SymbolResolver: Send + Sync {
    fn resolve(&self, hash: u32) -> Option<&str>;
}

impl SymbolResolver for HashMap<u32, String> {
    fn resolve(&self, hash: u32) -> Option<&str> {
        self.get(&hash).map(String::as_str)
    }
}

/// On-disk form. `names` are hashed on load; `hashes` pins names to hashes
/// that are known but not reproducible from the name (hex keys).
#[derive(Debug, Default, Serialize, Deserialize)]
struct SymbolFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    names: Vec<String>,
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    hashes: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    by_hash: HashMap<u32, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name under its computed hash. Returns the hash.
    pub fn insert_name(&mut self, name: &str) -> Result<u32> {
        let hash = mjo_isa::sjis::hash_name(name)
            .ok_or_else(|| FileError::UnhashableName(name.to_string()))?;
        self.by_hash.insert(hash, name.to_string());
        Ok(hash)
    }

    pub fn insert(&mut self, hash: u32, name: impl Into<String>) {
        self.by_hash.insert(hash, name.into());
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: SymbolFile = serde_yaml::from_str(text).map_err(|e| FileError::Yaml(e.to_string()))?;
        let mut table = Self::new();
        for name in &file.names {
            table.insert_name(name)?;
        }
        for (key, name) in file.hashes {
            let digits = key.trim_start_matches('$').trim_start_matches("0x");
            let hash = u32::from_str_radix(digits, 16).map_err(|_| FileError::InvalidHashKey(key.clone()))?;
            table.insert(hash, name);
        }
        Ok(table)
    }

    /// Serialize with explicit hashes, so that the result does not depend
    /// on names hashing back to their keys.
    pub fn to_yaml(&self) -> Result<String> {
        let file = SymbolFile {
            names: Vec::new(),
            hashes: self.by_hash.iter().map(|(h, n)| (format!("{h:08x}"), n.clone())).collect(),
        };
        serde_yaml::to_string(&file).map_err(|e| FileError::Yaml(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| FileError::Io(e.to_string()))?;
        Self::from_yaml(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?).map_err(|e| FileError::Io(e.to_string()))
    }
}

impl SymbolResolver for SymbolTable {
    fn resolve(&self, hash: u32) -> Option<&str> {
        self.by_hash.get(&hash).map(String::as_str)
    }
}
