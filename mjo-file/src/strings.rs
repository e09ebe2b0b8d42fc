//! Externalized message strings.
//!
//! `text` instructions carry the visible script text. Moving those strings
//! into a separate key → text table lets them be edited or translated
//! without touching the assembly.

use std::collections::BTreeMap;
use std::path::Path;

use mjo_isa::{Instruction, op};
use serde::{Deserialize, Serialize};

use crate::error::{FileError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringTable {
    entries: BTreeMap<String, String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(key.into(), text.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| FileError::Yaml(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| FileError::Yaml(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| FileError::Io(e.to_string()))?;
        Self::from_yaml(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?).map_err(|e| FileError::Io(e.to_string()))
    }

    /// Replace the string of every `text` instruction with a key `L1`,
    /// `L2`, … in visiting order and store the text here. Numbering
    /// continues after the keys already present. Returns the number of
    /// strings moved.
    pub fn externalize<'a>(&mut self, instructions: impl IntoIterator<Item = &'a mut Instruction>) -> usize {
        let mut moved = 0;
        for insn in instructions {
            if insn.value() != op::TEXT {
                continue;
            }
            let Some(text) = insn.string.take() else {
                continue;
            };
            let key = format!("L{}", self.entries.len() + 1);
            self.entries.insert(key.clone(), text);
            insn.external_key = Some(key);
            moved += 1;
        }
        moved
    }

    /// Put the text back into every instruction that carries a key.
    pub fn internalize<'a>(&self, instructions: impl IntoIterator<Item = &'a mut Instruction>) -> Result<()> {
        for insn in instructions {
            let Some(key) = insn.external_key.take() else {
                continue;
            };
            match self.entries.get(&key) {
                Some(text) => insn.string = Some(text.clone()),
                None => {
                    insn.external_key = Some(key.clone());
                    return Err(FileError::MissingString(key));
                }
            }
        }
        Ok(())
    }
}
