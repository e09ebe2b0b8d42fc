//! Optional YAML defaults, overridden by command-line flags.
//!
//! ```yaml
//! symbols: names.yaml
//! strings: strings.yaml
//! encrypt: true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CliError, Result, io};

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Symbol table used to name hashes.
    pub symbols: Option<PathBuf>,
    /// Externalized-string table.
    pub strings: Option<PathBuf>,
    /// Encrypt the code blob when assembling.
    pub encrypt: bool,
}

impl Config {
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(io(path))?;
        let config = Self::from_yaml(&text, path)?;
        // relative table paths are relative to the config file
        let base = path.parent().unwrap_or(Path::new(""));
        Ok(Self {
            symbols: config.symbols.map(|p| base.join(p)),
            strings: config.strings.map(|p| base.join(p)),
            encrypt: config.encrypt,
        })
    }
}
