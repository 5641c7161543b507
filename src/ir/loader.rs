// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Reads IR modules from disk.
//!
//! Modules are stored as JSON documents matching the serde shape of
//! [`Module`]. A file that cannot be read or parsed yields an error the
//! caller is expected to report and skip; remaining files are processed.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use super::Module;

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "{}", e),
            LoadError::Parse(e) => write!(f, "{}", e),
            LoadError::Invalid(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::Parse(e) => Some(e),
            LoadError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Parse(e)
    }
}

pub fn load_module(path: &Path) -> Result<Module, LoadError> {
    let text = fs::read_to_string(path)?;
    let mut module: Module = serde_json::from_str(&text)?;
    if module.name.is_empty() {
        module.name = path.display().to_string();
    }
    module.finalize().map_err(LoadError::Invalid)?;
    Ok(module)
}
