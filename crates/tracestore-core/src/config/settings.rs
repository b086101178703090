use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Per-handle settings of a trace store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Write the container as indented JSON.
    pub pretty: bool,
    /// Validate attributes against the schema before `set_trace_attrs`,
    /// `populate` or `merge` persist them.
    pub validate_on_write: bool,
}

impl StoreSettings {
    /// Read settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
