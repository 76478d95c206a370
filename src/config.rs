//! Runtime options for the container engine
//!
//! Format geometry is fixed at compile time (see [`crate::container`]); only
//! engine behavior is configurable.
//!
//! ```
//! use zvfs::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str("sync_writes = true").unwrap();
//! assert!(config.sync_writes);
//! assert!(config.truncate_on_defragment);
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run a full consistency check every time a container is opened
    pub verify_on_open: bool,

    /// Call `sync_all` at the end of every mutating operation
    pub sync_writes: bool,

    /// Shrink the container file to the append cursor after defragmentation
    pub truncate_on_defragment: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_on_open: false,
            sync_writes: false,
            truncate_on_defragment: true,
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
