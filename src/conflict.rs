//! Caller-side resolution of path conflicts
//!
//! The engine never prompts. When a target path already exists, the caller
//! decides up front what should happen and passes that decision in.

use crate::error::{Result, ZvfsError};
use std::path::{Path, PathBuf};

/// What to do when the target path of `create` or `extract` already exists
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Conflict {
    /// Replace the existing file
    Overwrite,
    /// Fail with [`ZvfsError::Aborted`]
    #[default]
    Abort,
    /// Write to this path instead
    Rename(PathBuf),
}

impl Conflict {
    /// Resolve the path that should actually be written
    ///
    /// A rename target that itself exists is rejected rather than resolved again.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        if !path.exists() {
            return Ok(path.to_path_buf());
        }

        match self {
            Conflict::Overwrite => Ok(path.to_path_buf()),
            Conflict::Abort => Err(ZvfsError::Aborted(path.to_path_buf())),
            Conflict::Rename(new_path) => {
                if new_path.exists() {
                    Err(ZvfsError::Aborted(new_path.clone()))
                } else {
                    Ok(new_path.clone())
                }
            }
        }
    }
}
