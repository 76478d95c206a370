use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for container operations
pub type Result<T> = std::result::Result<T, ZvfsError>;

/// Unified error type for all container operations
#[derive(Debug, Error)]
pub enum ZvfsError {
    // Lookup errors
    #[error("File not found in container: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Container is full: all {0} slots are in use")]
    CapacityExceeded(usize),

    #[error("File name too long: {name} is {len} bytes (max {max})")]
    NameTooLong { name: String, len: usize, max: usize },

    #[error("No files in container")]
    EmptyContainer,

    // Format errors
    #[error("Invalid container format: {0}")]
    InvalidFormat(String),

    #[error("Invalid magic number in container header")]
    InvalidMagic,

    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u8),

    #[error("Container corrupted: {0}")]
    Corrupted(String),

    #[error("Payload too large for 32-bit offsets: {0} bytes")]
    PayloadTooLarge(u64),

    // Caller decisions
    #[error("Operation aborted, path already exists: {0}")]
    Aborted(PathBuf),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for ZvfsError {
    fn from(err: toml::de::Error) -> Self {
        ZvfsError::Config(err.to_string())
    }
}

impl ZvfsError {
    /// True for errors that indicate the on-disk image is damaged rather than misused
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ZvfsError::InvalidFormat(_)
                | ZvfsError::InvalidMagic
                | ZvfsError::UnsupportedVersion(_)
                | ZvfsError::Corrupted(_)
        )
    }
}
