//! zvfs: a minimal single-file virtual file system
//!
//! A container is one file holding a 64-byte header, a fixed table of 32
//! entry slots and an append-only data region with 64-byte aligned payloads.
//! Files are added to the first empty slot, deleted by tombstoning, and their
//! slots and space are only reclaimed by an explicit defragmentation.
//!
//! # Example
//!
//! ```no_run
//! use zvfs::{Conflict, Container};
//!
//! let mut container = Container::create("disk.zvfs", Conflict::Overwrite)?;
//! container.add("hello.txt", b"Hello, World!")?;
//! assert_eq!(container.read("hello.txt")?, b"Hello, World!");
//!
//! container.remove("hello.txt")?;
//! let report = container.defragment()?;
//! assert_eq!(report.removed_files, 1);
//! # Ok::<(), zvfs::ZvfsError>(())
//! ```

pub mod clock;
pub mod config;
pub mod conflict;
pub mod container;
pub mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use conflict::Conflict;
pub use container::{
    Container, ContainerInfo, DefragReport, FileEntry, FileTable, Header, ListEntry,
    DATA_ALIGNMENT, DATA_START_OFFSET, ENTRY_SIZE, FILE_TABLE_OFFSET, HEADER_SIZE, MAGIC_NUMBER,
    MAX_FILES, MAX_NAME_LENGTH,
};
pub use error::{Result, ZvfsError};
