mod engine;
mod format;
mod table;

pub use engine::{Container, ContainerInfo, DefragReport, ListEntry};
pub use format::{
    encode_name, padded_len, FileEntry, Header, DATA_ALIGNMENT, DATA_START_OFFSET, ENTRY_SIZE,
    FILE_TABLE_OFFSET, FLAG_ACTIVE, FLAG_DELETED, FORMAT_VERSION, HEADER_SIZE, MAGIC_NUMBER,
    MAX_FILES, MAX_NAME_LENGTH, NAME_FIELD_SIZE,
};
pub use table::FileTable;
