use crate::error::{Result, ZvfsError};
use std::io::{Read, Write};

/// Magic signature at offset 0 of every container
pub const MAGIC_NUMBER: [u8; 8] = *b"ZVFSDSK1";

/// Current format version
pub const FORMAT_VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 64;

/// File table entry size in bytes
pub const ENTRY_SIZE: usize = 64;

/// Number of slots in the file table
pub const MAX_FILES: usize = 32;

/// Payloads are padded to a multiple of this many bytes
pub const DATA_ALIGNMENT: u64 = 64;

/// Width of the name field, including the terminating NUL
pub const NAME_FIELD_SIZE: usize = 32;

/// Maximum file name length in bytes (UTF-8)
pub const MAX_NAME_LENGTH: usize = NAME_FIELD_SIZE - 1;

/// The file table starts directly after the header
pub const FILE_TABLE_OFFSET: u32 = HEADER_SIZE as u32;

/// 64 + 32 * 64 = 2112
pub const DATA_START_OFFSET: u32 = (HEADER_SIZE + MAX_FILES * ENTRY_SIZE) as u32;

/// Entry flag for a live file
pub const FLAG_ACTIVE: u8 = 0;

/// Entry flag for a tombstoned file
pub const FLAG_DELETED: u8 = 1;

/// Round a payload length up to the next alignment boundary
pub fn padded_len(len: u64) -> u64 {
    len.div_ceil(DATA_ALIGNMENT) * DATA_ALIGNMENT
}

/// Encode a file name into its fixed-width, zero-padded field
pub fn encode_name(name: &str) -> Result<[u8; NAME_FIELD_SIZE]> {
    let bytes = name.as_bytes();
    if bytes.len() > MAX_NAME_LENGTH {
        return Err(ZvfsError::NameTooLong {
            name: name.to_string(),
            len: bytes.len(),
            max: MAX_NAME_LENGTH,
        });
    }

    let mut field = [0u8; NAME_FIELD_SIZE];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

/// Container header at offset 0
///
/// Structure (64 bytes, little-endian):
/// - Magic: 8 bytes
/// - Version, Flags: uint8 each
/// - Reserved: 2 bytes
/// - File Count, File Capacity, File Entry Size: uint16 each
/// - Reserved: 2 bytes
/// - File Table Offset, Data Start Offset, Next Free Offset, Free Entry Offset: uint32 each
/// - Deleted Files: uint16
/// - Reserved: 26 bytes
///
/// Reserved fields are carried on the value so that a decode/encode cycle
/// reproduces the original bytes exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 8],
    pub version: u8,
    pub flags: u8,
    pub reserved0: u16,
    pub file_count: u16,
    pub file_capacity: u16,
    pub file_entry_size: u16,
    pub reserved1: u16,
    pub file_table_offset: u32,
    pub data_start_offset: u32,
    pub next_free_offset: u32,
    pub free_entry_offset: u32,
    pub deleted_files: u16,
    pub reserved2: [u8; 26],
}

impl Header {
    pub fn new() -> Self {
        Self {
            magic: MAGIC_NUMBER,
            version: FORMAT_VERSION,
            flags: 0,
            reserved0: 0,
            file_count: 0,
            file_capacity: MAX_FILES as u16,
            file_entry_size: ENTRY_SIZE as u16,
            reserved1: 0,
            file_table_offset: FILE_TABLE_OFFSET,
            data_start_offset: DATA_START_OFFSET,
            next_free_offset: DATA_START_OFFSET,
            free_entry_offset: FILE_TABLE_OFFSET,
            deleted_files: 0,
            reserved2: [0u8; 26],
        }
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Read header from a reader
    ///
    /// Magic and version are not checked here; see [`Header::validate`].
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;

        let version = read_u8(&mut reader)?;
        let flags = read_u8(&mut reader)?;
        let reserved0 = read_u16(&mut reader)?;
        let file_count = read_u16(&mut reader)?;
        let file_capacity = read_u16(&mut reader)?;
        let file_entry_size = read_u16(&mut reader)?;
        let reserved1 = read_u16(&mut reader)?;
        let file_table_offset = read_u32(&mut reader)?;
        let data_start_offset = read_u32(&mut reader)?;
        let next_free_offset = read_u32(&mut reader)?;
        let free_entry_offset = read_u32(&mut reader)?;
        let deleted_files = read_u16(&mut reader)?;

        let mut reserved2 = [0u8; 26];
        reader.read_exact(&mut reserved2)?;

        Ok(Self {
            magic,
            version,
            flags,
            reserved0,
            file_count,
            file_capacity,
            file_entry_size,
            reserved1,
            file_table_offset,
            data_start_offset,
            next_free_offset,
            free_entry_offset,
            deleted_files,
            reserved2,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.magic);
        buf[8] = self.version;
        buf[9] = self.flags;
        buf[10..12].copy_from_slice(&self.reserved0.to_le_bytes());
        buf[12..14].copy_from_slice(&self.file_count.to_le_bytes());
        buf[14..16].copy_from_slice(&self.file_capacity.to_le_bytes());
        buf[16..18].copy_from_slice(&self.file_entry_size.to_le_bytes());
        buf[18..20].copy_from_slice(&self.reserved1.to_le_bytes());
        buf[20..24].copy_from_slice(&self.file_table_offset.to_le_bytes());
        buf[24..28].copy_from_slice(&self.data_start_offset.to_le_bytes());
        buf[28..32].copy_from_slice(&self.next_free_offset.to_le_bytes());
        buf[32..36].copy_from_slice(&self.free_entry_offset.to_le_bytes());
        buf[36..38].copy_from_slice(&self.deleted_files.to_le_bytes());
        buf[38..64].copy_from_slice(&self.reserved2);
        buf
    }

    /// Decode a header from exactly [`HEADER_SIZE`] bytes
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != HEADER_SIZE {
            return Err(ZvfsError::InvalidFormat(format!(
                "Header must be {} bytes, got {}",
                HEADER_SIZE,
                buf.len()
            )));
        }
        Self::read_from(buf)
    }

    /// Check magic, version, table geometry and slot counters against this format revision
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC_NUMBER {
            return Err(ZvfsError::InvalidMagic);
        }
        if self.version != FORMAT_VERSION {
            return Err(ZvfsError::UnsupportedVersion(self.version));
        }
        if self.file_capacity as usize != MAX_FILES
            || self.file_entry_size as usize != ENTRY_SIZE
            || self.file_table_offset != FILE_TABLE_OFFSET
            || self.data_start_offset != DATA_START_OFFSET
        {
            return Err(ZvfsError::InvalidFormat(format!(
                "Unexpected geometry: capacity={} entry_size={} table={} data={}",
                self.file_capacity,
                self.file_entry_size,
                self.file_table_offset,
                self.data_start_offset
            )));
        }
        if self.file_count as usize + self.deleted_files as usize > self.file_capacity as usize {
            return Err(ZvfsError::Corrupted(format!(
                "file_count {} + deleted_files {} exceeds capacity {}",
                self.file_count, self.deleted_files, self.file_capacity
            )));
        }
        Ok(())
    }

    /// Slots neither active nor tombstoned
    pub fn free_entries(&self) -> usize {
        (self.file_capacity as usize)
            .saturating_sub(self.file_count as usize + self.deleted_files as usize)
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// File table entry
///
/// Structure (64 bytes, little-endian):
/// - Name: 32 bytes, zero-padded UTF-8
/// - Start: uint32 (absolute offset of the payload)
/// - Length: uint32 (unpadded payload size)
/// - Type: uint8
/// - Flag: uint8 (0 = active, 1 = deleted)
/// - Reserved: 2 bytes
/// - Created: uint64 (unix seconds)
/// - Reserved: 12 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: [u8; NAME_FIELD_SIZE],
    pub start: u32,
    pub length: u32,
    pub kind: u8,
    pub flag: u8,
    pub reserved0: u16,
    pub created: u64,
    pub reserved1: [u8; 12],
}

impl FileEntry {
    /// An unused slot (all zeroes)
    pub fn empty() -> Self {
        Self {
            name: [0u8; NAME_FIELD_SIZE],
            start: 0,
            length: 0,
            kind: 0,
            flag: FLAG_ACTIVE,
            reserved0: 0,
            created: 0,
            reserved1: [0u8; 12],
        }
    }

    /// Create an active entry for a freshly stored payload
    pub fn new(name: [u8; NAME_FIELD_SIZE], start: u32, length: u32, created: u64) -> Self {
        Self {
            name,
            start,
            length,
            created,
            ..Self::empty()
        }
    }

    /// A slot is empty when its name is all zeroes
    pub fn is_empty(&self) -> bool {
        self.name.iter().all(|&b| b == 0)
    }

    pub fn is_deleted(&self) -> bool {
        self.flag == FLAG_DELETED
    }

    /// Non-empty and not tombstoned
    pub fn is_active(&self) -> bool {
        !self.is_empty() && !self.is_deleted()
    }

    /// Decode the name up to the first NUL
    pub fn file_name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_SIZE);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// End of the payload including alignment padding
    pub fn padded_end(&self) -> u64 {
        self.start as u64 + padded_len(self.length as u64)
    }

    /// Write entry to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Read entry from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut name = [0u8; NAME_FIELD_SIZE];
        reader.read_exact(&mut name)?;

        let start = read_u32(&mut reader)?;
        let length = read_u32(&mut reader)?;
        let kind = read_u8(&mut reader)?;
        let flag = read_u8(&mut reader)?;
        let reserved0 = read_u16(&mut reader)?;
        let created = read_u64(&mut reader)?;

        let mut reserved1 = [0u8; 12];
        reader.read_exact(&mut reserved1)?;

        Ok(Self {
            name,
            start,
            length,
            kind,
            flag,
            reserved0,
            created,
            reserved1,
        })
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0..32].copy_from_slice(&self.name);
        buf[32..36].copy_from_slice(&self.start.to_le_bytes());
        buf[36..40].copy_from_slice(&self.length.to_le_bytes());
        buf[40] = self.kind;
        buf[41] = self.flag;
        buf[42..44].copy_from_slice(&self.reserved0.to_le_bytes());
        buf[44..52].copy_from_slice(&self.created.to_le_bytes());
        buf[52..64].copy_from_slice(&self.reserved1);
        buf
    }

    /// Decode an entry from exactly [`ENTRY_SIZE`] bytes
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != ENTRY_SIZE {
            return Err(ZvfsError::InvalidFormat(format!(
                "File entry must be {} bytes, got {}",
                ENTRY_SIZE,
                buf.len()
            )));
        }
        Self::read_from(buf)
    }
}

impl Default for FileEntry {
    fn default() -> Self {
        Self::empty()
    }
}

// Helper functions for reading primitive types
fn read_u8<R: Read>(mut reader: R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16<R: Read>(mut reader: R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(mut reader: R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(DATA_START_OFFSET, 2112);
        assert_eq!(FILE_TABLE_OFFSET, 64);
        assert_eq!(MAX_NAME_LENGTH, 31);
    }

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 64);
        assert_eq!(padded_len(5), 64);
        assert_eq!(padded_len(64), 64);
        assert_eq!(padded_len(65), 128);
    }

    #[test]
    fn test_default_header_bytes() {
        let bytes = Header::new().to_bytes();
        assert_eq!(&bytes[0..8], b"ZVFSDSK1");
        assert_eq!(bytes[8], 1);
        // file_capacity at 14..16
        assert_eq!(u16::from_le_bytes([bytes[14], bytes[15]]), 32);
        // data_start_offset at 24..28
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 2112);
        // next_free_offset at 28..32
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 2112);
        // free_entry_offset at 32..36
        assert_eq!(u32::from_le_bytes(bytes[32..36].try_into().unwrap()), 64);
    }

    #[test]
    fn test_header_roundtrip_preserves_reserved() {
        let mut header = Header::new();
        header.file_count = 3;
        header.deleted_files = 2;
        header.next_free_offset = 2112 + 640;
        header.reserved0 = 0xBEEF;
        header.reserved1 = 0x1234;
        header.reserved2 = [0xA5; 26];

        let buf = header.to_bytes();
        assert_eq!(buf.len(), HEADER_SIZE);

        let parsed = Header::from_bytes(&buf).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.to_bytes(), buf);
    }

    #[test]
    fn test_entry_roundtrip() {
        let name = encode_name("exactly-thirty-one-bytes-long.x").unwrap();
        let entry = FileEntry::new(name, 2176, 64, 1_699_999_999);

        let mut buf = Vec::new();
        entry.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), ENTRY_SIZE);

        let parsed = FileEntry::from_bytes(&buf).unwrap();
        assert_eq!(parsed, entry);
        assert_eq!(parsed.file_name(), "exactly-thirty-one-bytes-long.x");
    }

    #[test]
    fn test_wrong_length_is_format_error() {
        assert!(matches!(
            Header::from_bytes(&[0u8; 63]),
            Err(ZvfsError::InvalidFormat(_))
        ));
        assert!(matches!(
            FileEntry::from_bytes(&[0u8; 65]),
            Err(ZvfsError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_decode_does_not_check_magic() {
        let mut bytes = Header::new().to_bytes();
        bytes[0] = 0xFF;
        let header = Header::from_bytes(&bytes).unwrap();
        assert!(matches!(header.validate(), Err(ZvfsError::InvalidMagic)));
    }

    #[test]
    fn test_validate_rejects_counter_overflow() {
        let mut header = Header::new();
        header.file_count = 1;
        header.deleted_files = u16::MAX;
        assert!(matches!(header.validate(), Err(ZvfsError::Corrupted(_))));

        header.deleted_files = 31;
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_encode_name_limits() {
        assert!(encode_name(&"a".repeat(31)).is_ok());
        assert!(matches!(
            encode_name(&"a".repeat(32)),
            Err(ZvfsError::NameTooLong { len: 32, max: 31, .. })
        ));
        // Multi-byte characters count by encoded length
        assert!(encode_name(&"é".repeat(16)).is_err());
    }

    #[test]
    fn test_entry_states() {
        let empty = FileEntry::empty();
        assert!(empty.is_empty());
        assert!(!empty.is_active());

        let mut entry = FileEntry::new(encode_name("a.txt").unwrap(), 2112, 5, 0);
        assert!(entry.is_active());
        entry.flag = FLAG_DELETED;
        assert!(entry.is_deleted());
        assert!(!entry.is_empty());
        assert!(!entry.is_active());
    }
}
