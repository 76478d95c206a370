use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::conflict::Conflict;
use crate::container::format::{
    encode_name, padded_len, FileEntry, Header, DATA_ALIGNMENT, DATA_START_OFFSET, FILE_TABLE_OFFSET,
    FLAG_DELETED, HEADER_SIZE, MAX_FILES,
};
use crate::container::table::FileTable;
use crate::error::{Result, ZvfsError};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Table region size in bytes
const TABLE_SIZE: usize = DATA_START_OFFSET as usize - HEADER_SIZE;

/// A listed file (active entries only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub slot: usize,
    pub name: String,
    pub length: u32,
    pub created: u64,
}

/// Summary counters for a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub path: PathBuf,
    pub file_count: usize,
    pub free_entries: usize,
    pub deleted_files: usize,
    pub next_free_offset: u32,
    pub total_size: u64,
}

impl ContainerInfo {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Outcome of a defragmentation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DefragReport {
    /// Tombstoned entries discarded
    pub removed_files: usize,
    /// Sum of the unpadded lengths of the discarded entries
    pub freed_bytes: u64,
}

/// Handle to a container file
///
/// The handle only remembers where the container lives. Every operation
/// opens the file, re-reads the header and table, and writes back only what
/// it changed, so state is never cached between calls.
pub struct Container {
    path: PathBuf,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl Container {
    /// Create a new, empty container
    pub fn create<P: AsRef<Path>>(path: P, conflict: Conflict) -> Result<Self> {
        Self::create_with_config(path, conflict, EngineConfig::default())
    }

    /// Create a new, empty container with explicit engine options
    pub fn create_with_config<P: AsRef<Path>>(
        path: P,
        conflict: Conflict,
        config: EngineConfig,
    ) -> Result<Self> {
        let path = conflict.resolve(path.as_ref())?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Header::new().write_to(&mut file)?;
        FileTable::new().write_to(&mut file)?;
        file.flush()?;
        if config.sync_writes {
            file.sync_all()?;
        }

        info!(path = %path.display(), "Created container");

        Ok(Self {
            path,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Open an existing container
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, EngineConfig::default())
    }

    /// Open an existing container with explicit engine options
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        let container = Self {
            path: path.as_ref().to_path_buf(),
            config,
            clock: Arc::new(SystemClock),
        };

        let mut file = container.open_file(false)?;
        Self::load(&mut file)?;

        if container.config.verify_on_open {
            if let Err(e) = container.verify() {
                warn!(path = %container.path.display(), error = %e, "Container failed verification");
                return Err(e);
            }
        }

        Ok(container)
    }

    /// Replace the time source used for `created` timestamps
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Location of the container file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Engine options this handle was opened with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read the current header
    pub fn header(&self) -> Result<Header> {
        let mut file = self.open_file(false)?;
        Ok(Self::load(&mut file)?.0)
    }

    /// Read the current file table
    pub fn table(&self) -> Result<FileTable> {
        let mut file = self.open_file(false)?;
        Ok(Self::load(&mut file)?.1)
    }

    /// Store a payload under `name`, returning the slot it was placed in
    ///
    /// Names of tombstoned files stay reserved until the next defragmentation.
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        let encoded = encode_name(name)?;

        let mut file = self.open_file(true)?;
        let (mut header, table) = Self::load(&mut file)?;

        if table.find(&encoded).is_some() {
            return Err(ZvfsError::AlreadyExists(name.to_string()));
        }

        let slot = table
            .first_empty()
            .ok_or(ZvfsError::CapacityExceeded(MAX_FILES))?;

        let length = data.len() as u64;
        let padded = padded_len(length);
        let start = header.next_free_offset;
        let end = start as u64 + padded;
        if length > u32::MAX as u64 || end > u32::MAX as u64 {
            return Err(ZvfsError::PayloadTooLarge(length));
        }

        let file_count = Self::bump(header.file_count, "file_count")?;

        // Data first, then entry, then header: a crash in between can only
        // orphan bytes past the cursor or leave an uncounted entry.
        file.seek(SeekFrom::Start(start as u64))?;
        file.write_all(data)?;
        file.write_all(&vec![0u8; (padded - length) as usize])?;

        let entry = FileEntry::new(encoded, start, length as u32, self.clock.now());
        file.seek(SeekFrom::Start(FileTable::slot_offset(slot)))?;
        entry.write_to(&mut file)?;

        header.file_count = file_count;
        header.next_free_offset = end as u32;
        header.free_entry_offset = Self::first_empty_offset(&table, Some(slot));
        Self::write_header(&mut file, &header)?;
        self.finish(&file)?;

        debug!(name, slot, start, length, "Added file");
        Ok(slot)
    }

    /// Store a file from disk under `name`
    pub fn add_from_disk<P: AsRef<Path>>(&mut self, name: &str, disk_path: P) -> Result<usize> {
        let data = std::fs::read(disk_path)?;
        self.add(name, &data)
    }

    /// Tombstone a file; its payload and slot remain until defragmentation
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let encoded = encode_name(name)?;

        let mut file = self.open_file(true)?;
        let (mut header, mut table) = Self::load(&mut file)?;

        let slot = table
            .find(&encoded)
            .ok_or_else(|| ZvfsError::NotFound(name.to_string()))?;

        let entry = table
            .get_mut(slot)
            .ok_or_else(|| ZvfsError::NotFound(name.to_string()))?;
        if entry.is_deleted() {
            return Err(ZvfsError::NotFound(format!("{} (already deleted)", name)));
        }

        let file_count = header.file_count.checked_sub(1).ok_or_else(|| {
            ZvfsError::Corrupted("file_count is zero while an active entry exists".to_string())
        })?;
        let deleted_files = Self::bump(header.deleted_files, "deleted_files")?;

        entry.flag = FLAG_DELETED;
        file.seek(SeekFrom::Start(FileTable::slot_offset(slot)))?;
        entry.write_to(&mut file)?;

        header.file_count = file_count;
        header.deleted_files = deleted_files;
        Self::write_header(&mut file, &header)?;
        self.finish(&file)?;

        debug!(name, slot, "Removed file");
        Ok(())
    }

    /// Read the payload of an active file
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let encoded = encode_name(name)?;

        let mut file = self.open_file(false)?;
        let (_, table) = Self::load(&mut file)?;

        let entry = table
            .find_active(&encoded)
            .and_then(|slot| table.get(slot))
            .ok_or_else(|| ZvfsError::NotFound(name.to_string()))?;

        Self::read_payload(&mut file, entry)
    }

    /// Read the payload of an active file as text
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    pub fn read_to_string(&self, name: &str) -> Result<String> {
        let data = self.read(name)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Write the payload of an active file to `destination`
    ///
    /// The file is written to a temporary sibling and moved into place, so a
    /// failed extraction never leaves a partial destination behind. Returns
    /// the path actually written.
    pub fn extract<P: AsRef<Path>>(
        &self,
        name: &str,
        destination: P,
        conflict: Conflict,
    ) -> Result<PathBuf> {
        let data = self.read(name)?;
        let target = conflict.resolve(destination.as_ref())?;

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&data)?;
        temp.flush()?;
        temp.persist(&target).map_err(|e| ZvfsError::Io(e.error))?;

        debug!(name, destination = %target.display(), bytes = data.len(), "Extracted file");
        Ok(target)
    }

    /// Active files in table order
    pub fn list(&self) -> Result<Vec<ListEntry>> {
        let table = self.table()?;

        let entries: Vec<ListEntry> = table
            .active()
            .map(|(slot, entry)| ListEntry {
                slot,
                name: entry.file_name(),
                length: entry.length,
                created: entry.created,
            })
            .collect();

        if entries.is_empty() {
            return Err(ZvfsError::EmptyContainer);
        }
        Ok(entries)
    }

    pub fn info(&self) -> Result<ContainerInfo> {
        let mut file = self.open_file(false)?;
        let (header, _) = Self::load(&mut file)?;

        Ok(ContainerInfo {
            path: self.path.clone(),
            file_count: header.file_count as usize,
            free_entries: header.free_entries(),
            deleted_files: header.deleted_files as usize,
            next_free_offset: header.next_free_offset,
            total_size: file.metadata()?.len(),
        })
    }

    /// Cross-check the header counters against the table and the data region
    pub fn verify(&self) -> Result<()> {
        let mut file = self.open_file(false)?;
        let (header, table) = Self::load(&mut file)?;
        let file_len = file.metadata()?.len();

        let active = table.active_count();
        let deleted = table.deleted_count();

        if header.file_count as usize + header.deleted_files as usize > MAX_FILES {
            return Err(ZvfsError::Corrupted(format!(
                "file_count {} + deleted_files {} exceeds capacity {}",
                header.file_count, header.deleted_files, MAX_FILES
            )));
        }
        if active != header.file_count as usize {
            return Err(ZvfsError::Corrupted(format!(
                "Header counts {} files but table holds {} active entries",
                header.file_count, active
            )));
        }
        if deleted != header.deleted_files as usize {
            return Err(ZvfsError::Corrupted(format!(
                "Header counts {} deleted files but table holds {} tombstones",
                header.deleted_files, deleted
            )));
        }

        let cursor = header.next_free_offset as u64;
        if cursor < header.data_start_offset as u64 || cursor % DATA_ALIGNMENT != 0 {
            return Err(ZvfsError::Corrupted(format!(
                "Misplaced append cursor: {}",
                cursor
            )));
        }
        if file_len < cursor {
            return Err(ZvfsError::Corrupted(format!(
                "Container is {} bytes but cursor is at {}",
                file_len, cursor
            )));
        }

        let mut names = HashSet::new();
        let mut spans = Vec::new();
        for (slot, entry) in table.slots().iter().enumerate() {
            if entry.is_empty() {
                continue;
            }
            if !names.insert(entry.name) {
                return Err(ZvfsError::Corrupted(format!(
                    "Duplicate name in slot {}: {}",
                    slot,
                    entry.file_name()
                )));
            }
            let start = entry.start as u64;
            if start < header.data_start_offset as u64 || start + entry.length as u64 > cursor {
                return Err(ZvfsError::Corrupted(format!(
                    "Entry {} in slot {} lies outside the data region",
                    entry.file_name(),
                    slot
                )));
            }
            if entry.length > 0 {
                spans.push((start, entry.padded_end(), slot));
            }
        }

        spans.sort_unstable();
        for pair in spans.windows(2) {
            let (_, prev_end, prev_slot) = pair[0];
            let (next_start, _, next_slot) = pair[1];
            if prev_end > next_start {
                return Err(ZvfsError::Corrupted(format!(
                    "Payloads of slots {} and {} overlap",
                    prev_slot, next_slot
                )));
            }
        }

        Ok(())
    }

    /// Discard tombstoned entries and compact both the table and the data region
    ///
    /// Surviving payloads are moved towards the start of the data region in
    /// ascending offset order, so every write lands at or before the payload's
    /// own previous position and never clobbers data not yet moved. Slot
    /// indices and offsets of surviving files change.
    pub fn defragment(&mut self) -> Result<DefragReport> {
        let mut file = self.open_file(true)?;
        let (mut header, table) = Self::load(&mut file)?;

        let mut keep: Vec<FileEntry> = table.active().map(|(_, e)| e.clone()).collect();
        let report = DefragReport {
            removed_files: table.deleted_count(),
            freed_bytes: table.deleted().map(|(_, e)| e.length as u64).sum(),
        };

        keep.sort_by_key(|e| e.start);

        // Nothing is moved until every survivor is known to be readable
        let limit = (header.next_free_offset as u64).min(file.metadata()?.len());
        Self::check_survivors(&keep, header.data_start_offset as u64, limit)?;

        let mut cursor = header.data_start_offset as u64;
        for entry in &mut keep {
            let length = entry.length as u64;
            let padded = padded_len(length);

            if entry.start as u64 != cursor {
                let data = Self::read_payload(&mut file, entry)?;
                file.seek(SeekFrom::Start(cursor))?;
                file.write_all(&data)?;
            } else {
                file.seek(SeekFrom::Start(cursor + length))?;
            }
            file.write_all(&vec![0u8; (padded - length) as usize])?;

            entry.start = cursor as u32;
            cursor += padded;
        }

        let kept = keep.len();
        let compacted = FileTable::from_entries(keep);
        file.seek(SeekFrom::Start(FILE_TABLE_OFFSET as u64))?;
        compacted.write_to(&mut file)?;

        header.file_count = kept as u16;
        header.deleted_files = 0;
        header.next_free_offset = cursor as u32;
        header.free_entry_offset = FileTable::slot_offset(kept) as u32;
        Self::write_header(&mut file, &header)?;

        if self.config.truncate_on_defragment {
            file.set_len(cursor)?;
        }
        self.finish(&file)?;

        info!(
            path = %self.path.display(),
            kept,
            removed = report.removed_files,
            freed_bytes = report.freed_bytes,
            next_free_offset = cursor,
            "Defragmented container"
        );
        Ok(report)
    }

    fn open_file(&self, write: bool) -> Result<File> {
        Ok(OpenOptions::new().read(true).write(write).open(&self.path)?)
    }

    /// Read and validate header and table
    fn load(file: &mut File) -> Result<(Header, FileTable)> {
        file.seek(SeekFrom::Start(0))?;

        let mut buf = vec![0u8; HEADER_SIZE + TABLE_SIZE];
        file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ZvfsError::InvalidFormat("Container is shorter than header and table".to_string())
            } else {
                ZvfsError::Io(e)
            }
        })?;

        let header = Header::from_bytes(&buf[..HEADER_SIZE])?;
        header.validate()?;
        let table = FileTable::read_from(&buf[HEADER_SIZE..])?;

        Ok((header, table))
    }

    fn read_payload(file: &mut File, entry: &FileEntry) -> Result<Vec<u8>> {
        // Check before allocating: a damaged length must not size the buffer
        let end = entry.start as u64 + entry.length as u64;
        if end > file.metadata()?.len() {
            return Err(ZvfsError::Corrupted(format!(
                "Payload of {} extends past end of container",
                entry.file_name()
            )));
        }

        file.seek(SeekFrom::Start(entry.start as u64))?;
        let mut data = vec![0u8; entry.length as usize];
        file.read_exact(&mut data)?;
        Ok(data)
    }

    fn write_header(file: &mut File, header: &Header) -> Result<()> {
        file.seek(SeekFrom::Start(0))?;
        header.write_to(file)
    }

    /// Offset of the first empty slot, treating `taken` as occupied
    ///
    /// A full table points just past the last slot.
    fn first_empty_offset(table: &FileTable, taken: Option<usize>) -> u32 {
        let slot = table
            .slots()
            .iter()
            .enumerate()
            .position(|(i, e)| e.is_empty() && Some(i) != taken)
            .unwrap_or(MAX_FILES);
        FileTable::slot_offset(slot) as u32
    }

    /// Survivors, sorted by start, must lie inside the data region and not overlap
    fn check_survivors(keep: &[FileEntry], data_start: u64, limit: u64) -> Result<()> {
        let mut prev_end = data_start;
        for entry in keep {
            let start = entry.start as u64;
            if start < data_start || start + entry.length as u64 > limit {
                return Err(ZvfsError::Corrupted(format!(
                    "Entry {} lies outside the data region",
                    entry.file_name()
                )));
            }
            if entry.length == 0 {
                continue;
            }
            if start < prev_end {
                return Err(ZvfsError::Corrupted(format!(
                    "Payload of {} overlaps a preceding file",
                    entry.file_name()
                )));
            }
            prev_end = entry.padded_end();
        }
        Ok(())
    }

    fn bump(counter: u16, field: &str) -> Result<u16> {
        counter
            .checked_add(1)
            .filter(|&n| n as usize <= MAX_FILES)
            .ok_or_else(|| ZvfsError::Corrupted(format!("{} would exceed capacity", field)))
    }

    fn finish(&self, file: &File) -> Result<()> {
        if self.config.sync_writes {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}
