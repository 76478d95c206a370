use crate::container::format::{FileEntry, ENTRY_SIZE, FILE_TABLE_OFFSET, MAX_FILES, NAME_FIELD_SIZE};
use crate::error::Result;
use std::io::{Read, Write};

/// Fixed-capacity, index-addressed array of file entry slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTable {
    slots: Vec<FileEntry>,
}

impl FileTable {
    /// A table of [`MAX_FILES`] empty slots
    pub fn new() -> Self {
        Self {
            slots: vec![FileEntry::empty(); MAX_FILES],
        }
    }

    /// Build a table from already-ordered entries, zero-filling the remaining slots
    ///
    /// Entries beyond capacity are ignored.
    pub fn from_entries(entries: impl IntoIterator<Item = FileEntry>) -> Self {
        let mut slots: Vec<FileEntry> = entries.into_iter().take(MAX_FILES).collect();
        slots.resize(MAX_FILES, FileEntry::empty());
        Self { slots }
    }

    /// Read all slots sequentially
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut slots = Vec::with_capacity(MAX_FILES);
        for _ in 0..MAX_FILES {
            slots.push(FileEntry::read_from(&mut reader)?);
        }
        Ok(Self { slots })
    }

    /// Write all slots sequentially
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for entry in &self.slots {
            entry.write_to(&mut writer)?;
        }
        Ok(())
    }

    /// Absolute file offset of a slot
    pub fn slot_offset(index: usize) -> u64 {
        FILE_TABLE_OFFSET as u64 + (index * ENTRY_SIZE) as u64
    }

    pub fn get(&self, index: usize) -> Option<&FileEntry> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut FileEntry> {
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[FileEntry] {
        &self.slots
    }

    /// First empty slot in table order
    pub fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(FileEntry::is_empty)
    }

    /// First non-empty slot (active or tombstoned) holding this name
    pub fn find(&self, name: &[u8; NAME_FIELD_SIZE]) -> Option<usize> {
        self.slots
            .iter()
            .position(|e| !e.is_empty() && &e.name == name)
    }

    /// First active slot holding this name
    pub fn find_active(&self, name: &[u8; NAME_FIELD_SIZE]) -> Option<usize> {
        self.slots
            .iter()
            .position(|e| e.is_active() && &e.name == name)
    }

    /// Active entries with their slot index, in table order
    pub fn active(&self) -> impl Iterator<Item = (usize, &FileEntry)> {
        self.slots.iter().enumerate().filter(|(_, e)| e.is_active())
    }

    /// Tombstoned entries with their slot index, in table order
    pub fn deleted(&self) -> impl Iterator<Item = (usize, &FileEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_empty() && e.is_deleted())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted().count()
    }

    pub fn empty_count(&self) -> usize {
        self.slots.iter().filter(|e| e.is_empty()).count()
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}
