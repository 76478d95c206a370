//! Crash recovery tests
//!
//! Writes within one operation are not atomic. These tests simulate an
//! interrupted add at each stage and check what verification and
//! defragmentation make of the result.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use tempfile::TempDir;
use zvfs::container::encode_name;
use zvfs::{Conflict, Container, FileEntry, FileTable, ZvfsError};

/// Helper: Create a container holding one file
fn create_test_container() -> (TempDir, Container) {
    let dir = TempDir::new().unwrap();
    let mut container = Container::create(dir.path().join("disk.zvfs"), Conflict::Abort).unwrap();
    container.add("first.txt", b"first").unwrap();
    (dir, container)
}

fn write_at(path: &std::path::Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

#[test]
fn test_crash_after_data_write() {
    let (_dir, mut container) = create_test_container();

    // Payload appended past the cursor, no entry and no header update
    write_at(container.path(), 2176, &[0x5A; 64]);

    container.verify().unwrap();
    assert_eq!(container.list().unwrap().len(), 1);

    // The next add overwrites the orphaned bytes
    container.add("second.txt", b"second").unwrap();
    assert_eq!(container.read("second.txt").unwrap(), b"second");
    container.verify().unwrap();
}

#[test]
fn test_crash_after_entry_write() {
    let (_dir, mut container) = create_test_container();

    // Payload and entry written, header still counts one file
    write_at(container.path(), 2176, b"second");
    let entry = FileEntry::new(encode_name("second.txt").unwrap(), 2176, 6, 0);
    write_at(container.path(), FileTable::slot_offset(1), &entry.to_bytes());

    assert!(matches!(container.verify(), Err(ZvfsError::Corrupted(_))));

    // The half-added name is already reserved
    assert!(matches!(
        container.add("second.txt", b"again"),
        Err(ZvfsError::AlreadyExists(_))
    ));
}

#[test]
fn test_reads_never_modify_container() {
    let (dir, container) = create_test_container();
    let before = std::fs::read(container.path()).unwrap();

    container.read("first.txt").unwrap();
    container.list().unwrap();
    container.info().unwrap();
    container.verify().unwrap();
    container
        .extract("first.txt", dir.path().join("out.txt"), Conflict::Abort)
        .unwrap();

    assert_eq!(std::fs::read(container.path()).unwrap(), before);
}
