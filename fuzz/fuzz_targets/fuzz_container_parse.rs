#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;
use zvfs::{Container, FileEntry, Header};

fuzz_target!(|data: &[u8]| {
    // Record decoding must never panic, whatever the length
    let _ = Header::from_bytes(data);
    let _ = FileEntry::from_bytes(data);

    let mut temp_file = match NamedTempFile::new() {
        Ok(f) => f,
        Err(_) => return,
    };
    if temp_file.write_all(data).is_err() || temp_file.flush().is_err() {
        return;
    }

    let mut container = match Container::open(temp_file.path()) {
        Ok(c) => c,
        Err(_) => return, // Expected for invalid data
    };

    let _ = container.verify();
    let _ = container.info();

    if let Ok(entries) = container.list() {
        for entry in &entries {
            let _ = container.read(&entry.name);
        }
    }

    let _ = container.read("");
    let _ = container.read("missing.txt");

    // Mutations on a damaged container must fail cleanly, never panic
    let _ = container.add("fuzz.bin", &data[..data.len().min(256)]);
    if let Ok(entries) = container.list() {
        if let Some(first) = entries.first() {
            let _ = container.remove(&first.name);
        }
    }
    let _ = container.remove("fuzz.bin");
    let _ = container.defragment();
    let _ = container.verify();
});
