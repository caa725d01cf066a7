//! Namespace behaviour across nested trees, renames and remounts.

mod common;

use common::{create, reopen};
use std::io::{Read, Write};
use strongbox_core::{extract_folder, EntryType, FolderRemovalMode, OpenDisposition, StrongboxError};

#[test]
fn nested_tree_survives_a_remount() {
    let (_dir, path, engine) = create(512);
    engine.add_folder("/projects").unwrap();
    engine.add_folder("/projects/alpha").unwrap();
    engine.add_folder("/projects/alpha/src").unwrap();
    engine.add_file("/projects/alpha/src/main.rs").unwrap();
    {
        let mut device = engine
            .open_file("/projects/alpha/src/main.rs", OpenDisposition::append())
            .unwrap();
        device.write_all(b"fn main() {}\n").unwrap();
    }
    engine.close().unwrap();

    let engine = reopen(&path);
    assert!(engine.folder_exists("/projects/alpha/src").unwrap());
    let info = engine.get_info("/projects/alpha/src/main.rs").unwrap();
    assert_eq!(info.entry_type, EntryType::File);
    assert_eq!(info.size, 13);

    let mut device = engine
        .open_file("/projects/alpha/src/main.rs", OpenDisposition::read_only())
        .unwrap();
    let mut contents = String::new();
    device.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "fn main() {}\n");
}

#[test]
fn renaming_a_folder_moves_its_subtree() {
    let (_dir, _path, engine) = create(512);
    engine.add_folder("/old").unwrap();
    engine.add_file("/old/inner").unwrap();
    {
        let mut device = engine
            .open_file("/old/inner", OpenDisposition::append())
            .unwrap();
        device.write_all(b"carried along").unwrap();
    }

    engine.rename_entry("/old", "/new").unwrap();
    assert!(!engine.folder_exists("/old").unwrap());
    assert!(engine.folder_exists("/new").unwrap());

    let mut device = engine
        .open_file("/new/inner", OpenDisposition::read_only())
        .unwrap();
    let mut contents = String::new();
    device.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "carried along");
}

#[test]
fn rename_rejects_an_occupied_destination() {
    let (_dir, _path, engine) = create(256);
    engine.add_file("/src").unwrap();
    engine.add_file("/dst").unwrap();
    assert!(matches!(
        engine.rename_entry("/src", "/dst"),
        Err(StrongboxError::AlreadyExists)
    ));
    // both entries are untouched
    assert!(engine.file_exists("/src").unwrap());
    assert!(engine.file_exists("/dst").unwrap());
}

#[test]
fn rename_of_a_missing_source_is_not_found() {
    let (_dir, _path, engine) = create(256);
    assert!(matches!(
        engine.rename_entry("/ghost", "/anywhere"),
        Err(StrongboxError::NotFound)
    ));
}

#[test]
fn must_be_empty_removal_succeeds_on_an_empty_folder() {
    let (_dir, _path, engine) = create(256);
    engine.add_folder("/vacant").unwrap();
    engine
        .remove_folder("/vacant", FolderRemovalMode::MustBeEmpty)
        .unwrap();
    assert!(!engine.folder_exists("/vacant").unwrap());
}

#[test]
fn listing_reports_sizes_and_types() {
    let (_dir, _path, engine) = create(256);
    engine.add_folder("/d").unwrap();
    engine.add_file("/plain").unwrap();
    {
        let mut device = engine
            .open_file("/plain", OpenDisposition::append())
            .unwrap();
        device.write_all(&[7u8; 1234]).unwrap();
    }

    let mut entries = engine.list_folder("/").unwrap();
    entries.sort_by(|a, b| a.filename.cmp(&b.filename));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].filename, "d");
    assert_eq!(entries[0].entry_type, EntryType::Folder);
    assert_eq!(entries[1].filename, "plain");
    assert_eq!(entries[1].entry_type, EntryType::File);
    assert_eq!(entries[1].size, 1234);
}

#[test]
fn extraction_round_trips_through_the_host() {
    let (_dir, _path, engine) = create(512);
    engine.add_folder("/export").unwrap();
    engine.add_file("/export/data.bin").unwrap();
    engine.add_folder("/export/sub").unwrap();
    engine.add_file("/export/sub/notes.txt").unwrap();
    let payload = b"exported".repeat(500);
    {
        let mut device = engine
            .open_file("/export/data.bin", OpenDisposition::append())
            .unwrap();
        device.write_all(&payload).unwrap();
        let mut device = engine
            .open_file("/export/sub/notes.txt", OpenDisposition::append())
            .unwrap();
        device.write_all(b"remember").unwrap();
    }

    let out = tempfile::TempDir::new().unwrap();
    extract_folder(&engine, "/export", out.path()).unwrap();
    assert_eq!(std::fs::read(out.path().join("data.bin")).unwrap(), payload);
    assert_eq!(
        std::fs::read(out.path().join("sub/notes.txt")).unwrap(),
        b"remember"
    );
}

#[test]
fn deep_paths_fail_cleanly_when_a_component_is_a_file() {
    let (_dir, _path, engine) = create(256);
    engine.add_file("/obstacle").unwrap();
    assert!(matches!(
        engine.add_file("/obstacle/child"),
        Err(StrongboxError::NotFound)
    ));
    assert!(!engine.file_exists("/obstacle/child").unwrap());
}
