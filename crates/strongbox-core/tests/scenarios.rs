//! End-to-end scenarios against mounted images.

mod common;

use common::{allocated_set, create, reopen, PAYLOAD};
use std::io::{Read, Seek, SeekFrom, Write};
use strongbox_core::block::FileBlock;
use strongbox_core::chain::BlockIterator;
use strongbox_core::folder::compound::CompoundFolder;
use strongbox_core::{EntryType, FolderRemovalMode, OpenDisposition};

fn big_string() -> Vec<u8> {
    b"Hello, World!".repeat(1000)
}

#[test]
fn create_and_read_back_a_small_file() {
    let (_dir, path, engine) = create(2048);
    engine.add_file("/hello.txt").unwrap();
    {
        let mut device = engine
            .open_file("/hello.txt", OpenDisposition::append())
            .unwrap();
        device.write_all(b"Hello, world!").unwrap();
    }
    engine.close().unwrap();

    let engine = reopen(&path);
    let mut device = engine
        .open_file("/hello.txt", OpenDisposition::read_only())
        .unwrap();
    let mut contents = vec![0u8; 13];
    device.read_exact(&mut contents).unwrap();
    assert_eq!(contents, b"Hello, world!");

    let info = engine.get_info("/hello.txt").unwrap();
    assert_eq!(info.size, 13);

    let block = FileBlock::load(
        engine.io().clone(),
        info.first_block,
        OpenDisposition::read_only(),
    )
    .unwrap();
    assert_eq!(block.bytes_written(), 13);
    assert_eq!(block.next_index(), block.index());
}

#[test]
fn cross_block_write_builds_a_full_chain() {
    let (_dir, path, engine) = create(2048);
    let data = big_string();
    assert_eq!(data.len(), 13000);

    engine.add_file("/big.bin").unwrap();
    let before = allocated_set(&engine);
    {
        let mut device = engine
            .open_file("/big.bin", OpenDisposition::append())
            .unwrap();
        device.write_all(&data).unwrap();
    }
    // the file started with one block; the write grew its chain to 26
    let after = allocated_set(&engine);
    assert_eq!(after.len() - before.len(), 25);
    engine.close().unwrap();

    let engine = reopen(&path);
    let info = engine.get_info("/big.bin").unwrap();
    assert_eq!(info.size, 13000);

    let chain: Vec<FileBlock> = BlockIterator::new(
        engine.io().clone(),
        info.first_block,
        OpenDisposition::read_only(),
    )
    .collect::<Result<_, _>>()
    .unwrap();
    assert_eq!(chain.len(), 26);
    assert_eq!(
        chain.last().unwrap().bytes_written() as u64,
        13000 - 25 * PAYLOAD
    );
    let allocated = allocated_set(&engine);
    assert!(chain.iter().all(|b| allocated.contains(&b.index())));

    let mut device = engine
        .open_file("/big.bin", OpenDisposition::read_only())
        .unwrap();
    let mut contents = Vec::new();
    device.read_to_end(&mut contents).unwrap();
    assert_eq!(contents, data);
}

#[test]
fn seek_from_end_overwrite() {
    let (_dir, path, engine) = create(2048);
    engine.add_file("/seek.bin").unwrap();
    {
        let mut device = engine
            .open_file("/seek.bin", OpenDisposition::append())
            .unwrap();
        device.write_all(&big_string()).unwrap();
    }
    engine.close().unwrap();

    let engine = reopen(&path);
    {
        let mut device = engine
            .open_file("/seek.bin", OpenDisposition::overwrite())
            .unwrap();
        device.seek(SeekFrom::End(-548)).unwrap();
        device.write_all(b"goodbye!").unwrap();
    }
    assert_eq!(engine.get_info("/seek.bin").unwrap().size, 13000);

    let mut device = engine
        .open_file("/seek.bin", OpenDisposition::read_only())
        .unwrap();
    device.seek(SeekFrom::Start(12452)).unwrap();
    let mut window = [0u8; 8];
    device.read_exact(&mut window).unwrap();
    assert_eq!(&window, b"goodbye!");
}

#[test]
fn truncate_keeps_a_prefix() {
    let (_dir, path, engine) = create(2048);
    let data = big_string();
    engine.add_file("/trunc.bin").unwrap();
    {
        let mut device = engine
            .open_file("/trunc.bin", OpenDisposition::append())
            .unwrap();
        device.write_all(&data).unwrap();
    }
    engine.truncate_file("/trunc.bin", 37).unwrap();
    engine.close().unwrap();

    let engine = reopen(&path);
    let info = engine.get_info("/trunc.bin").unwrap();
    assert_eq!(info.size, 37);

    let chain: Vec<FileBlock> = BlockIterator::new(
        engine.io().clone(),
        info.first_block,
        OpenDisposition::read_only(),
    )
    .collect::<Result<_, _>>()
    .unwrap();
    assert_eq!(chain.len(), 1);

    let mut device = engine
        .open_file("/trunc.bin", OpenDisposition::read_only())
        .unwrap();
    let mut contents = Vec::new();
    device.read_to_end(&mut contents).unwrap();
    assert_eq!(contents, &data[..37]);
}

#[test]
fn root_folder_buckets_many_entries() {
    let (_dir, path, engine) = create(2048);
    for i in 0..120 {
        engine.add_file(&format!("/f{i}")).unwrap();
    }
    engine.close().unwrap();

    let engine = reopen(&path);
    let entries = engine.list_folder("/").unwrap();
    assert_eq!(entries.len(), 120);
    let mut names: Vec<String> = entries.into_iter().map(|e| e.filename).collect();
    names.sort();
    let mut expected: Vec<String> = (0..120).map(|i| format!("f{i}")).collect();
    expected.sort();
    assert_eq!(names, expected);

    let io = engine.io().clone();
    let root = CompoundFolder::load(io.clone(), io.root_block, "root").unwrap();
    assert!(root.bucket_count() >= 3);
}

fn build_tree(engine: &strongbox_core::Strongbox) {
    engine.add_file("/top").unwrap();
    engine.add_folder("/a").unwrap();
    engine.add_file("/a/one").unwrap();
    engine.add_file("/a/two").unwrap();
    engine.add_folder("/a/deep").unwrap();
    engine.add_file("/a/deep/three").unwrap();
    engine.add_folder("/b").unwrap();
    engine.add_file("/b/four").unwrap();
    for (path, content) in [
        ("/top", "alpha".as_bytes().to_vec()),
        ("/a/one", b"beta".repeat(200)),
        ("/a/two", b"gamma".to_vec()),
        ("/a/deep/three", b"delta".repeat(400)),
        ("/b/four", b"epsilon".to_vec()),
    ] {
        let mut device = engine.open_file(path, OpenDisposition::append()).unwrap();
        device.write_all(&content).unwrap();
    }
}

#[test]
fn delete_all_round_trip_restores_the_allocation_set() {
    let (_dir, _path, engine) = create(2048);
    build_tree(&engine);
    let populated = allocated_set(&engine);

    engine.remove_file("/top").unwrap();
    engine.remove_folder("/a", FolderRemovalMode::Recursive).unwrap();
    engine.remove_folder("/b", FolderRemovalMode::Recursive).unwrap();

    let emptied = allocated_set(&engine);
    assert_eq!(emptied.into_iter().collect::<Vec<_>>(), vec![0]);

    build_tree(&engine);
    assert_eq!(allocated_set(&engine), populated);
}

#[test]
fn rename_across_folders_preserves_identity() {
    let (_dir, path, engine) = create(2048);
    engine.add_folder("/a").unwrap();
    engine.add_folder("/b").unwrap();
    engine.add_file("/a/x").unwrap();
    {
        let mut device = engine.open_file("/a/x", OpenDisposition::append()).unwrap();
        device.write_all(b"travelling bytes").unwrap();
    }
    let before = engine.get_info("/a/x").unwrap();

    engine.rename_entry("/a/x", "/b/y").unwrap();
    assert!(!engine.file_exists("/a/x").unwrap());
    assert!(engine.file_exists("/b/y").unwrap());

    let after = engine.get_info("/b/y").unwrap();
    assert_eq!(after.first_block, before.first_block);
    assert_eq!(after.entry_type, EntryType::File);
    engine.close().unwrap();

    let engine = reopen(&path);
    let mut device = engine
        .open_file("/b/y", OpenDisposition::read_only())
        .unwrap();
    let mut contents = Vec::new();
    device.read_to_end(&mut contents).unwrap();
    assert_eq!(contents, b"travelling bytes");
}

#[test]
fn remove_then_re_add_reuses_the_same_blocks() {
    let (_dir, _path, engine) = create(2048);
    // a second entry keeps the bucket alive across the removal
    engine.add_file("/anchor").unwrap();
    engine.add_file("/recycled").unwrap();
    {
        let mut device = engine
            .open_file("/recycled", OpenDisposition::append())
            .unwrap();
        device.write_all(&b"x".repeat(1300)).unwrap();
    }
    let info = engine.get_info("/recycled").unwrap();
    let chain_before: Vec<u64> = BlockIterator::new(
        engine.io().clone(),
        info.first_block,
        OpenDisposition::read_only(),
    )
    .map(|b| b.unwrap().index())
    .collect();

    engine.remove_file("/recycled").unwrap();
    engine.add_file("/recycled").unwrap();
    {
        let mut device = engine
            .open_file("/recycled", OpenDisposition::append())
            .unwrap();
        device.write_all(&b"x".repeat(1300)).unwrap();
    }
    let info = engine.get_info("/recycled").unwrap();
    let chain_after: Vec<u64> = BlockIterator::new(
        engine.io().clone(),
        info.first_block,
        OpenDisposition::read_only(),
    )
    .map(|b| b.unwrap().index())
    .collect();

    assert_eq!(chain_before, chain_after);
}

#[test]
fn mounting_without_mutation_leaves_the_image_untouched() {
    let (_dir, path, engine) = create(256);
    engine.add_file("/settled").unwrap();
    {
        let mut device = engine
            .open_file("/settled", OpenDisposition::append())
            .unwrap();
        device.write_all(b"steady state").unwrap();
    }
    engine.close().unwrap();
    let image_before = std::fs::read(&path).unwrap();

    {
        let engine = reopen(&path);
        assert!(engine.file_exists("/settled").unwrap());
        let mut device = engine
            .open_file("/settled", OpenDisposition::read_only())
            .unwrap();
        let mut contents = Vec::new();
        device.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"steady state");
        engine.close().unwrap();
    }

    let image_after = std::fs::read(&path).unwrap();
    assert_eq!(image_before, image_after);
}
