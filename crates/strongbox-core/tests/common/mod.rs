//! Helpers shared by the integration suites: small-block images with cheap
//! key derivation so the block-chain machinery gets exercised quickly.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use strongbox_core::cipher::KdfParams;
use strongbox_core::container::{self, ContainerOptions};
use strongbox_core::stream::ImageStream;
use strongbox_core::{bitmap, Strongbox};
use tempfile::TempDir;

pub const PASSWORD: &[u8] = b"integration password";
pub const BLOCK_SIZE: u64 = 512;
/// Payload bytes per block at [`BLOCK_SIZE`].
pub const PAYLOAD: u64 = 500;

pub fn options() -> ContainerOptions {
    ContainerOptions {
        kdf: KdfParams {
            log_n: 4,
            r: 8,
            p: 1,
        },
        cache_keystream: false,
        block_size: BLOCK_SIZE,
        ..ContainerOptions::default()
    }
}

pub fn create(blocks: u64) -> (TempDir, PathBuf, Strongbox) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("image.sbx");
    let engine = container::create(&path, PASSWORD, blocks, options()).unwrap();
    (dir, path, engine)
}

pub fn reopen(path: &Path) -> Strongbox {
    container::open(path, PASSWORD, options()).unwrap()
}

/// The set of allocated block indices, straight from the volume bitmap.
pub fn allocated_set(engine: &Strongbox) -> BTreeSet<u64> {
    let io = engine.io();
    let mut stream = ImageStream::open(io).unwrap();
    (0..io.geometry.blocks)
        .filter(|&index| bitmap::is_block_in_use(&mut stream, index, io.geometry.blocks).unwrap())
        .collect()
}
