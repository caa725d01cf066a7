//! Shared helpers for unit tests: tiny images with cheap key derivation
//! and small blocks so chain behaviour is exercised quickly.

use crate::cipher::KdfParams;
use crate::container::{self, ContainerOptions};
use crate::strongbox::Strongbox;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TEST_PASSWORD: &[u8] = b"correct horse battery staple";
pub const TEST_BLOCK_SIZE: u64 = 512;

pub fn cheap_options() -> ContainerOptions {
    ContainerOptions {
        kdf: KdfParams {
            log_n: 4,
            r: 8,
            p: 1,
        },
        cache_keystream: false,
        block_size: TEST_BLOCK_SIZE,
        ..ContainerOptions::default()
    }
}

pub fn create_engine(blocks: u64) -> (TempDir, PathBuf, Strongbox) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sbx");
    let engine = container::create(&path, TEST_PASSWORD, blocks, cheap_options()).unwrap();
    (dir, path, engine)
}

pub fn reopen(path: &Path) -> Strongbox {
    container::open(path, TEST_PASSWORD, cheap_options()).unwrap()
}
