//! Shared I/O context threaded through every engine object.
//!
//! One `CoreIo` exists per open container. Files, folders and blocks hold a
//! strong handle to it and open short-lived [`ImageStream`]s against it;
//! the context owns the derived cipher state, the allocator and the free
//! block counter. The engine outlives every value constructed from it.
//!
//! [`ImageStream`]: crate::stream::ImageStream

use crate::builder::FileBlockBuilder;
use crate::cipher::ByteTransformer;
use crate::detail::Geometry;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

pub struct CoreIo {
    pub path: PathBuf,
    pub geometry: Geometry,
    /// First block of the root folder. Normally 0; a decoy volume places
    /// its root elsewhere.
    pub root_block: u64,
    pub rounds: u32,
    pub transformer: ByteTransformer,
    pub free_blocks: Mutex<u64>,
    pub builder: Mutex<FileBlockBuilder>,
}

pub type SharedCoreIo = Arc<CoreIo>;
