//! Block allocator.
//!
//! New blocks come from a FIFO of recycled indices first, then from the
//! lowest clear bit in the volume bitmap. Allocation marks the bitmap and
//! initialises the block header before the block is handed out, so a
//! half-finished operation can never surface an uninitialised chain node.

use crate::bitmap;
use crate::block::FileBlock;
use crate::core_io::SharedCoreIo;
use crate::disposition::OpenDisposition;
use crate::error::{Result, StrongboxError};
use crate::stream::ImageStream;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct FileBlockBuilder {
    recycled: VecDeque<u64>,
}

impl FileBlockBuilder {
    pub fn new() -> Self {
        FileBlockBuilder {
            recycled: VecDeque::new(),
        }
    }

    /// Queues a freed index for reuse ahead of any bitmap scan.
    pub fn recycle(&mut self, index: u64) {
        self.recycled.push_back(index);
    }

    pub fn recycled_count(&self) -> usize {
        self.recycled.len()
    }

    /// Allocates a fresh writable block: either the configured root block
    /// (when `force_root` is set) or the next free index. Sets the bitmap
    /// bit, decrements the free-block counter and persists the initial
    /// header `{bytes_written: 0, next: self}`.
    pub fn build_writable_block(
        io: &SharedCoreIo,
        disposition: OpenDisposition,
        force_root: bool,
    ) -> Result<FileBlock> {
        let index = {
            let mut stream = ImageStream::open(io)?;
            if force_root {
                io.root_block
            } else {
                Self::next_free_index(io, &mut stream)?
            }
        };

        let mut block = FileBlock::fresh(io.clone(), index, disposition)?;
        block.register_with_bitmap()?;
        {
            let mut free = io.free_blocks.lock();
            *free = free.saturating_sub(1);
        }
        tracing::debug!(block = index, "allocated volume block");
        Ok(block)
    }

    fn next_free_index(io: &SharedCoreIo, stream: &mut ImageStream<'_>) -> Result<u64> {
        let mut builder = io.builder.lock();
        while let Some(index) = builder.recycled.pop_front() {
            if index < io.geometry.blocks
                && !bitmap::is_block_in_use(stream, index, io.geometry.blocks)?
            {
                return Ok(index);
            }
        }
        bitmap::find_first_free(stream, io.geometry.blocks)?.ok_or(StrongboxError::NoSpace)
    }
}
