//! Lazy walk over a file's block chain.
//!
//! Follows `next_index` from the start block until the self-referential
//! tail. Headers are materialised on demand; the sequence is finite,
//! non-restartable and surfaces corruption (dangling successors, cycles,
//! unallocated members) as it is discovered.

use crate::bitmap;
use crate::block::FileBlock;
use crate::core_io::SharedCoreIo;
use crate::disposition::OpenDisposition;
use crate::error::{Result, StrongboxError};
use crate::stream::ImageStream;

pub struct BlockIterator {
    io: SharedCoreIo,
    disposition: OpenDisposition,
    next: Option<u64>,
    visited: u64,
}

impl BlockIterator {
    pub fn new(io: SharedCoreIo, start: u64, disposition: OpenDisposition) -> Self {
        BlockIterator {
            io,
            disposition,
            next: Some(start),
            visited: 0,
        }
    }

    fn load(&mut self, index: u64) -> Result<FileBlock> {
        self.visited += 1;
        if self.visited > self.io.geometry.blocks {
            return Err(StrongboxError::CorruptImage(format!(
                "chain starting near block {index} cycles"
            )));
        }
        {
            let mut stream = ImageStream::open(&self.io)?;
            if !bitmap::is_block_in_use(&mut stream, index, self.io.geometry.blocks)? {
                return Err(StrongboxError::CorruptImage(format!(
                    "chain references unallocated block {index}"
                )));
            }
        }
        FileBlock::load(self.io.clone(), index, self.disposition)
    }
}

impl Iterator for BlockIterator {
    type Item = Result<FileBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next.take()?;
        match self.load(index) {
            Ok(block) => {
                if !block.is_chain_tail() {
                    self.next = Some(block.next_index());
                }
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FileBlockBuilder;
    use crate::test_util::create_engine;

    fn allocate_chain(io: &SharedCoreIo, length: usize) -> Vec<u64> {
        let mut blocks = Vec::new();
        for _ in 0..length {
            blocks.push(
                FileBlockBuilder::build_writable_block(io, OpenDisposition::append(), false)
                    .unwrap(),
            );
        }
        for i in 0..length - 1 {
            let next = blocks[i + 1].index();
            blocks[i].set_next_index(next).unwrap();
        }
        blocks.iter().map(|b| b.index()).collect()
    }

    #[test]
    fn walks_to_the_self_referential_tail() {
        let (_dir, _path, engine) = create_engine(32);
        let io = engine.io().clone();
        let indices = allocate_chain(&io, 4);

        let walked: Vec<u64> = BlockIterator::new(io, indices[0], OpenDisposition::read_only())
            .map(|b| b.unwrap().index())
            .collect();
        assert_eq!(walked, indices);
    }

    #[test]
    fn single_block_chain_yields_once() {
        let (_dir, _path, engine) = create_engine(32);
        let io = engine.io().clone();
        let indices = allocate_chain(&io, 1);
        let walked: Vec<u64> = BlockIterator::new(io, indices[0], OpenDisposition::read_only())
            .map(|b| b.unwrap().index())
            .collect();
        assert_eq!(walked, indices);
    }

    #[test]
    fn unallocated_successor_is_corrupt() {
        let (_dir, _path, engine) = create_engine(32);
        let io = engine.io().clone();
        let mut head =
            FileBlockBuilder::build_writable_block(&io, OpenDisposition::append(), false).unwrap();
        head.set_next_index(20).unwrap();

        let outcome: Result<Vec<FileBlock>> =
            BlockIterator::new(io, head.index(), OpenDisposition::read_only()).collect();
        assert!(matches!(outcome, Err(StrongboxError::CorruptImage(_))));
    }

    #[test]
    fn two_block_cycle_is_corrupt() {
        let (_dir, _path, engine) = create_engine(32);
        let io = engine.io().clone();
        let indices = allocate_chain(&io, 2);
        // point the tail back at the head
        let mut tail = FileBlock::load(io.clone(), indices[1], OpenDisposition::append()).unwrap();
        tail.set_next_index(indices[0]).unwrap();

        let outcome: Result<Vec<FileBlock>> =
            BlockIterator::new(io, indices[0], OpenDisposition::read_only()).collect();
        assert!(matches!(outcome, Err(StrongboxError::CorruptImage(_))));
    }
}
