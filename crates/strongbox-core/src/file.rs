//! A logical byte stream realised as a chain of file blocks.
//!
//! The chain is the file's identity: the start block index is what parent
//! folders record, and the logical size is always the sum of the payload
//! lengths along the chain. Reads and writes never cross a block boundary
//! in one disk operation.

use crate::block::FileBlock;
use crate::builder::FileBlockBuilder;
use crate::chain::BlockIterator;
use crate::core_io::SharedCoreIo;
use crate::disposition::{AppendOrOverwrite, OpenDisposition, TruncateOrKeep};
use crate::error::{Result, StrongboxError};
use crate::stream::ImageStream;
use crate::bitmap;
use std::io::SeekFrom;

/// Invoked from [`File::flush`] with the current size; parent folders use
/// it to keep their cached entry metadata fresh.
pub type SizeCallback = Box<dyn Fn(u64)>;

pub struct File {
    io: SharedCoreIo,
    file_size: u64,
    start_block: Option<u64>,
    working_block: Option<FileBlock>,
    block_index: u64,
    block_count: u64,
    disposition: OpenDisposition,
    enforce_start_block: bool,
    pos: u64,
    size_callback: Option<SizeCallback>,
}

impl File {
    /// Creates a brand-new empty file, allocating its start block.
    pub fn create(io: SharedCoreIo) -> Result<Self> {
        Self::create_inner(io, false)
    }

    /// Creates a brand-new empty file whose start block is forced to the
    /// configured root block. Used once, when a container's root folder is
    /// first laid down.
    pub fn create_at_root(io: SharedCoreIo) -> Result<Self> {
        Self::create_inner(io, true)
    }

    fn create_inner(io: SharedCoreIo, enforce_root: bool) -> Result<Self> {
        let disposition = OpenDisposition::append();
        let block = FileBlockBuilder::build_writable_block(&io, disposition, enforce_root)?;
        Ok(File {
            start_block: Some(block.index()),
            working_block: Some(block),
            io,
            file_size: 0,
            block_index: 0,
            block_count: 1,
            disposition,
            enforce_start_block: false,
            pos: 0,
            size_callback: None,
        })
    }

    /// Opens an existing file from its start block, enumerating the chain
    /// to establish size and block count. Truncate dispositions drop the
    /// existing chain immediately; append dispositions seek to the end.
    pub fn open(io: SharedCoreIo, start_block: u64, disposition: OpenDisposition) -> Result<Self> {
        let mut file_size = 0u64;
        let mut block_count = 0u64;
        for block in BlockIterator::new(io.clone(), start_block, disposition) {
            file_size += block?.bytes_written() as u64;
            block_count += 1;
        }
        let working = FileBlock::load(io.clone(), start_block, disposition)?;
        let mut file = File {
            io,
            file_size,
            start_block: Some(start_block),
            working_block: Some(working),
            block_index: 0,
            block_count,
            disposition,
            enforce_start_block: false,
            pos: 0,
            size_callback: None,
        };
        if file.disposition.writable() {
            if file.disposition.trunc_mode() == TruncateOrKeep::Truncate {
                file.unlink()?;
            } else if file.disposition.append_mode() == AppendOrOverwrite::Append {
                file.seek(SeekFrom::End(0))?;
            }
        }
        Ok(file)
    }

    pub fn size(&self) -> u64 {
        self.file_size
    }

    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn start_block(&self) -> Option<u64> {
        self.start_block
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    pub fn set_size_callback(&mut self, callback: SizeCallback) {
        self.size_callback = Some(callback);
    }

    /// Reads up to `buf.len()` bytes, stopping early when the chain is
    /// exhausted. Returns the number of bytes read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.disposition.readable() {
            return Err(StrongboxError::NotReadable);
        }
        let mut read = 0usize;
        while read < buf.len() {
            let (available, next_index) = match &self.working_block {
                Some(block) => (
                    block.bytes_written().saturating_sub(block.tell()) as usize,
                    block.next_index(),
                ),
                None => break,
            };
            if available == 0 {
                if self.block_index + 1 < self.block_count {
                    self.working_block =
                        Some(FileBlock::load(self.io.clone(), next_index, self.disposition)?);
                    self.block_index += 1;
                    continue;
                }
                break;
            }
            let take = available.min(buf.len() - read);
            let block = match self.working_block.as_mut() {
                Some(block) => block,
                None => break,
            };
            let n = block.read(&mut buf[read..read + take])?;
            if n == 0 {
                break;
            }
            read += n;
            self.pos += n as u64;
        }
        Ok(read)
    }

    /// Writes all of `buf` at the current position, allocating and linking
    /// new blocks as the chain is exhausted. In overwrite mode a write that
    /// reaches end-of-file extends the file for the remainder.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.disposition.writable() {
            return Err(StrongboxError::NotWritable);
        }
        let payload = self.io.geometry.block_write_space();
        let mut written = 0usize;
        while written < buf.len() {
            self.prepare_working_block_for_write()?;
            let block = match self.working_block.as_mut() {
                Some(block) => block,
                None => {
                    return Err(StrongboxError::CorruptImage(
                        "no writable block after allocation".into(),
                    ))
                }
            };
            let space = (payload - block.tell()) as usize;
            let take = space.min(buf.len() - written);
            block.write(&buf[written..written + take])?;
            written += take;
            self.pos += take as u64;
            if self.pos > self.file_size {
                self.file_size = self.pos;
            }
        }
        Ok(written)
    }

    /// Ensures the working block can accept at least one byte, allocating
    /// or advancing as needed.
    fn prepare_working_block_for_write(&mut self) -> Result<()> {
        let payload = self.io.geometry.block_write_space();

        let (full, current_index, current_next) = match &self.working_block {
            Some(block) => (block.tell() >= payload, block.index(), block.next_index()),
            None => {
                if self.block_count == 0 {
                    let block = FileBlockBuilder::build_writable_block(
                        &self.io,
                        self.disposition,
                        self.enforce_start_block,
                    )?;
                    self.enforce_start_block = false;
                    self.start_block = Some(block.index());
                    self.block_index = 0;
                    self.block_count = 1;
                    self.working_block = Some(block);
                } else {
                    let start = self.start_block.ok_or_else(|| {
                        StrongboxError::CorruptImage("file lost its start block".into())
                    })?;
                    self.working_block =
                        Some(FileBlock::load(self.io.clone(), start, self.disposition)?);
                    self.block_index = 0;
                }
                return Ok(());
            }
        };
        if !full {
            return Ok(());
        }

        // current block exhausted: advance into the existing chain when
        // overwriting mid-file, otherwise grow the chain
        let overwriting_midfile = self.disposition.append_mode() == AppendOrOverwrite::Overwrite
            && self.pos < self.file_size;
        if overwriting_midfile {
            if current_next == current_index {
                return Err(StrongboxError::CorruptImage(format!(
                    "chain ends at block {current_index} before recorded file size"
                )));
            }
            self.working_block = Some(FileBlock::load(
                self.io.clone(),
                current_next,
                self.disposition,
            )?);
            self.block_index += 1;
        } else {
            let new_block =
                FileBlockBuilder::build_writable_block(&self.io, self.disposition, false)?;
            if let Some(block) = self.working_block.as_mut() {
                block.set_next_index(new_block.index())?;
            }
            self.block_index = self.block_count;
            self.block_count += 1;
            self.working_block = Some(new_block);
        }
        Ok(())
    }

    /// Translates a logical offset to (chain index, intra-block offset) and
    /// repositions there. Seeking outside `0..=size` fails.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(offset) => self.pos as i128 + offset as i128,
            SeekFrom::End(offset) => self.file_size as i128 + offset as i128,
        };
        if target < 0 || target > self.file_size as i128 {
            return Err(StrongboxError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek outside file bounds",
            )));
        }
        let target = target as u64;

        if self.block_count > 0 {
            let payload = self.io.geometry.block_write_space() as u64;
            let (chain_index, intra) = if target == self.file_size {
                let index = self.block_count - 1;
                (index, target - index * payload)
            } else {
                (target / payload, target % payload)
            };
            let mut block = self.block_with_chain_index(chain_index)?;
            block.seek(intra as u32);
            self.working_block = Some(block);
            self.block_index = chain_index;
        }
        self.pos = target;
        Ok(target)
    }

    fn block_with_chain_index(&self, n: u64) -> Result<FileBlock> {
        let start = self
            .start_block
            .ok_or_else(|| StrongboxError::CorruptImage("file has no blocks".into()))?;
        for (count, block) in BlockIterator::new(self.io.clone(), start, self.disposition).enumerate()
        {
            if count as u64 == n {
                return block;
            }
        }
        Err(StrongboxError::CorruptImage(format!(
            "chain has no block at position {n}"
        )))
    }

    /// Cuts the file down to `new_size` bytes. The block containing the new
    /// final byte becomes the chain tail.
    //
    // TODO: reclaim the blocks beyond the cut; their bitmap bits stay set
    // until the file is unlinked.
    pub fn truncate(&mut self, new_size: u64) -> Result<()> {
        if !self.disposition.writable() {
            return Err(StrongboxError::NotWritable);
        }
        if new_size > self.file_size {
            return Err(StrongboxError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "cannot truncate beyond end of file",
            )));
        }
        let payload = self.io.geometry.block_write_space() as u64;
        let (tail_index, tail_len) = if new_size == 0 {
            (0, 0)
        } else {
            let index = (new_size - 1) / payload;
            (index, new_size - index * payload)
        };

        let mut tail = self.block_with_chain_index(tail_index)?;
        tail.set_size(tail_len as u32)?;
        tail.set_next_index(tail.index())?;

        self.block_count = tail_index + 1;
        self.file_size = new_size;
        self.block_index = 0;
        self.pos = 0;
        if let Some(start) = self.start_block {
            let mut block = FileBlock::load(self.io.clone(), start, self.disposition)?;
            block.seek(0);
            self.working_block = Some(block);
        }
        Ok(())
    }

    /// Releases the whole chain: clears every bitmap bit, returns the
    /// blocks to the recycler and raises the free-block counter.
    pub fn unlink(&mut self) -> Result<()> {
        if let Some(start) = self.start_block {
            let mut indices = Vec::new();
            for block in BlockIterator::new(self.io.clone(), start, self.disposition) {
                indices.push(block?.index());
            }
            let mut stream = ImageStream::open(&self.io)?;
            for &index in &indices {
                bitmap::set_block(&mut stream, index, self.io.geometry.blocks, false)?;
                *self.io.free_blocks.lock() += 1;
                self.io.builder.lock().recycle(index);
            }
        }
        self.file_size = 0;
        self.block_count = 0;
        self.block_index = 0;
        self.pos = 0;
        self.start_block = None;
        self.working_block = None;
        Ok(())
    }

    /// Nothing is buffered between operations, so flushing only reports the
    /// current size to an interested parent folder.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(callback) = &self.size_callback {
            callback(self.file_size);
        }
        Ok(())
    }
}
