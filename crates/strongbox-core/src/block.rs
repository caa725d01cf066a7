//! One fixed-size storage unit and node of a file's block chain.
//!
//! The 12-byte header holds the payload length and the index of the
//! successor block. A block whose successor index equals its own index
//! terminates its chain.

use crate::bitmap;
use crate::core_io::SharedCoreIo;
use crate::detail::FILE_BLOCK_META;
use crate::disposition::{AppendOrOverwrite, OpenDisposition};
use crate::error::{Result, StrongboxError};
use crate::stream::ImageStream;
use std::io::SeekFrom;

pub struct FileBlock {
    io: SharedCoreIo,
    index: u64,
    offset: u64,
    bytes_written: u32,
    next: u64,
    seek_pos: u32,
    disposition: OpenDisposition,
}

impl FileBlock {
    /// Loads an existing block's header from disk. The payload position
    /// starts at 0.
    pub fn load(io: SharedCoreIo, index: u64, disposition: OpenDisposition) -> Result<Self> {
        if index >= io.geometry.blocks {
            return Err(StrongboxError::CorruptImage(format!(
                "block index {index} out of range"
            )));
        }
        let offset = io.geometry.block_offset(index);
        let mut header = [0u8; FILE_BLOCK_META as usize];
        {
            let mut stream = ImageStream::open(&io)?;
            stream.seek(SeekFrom::Start(offset))?;
            stream.read(&mut header)?;
        }
        let bytes_written = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let next = u64::from_be_bytes([
            header[4], header[5], header[6], header[7], header[8], header[9], header[10],
            header[11],
        ]);
        if bytes_written > io.geometry.block_write_space() {
            return Err(StrongboxError::CorruptImage(format!(
                "block {index} reports {bytes_written} payload bytes"
            )));
        }
        Ok(FileBlock {
            io,
            index,
            offset,
            bytes_written,
            next,
            seek_pos: 0,
            disposition,
        })
    }

    /// Initialises a brand-new block: zero payload, successor pointing at
    /// itself. The header is persisted immediately.
    pub fn fresh(io: SharedCoreIo, index: u64, disposition: OpenDisposition) -> Result<Self> {
        let offset = io.geometry.block_offset(index);
        {
            let mut stream = ImageStream::open(&io)?;
            stream.seek(SeekFrom::Start(offset))?;
            let mut header = [0u8; FILE_BLOCK_META as usize];
            header[4..].copy_from_slice(&index.to_be_bytes());
            stream.write(&header)?;
            stream.flush()?;
        }
        Ok(FileBlock {
            io,
            index,
            offset,
            bytes_written: 0,
            next: index,
            seek_pos: 0,
            disposition,
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn next_index(&self) -> u64 {
        self.next
    }

    /// Whether this block terminates its chain.
    pub fn is_chain_tail(&self) -> bool {
        self.next == self.index
    }

    pub fn bytes_written(&self) -> u32 {
        self.bytes_written
    }

    pub fn tell(&self) -> u32 {
        self.seek_pos
    }

    pub fn seek(&mut self, pos: u32) {
        self.seek_pos = pos;
    }

    /// Reads up to `buf.len()` payload bytes from the current position.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.disposition.readable() {
            return Err(StrongboxError::NotReadable);
        }
        let available = self.bytes_written.saturating_sub(self.seek_pos) as usize;
        let n = buf.len().min(available);
        if n == 0 {
            return Ok(0);
        }
        let mut stream = ImageStream::open(&self.io)?;
        stream.seek(SeekFrom::Start(
            self.offset + FILE_BLOCK_META + self.seek_pos as u64,
        ))?;
        stream.read(&mut buf[..n])?;
        self.seek_pos += n as u32;
        Ok(n)
    }

    /// Writes `buf` at the current position. In append mode the payload
    /// length grows by `buf.len()`; in overwrite mode it grows only when
    /// the write runs past the recorded end.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.disposition.writable() {
            return Err(StrongboxError::NotWritable);
        }
        let n = buf.len() as u32;
        debug_assert!(self.seek_pos + n <= self.io.geometry.block_write_space());

        let mut stream = ImageStream::open(&self.io)?;
        stream.seek(SeekFrom::Start(
            self.offset + FILE_BLOCK_META + self.seek_pos as u64,
        ))?;
        stream.write(buf)?;

        match self.disposition.append_mode() {
            AppendOrOverwrite::Append => {
                self.bytes_written += n;
                self.persist_size(&mut stream, self.bytes_written)?;
            }
            AppendOrOverwrite::Overwrite => {
                if self.seek_pos + n > self.bytes_written {
                    self.bytes_written = self.seek_pos + n;
                    self.persist_size(&mut stream, self.bytes_written)?;
                }
            }
        }
        stream.flush()?;
        self.seek_pos += n;
        Ok(buf.len())
    }

    /// Persists a new payload length.
    pub fn set_size(&mut self, size: u32) -> Result<()> {
        let mut stream = ImageStream::open(&self.io)?;
        self.persist_size(&mut stream, size)?;
        stream.flush()?;
        self.bytes_written = size;
        Ok(())
    }

    fn persist_size(&self, stream: &mut ImageStream<'_>, size: u32) -> Result<()> {
        stream.seek(SeekFrom::Start(self.offset))?;
        stream.write(&size.to_be_bytes())?;
        Ok(())
    }

    /// Persists a new successor index.
    pub fn set_next_index(&mut self, next: u64) -> Result<()> {
        let mut stream = ImageStream::open(&self.io)?;
        stream.seek(SeekFrom::Start(self.offset + 4))?;
        stream.write(&next.to_be_bytes())?;
        stream.flush()?;
        self.next = next;
        Ok(())
    }

    /// Marks this block allocated in the volume bitmap.
    pub fn register_with_bitmap(&mut self) -> Result<()> {
        let mut stream = ImageStream::open(&self.io)?;
        bitmap::set_block(&mut stream, self.index, self.io.geometry.blocks, true)
    }
}
