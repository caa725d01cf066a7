//! Seekable byte channel over the host image file.
//!
//! Every read and write passes through the cipher layer; the host file
//! holds ciphertext end-to-end. The stream tracks its own logical position
//! and hands the absolute byte offset of each operation to the transformer
//! as the keystream offset, so reads and writes are symmetric. No plaintext
//! is buffered.

use crate::core_io::CoreIo;
use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

pub struct ImageStream<'a> {
    io: &'a CoreIo,
    file: File,
    pos: u64,
}

impl<'a> ImageStream<'a> {
    /// Opens the host file for reading and writing.
    pub fn open(io: &'a CoreIo) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&io.path)?;
        Ok(ImageStream { io, file, pos: 0 })
    }

    /// Reads exactly `buf.len()` bytes at the current position, decrypting
    /// them in place.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.pos;
        self.file.read_exact(buf)?;
        self.io.transformer.transform_in_place(buf, start);
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Encrypts `buf` and writes it at the current position.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        let mut ciphertext = vec![0u8; buf.len()];
        self.io.transformer.transform(buf, &mut ciphertext, self.pos);
        self.file.write_all(&ciphertext)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.pos = self.file.seek(pos)?;
        Ok(self.pos)
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Flushes and forces the host file's contents to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
