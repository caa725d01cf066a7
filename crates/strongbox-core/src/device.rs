//! Adapter exposing an engine [`File`] as a standard byte-stream device.
//!
//! Implements `std::io::{Read, Write, Seek}` so host-side code can stream
//! data in and out of the container with ordinary I/O plumbing.

use crate::error::StrongboxError;
use crate::file::File;
use std::io;

pub struct FileDevice {
    file: File,
}

impl FileDevice {
    pub fn new(file: File) -> Self {
        FileDevice { file }
    }

    pub fn size(&self) -> u64 {
        self.file.size()
    }

    pub fn into_inner(self) -> File {
        self.file
    }
}

fn to_io_error(e: StrongboxError) -> io::Error {
    match e {
        StrongboxError::Io(inner) => inner,
        StrongboxError::NotReadable | StrongboxError::NotWritable => {
            io::Error::new(io::ErrorKind::PermissionDenied, e.to_string())
        }
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

impl io::Read for FileDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf).map_err(to_io_error)
    }
}

impl io::Write for FileDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf).map_err(to_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush().map_err(to_io_error)
    }
}

impl io::Seek for FileDevice {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.file.seek(pos).map_err(to_io_error)
    }
}
