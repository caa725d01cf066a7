//! The namespace root: path resolution and the public filesystem
//! operations.
//!
//! Paths split on `/`; empty components are ignored and `.`/`..` carry no
//! special meaning. Every operation resolves the parent folder against the
//! root compound folder, then acts on the final component.

use crate::core_io::SharedCoreIo;
use crate::detail::MAX_FILENAME_LENGTH;
use crate::device::FileDevice;
use crate::disposition::OpenDisposition;
use crate::error::{Result, StrongboxError};
use crate::folder::compound::CompoundFolder;
use crate::folder::{EntryInfo, EntryType};
use crate::stream::ImageStream;

/// Policy for [`Strongbox::remove_folder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderRemovalMode {
    MustBeEmpty,
    Recursive,
}

/// Filesystem statistics, in the shape a mounting driver wants for a
/// `statvfs` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub block_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
    pub files_available: u64,
    pub max_filename_length: u64,
}

pub struct Strongbox {
    io: SharedCoreIo,
}

impl Strongbox {
    /// Binds the engine to a shared I/O context, verifying that the root
    /// folder is loadable.
    pub fn new(io: SharedCoreIo) -> Result<Self> {
        let engine = Strongbox { io };
        engine.root()?;
        Ok(engine)
    }

    pub fn io(&self) -> &SharedCoreIo {
        &self.io
    }

    fn root(&self) -> Result<CompoundFolder> {
        CompoundFolder::load(self.io.clone(), self.io.root_block, "root")
    }

    fn components(path: &str) -> Vec<&str> {
        path.split('/').filter(|c| !c.is_empty()).collect()
    }

    /// Resolves the parent folder of the final path component.
    fn resolve_parent(&self, parts: &[&str]) -> Result<CompoundFolder> {
        let mut folder = self.root()?;
        for part in &parts[..parts.len() - 1] {
            folder = folder.get_folder(part)?;
        }
        Ok(folder)
    }

    pub fn get_info(&self, path: &str) -> Result<EntryInfo> {
        let parts = Self::components(path);
        if parts.is_empty() {
            return Err(StrongboxError::NotFound);
        }
        let mut parent = self.resolve_parent(&parts)?;
        parent
            .get_entry_info(parts[parts.len() - 1])?
            .ok_or(StrongboxError::NotFound)
    }

    fn entry_exists(&self, path: &str, wanted: EntryType) -> Result<bool> {
        let parts = Self::components(path);
        if parts.is_empty() {
            return Ok(wanted == EntryType::Folder);
        }
        let mut parent = match self.resolve_parent(&parts) {
            Ok(parent) => parent,
            Err(StrongboxError::NotFound) => return Ok(false),
            Err(e) => return Err(e),
        };
        Ok(parent
            .get_entry_info(parts[parts.len() - 1])?
            .map(|info| info.entry_type == wanted)
            .unwrap_or(false))
    }

    pub fn file_exists(&self, path: &str) -> Result<bool> {
        if path.ends_with('/') {
            return Ok(false);
        }
        self.entry_exists(path, EntryType::File)
    }

    pub fn folder_exists(&self, path: &str) -> Result<bool> {
        self.entry_exists(path, EntryType::Folder)
    }

    fn ensure_vacant(&self, parent: &mut CompoundFolder, name: &str) -> Result<()> {
        if parent.get_entry_info(name)?.is_some() {
            return Err(StrongboxError::AlreadyExists);
        }
        Ok(())
    }

    /// Creates an empty file. A trailing `/` on the path is illegal.
    pub fn add_file(&self, path: &str) -> Result<()> {
        if path.ends_with('/') {
            return Err(StrongboxError::IllegalFilename);
        }
        let parts = Self::components(path);
        if parts.is_empty() {
            return Err(StrongboxError::IllegalFilename);
        }
        let mut parent = self.resolve_parent(&parts)?;
        let name = parts[parts.len() - 1];
        self.ensure_vacant(&mut parent, name)?;
        parent.add_file(name)?;
        Ok(())
    }

    /// Creates an empty folder. A trailing `/` is stripped.
    pub fn add_folder(&self, path: &str) -> Result<()> {
        let parts = Self::components(path);
        if parts.is_empty() {
            return Err(StrongboxError::IllegalFilename);
        }
        let mut parent = self.resolve_parent(&parts)?;
        let name = parts[parts.len() - 1];
        self.ensure_vacant(&mut parent, name)?;
        parent.add_folder(name)
    }

    /// Moves an entry's metadata between folders, preserving its chain.
    /// The destination slot is written before the source slot is cleared;
    /// the pair is still not atomic across a crash.
    pub fn rename_entry(&self, src: &str, dst: &str) -> Result<()> {
        let src_parts = Self::components(src);
        let dst_parts = Self::components(dst);
        if src_parts.is_empty() || dst_parts.is_empty() {
            return Err(StrongboxError::NotFound);
        }
        let mut src_parent = self.resolve_parent(&src_parts)?;
        let mut dst_parent = self.resolve_parent(&dst_parts)?;
        let dst_name = dst_parts[dst_parts.len() - 1];
        self.ensure_vacant(&mut dst_parent, dst_name)?;

        let src_name = src_parts[src_parts.len() - 1];
        let info = src_parent
            .get_entry_info(src_name)?
            .ok_or(StrongboxError::NotFound)?;

        dst_parent.write_new_metadata(dst_name, info.entry_type, info.first_block)?;
        src_parent.put_metadata_out_of_use(src_name)?;
        Ok(())
    }

    pub fn remove_file(&self, path: &str) -> Result<()> {
        let parts = Self::components(path);
        if parts.is_empty() {
            return Err(StrongboxError::NotFound);
        }
        let mut parent = self.resolve_parent(&parts)?;
        let name = parts[parts.len() - 1];
        match parent.get_entry_info(name)? {
            Some(info) if info.entry_type == EntryType::File => parent.remove_file(name),
            _ => Err(StrongboxError::NotFound),
        }
    }

    pub fn remove_folder(&self, path: &str, mode: FolderRemovalMode) -> Result<()> {
        let parts = Self::components(path);
        if parts.is_empty() {
            return Err(StrongboxError::NotFound);
        }
        let mut parent = self.resolve_parent(&parts)?;
        let name = parts[parts.len() - 1];
        match parent.get_entry_info(name)? {
            Some(info) if info.entry_type == EntryType::Folder => {
                if mode == FolderRemovalMode::MustBeEmpty {
                    let mut child = parent.get_folder(name)?;
                    if !child.list_all_entries()?.is_empty() {
                        return Err(StrongboxError::FolderNotEmpty);
                    }
                }
                parent.remove_folder(name)
            }
            _ => Err(StrongboxError::NotFound),
        }
    }

    /// Lists the entries of a folder. `/` lists the root.
    pub fn list_folder(&self, path: &str) -> Result<Vec<EntryInfo>> {
        let parts = Self::components(path);
        let mut folder = self.root()?;
        for part in &parts {
            folder = folder.get_folder(part)?;
        }
        folder.list_all_entries()
    }

    /// Opens a file as a byte-stream device.
    pub fn open_file(&self, path: &str, disposition: OpenDisposition) -> Result<FileDevice> {
        if path.ends_with('/') {
            return Err(StrongboxError::NotFound);
        }
        let parts = Self::components(path);
        if parts.is_empty() {
            return Err(StrongboxError::NotFound);
        }
        let mut parent = self.resolve_parent(&parts)?;
        let file = parent.get_file(parts[parts.len() - 1], disposition)?;
        Ok(FileDevice::new(file))
    }

    pub fn truncate_file(&self, path: &str, new_size: u64) -> Result<()> {
        let device = self.open_file(path, OpenDisposition::overwrite())?;
        let mut file = device.into_inner();
        file.truncate(new_size)?;
        file.flush()
    }

    pub fn stats(&self) -> FsStats {
        let free = *self.io.free_blocks.lock();
        FsStats {
            block_size: self.io.geometry.block_size,
            blocks: self.io.geometry.blocks,
            blocks_free: free,
            blocks_available: free,
            files: self.io.geometry.blocks,
            files_free: free,
            files_available: free,
            max_filename_length: MAX_FILENAME_LENGTH as u64,
        }
    }

    /// Forces the host file to stable storage.
    pub fn close(self) -> Result<()> {
        let mut stream = ImageStream::open(&self.io)?;
        stream.sync()
    }
}
