//! A directory-as-file: fixed-width metadata slots packed in a [`File`].
//!
//! Payload layout: an 8-byte appended-slot count, then `ENTRY_WIDTH`-byte
//! slots of `{flags, NUL-padded name, first block index}`. Removing an
//! entry clears its in-use bit in place; the slot is recycled by a later
//! addition, and only genuinely new slots bump the header count.

use super::compound::CompoundFolder;
use super::{validate_filename, EntryInfo, EntryType, FLAG_FOLDER, FLAG_IN_USE};
use crate::core_io::SharedCoreIo;
use crate::detail::{CONTENT_SIZE, ENTRY_WIDTH, MAX_FILENAME_LENGTH};
use crate::disposition::OpenDisposition;
use crate::error::{Result, StrongboxError};
use crate::file::File;
use std::io::SeekFrom;

pub struct LeafFolder {
    io: SharedCoreIo,
    name: String,
    file: File,
    entry_count: u64,
}

struct RawSlot {
    flags: u8,
    filename: String,
    first_block: u64,
}

impl RawSlot {
    fn in_use(&self) -> bool {
        self.flags & FLAG_IN_USE != 0
    }

    fn entry_type(&self) -> EntryType {
        if self.flags & FLAG_FOLDER != 0 {
            EntryType::Folder
        } else {
            EntryType::File
        }
    }
}

impl LeafFolder {
    /// Creates an empty folder backed by a fresh file.
    pub fn create(io: SharedCoreIo, name: &str) -> Result<Self> {
        Self::create_inner(io, name, false)
    }

    /// Creates the folder whose backing file occupies the configured root
    /// block.
    pub fn create_at_root(io: SharedCoreIo, name: &str) -> Result<Self> {
        Self::create_inner(io, name, true)
    }

    fn create_inner(io: SharedCoreIo, name: &str, at_root: bool) -> Result<Self> {
        let mut fresh = if at_root {
            File::create_at_root(io.clone())?
        } else {
            File::create(io.clone())?
        };
        fresh.write(&0u64.to_be_bytes())?;
        let start = fresh
            .start_block()
            .ok_or_else(|| StrongboxError::CorruptImage("new folder has no start block".into()))?;
        Self::load(io, start, name)
    }

    /// Opens an existing folder from its backing file's start block.
    pub fn load(io: SharedCoreIo, start_block: u64, name: &str) -> Result<Self> {
        let mut file = File::open(io.clone(), start_block, OpenDisposition::overwrite())?;
        file.seek(SeekFrom::Start(0))?;
        let mut count = [0u8; 8];
        if file.read(&mut count)? != count.len() {
            return Err(StrongboxError::CorruptImage(format!(
                "folder at block {start_block} is shorter than its header"
            )));
        }
        Ok(LeafFolder {
            io,
            name: name.to_string(),
            file,
            entry_count: u64::from_be_bytes(count),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appended-slot count (includes cleared slots awaiting reuse).
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn start_block(&self) -> Result<u64> {
        self.file
            .start_block()
            .ok_or_else(|| StrongboxError::CorruptImage("folder lost its backing file".into()))
    }

    /// Entries currently in use.
    pub fn live_entry_count(&mut self) -> Result<u64> {
        let mut live = 0;
        for index in 0..self.entry_count {
            if self.read_slot(index)?.in_use() {
                live += 1;
            }
        }
        Ok(live)
    }

    /// Whether an addition can proceed: either a cleared slot is available
    /// for reuse or the appended-slot count is below capacity.
    pub fn has_space_for_new_entry(&mut self) -> Result<bool> {
        Ok(self.first_free_slot()?.is_some() || self.entry_count < CONTENT_SIZE)
    }

    fn slot_offset(index: u64) -> u64 {
        8 + index * ENTRY_WIDTH
    }

    fn read_slot(&mut self, index: u64) -> Result<RawSlot> {
        self.file.seek(SeekFrom::Start(Self::slot_offset(index)))?;
        let mut raw = [0u8; ENTRY_WIDTH as usize];
        if self.file.read(&mut raw)? != raw.len() {
            return Err(StrongboxError::CorruptImage(format!(
                "folder {} slot {index} is truncated",
                self.name
            )));
        }
        let name_bytes = &raw[1..1 + MAX_FILENAME_LENGTH];
        let name_len = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_FILENAME_LENGTH);
        let filename = std::str::from_utf8(&name_bytes[..name_len])
            .map_err(|_| {
                StrongboxError::CorruptImage(format!(
                    "folder {} slot {index} has a malformed name",
                    self.name
                ))
            })?
            .to_string();
        let mut block_bytes = [0u8; 8];
        block_bytes.copy_from_slice(&raw[1 + MAX_FILENAME_LENGTH..]);
        Ok(RawSlot {
            flags: raw[0],
            filename,
            first_block: u64::from_be_bytes(block_bytes),
        })
    }

    fn write_slot(&mut self, index: u64, flags: u8, name: &str, first_block: u64) -> Result<()> {
        let mut raw = [0u8; ENTRY_WIDTH as usize];
        raw[0] = flags;
        raw[1..1 + name.len()].copy_from_slice(name.as_bytes());
        raw[1 + MAX_FILENAME_LENGTH..].copy_from_slice(&first_block.to_be_bytes());
        self.file.seek(SeekFrom::Start(Self::slot_offset(index)))?;
        self.file.write(&raw)?;
        Ok(())
    }

    fn write_flags(&mut self, index: u64, flags: u8) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::slot_offset(index)))?;
        self.file.write(&[flags])?;
        Ok(())
    }

    fn bump_entry_count(&mut self) -> Result<()> {
        self.entry_count += 1;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write(&self.entry_count.to_be_bytes())?;
        Ok(())
    }

    fn first_free_slot(&mut self) -> Result<Option<u64>> {
        for index in 0..self.entry_count {
            if !self.read_slot(index)?.in_use() {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn find_named(&mut self, name: &str) -> Result<Option<(u64, RawSlot)>> {
        for index in 0..self.entry_count {
            let slot = self.read_slot(index)?;
            if slot.in_use() && slot.filename == name {
                return Ok(Some((index, slot)));
            }
        }
        Ok(None)
    }

    /// Inserts a metadata slot referencing an existing chain. Reuses a
    /// cleared slot when one exists; otherwise appends and bumps the
    /// header count.
    pub fn write_new_metadata(
        &mut self,
        name: &str,
        entry_type: EntryType,
        first_block: u64,
    ) -> Result<()> {
        validate_filename(name)?;
        let flags = match entry_type {
            EntryType::File => FLAG_IN_USE,
            EntryType::Folder => FLAG_IN_USE | FLAG_FOLDER,
        };
        match self.first_free_slot()? {
            Some(index) => self.write_slot(index, flags, name, first_block)?,
            None => {
                if self.entry_count >= CONTENT_SIZE {
                    return Err(StrongboxError::NoSpace);
                }
                let index = self.entry_count;
                self.write_slot(index, flags, name, first_block)?;
                self.bump_entry_count()?;
            }
        }
        Ok(())
    }

    /// Creates a new empty file entry and returns its start block.
    pub fn add_file(&mut self, name: &str) -> Result<u64> {
        validate_filename(name)?;
        let child = File::create(self.io.clone())?;
        let start = child
            .start_block()
            .ok_or_else(|| StrongboxError::CorruptImage("new file has no start block".into()))?;
        self.write_new_metadata(name, EntryType::File, start)?;
        Ok(start)
    }

    /// Creates a new compound sub-folder entry.
    pub fn add_compound_folder(&mut self, name: &str) -> Result<CompoundFolder> {
        validate_filename(name)?;
        let child = CompoundFolder::create(self.io.clone(), name)?;
        self.write_new_metadata(name, EntryType::Folder, child.start_block()?)?;
        Ok(child)
    }

    /// Creates a new leaf sub-folder entry (a compound folder's bucket).
    pub fn add_leaf_folder(&mut self, name: &str) -> Result<LeafFolder> {
        validate_filename(name)?;
        let child = LeafFolder::create(self.io.clone(), name)?;
        self.write_new_metadata(name, EntryType::Folder, child.start_block()?)?;
        Ok(child)
    }

    pub fn get_entry_info(&mut self, name: &str) -> Result<Option<EntryInfo>> {
        match self.find_named(name)? {
            Some((_, slot)) => Ok(Some(self.info_for_slot(&slot)?)),
            None => Ok(None),
        }
    }

    fn info_for_slot(&self, slot: &RawSlot) -> Result<EntryInfo> {
        let child = File::open(
            self.io.clone(),
            slot.first_block,
            OpenDisposition::read_only(),
        )?;
        Ok(EntryInfo {
            filename: slot.filename.clone(),
            entry_type: slot.entry_type(),
            first_block: slot.first_block,
            size: child.size(),
        })
    }

    pub fn get_file(&mut self, name: &str, disposition: OpenDisposition) -> Result<Option<File>> {
        match self.find_named(name)? {
            Some((_, slot)) if slot.entry_type() == EntryType::File => Ok(Some(File::open(
                self.io.clone(),
                slot.first_block,
                disposition,
            )?)),
            _ => Ok(None),
        }
    }

    pub fn get_compound_folder(&mut self, name: &str) -> Result<Option<CompoundFolder>> {
        match self.find_named(name)? {
            Some((_, slot)) if slot.entry_type() == EntryType::Folder => Ok(Some(
                CompoundFolder::load(self.io.clone(), slot.first_block, name)?,
            )),
            _ => Ok(None),
        }
    }

    pub fn get_leaf_folder(&mut self, name: &str) -> Result<Option<LeafFolder>> {
        match self.find_named(name)? {
            Some((_, slot)) if slot.entry_type() == EntryType::Folder => Ok(Some(
                LeafFolder::load(self.io.clone(), slot.first_block, name)?,
            )),
            _ => Ok(None),
        }
    }

    /// Removes a file entry and frees its chain. Returns whether the name
    /// was present.
    pub fn remove_file(&mut self, name: &str) -> Result<bool> {
        let Some((index, slot)) = self.find_named(name)? else {
            return Ok(false);
        };
        if slot.entry_type() != EntryType::File {
            return Ok(false);
        }
        self.write_flags(index, slot.flags & !FLAG_IN_USE)?;
        let mut child = File::open(
            self.io.clone(),
            slot.first_block,
            OpenDisposition::overwrite(),
        )?;
        child.unlink()?;
        Ok(true)
    }

    /// Recursively removes a compound sub-folder: children first, then the
    /// folder's own backing chains.
    pub fn remove_compound_folder(&mut self, name: &str) -> Result<bool> {
        let Some((index, slot)) = self.find_named(name)? else {
            return Ok(false);
        };
        if slot.entry_type() != EntryType::Folder {
            return Ok(false);
        }
        self.write_flags(index, slot.flags & !FLAG_IN_USE)?;
        let mut child = CompoundFolder::load(self.io.clone(), slot.first_block, name)?;
        child.remove_all_entries()?;
        child.unlink_backing()?;
        Ok(true)
    }

    /// Removes a leaf sub-folder entry and frees its backing chain. Used
    /// for dropping emptied buckets.
    pub fn remove_leaf_folder(&mut self, name: &str) -> Result<bool> {
        let Some((index, slot)) = self.find_named(name)? else {
            return Ok(false);
        };
        if slot.entry_type() != EntryType::Folder {
            return Ok(false);
        }
        self.write_flags(index, slot.flags & !FLAG_IN_USE)?;
        let mut backing = File::open(
            self.io.clone(),
            slot.first_block,
            OpenDisposition::overwrite(),
        )?;
        backing.unlink()?;
        Ok(true)
    }

    /// Clears an entry's in-use bit without touching the chain it points
    /// to. The rename path re-homes the chain under a new slot.
    pub fn put_metadata_out_of_use(&mut self, name: &str) -> Result<bool> {
        let Some((index, slot)) = self.find_named(name)? else {
            return Ok(false);
        };
        self.write_flags(index, slot.flags & !FLAG_IN_USE)?;
        Ok(true)
    }

    pub fn list_all_entries(&mut self) -> Result<Vec<EntryInfo>> {
        self.list_filtered(|_| true)
    }

    pub fn list_file_entries(&mut self) -> Result<Vec<EntryInfo>> {
        self.list_filtered(|t| t == EntryType::File)
    }

    pub fn list_folder_entries(&mut self) -> Result<Vec<EntryInfo>> {
        self.list_filtered(|t| t == EntryType::Folder)
    }

    fn list_filtered(&mut self, keep: impl Fn(EntryType) -> bool) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();
        for index in 0..self.entry_count {
            let slot = self.read_slot(index)?;
            if slot.in_use() && keep(slot.entry_type()) {
                entries.push(self.info_for_slot(&slot)?);
            }
        }
        Ok(entries)
    }

    /// Frees the folder's own backing chain.
    pub fn unlink_backing(&mut self) -> Result<()> {
        self.file.unlink()
    }
}
