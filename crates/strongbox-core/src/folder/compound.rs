//! A directory with a bucket layer.
//!
//! User entries live in bounded leaf-folder buckets; the compound folder's
//! own leaf holds the buckets themselves, named `index_<n>`. A bucket that
//! empties out on removal is dropped from the parent. Lookups are cached
//! per compound-folder instance.

use super::leaf::LeafFolder;
use super::{validate_filename, EntryInfo, EntryType};
use crate::core_io::SharedCoreIo;
use crate::disposition::OpenDisposition;
use crate::error::{Result, StrongboxError};
use crate::file::File;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct CompoundFolder {
    io: SharedCoreIo,
    name: String,
    parent: LeafFolder,
    buckets: Vec<LeafFolder>,
    cache: Arc<Mutex<HashMap<String, EntryInfo>>>,
    cache_complete: bool,
    bucket_seq: u64,
}

impl CompoundFolder {
    pub fn create(io: SharedCoreIo, name: &str) -> Result<Self> {
        let parent = LeafFolder::create(io.clone(), name)?;
        Ok(Self::from_parent(io, name, parent))
    }

    /// Creates the container's root folder on the configured root block.
    pub fn create_at_root(io: SharedCoreIo, name: &str) -> Result<Self> {
        let parent = LeafFolder::create_at_root(io.clone(), name)?;
        Ok(Self::from_parent(io, name, parent))
    }

    fn from_parent(io: SharedCoreIo, name: &str, parent: LeafFolder) -> Self {
        let bucket_seq = parent.entry_count();
        CompoundFolder {
            io,
            name: name.to_string(),
            parent,
            buckets: Vec::new(),
            cache: Arc::new(Mutex::new(HashMap::new())),
            cache_complete: false,
            bucket_seq,
        }
    }

    /// Opens an existing compound folder, loading handles for its buckets.
    pub fn load(io: SharedCoreIo, start_block: u64, name: &str) -> Result<Self> {
        let mut parent = LeafFolder::load(io.clone(), start_block, name)?;
        let mut buckets = Vec::new();
        for info in parent.list_folder_entries()? {
            buckets.push(LeafFolder::load(io.clone(), info.first_block, &info.filename)?);
        }
        let bucket_seq = parent.entry_count();
        Ok(CompoundFolder {
            io,
            name: name.to_string(),
            parent,
            buckets,
            cache: Arc::new(Mutex::new(HashMap::new())),
            cache_complete: false,
            bucket_seq,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_block(&self) -> Result<u64> {
        self.parent.start_block()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn next_bucket_name(&mut self) -> Result<String> {
        loop {
            let candidate = format!("index_{}", self.bucket_seq);
            self.bucket_seq += 1;
            if self.parent.get_entry_info(&candidate)?.is_none() {
                return Ok(candidate);
            }
        }
    }

    /// Index of a bucket that can absorb a new entry, creating one when
    /// every existing bucket is full.
    fn bucket_with_space(&mut self) -> Result<usize> {
        for (position, bucket) in self.buckets.iter_mut().enumerate() {
            if bucket.has_space_for_new_entry()? {
                return Ok(position);
            }
        }
        let name = self.next_bucket_name()?;
        let bucket = self.parent.add_leaf_folder(&name)?;
        self.buckets.push(bucket);
        Ok(self.buckets.len() - 1)
    }

    pub fn add_file(&mut self, name: &str) -> Result<u64> {
        validate_filename(name)?;
        let position = self.bucket_with_space()?;
        let start = self.buckets[position].add_file(name)?;
        self.cache.lock().insert(
            name.to_string(),
            EntryInfo {
                filename: name.to_string(),
                entry_type: EntryType::File,
                first_block: start,
                size: 0,
            },
        );
        Ok(start)
    }

    pub fn add_folder(&mut self, name: &str) -> Result<()> {
        validate_filename(name)?;
        let position = self.bucket_with_space()?;
        let child = self.buckets[position].add_compound_folder(name)?;
        self.cache.lock().insert(
            name.to_string(),
            EntryInfo {
                filename: name.to_string(),
                entry_type: EntryType::Folder,
                first_block: child.start_block()?,
                size: 0,
            },
        );
        Ok(())
    }

    pub fn get_entry_info(&mut self, name: &str) -> Result<Option<EntryInfo>> {
        if let Some(info) = self.cache.lock().get(name) {
            return Ok(Some(info.clone()));
        }
        if self.cache_complete {
            return Ok(None);
        }
        for bucket in self.buckets.iter_mut() {
            if let Some(info) = bucket.get_entry_info(name)? {
                self.cache.lock().insert(name.to_string(), info.clone());
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    /// Opens a child file. The returned handle keeps this folder's entry
    /// cache up to date through its size callback.
    pub fn get_file(&mut self, name: &str, disposition: OpenDisposition) -> Result<File> {
        for bucket in self.buckets.iter_mut() {
            if let Some(mut file) = bucket.get_file(name, disposition)? {
                let cache = Arc::clone(&self.cache);
                let key = name.to_string();
                file.set_size_callback(Box::new(move |size| {
                    if let Some(info) = cache.lock().get_mut(&key) {
                        info.size = size;
                    }
                }));
                return Ok(file);
            }
        }
        Err(StrongboxError::NotFound)
    }

    pub fn get_folder(&mut self, name: &str) -> Result<CompoundFolder> {
        for bucket in self.buckets.iter_mut() {
            if let Some(folder) = bucket.get_compound_folder(name)? {
                return Ok(folder);
            }
        }
        Err(StrongboxError::NotFound)
    }

    pub fn list_all_entries(&mut self) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();
        for bucket in self.buckets.iter_mut() {
            entries.extend(bucket.list_all_entries()?);
        }
        let mut cache = self.cache.lock();
        cache.clear();
        for info in &entries {
            cache.insert(info.filename.clone(), info.clone());
        }
        drop(cache);
        self.cache_complete = true;
        Ok(entries)
    }

    pub fn list_file_entries(&mut self) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();
        for bucket in self.buckets.iter_mut() {
            entries.extend(bucket.list_file_entries()?);
        }
        Ok(entries)
    }

    pub fn list_folder_entries(&mut self) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();
        for bucket in self.buckets.iter_mut() {
            entries.extend(bucket.list_folder_entries()?);
        }
        Ok(entries)
    }

    fn drop_bucket_if_empty(&mut self, position: usize) -> Result<()> {
        if self.buckets[position].live_entry_count()? > 0 {
            return Ok(());
        }
        let name = self.buckets[position].name().to_string();
        self.parent.remove_leaf_folder(&name)?;
        self.buckets.remove(position);
        Ok(())
    }

    pub fn remove_file(&mut self, name: &str) -> Result<()> {
        for position in 0..self.buckets.len() {
            if self.buckets[position].remove_file(name)? {
                self.cache.lock().remove(name);
                self.drop_bucket_if_empty(position)?;
                return Ok(());
            }
        }
        Err(StrongboxError::NotFound)
    }

    pub fn remove_folder(&mut self, name: &str) -> Result<()> {
        for position in 0..self.buckets.len() {
            if self.buckets[position].remove_compound_folder(name)? {
                self.cache.lock().remove(name);
                self.drop_bucket_if_empty(position)?;
                return Ok(());
            }
        }
        Err(StrongboxError::NotFound)
    }

    /// Removes every entry, recursively. Buckets evaporate as they empty.
    pub fn remove_all_entries(&mut self) -> Result<()> {
        for info in self.list_all_entries()? {
            match info.entry_type {
                EntryType::File => self.remove_file(&info.filename)?,
                EntryType::Folder => self.remove_folder(&info.filename)?,
            }
        }
        Ok(())
    }

    /// Clears an entry's metadata without freeing its chain (rename).
    pub fn put_metadata_out_of_use(&mut self, name: &str) -> Result<()> {
        for bucket in self.buckets.iter_mut() {
            if bucket.put_metadata_out_of_use(name)? {
                self.cache.lock().remove(name);
                return Ok(());
            }
        }
        Err(StrongboxError::NotFound)
    }

    /// Inserts metadata referencing an existing chain (rename).
    pub fn write_new_metadata(
        &mut self,
        name: &str,
        entry_type: EntryType,
        first_block: u64,
    ) -> Result<()> {
        validate_filename(name)?;
        let position = self.bucket_with_space()?;
        self.buckets[position].write_new_metadata(name, entry_type, first_block)?;
        self.cache.lock().remove(name);
        self.cache_complete = false;
        Ok(())
    }

    /// Frees the folder's own storage: every remaining bucket's backing
    /// chain, then the parent leaf's chain. Entries must have been removed
    /// first.
    pub fn unlink_backing(&mut self) -> Result<()> {
        for bucket in self.buckets.iter_mut() {
            bucket.unlink_backing()?;
        }
        self.buckets.clear();
        self.parent.unlink_backing()?;
        self.cache.lock().clear();
        Ok(())
    }
}
