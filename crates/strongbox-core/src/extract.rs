//! Recursive extraction of a container folder to the host filesystem.
//!
//! Walks a folder's entries depth-first, mirroring sub-folders as host
//! directories and streaming file contents out through read-only devices.

use crate::disposition::OpenDisposition;
use crate::error::Result;
use crate::folder::EntryType;
use crate::strongbox::Strongbox;
use std::fs;
use std::path::Path;

fn join_container_path(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Copies everything under `container_path` into `host_dest`, creating
/// `host_dest` (and any sub-directories) as needed.
pub fn extract_folder(engine: &Strongbox, container_path: &str, host_dest: &Path) -> Result<()> {
    fs::create_dir_all(host_dest)?;
    for info in engine.list_folder(container_path)? {
        let child_container = join_container_path(container_path, &info.filename);
        let child_host = host_dest.join(&info.filename);
        match info.entry_type {
            EntryType::Folder => {
                tracing::debug!(path = %child_host.display(), "creating folder");
                extract_folder(engine, &child_container, &child_host)?;
            }
            EntryType::File => {
                tracing::debug!(path = %child_host.display(), "writing file");
                let mut device =
                    engine.open_file(&child_container, OpenDisposition::read_only())?;
                let mut out = fs::File::create(&child_host)?;
                std::io::copy(&mut device, &mut out)?;
            }
        }
    }
    Ok(())
}
