//! Creating and mounting container images.
//!
//! `create` lays down the image prefix, the encrypted superblock and
//! bitmap, and the root folder. `open` reads the plaintext prefix, derives
//! the key, validates the image geometry and reconstructs the shared I/O
//! context. Both return a ready [`Strongbox`] engine.

use crate::bitmap;
use crate::builder::FileBlockBuilder;
use crate::cipher::{ByteTransformer, CipherVariant, KdfParams};
use crate::core_io::{CoreIo, SharedCoreIo};
use crate::detail::{Geometry, BITMAP_OFFSET, BLOCK_COUNT_OFFSET, FILE_BLOCK_SIZE};
use crate::error::{Result, StrongboxError};
use crate::events::{null_sink, ProgressSink};
use crate::folder::compound::CompoundFolder;
use crate::stream::ImageStream;
use crate::strongbox::Strongbox;
use parking_lot::Mutex;
use rand::{rngs::OsRng, RngCore};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

/// Knobs for creating or mounting an image.
pub struct ContainerOptions {
    /// Cipher rounds recorded in the image prefix (create only).
    pub rounds: u8,
    /// Key-derivation cost parameters.
    pub kdf: KdfParams,
    /// First block of the root folder. 0 for the normal volume; a decoy
    /// volume supplies its own number.
    pub root_block: u64,
    /// Precompute the keystream prefix after key derivation.
    pub cache_keystream: bool,
    /// Block size the image was (or will be) laid out with.
    pub block_size: u64,
    /// Subscriber for key-generation and cipher-build progress.
    pub sink: ProgressSink,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        ContainerOptions {
            rounds: 64,
            kdf: KdfParams::default(),
            root_block: 0,
            cache_keystream: true,
            block_size: FILE_BLOCK_SIZE,
            sink: null_sink(),
        }
    }
}

fn build_core_io(
    path: &Path,
    password: &[u8],
    iv: u64,
    rounds: u8,
    geometry: Geometry,
    opts: &ContainerOptions,
) -> Result<SharedCoreIo> {
    let transformer = ByteTransformer::new(
        password,
        iv,
        CipherVariant::Xtea64 {
            rounds: rounds as u32,
        },
        opts.kdf,
        &opts.sink,
        opts.cache_keystream,
    )?;
    Ok(Arc::new(CoreIo {
        path: path.to_path_buf(),
        geometry,
        root_block: opts.root_block,
        rounds: rounds as u32,
        transformer,
        free_blocks: Mutex::new(0),
        builder: Mutex::new(FileBlockBuilder::new()),
    }))
}

/// Creates a new image of `blocks` blocks at `path` and returns the
/// mounted engine.
pub fn create<P: AsRef<Path>>(
    path: P,
    password: &[u8],
    blocks: u64,
    opts: ContainerOptions,
) -> Result<Strongbox> {
    let path = path.as_ref();
    if blocks == 0 || opts.root_block >= blocks {
        return Err(StrongboxError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "block count must be non-zero and contain the root block",
        )));
    }
    if opts.rounds == 0 {
        return Err(StrongboxError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "cipher rounds must be non-zero",
        )));
    }
    let geometry = Geometry::with_block_size(blocks, opts.block_size);

    let iv = OsRng.next_u64();
    {
        let mut host = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        host.write_all(&iv.to_be_bytes())?;
        host.write_all(&[opts.rounds])?;
        host.set_len(geometry.image_size())?;
        host.sync_all()?;
    }

    let io = build_core_io(path, password, iv, opts.rounds, geometry, &opts)?;
    {
        let mut stream = ImageStream::open(&io)?;
        stream.seek(SeekFrom::Start(BLOCK_COUNT_OFFSET))?;
        stream.write(&blocks.to_be_bytes())?;
        stream.seek(SeekFrom::Start(BITMAP_OFFSET))?;
        stream.write(&vec![0u8; geometry.bitmap_bytes() as usize])?;
        stream.sync()?;
    }
    *io.free_blocks.lock() = blocks;

    CompoundFolder::create_at_root(io.clone(), "root")?;
    tracing::info!(path = %path.display(), blocks, "created container image");
    Strongbox::new(io)
}

/// Mounts an existing image. The plaintext prefix supplies the IV and
/// rounds; everything else is read through the cipher layer.
pub fn open<P: AsRef<Path>>(
    path: P,
    password: &[u8],
    opts: ContainerOptions,
) -> Result<Strongbox> {
    let path = path.as_ref();
    let (iv, rounds, host_len, mut count_bytes) = {
        let mut host = OpenOptions::new().read(true).open(path)?;
        let mut prefix = [0u8; 9];
        host.read_exact(&mut prefix)?;
        let mut iv_bytes = [0u8; 8];
        iv_bytes.copy_from_slice(&prefix[..8]);
        let mut count_bytes = [0u8; 8];
        host.read_exact(&mut count_bytes)?;
        let len = host.seek(SeekFrom::End(0))?;
        (u64::from_be_bytes(iv_bytes), prefix[8], len, count_bytes)
    };
    if rounds == 0 {
        return Err(StrongboxError::CorruptImage(
            "cipher rounds byte is zero".into(),
        ));
    }

    let transformer = ByteTransformer::new(
        password,
        iv,
        CipherVariant::Xtea64 {
            rounds: rounds as u32,
        },
        opts.kdf,
        &opts.sink,
        opts.cache_keystream,
    )?;
    transformer.transform_in_place(&mut count_bytes, BLOCK_COUNT_OFFSET);
    let blocks = u64::from_be_bytes(count_bytes);
    if blocks == 0 {
        return Err(StrongboxError::CorruptImage(
            "superblock reports zero blocks".into(),
        ));
    }
    let geometry = Geometry::with_block_size(blocks, opts.block_size);
    if geometry.checked_image_size() != Some(host_len) {
        return Err(StrongboxError::CorruptImage(format!(
            "image length {host_len} does not match {} blocks",
            blocks
        )));
    }
    if opts.root_block >= blocks {
        return Err(StrongboxError::CorruptImage(format!(
            "root block {} outside volume of {blocks} blocks",
            opts.root_block
        )));
    }

    let io = Arc::new(CoreIo {
        path: path.to_path_buf(),
        geometry,
        root_block: opts.root_block,
        rounds: rounds as u32,
        transformer,
        free_blocks: Mutex::new(0),
        builder: Mutex::new(FileBlockBuilder::new()),
    });

    let in_use = {
        let mut stream = ImageStream::open(&io)?;
        bitmap::count_in_use(&mut stream, blocks)?
    };
    *io.free_blocks.lock() = blocks - in_use;
    tracing::info!(
        path = %path.display(),
        blocks,
        free = blocks - in_use,
        "opened container image"
    );
    Strongbox::new(io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{cheap_options, create_engine, TEST_PASSWORD};
    use std::io::Write as _;

    #[test]
    fn create_then_open_round_trips() {
        let (_dir, path, engine) = create_engine(64);
        engine.add_file("/keep").unwrap();
        engine.close().unwrap();

        let engine = open(&path, TEST_PASSWORD, cheap_options()).unwrap();
        assert!(engine.file_exists("/keep").unwrap());
        assert_eq!(engine.stats().blocks, 64);
    }

    #[test]
    fn zero_rounds_byte_is_rejected() {
        let (_dir, path, engine) = create_engine(64);
        engine.close().unwrap();
        {
            let mut host = OpenOptions::new().write(true).open(&path).unwrap();
            host.seek(SeekFrom::Start(8)).unwrap();
            host.write_all(&[0]).unwrap();
        }
        assert!(matches!(
            open(&path, TEST_PASSWORD, cheap_options()),
            Err(StrongboxError::CorruptImage(_))
        ));
    }

    #[test]
    fn prefix_layout_disagreement_is_rejected() {
        // an image written with the 8-byte-IV-only prefix (no rounds byte)
        // is one byte shorter than this layout requires
        let (_dir, path, engine) = create_engine(64);
        engine.close().unwrap();
        let shorter = std::fs::metadata(&path).unwrap().len() - 1;
        {
            let host = OpenOptions::new().write(true).open(&path).unwrap();
            host.set_len(shorter).unwrap();
        }
        assert!(matches!(
            open(&path, TEST_PASSWORD, cheap_options()),
            Err(StrongboxError::CorruptImage(_))
        ));
    }

    #[test]
    fn wrong_password_cannot_decode_the_superblock() {
        let (_dir, path, engine) = create_engine(64);
        engine.close().unwrap();
        assert!(matches!(
            open(&path, b"not the password", cheap_options()),
            Err(StrongboxError::CorruptImage(_))
        ));
    }

    #[test]
    fn root_block_outside_volume_is_rejected() {
        let (_dir, path, engine) = create_engine(64);
        engine.close().unwrap();
        let opts = ContainerOptions {
            root_block: 64,
            ..cheap_options()
        };
        assert!(matches!(
            open(&path, TEST_PASSWORD, opts),
            Err(StrongboxError::CorruptImage(_))
        ));
    }

    #[test]
    fn decoy_root_volume_mounts_independently() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("decoy.sbx");
        let opts = ContainerOptions {
            root_block: 40,
            ..cheap_options()
        };
        let engine = create(&path, TEST_PASSWORD, 64, opts).unwrap();
        engine.add_file("/hidden").unwrap();
        engine.close().unwrap();

        let opts = ContainerOptions {
            root_block: 40,
            ..cheap_options()
        };
        let engine = open(&path, TEST_PASSWORD, opts).unwrap();
        assert!(engine.file_exists("/hidden").unwrap());
    }
}
