//! Strongbox: an encrypted single-file virtual filesystem.
//!
//! A container image is one host file holding a complete hierarchical
//! namespace of files and folders. Every byte of the image past a 9-byte
//! plaintext prefix is encrypted with a counter-mode keystream derived
//! from a password, so the host file is ciphertext end-to-end.
//!
//! ## Image layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ 0..8    IV (big-endian u64)       plaintext  │
//! │ 8       cipher rounds (u8)        plaintext  │
//! │ 9..17   block count B             encrypted  │
//! │ 17..    volume bitmap, ⌈B/8⌉ bytes encrypted │
//! │ ...     block area: B × 4096-byte blocks     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Each block carries a 12-byte header (payload length + successor index)
//! and is a node in a singly linked chain; a block whose successor is
//! itself terminates its chain. Files are chains; folders are files whose
//! payload is a table of fixed-width metadata slots; large folders shard
//! their entries across bounded leaf-folder buckets.
//!
//! ## Modules
//!
//! - [`container`] - creating and mounting images
//! - [`strongbox`] - the namespace engine (add/remove/rename/open/stats)
//! - [`file`] / [`block`] / [`chain`] - the block-chain byte streams
//! - [`folder`] - leaf and compound directory representations
//! - [`bitmap`] / [`builder`] - allocation
//! - [`cipher`] / [`stream`] - the encryption layer
//!
//! ## Example
//!
//! ```no_run
//! use strongbox_core::container::{self, ContainerOptions};
//! use strongbox_core::disposition::OpenDisposition;
//! use std::io::{Read, Write};
//!
//! let engine = container::create("vault.sbx", b"password", 2048, ContainerOptions::default())?;
//! engine.add_file("/hello.txt")?;
//! let mut device = engine.open_file("/hello.txt", OpenDisposition::append())?;
//! device.write_all(b"Hello, world!")?;
//! drop(device);
//!
//! let mut device = engine.open_file("/hello.txt", OpenDisposition::read_only())?;
//! let mut contents = String::new();
//! device.read_to_string(&mut contents)?;
//! assert_eq!(contents, "Hello, world!");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The engine is single-threaded at its API boundary: a mounting driver or
//! shell serialises calls (a mutex around each operation). Key derivation
//! and the optional keystream prebuild may run on a worker thread before
//! the engine is used; progress is reported through [`events`].

pub mod bitmap;
pub mod block;
pub mod builder;
pub mod chain;
pub mod cipher;
pub mod container;
pub mod core_io;
pub mod detail;
pub mod device;
pub mod disposition;
pub mod error;
pub mod events;
pub mod extract;
pub mod file;
pub mod folder;
pub mod stream;
pub mod strongbox;

#[cfg(test)]
pub(crate) mod test_util;

pub use cipher::{ByteTransformer, CipherVariant, KdfParams};
pub use container::ContainerOptions;
pub use core_io::{CoreIo, SharedCoreIo};
pub use device::FileDevice;
pub use disposition::OpenDisposition;
pub use error::{Result, StrongboxError};
pub use events::{null_sink, ProgressEvent, ProgressSink};
pub use extract::extract_folder;
pub use folder::{EntryInfo, EntryType};
pub use strongbox::{FolderRemovalMode, FsStats, Strongbox};
