//! On-disk layout: format constants and pure offset arithmetic.
//!
//! Everything multi-byte on the wire is big-endian. The first nine bytes of
//! an image (IV + rounds) are stored in the clear so the keystream can be
//! initialised; every byte after them is ciphertext.

/// Size of one storage block, header included.
pub const FILE_BLOCK_SIZE: u64 = 4096;

/// Per-block header: 4 bytes payload length + 8 bytes next index.
pub const FILE_BLOCK_META: u64 = 12;

/// Byte offset of the plaintext IV.
pub const IV_OFFSET: u64 = 0;

/// Byte offset of the plaintext cipher-rounds byte.
pub const ROUNDS_OFFSET: u64 = 8;

/// Byte offset of the encrypted block count.
pub const BLOCK_COUNT_OFFSET: u64 = 9;

/// Byte offset of the volume bitmap.
pub const BITMAP_OFFSET: u64 = 17;

/// Longest admissible entry name, in bytes.
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Folder metadata slot: 1 flag byte + name + 8-byte first-block index.
pub const ENTRY_WIDTH: u64 = 1 + MAX_FILENAME_LENGTH as u64 + 8;

/// Appended-slot capacity of one folder bucket.
pub const CONTENT_SIZE: u64 = 50;

/// Length of the optional precomputed keystream prefix.
pub const CIPHER_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Image geometry: block count plus the block size the image was built
/// with. The block size is `FILE_BLOCK_SIZE` for production images; tests
/// shrink it to exercise chain behaviour with small payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub blocks: u64,
    pub block_size: u64,
}

impl Geometry {
    pub fn new(blocks: u64) -> Self {
        Geometry {
            blocks,
            block_size: FILE_BLOCK_SIZE,
        }
    }

    pub fn with_block_size(blocks: u64, block_size: u64) -> Self {
        debug_assert!(block_size > FILE_BLOCK_META);
        Geometry { blocks, block_size }
    }

    /// Number of bytes occupied by the volume bitmap.
    pub fn bitmap_bytes(&self) -> u64 {
        (self.blocks + 7) / 8
    }

    /// Byte offset of the block area.
    pub fn blocks_offset(&self) -> u64 {
        BITMAP_OFFSET + self.bitmap_bytes()
    }

    /// Byte offset of block `index`.
    pub fn block_offset(&self, index: u64) -> u64 {
        self.blocks_offset() + index * self.block_size
    }

    /// Payload bytes available in one block.
    pub fn block_write_space(&self) -> u32 {
        (self.block_size - FILE_BLOCK_META) as u32
    }

    /// Total byte length of a well-formed image.
    pub fn image_size(&self) -> u64 {
        self.blocks_offset() + self.blocks * self.block_size
    }

    /// [`image_size`](Self::image_size) with overflow reported as `None`.
    /// Mount-time validation runs this against untrusted block counts.
    pub fn checked_image_size(&self) -> Option<u64> {
        let bitmap = self.blocks.checked_add(7)? / 8;
        BITMAP_OFFSET
            .checked_add(bitmap)?
            .checked_add(self.blocks.checked_mul(self.block_size)?)
    }
}
