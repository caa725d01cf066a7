//! Counter-mode stream cipher over a 64-bit block cipher.
//!
//! The keystream is position-addressable: byte `i` lives at byte `i % 8` of
//! keystream block `i / 8`, and block `j` is the encipherment of the
//! counter `iv + j`. XOR-ing a buffer against the keystream at its image
//! offset therefore works identically for reads and writes.
//!
//! An instance may cache a keystream prefix. The cache is an optimisation
//! only: any range that falls inside it produces bytes identical to the
//! on-the-fly path.

pub mod xtea;

use crate::detail::CIPHER_BUFFER_SIZE;
use crate::error::{Result, StrongboxError};
use crate::events::{ProgressEvent, ProgressSink};
use zeroize::{Zeroize, Zeroizing};

/// Scrypt cost parameters for deriving the cipher key from a password.
///
/// The defaults match the image format's reference derivation. Shrinking
/// them weakens brute-force resistance but does not affect the wire format,
/// which only sees the 16 derived bytes.
#[derive(Debug, Clone, Copy)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams {
            log_n: 20,
            r: 8,
            p: 1,
        }
    }
}

/// Cipher algorithm selector. One variant today; the sum type leaves room
/// for alternative 64-bit ciphers without changing the transformer API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherVariant {
    Xtea64 { rounds: u32 },
}

/// Position-addressable CTR keystream bound to one derived key.
pub struct ByteTransformer {
    key: [u32; 4],
    iv: u64,
    variant: CipherVariant,
    cached_prefix: Vec<u8>,
}

impl ByteTransformer {
    /// Derives the key from `password` and salt `iv`, emitting progress
    /// events to `sink`. When `cache_prefix` is set the first
    /// [`CIPHER_BUFFER_SIZE`] keystream bytes are precomputed.
    pub fn new(
        password: &[u8],
        iv: u64,
        variant: CipherVariant,
        kdf: KdfParams,
        sink: &ProgressSink,
        cache_prefix: bool,
    ) -> Result<Self> {
        sink(ProgressEvent::KeyGenBegin);
        let key = derive_key(password, iv, kdf)?;
        sink(ProgressEvent::KeyGenEnd);

        let mut transformer = ByteTransformer {
            key,
            iv,
            variant,
            cached_prefix: Vec::new(),
        };
        if cache_prefix {
            transformer.build_cipher_buffer(CIPHER_BUFFER_SIZE, sink);
        }
        Ok(transformer)
    }

    pub fn variant(&self) -> CipherVariant {
        self.variant
    }

    /// XORs `input` with the keystream starting at `stream_offset`, writing
    /// the result into `output`. Self-inverse: applying it twice at the
    /// same offset restores the original bytes.
    pub fn transform(&self, input: &[u8], output: &mut [u8], stream_offset: u64) {
        debug_assert_eq!(input.len(), output.len());
        let len = input.len() as u64;

        if !self.cached_prefix.is_empty() && stream_offset + len <= self.cached_prefix.len() as u64
        {
            let start = stream_offset as usize;
            for (i, (inb, outb)) in input.iter().zip(output.iter_mut()).enumerate() {
                *outb = inb ^ self.cached_prefix[start + i];
            }
            return;
        }

        let mut block_index = stream_offset / 8;
        let mut keystream = self.keystream_block(block_index);
        for (i, (inb, outb)) in input.iter().zip(output.iter_mut()).enumerate() {
            let pos = stream_offset + i as u64;
            if pos / 8 != block_index {
                block_index = pos / 8;
                keystream = self.keystream_block(block_index);
            }
            *outb = inb ^ keystream[(pos % 8) as usize];
        }
    }

    /// In-place convenience over [`transform`](Self::transform).
    pub fn transform_in_place(&self, buf: &mut [u8], stream_offset: u64) {
        let mut block_index = u64::MAX;
        let mut keystream = [0u8; 8];
        let len = buf.len() as u64;

        if !self.cached_prefix.is_empty() && stream_offset + len <= self.cached_prefix.len() as u64
        {
            let start = stream_offset as usize;
            for (i, b) in buf.iter_mut().enumerate() {
                *b ^= self.cached_prefix[start + i];
            }
            return;
        }

        for (i, b) in buf.iter_mut().enumerate() {
            let pos = stream_offset + i as u64;
            if pos / 8 != block_index {
                block_index = pos / 8;
                keystream = self.keystream_block(block_index);
            }
            *b ^= keystream[(pos % 8) as usize];
        }
    }

    fn keystream_block(&self, index: u64) -> [u8; 8] {
        let mut block = self.iv.wrapping_add(index).to_be_bytes();
        match self.variant {
            CipherVariant::Xtea64 { rounds } => xtea::encipher(rounds, &mut block, &self.key),
        }
        block
    }

    fn build_cipher_buffer(&mut self, len: usize, sink: &ProgressSink) {
        const CHUNK: usize = 64 * 1024;
        sink(ProgressEvent::BigCipherBuildBegin);
        let mut prefix = vec![0u8; len];
        for (chunk_index, chunk) in prefix.chunks_mut(CHUNK).enumerate() {
            let base = (chunk_index * CHUNK) as u64;
            let mut keystream = self.keystream_block(base / 8);
            let mut block_index = base / 8;
            for (i, b) in chunk.iter_mut().enumerate() {
                let pos = base + i as u64;
                if pos / 8 != block_index {
                    block_index = pos / 8;
                    keystream = self.keystream_block(block_index);
                }
                *b = keystream[(pos % 8) as usize];
            }
            sink(ProgressEvent::CipherBuildUpdate);
        }
        self.cached_prefix = prefix;
        sink(ProgressEvent::BigCipherBuildEnd);
    }

    /// Test hook: cache a prefix of an arbitrary length.
    #[doc(hidden)]
    pub fn cache_prefix_len(&mut self, len: usize, sink: &ProgressSink) {
        self.build_cipher_buffer(len, sink);
    }
}

impl Drop for ByteTransformer {
    fn drop(&mut self) {
        self.key.zeroize();
        self.cached_prefix.zeroize();
    }
}

fn derive_key(password: &[u8], iv: u64, kdf: KdfParams) -> Result<[u32; 4]> {
    let params = scrypt::Params::new(kdf.log_n, kdf.r, kdf.p, 16).map_err(|e| {
        StrongboxError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid scrypt parameters: {e}"),
        ))
    })?;
    let salt = iv.to_be_bytes();
    let mut raw = Zeroizing::new([0u8; 16]);
    scrypt::scrypt(password, &salt, &params, &mut raw[..]).map_err(|e| {
        StrongboxError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("key derivation failed: {e}"),
        ))
    })?;

    let mut key = [0u32; 4];
    for (word, bytes) in key.iter_mut().zip(raw.chunks_exact(4)) {
        *word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    Ok(key)
}
