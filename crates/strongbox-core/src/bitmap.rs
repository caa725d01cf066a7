//! Volume bitmap: one bit per block, living immediately after the
//! superblock.
//!
//! Bit `i % 8` of byte `i / 8` records block `i`, tested with the mask
//! `1 << (7 - (i % 8))`. The bit order is part of the image format.

use crate::detail::BITMAP_OFFSET;
use crate::error::{Result, StrongboxError};
use crate::stream::ImageStream;
use std::io::SeekFrom;

fn mask(index: u64) -> u8 {
    1 << (7 - (index % 8))
}

fn check_bounds(index: u64, blocks: u64) -> Result<()> {
    if index >= blocks {
        return Err(StrongboxError::CorruptImage(format!(
            "block index {index} out of range ({blocks} blocks)"
        )));
    }
    Ok(())
}

/// Whether block `index` is allocated.
pub fn is_block_in_use(stream: &mut ImageStream<'_>, index: u64, blocks: u64) -> Result<bool> {
    check_bounds(index, blocks)?;
    let mut byte = [0u8];
    stream.seek(SeekFrom::Start(BITMAP_OFFSET + index / 8))?;
    stream.read(&mut byte)?;
    Ok(byte[0] & mask(index) != 0)
}

/// Sets or clears the allocation bit for block `index`.
pub fn set_block(
    stream: &mut ImageStream<'_>,
    index: u64,
    blocks: u64,
    in_use: bool,
) -> Result<()> {
    check_bounds(index, blocks)?;
    let offset = BITMAP_OFFSET + index / 8;
    let mut byte = [0u8];
    stream.seek(SeekFrom::Start(offset))?;
    stream.read(&mut byte)?;

    let already = byte[0] & mask(index) != 0;
    if already == in_use {
        if !in_use {
            tracing::warn!(block = index, "double free of volume block");
        }
        return Ok(());
    }

    if in_use {
        byte[0] |= mask(index);
    } else {
        byte[0] &= !mask(index);
    }
    stream.seek(SeekFrom::Start(offset))?;
    stream.write(&byte)?;
    stream.flush()?;
    Ok(())
}

fn read_bitmap(stream: &mut ImageStream<'_>, blocks: u64) -> Result<Vec<u8>> {
    let mut map = vec![0u8; ((blocks + 7) / 8) as usize];
    stream.seek(SeekFrom::Start(BITMAP_OFFSET))?;
    stream.read(&mut map)?;
    Ok(map)
}

/// Lowest free block index, or `None` when the volume is full.
pub fn find_first_free(stream: &mut ImageStream<'_>, blocks: u64) -> Result<Option<u64>> {
    let map = read_bitmap(stream, blocks)?;
    for index in 0..blocks {
        if map[(index / 8) as usize] & mask(index) == 0 {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// The `n` smallest free block indices, without setting their bits. Errs
/// with [`StrongboxError::NoSpace`] when fewer than `n` are free.
pub fn take_n(stream: &mut ImageStream<'_>, blocks: u64, n: usize) -> Result<Vec<u64>> {
    let map = read_bitmap(stream, blocks)?;
    let mut found = Vec::with_capacity(n);
    for index in 0..blocks {
        if found.len() == n {
            break;
        }
        if map[(index / 8) as usize] & mask(index) == 0 {
            found.push(index);
        }
    }
    if found.len() < n {
        return Err(StrongboxError::NoSpace);
    }
    Ok(found)
}

/// Number of allocated blocks.
pub fn count_in_use(stream: &mut ImageStream<'_>, blocks: u64) -> Result<u64> {
    let map = read_bitmap(stream, blocks)?;
    let mut count = 0u64;
    for index in 0..blocks {
        if map[(index / 8) as usize] & mask(index) != 0 {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_order_is_msb_first() {
        assert_eq!(mask(0), 0b1000_0000);
        assert_eq!(mask(7), 0b0000_0001);
        assert_eq!(mask(8), 0b1000_0000);
        assert_eq!(mask(13), 0b0000_0100);
    }
}
