//! Fixed-capacity storage blocks.

use std::fmt;

/// Alignment guaranteed for the start of every block, in bytes.
pub const BLOCK_ALIGN: usize = std::mem::align_of::<u64>();

/// A fixed-capacity buffer circulating through a chain.
///
/// A block carries a **valid size**: the number of leading bytes that hold
/// produced entries. Fresh and recycled blocks are fully valid so that the
/// head of the chain can write the whole block; a producer shrinks the valid
/// size when it stops early.
///
/// Storage is word-backed so the first byte is always
/// [`BLOCK_ALIGN`]-aligned.
pub struct Block {
    words: Box<[u64]>,
    capacity: usize,
    valid_size: usize,
}

impl Block {
    /// Allocates a zeroed block of `capacity` bytes, fully valid.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let words = vec![0u64; capacity.div_ceil(BLOCK_ALIGN)].into_boxed_slice();
        Self {
            words,
            capacity,
            valid_size: capacity,
        }
    }

    /// Returns the capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of valid bytes.
    #[must_use]
    pub fn valid_size(&self) -> usize {
        self.valid_size
    }

    /// Sets the number of valid bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds the capacity.
    pub fn set_valid_size(&mut self, size: usize) {
        assert!(
            size <= self.capacity,
            "valid size {size} exceeds block capacity {}",
            self.capacity
        );
        self.valid_size = size;
    }

    /// Returns the full storage, valid or not.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.capacity]
    }

    /// Returns the full storage mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.capacity]
    }

    /// Returns the valid prefix of the storage.
    #[must_use]
    pub fn valid_bytes(&self) -> &[u8] {
        &self.as_bytes()[..self.valid_size]
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("capacity", &self.capacity)
            .field("valid_size", &self.valid_size)
            .finish()
    }
}
