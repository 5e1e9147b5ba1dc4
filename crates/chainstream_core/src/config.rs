//! Chain configuration.

use crate::error::{ChainError, ChainResult};

/// Configuration for a [`crate::Chain`].
///
/// The block size is derived: `total_memory` is split across `block_count`
/// blocks and each block is rounded down to a whole number of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Size of one entry in bytes. Must be nonzero.
    pub entry_size: usize,

    /// Number of blocks circulating in the chain. Must be nonzero.
    pub block_count: usize,

    /// Memory budget shared by all blocks, in bytes.
    pub total_memory: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            entry_size: 8,
            block_count: 2,
            total_memory: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl ChainConfig {
    /// Creates a configuration for entries of `entry_size` bytes with default
    /// memory settings.
    #[must_use]
    pub fn new(entry_size: usize) -> Self {
        Self {
            entry_size,
            ..Self::default()
        }
    }

    /// Creates a configuration with an exact block size.
    ///
    /// `block_size` should be a multiple of `entry_size`; otherwise the
    /// derived block size rounds down.
    #[must_use]
    pub fn for_blocks(entry_size: usize, block_size: usize, block_count: usize) -> Self {
        Self {
            entry_size,
            block_count,
            total_memory: block_size.saturating_mul(block_count),
        }
    }

    /// Sets the entry size.
    #[must_use]
    pub const fn entry_size(mut self, size: usize) -> Self {
        self.entry_size = size;
        self
    }

    /// Sets the number of blocks.
    #[must_use]
    pub const fn block_count(mut self, count: usize) -> Self {
        self.block_count = count;
        self
    }

    /// Sets the total memory budget.
    #[must_use]
    pub const fn total_memory(mut self, bytes: usize) -> Self {
        self.total_memory = bytes;
        self
    }

    /// Checks that the configuration can hold at least one entry per block.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidConfig`] if the entry size or block count
    /// is zero, or if the memory budget cannot fit one entry per block.
    pub fn validate(&self) -> ChainResult<()> {
        if self.entry_size == 0 {
            return Err(ChainError::invalid_config("zero-size entries"));
        }
        if self.block_count == 0 {
            return Err(ChainError::invalid_config("block count zero"));
        }
        let minimum = self.entry_size.saturating_mul(self.block_count);
        if self.total_memory < minimum {
            return Err(ChainError::invalid_config(format!(
                "{} total memory, too small for {} blocks containing entries of size {}",
                self.total_memory, self.block_count, self.entry_size
            )));
        }
        Ok(())
    }

    /// Returns the block size this configuration produces.
    ///
    /// Only meaningful once [`validate`](Self::validate) succeeds.
    #[must_use]
    pub fn derived_block_size(&self) -> usize {
        self.total_memory / (self.block_count * self.entry_size) * self.entry_size
    }
}
