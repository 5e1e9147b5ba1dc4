//! Fixed-stride entry stream over a chain position.

use crate::block::Block;
use crate::chain::ChainPosition;
use crate::link::Link;

/// Whether a stream has an entry under its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// An entry is available through `get`.
    Active,
    /// The stream ended; it never becomes active again.
    Exhausted,
}

/// A forward cursor over fixed-size entries spread across blocks.
///
/// The stream presents the blocks arriving at its position as one
/// sequence of `entry_size`-byte entries. Blocks with a valid size of zero
/// are skipped without being exposed, and each block is read only up to its
/// valid size. The same type serves producers: a producer writes through
/// [`get_mut`](Self::get_mut), advances, and finally calls
/// [`poison`](Self::poison) to end the stream exactly after the last entry
/// written.
///
/// Entry slices are derived from the current block on every access; the
/// stream keeps only offsets, never references into a block.
///
/// # Panics
///
/// `get`, `get_mut`, and `advance` panic when the stream is not active.
/// Check [`is_active`](Self::is_active) or [`state`](Self::state) first.
///
/// # Example
///
/// ```rust
/// use chainstream_core::{Chain, ChainConfig, Stream};
///
/// let mut chain = Chain::new(ChainConfig::for_blocks(4, 8, 2)).unwrap();
/// chain
///     .spawn_fn(|position| {
///         let mut out = Stream::new(position);
///         for word in [b"abcd", b"efgh", b"ijkl"] {
///             out.get_mut().copy_from_slice(word);
///             out.advance();
///         }
///         out.poison();
///         Ok(())
///     })
///     .unwrap();
///
/// let mut input = Stream::default();
/// chain.attach(&mut input).unwrap();
/// chain.complete_loop().unwrap();
///
/// let mut seen = Vec::new();
/// while input.is_active() {
///     seen.extend_from_slice(input.get());
///     input.advance();
/// }
/// assert_eq!(seen, b"abcdefghijkl");
/// ```
#[derive(Debug, Default)]
pub struct Stream {
    link: Option<Link>,
    offset: usize,
    end: usize,
    entry_size: usize,
    block_size: usize,
}

impl Stream {
    /// Creates a stream bound to `position`.
    ///
    /// Waits until the first non-empty block or the end of the stream
    /// arrives.
    #[must_use]
    pub fn new(position: ChainPosition) -> Self {
        let mut stream = Self::default();
        stream.init(position);
        stream
    }

    /// Binds an unbound stream to `position`.
    ///
    /// # Panics
    ///
    /// Panics if the stream is already bound.
    pub fn init(&mut self, position: ChainPosition) {
        assert!(self.link.is_none(), "stream initialized twice");
        self.entry_size = position.entry_size();
        self.block_size = position.block_size();
        self.link = Some(Link::new(position));
        self.start_block();
    }

    /// Returns the state of the stream.
    #[must_use]
    pub fn state(&self) -> StreamState {
        if self.is_active() {
            StreamState::Active
        } else {
            StreamState::Exhausted
        }
    }

    /// Returns true if an entry is under the cursor.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.link.as_ref().is_some_and(Link::is_valid)
    }

    /// Returns the entry under the cursor.
    ///
    /// # Panics
    ///
    /// Panics if the stream is not active.
    #[must_use]
    pub fn get(&self) -> &[u8] {
        let range = self.offset..self.offset + self.entry_size;
        &self.current_block().as_bytes()[range]
    }

    /// Returns the entry under the cursor for writing.
    ///
    /// # Panics
    ///
    /// Panics if the stream is not active.
    pub fn get_mut(&mut self) -> &mut [u8] {
        let range = self.offset..self.offset + self.entry_size;
        &mut self.current_block_mut().as_bytes_mut()[range]
    }

    /// Moves to the next entry, crossing into the next non-empty block when
    /// the current one is used up. Crossing a block may wait for upstream.
    ///
    /// # Panics
    ///
    /// Panics if the stream is not active.
    pub fn advance(&mut self) {
        assert!(self.is_active(), "advance on an inactive stream");
        debug_assert!(self.offset < self.end);
        self.offset += self.entry_size;
        if self.offset == self.end {
            if let Some(link) = self.link.as_mut() {
                link.advance();
            }
            self.start_block();
        }
    }

    /// Ends the stream after the entries written so far.
    ///
    /// The current block's valid size is cut to the bytes before the
    /// cursor, the block is passed on, and poison follows it. Downstream
    /// readers see every entry written before this call and nothing after.
    /// Does nothing if the stream is already exhausted, since the upstream
    /// poison has then been forwarded.
    pub fn poison(&mut self) {
        if !self.is_active() {
            return;
        }
        let written = self.offset;
        if let Some(link) = self.link.as_mut() {
            link.set_valid_size(written);
            link.advance();
            link.poison();
        }
        self.offset = 0;
        self.end = 0;
    }

    /// Returns the entry size, or zero for an unbound stream.
    #[must_use]
    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    /// Returns the block size, or zero for an unbound stream.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    // Skips empty blocks and resets the cursor to the start of the next
    // block with data, or leaves the stream exhausted.
    fn start_block(&mut self) {
        self.offset = 0;
        self.end = 0;
        let Some(link) = self.link.as_mut() else {
            return;
        };
        while link.block().is_some_and(|block| block.valid_size() == 0) {
            link.advance();
        }
        self.end = link.valid_size();
        debug_assert!(
            self.end % self.entry_size == 0,
            "block valid size {} is not a multiple of entry size {}",
            self.end,
            self.entry_size
        );
    }

    fn current_block(&self) -> &Block {
        match self.link.as_ref().and_then(Link::block) {
            Some(block) => block,
            None => panic!("stream is not active"),
        }
    }

    fn current_block_mut(&mut self) -> &mut Block {
        match self.link.as_mut().and_then(Link::block_mut) {
            Some(block) => block,
            None => panic!("stream is not active"),
        }
    }
}
