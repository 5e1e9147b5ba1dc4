//! Typed view over an entry stream.

use crate::block::BLOCK_ALIGN;
use crate::chain::ChainPosition;
use crate::error::{ChainError, ChainResult};
use crate::link::Link;
use crate::stream::{Stream, StreamState};
use bytemuck::Pod;
use std::fmt;
use std::marker::PhantomData;

/// A [`Stream`] whose entries are read and written as `T`.
///
/// The record layout is checked once, when the view is created: `T` must be
/// exactly one entry long and its alignment must not exceed the block
/// alignment. Access then reinterprets the entry bytes in place, with no
/// copies and no per-access checks beyond the stream's own.
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use chainstream_core::{Chain, ChainConfig, TypedStream};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
/// #[repr(C)]
/// struct Pair {
///     key: u32,
///     value: u32,
/// }
///
/// let mut chain = Chain::new(ChainConfig::for_blocks(8, 16, 2)).unwrap();
/// chain
///     .spawn_fn(|position| {
///         let mut out = TypedStream::<Pair>::new(position)?;
///         for key in 0..3 {
///             *out.get_mut() = Pair { key, value: key * 10 };
///             out.advance();
///         }
///         out.poison();
///         Ok(())
///     })
///     .unwrap();
///
/// let mut input = chain.typed_stream::<Pair>().unwrap();
/// chain.complete_loop().unwrap();
/// let mut values = Vec::new();
/// while input.is_active() {
///     values.push(input.get().value);
///     input.advance();
/// }
/// assert_eq!(values, vec![0, 10, 20]);
/// ```
pub struct TypedStream<T> {
    stream: Stream,
    _marker: PhantomData<T>,
}

impl<T: Pod> TypedStream<T> {
    /// Checks that `T` fits entries of `entry_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::RecordLayout`] on a size mismatch or an
    /// alignment larger than [`BLOCK_ALIGN`].
    pub fn check_layout(entry_size: usize) -> ChainResult<()> {
        let size = std::mem::size_of::<T>();
        if entry_size == 0 || size != entry_size || std::mem::align_of::<T>() > BLOCK_ALIGN {
            return Err(ChainError::record_layout::<T>(entry_size));
        }
        Ok(())
    }

    /// Creates a typed stream bound to `position`.
    ///
    /// On a layout mismatch the position is still bound and immediately
    /// released, so it forwards poison and the rest of the chain can finish.
    /// To reject a record type without consuming a position, call
    /// [`check_layout`](Self::check_layout) first.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::RecordLayout`] if `T` does not fit the entries.
    pub fn new(position: ChainPosition) -> ChainResult<Self> {
        if let Err(e) = Self::check_layout(position.entry_size()) {
            drop(Link::new(position));
            return Err(e);
        }
        Ok(Self {
            stream: Stream::new(position),
            _marker: PhantomData,
        })
    }

    /// Wraps a bound stream.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::RecordLayout`] if `T` does not fit the entries,
    /// including when the stream is unbound. The stream is dropped in that
    /// case.
    pub fn from_stream(stream: Stream) -> ChainResult<Self> {
        Self::check_layout(stream.entry_size())?;
        Ok(Self {
            stream,
            _marker: PhantomData,
        })
    }

    /// Returns the record under the cursor.
    ///
    /// # Panics
    ///
    /// Panics if the stream is not active.
    #[must_use]
    pub fn get(&self) -> &T {
        bytemuck::from_bytes(self.stream.get())
    }

    /// Returns the record under the cursor for writing.
    ///
    /// # Panics
    ///
    /// Panics if the stream is not active.
    pub fn get_mut(&mut self) -> &mut T {
        bytemuck::from_bytes_mut(self.stream.get_mut())
    }

    /// See [`Stream::state`].
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.stream.state()
    }

    /// See [`Stream::is_active`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stream.is_active()
    }

    /// See [`Stream::advance`].
    pub fn advance(&mut self) {
        self.stream.advance();
    }

    /// See [`Stream::poison`].
    pub fn poison(&mut self) {
        self.stream.poison();
    }

    /// Returns the underlying byte stream.
    #[must_use]
    pub fn as_stream(&self) -> &Stream {
        &self.stream
    }

    /// Unwraps the underlying byte stream.
    #[must_use]
    pub fn into_inner(self) -> Stream {
        self.stream
    }
}

impl<T> fmt::Debug for TypedStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedStream")
            .field("record", &std::any::type_name::<T>())
            .field("stream", &self.stream)
            .finish()
    }
}
