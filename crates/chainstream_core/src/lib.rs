//! # ChainStream Core
//!
//! Fixed-stride entry streams over a recycling block pipeline.
//!
//! A [`Chain`] circulates a fixed number of equally sized [`Block`]s through
//! a ring of bounded queues. Each stage of the pipeline sits at one
//! [`ChainPosition`] and usually runs on its own thread. A [`Stream`] attached
//! to a position presents the blocks passing through it as one sequence of
//! fixed-size entries, hiding block boundaries, empty blocks, and partially
//! filled blocks from the caller.
//!
//! ## Design Principles
//!
//! - Entries are accessed in place, never copied out of their block
//! - Memory is bounded by the block count; slow stages throttle fast ones
//! - End of stream is a poison marker that follows the last block
//! - Misusing a stream panics; pipeline failures are [`ChainError`]s
//!
//! ## Example
//!
//! ```rust
//! use chainstream_core::{Chain, ChainConfig, Stream};
//!
//! let mut chain = Chain::new(ChainConfig::for_blocks(4, 8, 2)).unwrap();
//! chain
//!     .spawn_fn(|position| {
//!         let mut out = Stream::new(position);
//!         for i in 0u32..5 {
//!             out.get_mut().copy_from_slice(&i.to_le_bytes());
//!             out.advance();
//!         }
//!         out.poison();
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let mut input = Stream::default();
//! chain.attach(&mut input).unwrap();
//! chain.complete_loop().unwrap();
//!
//! let mut sum = 0;
//! while input.is_active() {
//!     sum += u32::from_le_bytes(input.get().try_into().unwrap());
//!     input.advance();
//! }
//! assert_eq!(sum, 10);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod block;
mod chain;
mod config;
mod error;
mod io;
mod link;
mod queue;
mod stream;
mod typed;

pub use block::{Block, BLOCK_ALIGN};
pub use chain::{Chain, ChainPosition, Recycler, Worker};
pub use config::ChainConfig;
pub use error::{ChainError, ChainResult};
pub use io::{ReadWorker, WriteAndRecycle, WriteWorker};
pub use link::Link;
pub use queue::{BlockQueue, Delivery};
pub use stream::{Stream, StreamState};
pub use typed::TypedStream;
