//! Block cursor over one chain position.

use crate::block::Block;
use crate::chain::ChainPosition;
use crate::queue::{BlockQueue, Delivery};
use std::sync::Arc;
use tracing::{debug, trace};

/// A cursor over the blocks arriving at one chain position.
///
/// The link holds at most one block at a time. Advancing hands the current
/// block to the next position and takes the next one from the previous
/// position, waiting if none is ready. When the upstream delivers poison the
/// link becomes invalid and forwards the poison right away, so the stages
/// behind it learn about the end of the stream without waiting for this link
/// to be dropped.
///
/// # Invariants
///
/// - Poison is forwarded downstream exactly once per link
/// - Blocks leave in the order they arrived
/// - A block held when the link is poisoned or dropped is passed on with a
///   valid size of zero, so it keeps circulating without exposing stale data
#[derive(Debug)]
pub struct Link {
    input: Arc<BlockQueue>,
    output: Arc<BlockQueue>,
    current: Option<Block>,
    poisoned: bool,
    bytes_seen: u64,
}

impl Link {
    /// Attaches to `position`, waiting for the first delivery.
    #[must_use]
    pub fn new(position: ChainPosition) -> Self {
        let (input, output) = position.into_queues();
        let mut link = Self {
            input,
            output,
            current: None,
            poisoned: false,
            bytes_seen: 0,
        };
        link.pull();
        link
    }

    /// Returns true while the link holds a block.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    /// Returns true once poison has been sent downstream.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Returns the current block, if any.
    #[must_use]
    pub fn block(&self) -> Option<&Block> {
        self.current.as_ref()
    }

    /// Returns the current block mutably, if any.
    pub fn block_mut(&mut self) -> Option<&mut Block> {
        self.current.as_mut()
    }

    /// Returns the current block's valid size, or zero when invalid.
    #[must_use]
    pub fn valid_size(&self) -> usize {
        self.current.as_ref().map_or(0, Block::valid_size)
    }

    /// Sets the current block's valid size.
    ///
    /// # Panics
    ///
    /// Panics if the link is invalid or `size` exceeds the block capacity.
    pub fn set_valid_size(&mut self, size: usize) {
        match self.current.as_mut() {
            Some(block) => block.set_valid_size(size),
            None => panic!("set_valid_size on an exhausted link"),
        }
    }

    /// Total valid bytes handed downstream so far.
    #[must_use]
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    /// Passes the current block downstream and waits for the next one.
    ///
    /// # Panics
    ///
    /// Panics if the link is invalid.
    pub fn advance(&mut self) {
        let Some(block) = self.current.take() else {
            panic!("advance on an exhausted link");
        };
        self.bytes_seen += block.valid_size() as u64;
        self.output.produce(Delivery::Block(block));
        self.pull();
    }

    /// Terminates the stream at this position.
    ///
    /// Any block still held is passed on empty, followed by poison. Does
    /// nothing if poison has already been forwarded.
    pub fn poison(&mut self) {
        if self.poisoned {
            return;
        }
        if let Some(mut block) = self.current.take() {
            block.set_valid_size(0);
            self.output.produce(Delivery::Block(block));
        }
        self.output.produce(Delivery::Poison);
        self.poisoned = true;
        trace!(bytes_seen = self.bytes_seen, "link poisoned");
    }

    fn pull(&mut self) {
        match self.input.consume() {
            Delivery::Block(block) => {
                trace!(valid_size = block.valid_size(), "link received block");
                self.current = Some(block);
            }
            Delivery::Poison => {
                trace!(bytes_seen = self.bytes_seen, "link received poison");
                self.current = None;
                if !self.poisoned {
                    self.output.produce(Delivery::Poison);
                    self.poisoned = true;
                }
            }
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if !self.poisoned {
            debug!(
                bytes_seen = self.bytes_seen,
                "link dropped before end of stream, forwarding poison"
            );
            self.poison();
        }
    }
}
