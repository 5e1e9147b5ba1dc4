//! Bounded blocking queue connecting adjacent chain positions.

use crate::block::Block;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// One item passed between chain positions.
#[derive(Debug)]
pub enum Delivery {
    /// A block, with its valid size set by the upstream stage.
    Block(Block),
    /// End-of-stream marker.
    Poison,
}

/// A bounded producer/consumer queue.
///
/// `produce` blocks while the queue is full and `consume` blocks while it is
/// empty. This is where backpressure comes from: the fixed number of blocks
/// in a chain bounds how far any stage can run ahead.
#[derive(Debug)]
pub struct BlockQueue {
    items: Mutex<VecDeque<Delivery>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl BlockQueue {
    /// Creates a queue holding at most `capacity` deliveries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be nonzero");
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Appends a delivery, waiting for room if the queue is full.
    pub fn produce(&self, delivery: Delivery) {
        let mut items = self.items.lock();
        while items.len() == self.capacity {
            self.not_full.wait(&mut items);
        }
        items.push_back(delivery);
        drop(items);
        self.not_empty.notify_one();
    }

    /// Removes the oldest delivery, waiting until one is available.
    pub fn consume(&self) -> Delivery {
        let mut items = self.items.lock();
        let delivery = loop {
            if let Some(delivery) = items.pop_front() {
                break delivery;
            }
            self.not_empty.wait(&mut items);
        };
        drop(items);
        self.not_full.notify_one();
        delivery
    }

    /// Removes the oldest delivery if one is queued.
    pub fn try_consume(&self) -> Option<Delivery> {
        let delivery = self.items.lock().pop_front();
        if delivery.is_some() {
            self.not_full.notify_one();
        }
        delivery
    }

    /// Returns the number of queued deliveries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Returns the maximum number of queued deliveries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
