//! Chains of worker positions sharing a pool of circulating blocks.
//!
//! A chain owns a ring of bounded queues. Position `i` reads from queue `i`
//! and writes to queue `i + 1`; the recycler closes the ring by feeding the
//! last queue back into the first. Blocks circulate around the ring, so the
//! block count bounds memory and every stage is throttled by the slowest.
//!
//! ```text
//! queue0 -> [position 0] -> queue1 -> [position 1] -> queue2 -> [recycler] -> queue0
//! ```

use crate::block::Block;
use crate::config::ChainConfig;
use crate::error::{ChainError, ChainResult};
use crate::link::Link;
use crate::queue::{BlockQueue, Delivery};
use crate::stream::Stream;
use crate::typed::TypedStream;
use bytemuck::Pod;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// A binding to one position in a chain: where blocks come from, where
/// they go, and the entry layout of the chain.
///
/// Every position handed out must be bound to a [`Link`] (directly, through
/// a [`Stream`], or by a [`Worker`]) before the chain finishes. An unbound
/// position never passes blocks on, so [`Chain::wait`] would block.
#[derive(Debug)]
pub struct ChainPosition {
    input: Arc<BlockQueue>,
    output: Arc<BlockQueue>,
    entry_size: usize,
    block_size: usize,
}

impl ChainPosition {
    /// Creates a position between two queues.
    ///
    /// [`Chain::add`] is the usual way to obtain positions; this is for
    /// wiring queues by hand.
    #[must_use]
    pub fn new(
        input: Arc<BlockQueue>,
        output: Arc<BlockQueue>,
        entry_size: usize,
        block_size: usize,
    ) -> Self {
        Self {
            input,
            output,
            entry_size,
            block_size,
        }
    }

    /// Returns the entry size of the chain.
    #[must_use]
    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    /// Returns the block size of the chain.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub(crate) fn into_queues(self) -> (Arc<BlockQueue>, Arc<BlockQueue>) {
        (self.input, self.output)
    }
}

/// A stage that runs on its own thread at one chain position.
///
/// Implemented for closures taking a [`ChainPosition`].
pub trait Worker: Send + 'static {
    /// Processes blocks at `position` until the stream ends.
    ///
    /// # Errors
    ///
    /// Errors are collected by [`Chain::wait`].
    fn run(self, position: ChainPosition) -> ChainResult<()>;
}

impl<F> Worker for F
where
    F: FnOnce(ChainPosition) -> ChainResult<()> + Send + 'static,
{
    fn run(self, position: ChainPosition) -> ChainResult<()> {
        self(position)
    }
}

/// Closes the ring: resets every block to full size and hands it back to
/// the head of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recycler;

impl Worker for Recycler {
    fn run(self, position: ChainPosition) -> ChainResult<()> {
        let block_size = position.block_size();
        let mut link = Link::new(position);
        while let Some(block) = link.block_mut() {
            block.set_valid_size(block_size);
            link.advance();
        }
        Ok(())
    }
}

/// A pipeline of positions sharing `block_count` blocks.
///
/// # Example
///
/// ```rust
/// use chainstream_core::{Chain, ChainConfig, Stream};
///
/// let mut chain = Chain::new(ChainConfig::for_blocks(8, 32, 2)).unwrap();
/// chain
///     .spawn_fn(|position| {
///         let mut out = Stream::new(position);
///         for i in 0u64..10 {
///             out.get_mut().copy_from_slice(&i.to_le_bytes());
///             out.advance();
///         }
///         out.poison();
///         Ok(())
///     })
///     .unwrap();
///
/// let mut input = chain.stream().unwrap();
/// chain.complete_loop().unwrap();
///
/// let mut count = 0;
/// while input.is_active() {
///     count += 1;
///     input.advance();
/// }
/// assert_eq!(count, 10);
/// drop(input);
/// chain.wait().unwrap();
/// ```
#[derive(Debug)]
pub struct Chain {
    config: ChainConfig,
    block_size: usize,
    queues: Vec<Arc<BlockQueue>>,
    workers: Vec<JoinHandle<ChainResult<()>>>,
    spare: Vec<Block>,
    complete_called: bool,
}

impl Chain {
    /// Creates a chain. No memory is allocated until the first position is
    /// added.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: ChainConfig) -> ChainResult<Self> {
        config.validate()?;
        let block_size = config.derived_block_size();
        debug!(
            entry_size = config.entry_size,
            block_size,
            block_count = config.block_count,
            "chain configured"
        );
        Ok(Self {
            config,
            block_size,
            queues: Vec::new(),
            workers: Vec::new(),
            spare: Vec::new(),
            complete_called: false,
        })
    }

    /// Returns the entry size.
    #[must_use]
    pub fn entry_size(&self) -> usize {
        self.config.entry_size
    }

    /// Returns the block size, a multiple of the entry size.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the number of circulating blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.config.block_count
    }

    /// Returns true between [`start`](Self::start) and [`wait`](Self::wait).
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.queues.is_empty()
    }

    /// Finishes any previous run and fills the head queue with blocks.
    ///
    /// Blocks returned by the previous run are reused.
    ///
    /// # Errors
    ///
    /// Returns the error from finishing the previous run, if any.
    pub fn start(&mut self) -> ChainResult<()> {
        self.wait()?;

        let block_count = self.config.block_count;
        let head = Arc::new(BlockQueue::new(self.queue_capacity()));
        let block_size = self.block_size;
        let mut blocks = std::mem::take(&mut self.spare);
        blocks.truncate(block_count);
        let reused = blocks.len();
        blocks.resize_with(block_count, || Block::new(block_size));
        for mut block in blocks {
            block.set_valid_size(block_size);
            head.produce(Delivery::Block(block));
        }
        self.queues.push(head);
        debug!(block_count, reused, "chain started");
        Ok(())
    }

    /// Adds a position at the end of the chain, starting it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::LoopClosed`] once the recycler is attached.
    pub fn add(&mut self) -> ChainResult<ChainPosition> {
        if self.complete_called {
            return Err(ChainError::LoopClosed);
        }
        if !self.is_running() {
            self.start()?;
        }
        let input = Arc::clone(self.last_queue());
        let output = Arc::new(BlockQueue::new(self.queue_capacity()));
        self.queues.push(Arc::clone(&output));
        Ok(ChainPosition::new(
            input,
            output,
            self.config.entry_size,
            self.block_size,
        ))
    }

    /// Binds `stream` to a new position and returns the chain, so several
    /// attachments compose in one expression.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::LoopClosed`] once the recycler is attached.
    ///
    /// # Panics
    ///
    /// Panics if `stream` is already bound.
    pub fn attach(&mut self, stream: &mut Stream) -> ChainResult<&mut Self> {
        let position = self.add()?;
        stream.init(position);
        Ok(self)
    }

    /// Returns a stream bound to a new position.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::LoopClosed`] once the recycler is attached.
    ///
    /// # Deadlocks
    ///
    /// Binding waits for the first non-empty block. Called on the thread that
    /// owns the chain before [`complete_loop`](Self::complete_loop), this
    /// blocks forever if the producers need more blocks than the chain holds
    /// before writing one, e.g. a single-block chain whose producer poisons
    /// without writing. In that case take the position with
    /// [`add`](Self::add), close the loop, then bind with [`Stream::new`].
    pub fn stream(&mut self) -> ChainResult<Stream> {
        Ok(Stream::new(self.add()?))
    }

    /// Returns a typed stream bound to a new position.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::RecordLayout`] if `T` does not match the entry
    /// size (checked before any position is added), or
    /// [`ChainError::LoopClosed`].
    ///
    /// # Deadlocks
    ///
    /// Same as [`stream`](Self::stream); the fallback order is
    /// [`add`](Self::add), [`complete_loop`](Self::complete_loop), then
    /// [`TypedStream::new`].
    pub fn typed_stream<T: Pod>(&mut self) -> ChainResult<TypedStream<T>> {
        TypedStream::<T>::check_layout(self.config.entry_size)?;
        TypedStream::new(self.add()?)
    }

    /// Runs `worker` on a new thread at a new position.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::LoopClosed`] once the recycler is attached, or
    /// an I/O error if the thread cannot be spawned.
    pub fn spawn<W: Worker>(&mut self, worker: W) -> ChainResult<&mut Self> {
        let position = self.add()?;
        self.spawn_at(position, worker)?;
        Ok(self)
    }

    /// Like [`spawn`](Self::spawn), for closures.
    ///
    /// # Errors
    ///
    /// Same as [`spawn`](Self::spawn).
    pub fn spawn_fn<F>(&mut self, worker: F) -> ChainResult<&mut Self>
    where
        F: FnOnce(ChainPosition) -> ChainResult<()> + Send + 'static,
    {
        self.spawn(worker)
    }

    /// Attaches the [`Recycler`], closing the ring.
    ///
    /// [`wait`](Self::wait) does this automatically, but a stream iterated
    /// on the calling thread needs the ring closed before it starts reading,
    /// or the head of the chain runs out of blocks. Binding a stream waits
    /// for the first non-empty block, so when that may take more blocks than
    /// the chain has, take the position with [`add`](Self::add), close the
    /// ring, then bind.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::LoopClosed`] if called twice in one run.
    pub fn complete_loop(&mut self) -> ChainResult<()> {
        if self.complete_called {
            return Err(ChainError::LoopClosed);
        }
        if !self.is_running() {
            self.start()?;
        }
        self.complete_called = true;
        if self.queues.len() == 1 {
            // No positions: the head queue already holds every block, so the
            // run ends here.
            self.queues[0].produce(Delivery::Poison);
            debug!("chain closed without positions");
            return Ok(());
        }
        let position = ChainPosition::new(
            Arc::clone(self.last_queue()),
            Arc::clone(&self.queues[0]),
            self.config.entry_size,
            self.block_size,
        );
        self.spawn_at(position, Recycler)
    }

    /// Waits for the current run to finish.
    ///
    /// Closes the ring if needed, joins every worker, then drains the
    /// queues, keeping the blocks for the next run.
    /// Streams owned by the calling thread must be exhausted or dropped
    /// first, otherwise the workers never see the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns the first worker error, [`ChainError::WorkerPanicked`], or
    /// [`ChainError::MissingPoison`] if no poison marker was left behind.
    pub fn wait(&mut self) -> ChainResult<()> {
        if self.queues.is_empty() {
            debug_assert!(self.workers.is_empty());
            return Ok(());
        }

        let mut outcome = Ok(());
        if !self.complete_called {
            outcome = self.complete_loop();
        }

        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("chain-worker").to_owned();
            let result = match handle.join() {
                Ok(result) => result,
                Err(_) => {
                    error!(worker = %name, "worker panicked");
                    Err(ChainError::worker_panicked(name))
                }
            };
            if let Err(e) = result {
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }

        // With every worker joined, each block sits in some queue. Usually
        // that is the head queue, but a consumer dropped early strands the
        // tail of the run in its own input queue.
        let block_count = self.config.block_count;
        let mut drained = 0;
        let mut poisoned = false;
        for queue in &self.queues {
            while let Some(delivery) = queue.try_consume() {
                match delivery {
                    Delivery::Block(block) => {
                        drained += 1;
                        if self.spare.len() < block_count {
                            self.spare.push(block);
                        }
                    }
                    Delivery::Poison => poisoned = true,
                }
            }
        }
        self.queues.clear();
        self.complete_called = false;
        debug!(drained, poisoned, "chain finished");

        if !poisoned && outcome.is_ok() {
            outcome = Err(ChainError::MissingPoison { blocks: drained });
        }
        outcome
    }

    fn spawn_at<W: Worker>(&mut self, position: ChainPosition, worker: W) -> ChainResult<()> {
        let name = format!("chain-worker-{}", self.workers.len());
        let handle = thread::Builder::new().name(name).spawn(move || {
            let result = worker.run(position);
            if let Err(e) = &result {
                error!(
                    worker = thread::current().name().unwrap_or("chain-worker"),
                    error = %e,
                    "worker failed"
                );
            }
            result
        })?;
        debug!(worker = ?handle.thread().name(), "worker spawned");
        self.workers.push(handle);
        Ok(())
    }

    fn last_queue(&self) -> &Arc<BlockQueue> {
        &self.queues[self.queues.len() - 1]
    }

    // One slot beyond the block count so a queue holding every block can
    // still take the poison marker.
    fn queue_capacity(&self) -> usize {
        self.config.block_count + 1
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        if let Err(e) = self.wait() {
            error!(error = %e, "chain did not finish cleanly");
        }
    }
}
