//! Workers moving blocks between a chain and byte streams.
//!
//! Record files have no header: they are entries concatenated back to back,
//! so a file of `n` entries is exactly `n * entry_size` bytes.

use crate::chain::{ChainPosition, Worker};
use crate::error::{ChainError, ChainResult};
use crate::link::Link;
use std::io::{self, Read, Write};
use tracing::debug;

/// Fills blocks from a reader and poisons the chain at end of input.
///
/// Belongs at the head of a chain.
#[derive(Debug)]
pub struct ReadWorker<R> {
    reader: R,
}

impl<R: Read + Send + 'static> ReadWorker<R> {
    /// Creates a worker reading from `reader`.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read + Send + 'static> Worker for ReadWorker<R> {
    fn run(mut self, position: ChainPosition) -> ChainResult<()> {
        let entry_size = position.entry_size();
        let mut link = Link::new(position);
        let mut total = 0u64;
        while let Some(block) = link.block_mut() {
            let got = read_or_eof(&mut self.reader, block.as_bytes_mut())?;
            if got % entry_size != 0 {
                return Err(ChainError::PartialEntry { got, entry_size });
            }
            if got == 0 {
                link.poison();
                debug!(bytes = total, "reader reached end of input");
                return Ok(());
            }
            block.set_valid_size(got);
            total += got as u64;
            link.advance();
        }
        debug!(bytes = total, "reader stopped by downstream poison");
        Ok(())
    }
}

/// Writes the valid bytes of every block to a writer.
#[derive(Debug)]
pub struct WriteWorker<W> {
    writer: W,
}

impl<W: Write + Send + 'static> WriteWorker<W> {
    /// Creates a worker writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send + 'static> Worker for WriteWorker<W> {
    fn run(mut self, position: ChainPosition) -> ChainResult<()> {
        let mut link = Link::new(position);
        while let Some(block) = link.block() {
            self.writer.write_all(block.valid_bytes())?;
            link.advance();
        }
        self.writer.flush()?;
        debug!(bytes = link.bytes_seen(), "writer finished");
        Ok(())
    }
}

/// Like [`WriteWorker`], but also resets each block to full size so the
/// head of the chain can refill it.
#[derive(Debug)]
pub struct WriteAndRecycle<W> {
    writer: W,
}

impl<W: Write + Send + 'static> WriteAndRecycle<W> {
    /// Creates a worker writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send + 'static> Worker for WriteAndRecycle<W> {
    fn run(mut self, position: ChainPosition) -> ChainResult<()> {
        let block_size = position.block_size();
        let mut link = Link::new(position);
        let mut total = 0u64;
        while let Some(block) = link.block_mut() {
            self.writer.write_all(block.valid_bytes())?;
            total += block.valid_size() as u64;
            block.set_valid_size(block_size);
            link.advance();
        }
        self.writer.flush()?;
        debug!(bytes = total, "writer finished");
        Ok(())
    }
}

// Reads until `buf` is full or the reader reports end of input.
fn read_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
