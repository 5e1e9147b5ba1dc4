//! Head command implementation.

use crate::error::CliError;
use crate::ChainArgs;
use chainstream_core::{Chain, ReadWorker, Stream, WriteAndRecycle};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

/// Runs the head command.
pub fn run(input: &Path, output: &Path, count: u64, args: &ChainArgs) -> Result<(), CliError> {
    info!("Keeping the first {} records of {:?}", count, input);

    let kept = head(input, output, count, args)?;

    println!("Wrote {} records to {}", kept, output.display());
    Ok(())
}

/// Copies at most `count` records from `input` to `output`.
///
/// Records flow from a reading chain into a writing chain. The writing side
/// is poisoned after the last record kept, which also ends the reading side
/// early instead of reading the rest of the input.
pub fn head(input: &Path, output: &Path, count: u64, args: &ChainArgs) -> Result<u64, CliError> {
    let reader = File::open(input).map_err(CliError::file(input))?;
    let writer = File::create(output).map_err(CliError::file(output))?;

    let mut source = Chain::new(args.config())?;
    let mut records = Stream::default();
    source.spawn(ReadWorker::new(reader))?.attach(&mut records)?;
    source.complete_loop()?;

    let mut sink = Chain::new(args.config())?;
    let mut kept = Stream::default();
    sink.attach(&mut kept)?
        .spawn(WriteAndRecycle::new(BufWriter::new(writer)))?;
    sink.complete_loop()?;

    // poison() keeps only entries behind the cursor, so the last kept record
    // is advanced past too. When it ends a block, that advance waits for one
    // more recycled block, which poison() then passes on empty.
    let mut written = 0u64;
    while written < count && records.is_active() {
        kept.get_mut().copy_from_slice(records.get());
        kept.advance();
        records.advance();
        written += 1;
    }
    kept.poison();
    debug!(written, exhausted = !records.is_active(), "head finished");
    drop(records);
    drop(kept);

    sink.wait()?;
    source.wait()?;
    Ok(written)
}
