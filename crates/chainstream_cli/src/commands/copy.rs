//! Copy command implementation.

use crate::error::CliError;
use crate::ChainArgs;
use chainstream_core::{Chain, ReadWorker, WriteAndRecycle};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Runs the copy command.
pub fn run(input: &Path, output: &Path, args: &ChainArgs) -> Result<(), CliError> {
    info!("Copying {:?} to {:?}", input, output);

    let bytes = copy(input, output, args)?;

    println!(
        "Copied {} records ({} bytes)",
        bytes / args.entry_size as u64,
        bytes
    );
    Ok(())
}

/// Copies `input` to `output` through a chain, returning the bytes copied.
pub fn copy(input: &Path, output: &Path, args: &ChainArgs) -> Result<u64, CliError> {
    let reader = File::open(input).map_err(CliError::file(input))?;
    let writer = File::create(output).map_err(CliError::file(output))?;

    let mut chain = Chain::new(args.config())?;
    chain
        .spawn(ReadWorker::new(reader))?
        .spawn(WriteAndRecycle::new(BufWriter::new(writer)))?;
    chain.wait()?;

    let bytes = std::fs::metadata(output)
        .map_err(CliError::file(output))?
        .len();
    Ok(bytes)
}
