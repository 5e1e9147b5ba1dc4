//! Count command implementation.

use crate::error::CliError;
use crate::ChainArgs;
use chainstream_core::{Chain, ReadWorker, Stream};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Record count result.
#[derive(Debug, Serialize)]
pub struct CountResult {
    /// Input file path.
    pub path: String,
    /// Record size in bytes.
    pub entry_size: usize,
    /// Block size used by the pipeline.
    pub block_size: usize,
    /// Number of records.
    pub records: u64,
    /// Total record bytes.
    pub bytes: u64,
}

/// Runs the count command.
pub fn run(input: &Path, args: &ChainArgs, format: &str) -> Result<(), CliError> {
    if format != "text" && format != "json" {
        return Err(CliError::UnknownFormat(format.to_owned()));
    }
    info!("Counting records in {:?}", input);

    let result = count(input, args)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("File:        {}", result.path);
            println!("Record size: {} bytes", result.entry_size);
            println!("Block size:  {} bytes", result.block_size);
            println!("Records:     {}", result.records);
            println!("Total:       {} bytes", result.bytes);
        }
    }
    Ok(())
}

/// Counts the records in `input` by walking a stream over it.
pub fn count(input: &Path, args: &ChainArgs) -> Result<CountResult, CliError> {
    let reader = File::open(input).map_err(CliError::file(input))?;

    let mut chain = Chain::new(args.config())?;
    let mut records = Stream::default();
    chain.spawn(ReadWorker::new(reader))?.attach(&mut records)?;
    chain.complete_loop()?;

    let mut count = 0u64;
    while records.is_active() {
        count += 1;
        records.advance();
    }
    drop(records);
    chain.wait()?;

    Ok(CountResult {
        path: input.display().to_string(),
        entry_size: chain.entry_size(),
        block_size: chain.block_size(),
        records: count,
        bytes: count * chain.entry_size() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn counts_records() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        fs::write(&input, vec![0u8; 6 * 77]).unwrap();
        let args = ChainArgs {
            entry_size: 6,
            block_size: None,
            blocks: 2,
            memory: 120,
        };

        let result = count(&input, &args).unwrap();

        assert_eq!(result.records, 77);
        assert_eq!(result.bytes, 6 * 77);
        assert_eq!(result.block_size, 60);
    }

    #[test]
    fn empty_file_has_no_records() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let args = ChainArgs {
            entry_size: 8,
            block_size: Some(64),
            blocks: 2,
            memory: 0,
        };

        assert_eq!(count(file.path(), &args).unwrap().records, 0);
    }

    #[test]
    fn rejects_unknown_format() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let args = ChainArgs {
            entry_size: 8,
            block_size: None,
            blocks: 2,
            memory: 1024,
        };
        let err = run(file.path(), &args, "xml").unwrap_err();
        assert!(matches!(err, CliError::UnknownFormat(_)));
    }

    #[test]
    fn json_output_has_fields() {
        let result = CountResult {
            path: "records.bin".into(),
            entry_size: 8,
            block_size: 64,
            records: 3,
            bytes: 24,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["records"], 3);
        assert_eq!(json["entry_size"], 8);
    }
}
