//! ChainStream CLI
//!
//! Command-line tools for files of fixed-size records.
//!
//! # Commands
//!
//! - `copy` - Copy a record file through a block pipeline
//! - `count` - Count the records in a file
//! - `head` - Copy the first records of a file into another

mod commands;
mod error;

use chainstream_core::ChainConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tools for files of fixed-size records.
#[derive(Parser)]
#[command(name = "chainstream")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Pipeline settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ChainArgs {
    /// Size of one record in bytes
    #[arg(short, long)]
    pub entry_size: usize,

    /// Exact block size in bytes (derived from --memory if omitted)
    #[arg(short, long)]
    pub block_size: Option<usize>,

    /// Number of circulating blocks
    #[arg(long, default_value = "2")]
    pub blocks: usize,

    /// Memory budget for all blocks, in bytes
    #[arg(long, default_value = "16777216")]
    pub memory: usize,
}

impl ChainArgs {
    /// Builds the chain configuration these arguments describe.
    pub fn config(&self) -> ChainConfig {
        match self.block_size {
            Some(block_size) => ChainConfig::for_blocks(self.entry_size, block_size, self.blocks),
            None => ChainConfig::new(self.entry_size)
                .block_count(self.blocks)
                .total_memory(self.memory),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a record file through a block pipeline
    Copy {
        /// Input record file
        input: PathBuf,

        /// Output record file
        output: PathBuf,

        #[command(flatten)]
        chain: ChainArgs,
    },

    /// Count the records in a file
    Count {
        /// Input record file
        input: PathBuf,

        #[command(flatten)]
        chain: ChainArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Copy the first records of a file into another
    Head {
        /// Input record file
        input: PathBuf,

        /// Output record file
        output: PathBuf,

        /// Number of records to keep
        #[arg(short = 'n', long)]
        count: u64,

        #[command(flatten)]
        chain: ChainArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose.
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Copy {
            input,
            output,
            chain,
        } => {
            commands::copy::run(&input, &output, &chain)?;
        }
        Commands::Count {
            input,
            chain,
            format,
        } => {
            commands::count::run(&input, &chain, &format)?;
        }
        Commands::Head {
            input,
            output,
            count,
            chain,
        } => {
            commands::head::run(&input, &output, count, &chain)?;
        }
    }

    Ok(())
}
