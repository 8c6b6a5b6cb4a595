//! audiotidy - reorganize an on-disk audio collection.
//!
//! Infers artist, date, disc, track, and title from file paths, reconciles
//! them against embedded tags, then re-encodes and renames everything into
//! a canonical Artist/Album/Track layout. Dry run by default; pass --write
//! to touch the disk.

pub mod art;
pub mod cli;
pub mod error;
pub mod fsutil;
pub mod info;
pub mod metadata;
pub mod organizer;
pub mod parse;
pub mod probe;
#[cfg(test)]
pub mod test_utils;
pub mod transcode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("audiotidy=info".parse().unwrap()))
        .init();

    cli::run(&args)
}
