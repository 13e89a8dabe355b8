//! yq-provider - Find container images pinned to the `latest` tag
//!
//! yq-provider provides:
//! - YAML manifest scanning with configurable ignore rules
//! - Concurrent yq queries, one engine process per file
//! - Deduplicated incidents with file URI and line number
//! - Unified output format (jsonl/json/md)

use anyhow::Result;
use clap::Parser;

mod backends;
mod cli;
mod core;
mod flows;

#[cfg(test)]
mod testutil;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    core::logging::init_logging(cli.verbose, cli.quiet);
    cli::run(cli)
}
