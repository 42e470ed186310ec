//! Run the character pipeline from stdin to stdout.
//!
//! Usage:
//!   charpipe [-c <capacity>] [-v] [--log-level <level>]
//!
//! Input ends at a line reading exactly `STOP` or at end-of-stream.

use charpipe_rs::{DEFAULT_CAPACITY, PipelineConfig, execute_threaded};
use clap::Parser;
use std::io;
use std::process;

/// Turn stdin lines into 80-character records on stdout.
///
/// Line breaks become spaces and every `++` becomes `^`.
#[derive(Parser)]
#[command(name = "charpipe", version)]
struct Cli {
    /// Capacity in bytes of each buffer between stages
    #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Show per-stage byte counts on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log level (RUST_LOG overrides)
    #[arg(long, default_value = "warn")]
    log_level: log::LevelFilter,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .parse_default_env()
        .init();

    let config = PipelineConfig::new(cli.capacity);
    if cli.verbose {
        eprintln!("Capacity: {} byte(s) per buffer", cli.capacity);
    }

    match execute_threaded(io::stdin(), io::stdout(), &config) {
        Ok(report) => {
            if cli.verbose {
                eprintln!("{report}");
            }
        }
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            process::exit(1);
        }
    }
}
