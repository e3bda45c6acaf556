//! # opus-convert
//!
//! A command-line tool converting folders of Bruker OPUS spectra into
//! CSV, NumPy or MATLAB files.
//!
//! ## Usage
//!
//! ```bash
//! # Convert every folder below ./measurements into .mat files in ./converted
//! opus-convert convert measurements -o converted
//!
//! # Split sample names into markup columns, three .npy files per folder
//! opus-convert convert measurements -f npy -s --drop-last-column
//!
//! # Inspect a result
//! opus-convert info converted/measurements_day1.mat
//!
//! # Generate synthetic input
//! opus-convert demo opus_demo
//! ```

mod cli;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity(), cli.quiet());
    cli::dispatch(cli)
}
