//! # opus-convert - Batch Conversion of OPUS Spectra
//!
//! `opus_convert` turns directory trees of Bruker OPUS measurement files into
//! matrices ready for analysis: one artifact per folder, holding the shared
//! wavenumber grid, a per-sample metadata ("markup") table derived from the
//! file names, and the spectra matrix.
//!
//! ## Key Features
//!
//! - **Recursive walk**: every folder within a depth bound that directly
//!   contains OPUS files becomes one result, named after the folder path.
//!
//! - **Strict aggregation**: all absorbance spectra of a folder must share the
//!   same wavenumber grid bit for bit, otherwise the folder is rejected whole.
//!
//! - **Three output formats**: delimited text (joined or split), NumPy `.npy`
//!   arrays, or a MATLAB level-5 `.mat` container.
//!
//! - **Idempotent and isolated**: existing results are skipped unless
//!   overwriting is requested, a failing folder never stops the walk, and
//!   artifacts are only renamed into place once fully encoded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//! use opus_convert::prelude::*;
//!
//! let config = ConversionConfig {
//!     output: OutputLocation::Directory(PathBuf::from("converted")),
//!     markup: MarkupOptions::split_on("_"),
//!     export: ExportOptions {
//!         format: OutputFormat::Npy,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//!
//! let reader = OpusReader::new();
//! let report = DirectoryWalker::new(&reader, &config).run(Path::new("measurements"))?;
//! println!("{report}");
//! # Ok::<(), opus_convert::error::ConvertError>(())
//! ```
//!
//! For a root folder `measurements` this produces:
//!
//! ```text
//! converted/
//! ├── measurements_day1_wavenumbers.npy
//! ├── measurements_day1_markup.npy
//! └── measurements_day1_spectra.npy
//! ```
//!
//! ## Architecture
//!
//! - [`opus`]: OPUS decoding behind the [`opus::SpectralSource`] capability
//! - [`aggregate`]: per-folder batch of spectra with a single wavenumber grid
//! - [`markup`]: sample metadata table from file names
//! - [`export`]: CSV, NPY and MAT encoders and the atomic [`export::ResultWriter`]
//! - [`walker`]: depth-bounded traversal with per-folder failure isolation
//! - [`report`]: summary of a walk

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod aggregate;
pub mod error;
pub mod export;
pub mod markup;
pub mod opus;
pub mod report;
pub mod walker;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::aggregate::{Batch, Sample, SpectrumAggregator};
    pub use crate::error::{ConvertError, Result};
    pub use crate::export::{
        read_mat, read_npy, ExportOptions, MatValue, NpyArray, OutputFormat, ResultWriter,
    };
    pub use crate::markup::{MarkupBuilder, MarkupOptions, MarkupTable, EMPTY_CELL};
    pub use crate::opus::{
        BlockInfo, BlockKind, OpusBuilder, OpusError, OpusReader, SpectralBlock, SpectralSource,
    };
    pub use crate::report::{FolderOutcome, FolderResult, WalkReport};
    pub use crate::walker::{
        ConversionConfig, DirectoryWalker, FolderPathKey, OutputLocation, DEFAULT_SEARCH_DEPTH,
    };
}
