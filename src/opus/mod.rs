//! # OPUS Input Module
//!
//! Decoding of Bruker OPUS spectral files, exposed through the [`SpectralSource`]
//! capability the conversion pipeline consumes.
//!
//! The pipeline only needs three operations: a file-type predicate, a listing of
//! the blocks in a file, and decoding of one block into an (x, y) pair. Keeping
//! them behind a trait lets tests and alternative decoders substitute their own
//! implementation without touching the directory walk.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use opus_convert::opus::{BlockKind, OpusReader, SpectralSource};
//!
//! let reader = OpusReader::new();
//! let path = Path::new("session/sample_A_1.0");
//! if reader.is_eligible(path) {
//!     for block in reader.list_blocks(path)? {
//!         if block.kind == BlockKind::Absorbance {
//!             let spectrum = reader.read_block(path, &block)?;
//!             println!("{} points", spectrum.x.len());
//!         }
//!     }
//! }
//! # Ok::<(), opus_convert::opus::OpusError>(())
//! ```

mod builder;
mod error;
mod parser;

use std::fs::File;
use std::io::Read;
use std::path::Path;

pub use builder::{OpusBuilder, MAX_BLOCKS};
pub use error::OpusError;
pub use parser::{
    linspace, BlockInfo, BlockKind, OpusFile, ParameterBlock, ParameterValue, SpectralBlock,
    OPUS_MAGIC,
};

/// Capability to recognise and decode spectral files
pub trait SpectralSource {
    /// True only for regular files carrying the decoder's format signature
    fn is_eligible(&self, path: &Path) -> bool;

    /// Blocks stored in the file, in file order
    fn list_blocks(&self, path: &Path) -> Result<Vec<BlockInfo>, OpusError>;

    /// Decode one block listed by [`list_blocks`](Self::list_blocks)
    fn read_block(&self, path: &Path, block: &BlockInfo) -> Result<SpectralBlock, OpusError>;
}

/// [`SpectralSource`] backed by OPUS files on disk
///
/// Every call opens the file afresh; nothing is cached between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpusReader;

impl OpusReader {
    /// Create a reader
    pub fn new() -> Self {
        Self
    }
}

impl SpectralSource for OpusReader {
    fn is_eligible(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }

        let mut magic = [0u8; 4];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut magic))
            .map(|_| magic == OPUS_MAGIC)
            .unwrap_or(false)
    }

    fn list_blocks(&self, path: &Path) -> Result<Vec<BlockInfo>, OpusError> {
        Ok(OpusFile::open(path)?.blocks().to_vec())
    }

    fn read_block(&self, path: &Path, block: &BlockInfo) -> Result<SpectralBlock, OpusError> {
        OpusFile::open(path)?.read_block(block)
    }
}
