/// Errors raised while decoding an OPUS file
#[derive(Debug, thiserror::Error)]
pub enum OpusError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file does not start with the OPUS signature
    #[error("missing OPUS signature")]
    BadSignature,

    /// The file is shorter than the block directory
    #[error("OPUS header truncated: {len} bytes")]
    HeaderTruncated {
        /// Actual file length
        len: usize,
    },

    /// A directory entry points past the end of the file
    #[error("block at offset {offset} ({length} bytes) exceeds file size {file_size}")]
    BlockOutOfBounds {
        /// Block start
        offset: usize,
        /// Block length in bytes
        length: usize,
        /// Actual file length
        file_size: usize,
    },

    /// A data block has no matching parameter block
    #[error("no parameter block for {0} data")]
    MissingParameterBlock(&'static str),

    /// A required parameter is absent from the parameter block
    #[error("missing parameter {0}")]
    MissingParameter(&'static str),

    /// A parameter entry is malformed or has an unusable value
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Three-letter parameter name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// The data block holds fewer points than NPT announces
    #[error("data block holds {available} points, {expected} expected")]
    ShortData {
        /// Points announced by NPT
        expected: usize,
        /// Points actually present
        available: usize,
    },
}
