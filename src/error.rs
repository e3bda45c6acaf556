//! Pipeline error taxonomy

use crate::opus::OpusError;

/// Errors raised by the conversion pipeline
///
/// Batch errors (`InconsistentAxis`, `MarkupShape`, decoder and write failures)
/// abort one folder only. `ArtifactExists` is an advisory skip. `Configuration`
/// aborts the whole run before any traversal.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The decoder could not read a spectral file
    #[error("Cannot decode {path}: {source}")]
    DecodeError {
        /// File that failed to decode
        path: String,
        /// Underlying decoder error
        #[source]
        source: OpusError,
    },

    /// Absorbance x-axes differ between files of one folder
    #[error("Wavenumbers inconsistent for {folder} (first mismatch in {file})")]
    InconsistentAxis {
        /// Folder holding the batch
        folder: String,
        /// First file whose axis differs from the first file's
        file: String,
    },

    /// Split sample names have unequal column counts and reconciliation is off
    #[error("Names in {folder} cannot be split into a table (row lengths {min} to {max})")]
    MarkupShape {
        /// Folder holding the batch
        folder: String,
        /// Shortest row
        min: usize,
        /// Longest row
        max: usize,
    },

    /// The output artifact exists and overwriting was not requested
    #[error("The result for {0} already exists")]
    ArtifactExists(String),

    /// Incompatible or invalid options
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Error from the CSV writer
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// A finished temp file could not be moved into place
    #[error("Cannot persist artifact: {0}")]
    PersistError(#[from] tempfile::PersistError),

    /// An artifact being read back is malformed
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),
}

impl ConvertError {
    /// True for the "already exists" skip, which is not a failure
    pub fn is_advisory(&self) -> bool {
        matches!(self, ConvertError::ArtifactExists(_))
    }

    pub(crate) fn decode(path: &std::path::Path, source: OpusError) -> Self {
        ConvertError::DecodeError {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, ConvertError>;
