//! Per-folder aggregation of absorbance spectra into one matrix
//!
//! Every file of a batch must carry the same wavenumber grid, compared bit for
//! bit. A single mismatch rejects the whole batch.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::opus::{BlockKind, OpusError, SpectralSource};

/// One decoded absorbance measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Source file
    pub path: PathBuf,
    /// Wavenumber grid
    pub axis: Vec<f64>,
    /// Absorbance values, one per grid point
    pub values: Vec<f64>,
}

/// Spectra of one folder sharing a single wavenumber grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    /// Files that contributed a row, in row order
    pub files: Vec<PathBuf>,
    /// Shared wavenumber grid
    pub axis: Vec<f64>,
    /// One row of absorbance values per file
    pub values: Vec<Vec<f64>>,
}

impl Batch {
    /// Assemble a batch, rejecting it if any axis differs from the first
    pub fn from_samples(folder: &Path, samples: Vec<Sample>) -> Result<Self> {
        let mut batch = Batch::default();
        let mut samples = samples.into_iter();

        let Some(first) = samples.next() else {
            return Ok(batch);
        };
        batch.axis = first.axis;
        batch.files.push(first.path);
        batch.values.push(first.values);

        for sample in samples {
            if !same_axis(&batch.axis, &sample.axis) {
                return Err(ConvertError::InconsistentAxis {
                    folder: folder.display().to_string(),
                    file: sample.path.display().to_string(),
                });
            }
            batch.files.push(sample.path);
            batch.values.push(sample.values);
        }

        Ok(batch)
    }

    /// True when no file yielded an absorbance block
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of spectra (matrix rows)
    pub fn spectra_count(&self) -> usize {
        self.values.len()
    }

    /// Number of grid points (matrix columns)
    pub fn point_count(&self) -> usize {
        self.axis.len()
    }
}

/// Exact comparison on the bit pattern of every grid point
pub fn same_axis(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// Reads the absorbance block of every file in a batch
pub struct SpectrumAggregator<'a, S: SpectralSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: SpectralSource + ?Sized> SpectrumAggregator<'a, S> {
    /// Create an aggregator over `source`
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Read `files` (all direct children of `folder`) into one batch
    ///
    /// Files without an absorbance block are left out of the batch; the
    /// returned [`Batch::files`] lists the ones that contributed a row.
    pub fn aggregate(&self, folder: &Path, files: &[PathBuf]) -> Result<Batch> {
        let mut samples = Vec::with_capacity(files.len());
        for path in files {
            match self.read_sample(path)? {
                Some(sample) => samples.push(sample),
                None => warn!("No absorbance block in {}", path.display()),
            }
        }

        Batch::from_samples(folder, samples)
    }

    /// Decode the first absorbance block of one file
    pub fn read_sample(&self, path: &Path) -> Result<Option<Sample>> {
        let blocks = self
            .source
            .list_blocks(path)
            .map_err(|e| ConvertError::decode(path, e))?;
        debug!(
            "{}: {:?}",
            path.display(),
            blocks.iter().map(|b| b.kind.code()).collect::<Vec<_>>()
        );

        let mut absorbance = blocks.iter().filter(|b| b.kind == BlockKind::Absorbance);
        let Some(block) = absorbance.next() else {
            return Ok(None);
        };
        if absorbance.next().is_some() {
            debug!("{}: using the first of several AB blocks", path.display());
        }

        let spectrum = self
            .source
            .read_block(path, block)
            .map_err(|e| ConvertError::decode(path, e))?;
        if spectrum.x.len() != spectrum.y.len() {
            return Err(ConvertError::decode(
                path,
                OpusError::ShortData {
                    expected: spectrum.x.len(),
                    available: spectrum.y.len(),
                },
            ));
        }

        Ok(Some(Sample {
            path: path.to_path_buf(),
            axis: spectrum.x,
            values: spectrum.y,
        }))
    }
}
