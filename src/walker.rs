//! # Directory Walk
//!
//! Visits every directory under a root up to a depth bound and converts each
//! folder that directly contains eligible spectral files into one result.
//!
//! ```text
//! root/                   depth 0   -> <out>/root.mat
//!   session_a/            depth 1   -> <out>/root_session_a.mat
//!     plate_1/            depth 2   -> <out>/root_session_a_plate_1.mat
//! ```
//!
//! A folder's batch either converts completely or leaves no artifact behind.
//! Batch errors are logged and recorded in the [`WalkReport`]; only an invalid
//! [`ConversionConfig`] or an unreadable root aborts the walk.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::aggregate::SpectrumAggregator;
use crate::error::{ConvertError, Result};
use crate::export::{ExportOptions, ResultWriter};
use crate::markup::{MarkupBuilder, MarkupOptions};
use crate::opus::SpectralSource;
use crate::report::{FolderOutcome, WalkReport};

/// Default recursion depth below the root
pub const DEFAULT_SEARCH_DEPTH: usize = 3;

/// Prefix of artifact names written next to the spectra
pub const INPLACE_PREFIX: &str = "__";

/// Where artifacts are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLocation {
    /// `DIR/<key>`; the directory is created when missing
    Directory(PathBuf),
    /// `<folder>/__<key>`, next to the spectra
    InPlace,
}

impl Default for OutputLocation {
    fn default() -> Self {
        OutputLocation::Directory(PathBuf::from("."))
    }
}

/// Everything a walk needs, passed explicitly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionConfig {
    /// Deepest level visited; the root is level 0
    pub max_depth: usize,
    /// Artifact location
    pub output: OutputLocation,
    /// Rewrite results that already exist
    pub overwrite: bool,
    /// Sample name handling
    pub markup: MarkupOptions,
    /// Serialization
    pub export: ExportOptions,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_SEARCH_DEPTH,
            output: OutputLocation::default(),
            overwrite: false,
            markup: MarkupOptions::default(),
            export: ExportOptions::default(),
        }
    }
}

impl ConversionConfig {
    /// Reject incompatible options before any filesystem access
    pub fn validate(&self) -> Result<()> {
        self.export.validate()?;
        self.markup.validate()
    }
}

/// Folder names from the root down to the current folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPathKey {
    names: Vec<String>,
}

impl FolderPathKey {
    /// Key holding only the root name
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            names: vec![root_name.into()],
        }
    }

    /// Descend into `name`
    pub fn push(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    /// Return to the parent; the root name is never removed
    pub fn pop(&mut self) -> Option<String> {
        if self.names.len() > 1 {
            self.names.pop()
        } else {
            None
        }
    }

    /// Folder names, root first
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Names joined with underscores
    pub fn output_name(&self) -> String {
        self.names.join("_")
    }
}

/// `label` padded to 24 columns, then `: value`
pub fn aligned(label: &str, value: impl Display) -> String {
    format!("{label:<24}: {value}")
}

/// Name of the root as it appears in output names
///
/// Taken from the path as given, so a symlinked root keeps the link's name.
/// Paths without a final name (`.`, `..`, `/`) are canonicalised first.
pub fn root_name(root: &Path) -> Result<String> {
    if let Some(name) = root.file_name() {
        return Ok(name.to_string_lossy().into_owned());
    }

    let canonical = fs::canonicalize(root)?;
    Ok(canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| canonical.display().to_string()))
}

/// Walks a directory tree and converts every folder holding eligible files
pub struct DirectoryWalker<'a, S: SpectralSource + ?Sized> {
    source: &'a S,
    config: &'a ConversionConfig,
}

impl<'a, S: SpectralSource + ?Sized> DirectoryWalker<'a, S> {
    /// Create a walker
    pub fn new(source: &'a S, config: &'a ConversionConfig) -> Self {
        Self { source, config }
    }

    /// Walk `root` and convert every folder within the depth bound
    pub fn run(&self, root: &Path) -> Result<WalkReport> {
        self.config.validate()?;

        if !root.is_dir() {
            return Err(ConvertError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            )));
        }

        let mut key = FolderPathKey::new(root_name(root)?);

        if let OutputLocation::Directory(dir) = &self.config.output {
            fs::create_dir_all(dir)?;
        }

        let mut report = WalkReport::new(root);
        self.walk(root, 0, &mut key, &mut report);
        Ok(report)
    }

    fn walk(&self, dir: &Path, depth: usize, key: &mut FolderPathKey, report: &mut WalkReport) {
        if depth > self.config.max_depth {
            return;
        }

        let entries = match sorted_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Cannot list {}: {}", dir.display(), e);
                report.add(dir, key.output_name(), FolderOutcome::Failed(e.to_string()));
                return;
            }
        };

        let files: Vec<PathBuf> = entries
            .iter()
            .filter(|p| self.source.is_eligible(p))
            .cloned()
            .collect();

        if !files.is_empty() {
            info!("{}", "-".repeat(80));
            info!("{}", aligned("Found files in folder", dir.display()));
            let outcome = self.convert_folder(dir, &files, key);
            report.add(dir, key.output_name(), outcome);
            info!("");
        }

        for sub in entries.iter().filter(|p| p.is_dir()) {
            let Some(name) = sub.file_name() else {
                continue;
            };
            key.push(name.to_string_lossy());
            self.walk(sub, depth + 1, key, report);
            key.pop();
        }
    }

    fn convert_folder(&self, folder: &Path, files: &[PathBuf], key: &FolderPathKey) -> FolderOutcome {
        let base = self.output_base(folder, key);
        match self.convert_batch(folder, files, &base) {
            Ok(outcome) => outcome,
            Err(e) if e.is_advisory() => {
                warn!("{}", e);
                FolderOutcome::Skipped(e.to_string())
            }
            Err(e) => {
                error!("{}", e);
                FolderOutcome::Failed(e.to_string())
            }
        }
    }

    fn convert_batch(&self, folder: &Path, files: &[PathBuf], base: &Path) -> Result<FolderOutcome> {
        let writer = ResultWriter::new(&self.config.export);
        if !self.config.overwrite && writer.exists(base) {
            return Err(ConvertError::ArtifactExists(base.display().to_string()));
        }

        let batch = SpectrumAggregator::new(self.source).aggregate(folder, files)?;
        if batch.is_empty() {
            warn!("No absorbance data in {}", folder.display());
            return Ok(FolderOutcome::NoData);
        }

        let markup = MarkupBuilder::new(&self.config.markup).build(folder, &batch.files)?;
        info!("{}", aligned("Number of spectra", batch.spectra_count()));
        info!("{}", aligned("Number of wavenumbers", batch.point_count()));

        let artifacts = writer.write(base, &markup, &batch)?;
        info!("{}", aligned("Saved in", base.display()));

        Ok(FolderOutcome::Converted {
            spectra: batch.spectra_count(),
            points: batch.point_count(),
            artifacts,
        })
    }

    /// Artifact base path (no extension) for `folder`
    pub fn output_base(&self, folder: &Path, key: &FolderPathKey) -> PathBuf {
        match &self.config.output {
            OutputLocation::Directory(dir) => dir.join(key.output_name()),
            OutputLocation::InPlace => {
                folder.join(format!("{INPLACE_PREFIX}{}", key.output_name()))
            }
        }
    }
}

/// Directory entries sorted by path
fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}
