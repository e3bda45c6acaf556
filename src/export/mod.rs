//! # Result Export Module
//!
//! Serializes a folder's (markup, wavenumbers, spectra) triple in one of three
//! formats:
//!
//! ```text
//! csv, one file   {base}.csv                  sample_name, column0.., <wavenumbers>
//! csv             {base}_wavenumbers.csv
//!                 {base}_markup.csv
//!                 {base}_spectra.csv
//! npy             {base}_wavenumbers.npy      <f8, (points,)
//!                 {base}_markup.npy           <U, (samples, columns)
//!                 {base}_spectra.npy          <f8, (samples, points)
//! mat             {base}.mat                  wavenumbers, markup, spectra
//! ```
//!
//! Every artifact is encoded into a temp file next to its destination and only
//! renamed into place once all pieces were encoded, so a failed folder never
//! leaves partial output. Results being overwritten are moved aside until the
//! new set is in place and restored if any rename fails. The primary artifact
//! (`_spectra.*` or the single file) is renamed last; its presence marks a
//! complete result.

pub mod delimited;
pub mod mat;
pub mod npy;

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempPath};

use crate::aggregate::Batch;
use crate::error::{ConvertError, Result};
use crate::markup::MarkupTable;

pub use mat::{read_mat, write_mat, MatValue};
pub use npy::{read_npy, write_npy, NpyArray};

/// Variable / suffix name of the wavenumber axis
pub const WAVENUMBERS: &str = "wavenumbers";
/// Variable / suffix name of the markup table
pub const MARKUP: &str = "markup";
/// Variable / suffix name of the spectra matrix
pub const SPECTRA: &str = "spectra";

/// Output format of the converted artifacts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// MATLAB level-5 container with three named variables
    #[default]
    Mat,
    /// Delimited text, joined or as three files
    Csv,
    /// Three NumPy arrays
    Npy,
}

impl OutputFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mat => "mat",
            OutputFormat::Csv => "csv",
            OutputFormat::Npy => "npy",
        }
    }

    /// Returns all available format names.
    pub fn variants() -> &'static [&'static str] {
        &["mat", "csv", "npy"]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mat" => Ok(OutputFormat::Mat),
            "csv" => Ok(OutputFormat::Csv),
            "npy" => Ok(OutputFormat::Npy),
            _ => Err(format!(
                "Unknown format '{}'. Valid options: {}",
                s,
                OutputFormat::variants().join(", ")
            )),
        }
    }
}

/// How results are serialized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Output format
    pub format: OutputFormat,
    /// Join markup and spectra into one CSV table (CSV only)
    pub one_file: bool,
    /// zlib-compress MAT variables (MAT only)
    pub compress: bool,
}

impl ExportOptions {
    /// Reject joined-table output with a non-CSV format
    pub fn validate(&self) -> Result<()> {
        if self.one_file && self.format != OutputFormat::Csv {
            return Err(ConvertError::Configuration(format!(
                "results can be joined into one file only with the csv format (got {})",
                self.format
            )));
        }
        Ok(())
    }

    /// All artifact paths for `base`, primary artifact last
    pub fn artifact_paths(&self, base: &Path) -> Vec<PathBuf> {
        let ext = self.format.extension();
        match self.format {
            OutputFormat::Mat => vec![with_suffix(base, &format!(".{ext}"))],
            OutputFormat::Csv if self.one_file => vec![with_suffix(base, &format!(".{ext}"))],
            OutputFormat::Csv | OutputFormat::Npy => [WAVENUMBERS, MARKUP, SPECTRA]
                .iter()
                .map(|piece| with_suffix(base, &format!("_{piece}.{ext}")))
                .collect(),
        }
    }

    /// The artifact whose presence marks a finished result
    pub fn primary_artifact(&self, base: &Path) -> PathBuf {
        let ext = self.format.extension();
        match self.format {
            OutputFormat::Mat => with_suffix(base, &format!(".{ext}")),
            OutputFormat::Csv if self.one_file => with_suffix(base, &format!(".{ext}")),
            OutputFormat::Csv | OutputFormat::Npy => with_suffix(base, &format!("_{SPECTRA}.{ext}")),
        }
    }
}

/// Append `suffix` to the last path component
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes a folder's results; the caller has already authorized the write
#[derive(Debug, Clone, Copy)]
pub struct ResultWriter<'a> {
    options: &'a ExportOptions,
}

impl<'a> ResultWriter<'a> {
    /// Create a writer
    pub fn new(options: &'a ExportOptions) -> Self {
        Self { options }
    }

    /// True when the primary artifact for `base` is already on disk
    pub fn exists(&self, base: &Path) -> bool {
        self.options.primary_artifact(base).is_file()
    }

    /// Write all artifacts for `base`; returns their paths
    pub fn write(&self, base: &Path, markup: &MarkupTable, batch: &Batch) -> Result<Vec<PathBuf>> {
        if markup.len() != batch.spectra_count() {
            return Err(ConvertError::InvalidArtifact(format!(
                "markup has {} rows for {} spectra",
                markup.len(),
                batch.spectra_count()
            )));
        }

        let paths = self.options.artifact_paths(base);
        let mut staged = Vec::with_capacity(paths.len());

        match self.options.format {
            OutputFormat::Csv if self.options.one_file => {
                staged.push(stage(&paths[0], |w| delimited::write_joined(w, markup, batch))?);
            }
            OutputFormat::Csv => {
                staged.push(stage(&paths[0], |w| delimited::write_axis(w, &batch.axis))?);
                staged.push(stage(&paths[1], |w| delimited::write_markup(w, markup))?);
                staged.push(stage(&paths[2], |w| delimited::write_matrix(w, &batch.values))?);
            }
            OutputFormat::Npy => {
                let axis = NpyArray::vector(batch.axis.clone());
                let labels = NpyArray::strings(markup.rows());
                let spectra = NpyArray::matrix(&batch.values, batch.point_count());
                staged.push(stage(&paths[0], |w| Ok(write_npy(w, &axis)?))?);
                staged.push(stage(&paths[1], |w| Ok(write_npy(w, &labels)?))?);
                staged.push(stage(&paths[2], |w| Ok(write_npy(w, &spectra)?))?);
            }
            OutputFormat::Mat => {
                let variables = [
                    (WAVENUMBERS, MatValue::row_vector(batch.axis.clone())),
                    (MARKUP, MatValue::string_table(markup.rows())),
                    (SPECTRA, MatValue::matrix(&batch.values, batch.point_count())),
                ];
                let compress = self.options.compress;
                staged.push(stage(&paths[0], |w| write_mat(w, &variables, compress))?);
            }
        }

        commit(staged, &paths)?;
        Ok(paths)
    }
}

/// An existing artifact moved aside while its replacement is persisted
struct Displaced {
    backup: TempPath,
    target: PathBuf,
}

/// Rename every staged file onto its path, all or nothing
///
/// Existing targets are moved aside first. On failure the files persisted so
/// far are removed and the previous ones restored; on success the backups are
/// dropped, which deletes them.
fn commit(staged: Vec<NamedTempFile>, paths: &[PathBuf]) -> Result<()> {
    let mut displaced = Vec::new();
    let mut persisted = Vec::new();

    let outcome = persist_all(staged, paths, &mut displaced, &mut persisted);
    if outcome.is_err() {
        for path in persisted {
            if let Err(e) = fs::remove_file(path) {
                warn!("Cannot remove {}: {}", path.display(), e);
            }
        }
        for Displaced { backup, target } in displaced {
            if let Err(e) = backup.persist(&target) {
                warn!("Cannot restore {}: {}", target.display(), e);
            }
        }
    }
    outcome
}

fn persist_all<'p>(
    staged: Vec<NamedTempFile>,
    paths: &'p [PathBuf],
    displaced: &mut Vec<Displaced>,
    persisted: &mut Vec<&'p PathBuf>,
) -> Result<()> {
    for path in paths.iter().filter(|p| p.is_file()) {
        let backup = tempfile::Builder::new()
            .prefix(".displaced")
            .tempfile_in(parent_dir(path))?
            .into_temp_path();
        fs::rename(path, &backup)?;
        displaced.push(Displaced {
            backup,
            target: path.clone(),
        });
    }

    for (temp, path) in staged.into_iter().zip(paths) {
        temp.persist(path)?;
        persisted.push(path);
    }
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Encode one artifact into a temp file in its destination directory
fn stage<F>(path: &Path, encode: F) -> Result<NamedTempFile>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let mut temp = NamedTempFile::new_in(parent_dir(path))?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        encode(&mut writer)?;
        writer.flush()?;
    }
    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{MarkupBuilder, MarkupOptions};
    use std::fs;
    use tempfile::tempdir;

    fn sample_batch() -> (MarkupTable, Batch) {
        let batch = Batch {
            files: vec![PathBuf::from("A_1.0"), PathBuf::from("B_2.0")],
            axis: vec![4000.0, 3999.5, 3999.0],
            values: vec![vec![0.1, 0.2, 0.3], vec![1.5, -2.25, 1e-7]],
        };
        let options = MarkupOptions::split_on("_");
        let markup = MarkupBuilder::new(&options)
            .build(Path::new("."), &batch.files)
            .unwrap();
        (markup, batch)
    }

    #[test]
    fn test_one_file_requires_csv() {
        for format in [OutputFormat::Mat, OutputFormat::Npy] {
            let options = ExportOptions {
                format,
                one_file: true,
                compress: false,
            };
            assert!(matches!(options.validate(), Err(ConvertError::Configuration(_))));
        }
        let options = ExportOptions {
            format: OutputFormat::Csv,
            one_file: true,
            compress: false,
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_artifact_naming() {
        let base = Path::new("out/root_session");
        let npy = ExportOptions {
            format: OutputFormat::Npy,
            ..Default::default()
        };
        assert_eq!(
            npy.artifact_paths(base),
            vec![
                PathBuf::from("out/root_session_wavenumbers.npy"),
                PathBuf::from("out/root_session_markup.npy"),
                PathBuf::from("out/root_session_spectra.npy"),
            ]
        );
        assert_eq!(
            npy.primary_artifact(base),
            PathBuf::from("out/root_session_spectra.npy")
        );

        let joined = ExportOptions {
            format: OutputFormat::Csv,
            one_file: true,
            compress: false,
        };
        assert_eq!(joined.artifact_paths(base), vec![PathBuf::from("out/root_session.csv")]);

        let mat = ExportOptions::default();
        assert_eq!(mat.primary_artifact(base), PathBuf::from("out/root_session.mat"));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("CSV").unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_str("npy").unwrap(), OutputFormat::Npy);
        assert!(OutputFormat::from_str("xlsx").is_err());
        assert_eq!(OutputFormat::default().to_string(), "mat");
    }

    #[test]
    fn test_npy_export_round_trip() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("root_a");
        let (markup, batch) = sample_batch();
        let options = ExportOptions {
            format: OutputFormat::Npy,
            ..Default::default()
        };

        let paths = ResultWriter::new(&options).write(&base, &markup, &batch).unwrap();
        assert_eq!(paths.len(), 3);

        let axis = read_npy(&mut fs::File::open(&paths[0]).unwrap()).unwrap();
        assert_eq!(axis, NpyArray::vector(batch.axis.clone()));

        let labels = read_npy(&mut fs::File::open(&paths[1]).unwrap()).unwrap();
        assert_eq!(labels.to_string_rows().unwrap(), markup.rows().to_vec());

        let spectra = read_npy(&mut fs::File::open(&paths[2]).unwrap()).unwrap();
        assert_eq!(spectra.shape(), &[2, 3]);
        assert_eq!(spectra.to_rows().unwrap(), batch.values);
    }

    #[test]
    fn test_mat_export_round_trip() {
        for compress in [false, true] {
            let dir = tempdir().unwrap();
            let base = dir.path().join("root_a");
            let (markup, batch) = sample_batch();
            let options = ExportOptions {
                format: OutputFormat::Mat,
                one_file: false,
                compress,
            };

            let paths = ResultWriter::new(&options).write(&base, &markup, &batch).unwrap();
            assert_eq!(paths, vec![dir.path().join("root_a.mat")]);

            let variables = read_mat(&mut fs::File::open(&paths[0]).unwrap()).unwrap();
            let names: Vec<_> = variables.iter().map(|(n, _)| n.as_str()).collect();
            assert_eq!(names, vec![WAVENUMBERS, MARKUP, SPECTRA]);

            assert_eq!(variables[0].1.to_rows().unwrap(), vec![batch.axis.clone()]);
            assert_eq!(variables[1].1.to_string_rows().unwrap(), markup.rows().to_vec());
            assert_eq!(variables[2].1.to_rows().unwrap(), batch.values);
        }
    }

    #[test]
    fn test_csv_split_export() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("root_a");
        let (markup, batch) = sample_batch();
        let options = ExportOptions {
            format: OutputFormat::Csv,
            ..Default::default()
        };

        let paths = ResultWriter::new(&options).write(&base, &markup, &batch).unwrap();
        assert_eq!(
            fs::read_to_string(&paths[0]).unwrap(),
            "4000.0\n3999.5\n3999.0\n"
        );
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), "A_1,A,1\nB_2,B,2\n");
        assert_eq!(
            fs::read_to_string(&paths[2]).unwrap(),
            "0.1,0.2,0.3\n1.5,-2.25,1e-7\n"
        );
    }

    #[test]
    fn test_csv_joined_export() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("root_a");
        let (markup, batch) = sample_batch();
        let options = ExportOptions {
            format: OutputFormat::Csv,
            one_file: true,
            compress: false,
        };

        let paths = ResultWriter::new(&options).write(&base, &markup, &batch).unwrap();
        assert_eq!(paths, vec![dir.path().join("root_a.csv")]);
        assert_eq!(
            fs::read_to_string(&paths[0]).unwrap(),
            "sample_name,column0,column1,4000.0,3999.5,3999.0\n\
             A_1,A,1,0.1,0.2,0.3\n\
             B_2,B,2,1.5,-2.25,1e-7\n"
        );
    }

    #[test]
    fn test_row_count_mismatch_writes_nothing() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("root_a");
        let (_, batch) = sample_batch();
        let options = ExportOptions::default();

        let err = ResultWriter::new(&options)
            .write(&base, &MarkupTable::default(), &batch)
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidArtifact(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    fn entry_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_failed_rename_removes_persisted_pieces() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("root");
        let (markup, batch) = sample_batch();
        let options = ExportOptions {
            format: OutputFormat::Npy,
            ..Default::default()
        };

        // A non-empty directory in place of the markup file blocks its rename
        let blocker = dir.path().join("root_markup.npy");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        let result = ResultWriter::new(&options).write(&base, &markup, &batch);
        assert!(result.is_err());
        assert_eq!(entry_names(dir.path()), vec!["root_markup.npy"]);
    }

    #[test]
    fn test_failed_overwrite_restores_previous_result() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("root");
        let (markup, batch) = sample_batch();
        let options = ExportOptions {
            format: OutputFormat::Csv,
            ..Default::default()
        };
        let writer = ResultWriter::new(&options);

        let paths = writer.write(&base, &markup, &batch).unwrap();
        let before: Vec<_> = paths[..2].iter().map(|p| fs::read(p).unwrap()).collect();

        // Replace the primary artifact with a directory the new one cannot land on
        fs::remove_file(&paths[2]).unwrap();
        fs::create_dir(&paths[2]).unwrap();
        fs::write(paths[2].join("keep"), "x").unwrap();

        let mut changed = batch.clone();
        changed.axis = vec![1.0, 2.0, 3.0];
        assert!(writer.write(&base, &markup, &changed).is_err());

        for (path, content) in paths[..2].iter().zip(before) {
            assert_eq!(fs::read(path).unwrap(), content);
        }
        assert_eq!(
            entry_names(dir.path()),
            vec!["root_markup.csv", "root_spectra.csv", "root_wavenumbers.csv"]
        );
    }

    #[test]
    fn test_overwrite_replaces_every_piece() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("root");
        let (markup, batch) = sample_batch();
        let options = ExportOptions {
            format: OutputFormat::Csv,
            ..Default::default()
        };
        let writer = ResultWriter::new(&options);
        writer.write(&base, &markup, &batch).unwrap();

        let mut changed = batch.clone();
        changed.axis = vec![1.0, 2.0, 3.0];
        let paths = writer.write(&base, &markup, &changed).unwrap();

        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "1.0\n2.0\n3.0\n");
        assert_eq!(
            entry_names(dir.path()),
            vec!["root_markup.csv", "root_spectra.csv", "root_wavenumbers.csv"]
        );
    }

    #[test]
    fn test_existing_artifact_detected() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("root_a");
        let (markup, batch) = sample_batch();
        let options = ExportOptions::default();
        let writer = ResultWriter::new(&options);

        assert!(!writer.exists(&base));
        writer.write(&base, &markup, &batch).unwrap();
        assert!(writer.exists(&base));
    }
}
