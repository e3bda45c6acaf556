//! # Walk Report
//!
//! Per-folder outcomes of a directory walk, rendered as plain text or with
//! colour when `colorized_output` is enabled.

use std::fmt;
use std::path::PathBuf;

#[cfg(feature = "colorized_output")]
use console::style;

/// What happened to one visited folder
#[derive(Debug, Clone, PartialEq)]
pub enum FolderOutcome {
    /// Artifacts were written
    Converted {
        /// Rows in the spectra matrix
        spectra: usize,
        /// Wavenumbers per spectrum
        points: usize,
        /// Written artifact paths, primary last
        artifacts: Vec<PathBuf>,
    },
    /// The result already existed and overwriting was off
    Skipped(String),
    /// Eligible files were present but none had an absorbance block
    NoData,
    /// The folder's batch was rejected
    Failed(String),
}

impl FolderOutcome {
    fn is_converted(&self) -> bool {
        matches!(self, FolderOutcome::Converted { .. })
    }

    fn is_failed(&self) -> bool {
        matches!(self, FolderOutcome::Failed(_))
    }
}

/// Outcome for one folder holding eligible files
#[derive(Debug, Clone, PartialEq)]
pub struct FolderResult {
    /// Folder that was visited
    pub folder: PathBuf,
    /// Output name derived from the folder path
    pub name: String,
    /// Result of the conversion
    pub outcome: FolderOutcome,
}

/// Summary of a directory walk
#[derive(Debug, Clone, Default)]
pub struct WalkReport {
    /// Root the walk started from
    pub root: PathBuf,
    /// Folders in visiting order
    pub folders: Vec<FolderResult>,
}

impl WalkReport {
    /// Empty report for `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            folders: Vec::new(),
        }
    }

    /// Record one folder
    pub fn add(&mut self, folder: impl Into<PathBuf>, name: impl Into<String>, outcome: FolderOutcome) {
        self.folders.push(FolderResult {
            folder: folder.into(),
            name: name.into(),
            outcome,
        });
    }

    /// Folders that were written
    pub fn converted_count(&self) -> usize {
        self.folders.iter().filter(|f| f.outcome.is_converted()).count()
    }

    /// Folders skipped because their result already existed
    pub fn skipped_count(&self) -> usize {
        self.folders
            .iter()
            .filter(|f| matches!(f.outcome, FolderOutcome::Skipped(_)))
            .count()
    }

    /// Folders without absorbance data
    pub fn no_data_count(&self) -> usize {
        self.folders
            .iter()
            .filter(|f| matches!(f.outcome, FolderOutcome::NoData))
            .count()
    }

    /// Folders whose batch was rejected
    pub fn failure_count(&self) -> usize {
        self.folders.iter().filter(|f| f.outcome.is_failed()).count()
    }

    /// Check if any folder failed
    pub fn has_failures(&self) -> bool {
        self.folders.iter().any(|f| f.outcome.is_failed())
    }

    /// Total spectra written across all folders
    pub fn spectra_written(&self) -> usize {
        self.folders
            .iter()
            .map(|f| match f.outcome {
                FolderOutcome::Converted { spectra, .. } => spectra,
                _ => 0,
            })
            .sum()
    }

    /// Format the report with colors (requires console feature)
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::Emoji;

            static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static SKIP: Emoji<'_, '_> = Emoji("↷", "[SKIP]");
            static EMPTY: Emoji<'_, '_> = Emoji("∅", "[EMPTY]");
            static FAIL: Emoji<'_, '_> = Emoji("✗", "[FAIL]");

            let mut output = String::new();

            output.push_str(&format!("{}\n", style("OPUS Conversion Report").bold().cyan()));
            output.push_str(&format!("{}\n", style("======================").cyan()));
            output.push_str(&format!("{}: {}\n\n", style("Root").bold(), self.root.display()));

            for folder in &self.folders {
                match &folder.outcome {
                    FolderOutcome::Converted {
                        spectra, points, ..
                    } => output.push_str(&format!(
                        "[{}] {} - {} spectra x {} wavenumbers\n",
                        OK,
                        style(&folder.name).green(),
                        spectra,
                        points
                    )),
                    FolderOutcome::Skipped(msg) => output.push_str(&format!(
                        "[{}] {} - {}: {}\n",
                        SKIP,
                        style(&folder.name).yellow(),
                        style("SKIPPED").yellow().bold(),
                        msg
                    )),
                    FolderOutcome::NoData => output.push_str(&format!(
                        "[{}] {} - no absorbance data\n",
                        EMPTY,
                        style(&folder.name).dim()
                    )),
                    FolderOutcome::Failed(msg) => output.push_str(&format!(
                        "[{}] {} - {}: {}\n",
                        FAIL,
                        style(&folder.name).red(),
                        style("FAILED").red().bold(),
                        msg
                    )),
                }
            }

            output.push('\n');
            output.push_str(&format!(
                "{}: {} converted, {} skipped, {} without data, {} failed\n",
                style("Summary").bold(),
                style(self.converted_count()).green(),
                style(self.skipped_count()).yellow(),
                style(self.no_data_count()).dim(),
                style(self.failure_count()).red()
            ));

            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

impl fmt::Display for WalkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OPUS Conversion Report")?;
        writeln!(f, "======================")?;
        writeln!(f, "Root: {}", self.root.display())?;
        writeln!(f)?;

        for folder in &self.folders {
            match &folder.outcome {
                FolderOutcome::Converted {
                    spectra, points, ..
                } => writeln!(
                    f,
                    "[✓] {} - {} spectra x {} wavenumbers",
                    folder.name, spectra, points
                )?,
                FolderOutcome::Skipped(msg) => writeln!(f, "[↷] {} - SKIPPED: {}", folder.name, msg)?,
                FolderOutcome::NoData => writeln!(f, "[∅] {} - no absorbance data", folder.name)?,
                FolderOutcome::Failed(msg) => writeln!(f, "[✗] {} - FAILED: {}", folder.name, msg)?,
            }
        }

        writeln!(f)?;
        writeln!(
            f,
            "Summary: {} converted, {} skipped, {} without data, {} failed",
            self.converted_count(),
            self.skipped_count(),
            self.no_data_count(),
            self.failure_count()
        )
    }
}
