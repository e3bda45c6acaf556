//! Sample metadata ("markup") derived from file names
//!
//! Without splitting, each row holds just the sample name (the file name with
//! its extension stripped). With a separator, the row is the full name followed
//! by its parts:
//!
//! ```text
//! A_1.0  ->  [A_1, A, 1]        (split on "_")
//! A_1.0  ->  [A_1, A]           (split on "_", last part dropped)
//! ```
//!
//! Rows of unequal length either fail the batch or, in fix-table mode, are
//! padded on the right with [`EMPTY_CELL`].

use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Placeholder written into cells added by fix-table reconciliation
pub const EMPTY_CELL: &str = "Empty";

/// Header of the first markup column
pub const SAMPLE_NAME_COLUMN: &str = "sample_name";

/// How sample names are turned into markup rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupOptions {
    /// Split names on this separator; `None` keeps one column
    pub separator: Option<String>,
    /// Drop the final split part (usually a position suffix)
    pub drop_last_column: bool,
    /// Pad short rows instead of failing the batch
    pub fix_table: bool,
}

impl MarkupOptions {
    /// Options that split on `separator`
    pub fn split_on(separator: impl Into<String>) -> Self {
        Self {
            separator: Some(separator.into()),
            ..Default::default()
        }
    }

    /// Reject an empty separator
    pub fn validate(&self) -> Result<()> {
        if matches!(self.separator.as_deref(), Some("")) {
            return Err(ConvertError::Configuration(
                "the name separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rectangular per-sample metadata table, row-aligned with the spectra matrix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupTable {
    rows: Vec<Vec<String>>,
    padded_rows: usize,
}

impl MarkupTable {
    /// Rows in sample order; the first cell of each is the sample name
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Columns per row
    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Rows that were padded by fix-table reconciliation
    pub fn padded_rows(&self) -> usize {
        self.padded_rows
    }

    /// `sample_name` followed by `column0`, `column1`, ...
    pub fn column_names(&self) -> Vec<String> {
        std::iter::once(SAMPLE_NAME_COLUMN.to_string())
            .chain((0..self.column_count().saturating_sub(1)).map(|i| format!("column{i}")))
            .collect()
    }
}

/// File name without its final extension
pub fn sample_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Builds markup tables according to [`MarkupOptions`]
#[derive(Debug, Clone, Copy)]
pub struct MarkupBuilder<'a> {
    options: &'a MarkupOptions,
}

impl<'a> MarkupBuilder<'a> {
    /// Create a builder
    pub fn new(options: &'a MarkupOptions) -> Self {
        Self { options }
    }

    /// Markup row for one sample name
    pub fn row(&self, name: &str) -> Vec<String> {
        let mut row = vec![name.to_string()];
        if let Some(separator) = self.options.separator.as_deref().filter(|s| !s.is_empty()) {
            let mut parts: Vec<String> = name.split(separator).map(str::to_string).collect();
            if self.options.drop_last_column {
                parts.pop();
            }
            row.extend(parts);
        }
        row
    }

    /// Build the table for `files`, in the same order
    pub fn build(&self, folder: &Path, files: &[PathBuf]) -> Result<MarkupTable> {
        let names: Vec<String> = files.iter().map(|f| sample_name(f)).collect();
        self.build_from_names(folder, &names)
    }

    /// Build the table from sample names directly
    pub fn build_from_names(&self, folder: &Path, names: &[String]) -> Result<MarkupTable> {
        let mut rows: Vec<Vec<String>> = names.iter().map(|n| self.row(n)).collect();

        let min = rows.iter().map(Vec::len).min().unwrap_or(0);
        let max = rows.iter().map(Vec::len).max().unwrap_or(0);
        if min == max {
            return Ok(MarkupTable {
                rows,
                padded_rows: 0,
            });
        }

        if !self.options.fix_table {
            return Err(ConvertError::MarkupShape {
                folder: folder.display().to_string(),
                min,
                max,
            });
        }

        let mut padded_rows = 0;
        for row in rows.iter_mut().filter(|r| r.len() < max) {
            row.resize(max, EMPTY_CELL.to_string());
            padded_rows += 1;
        }
        warn!("{} samples were fixed in the table", padded_rows);

        Ok(MarkupTable { rows, padded_rows })
    }
}
