//! TOML configuration file support.
//!
//! Settings that would otherwise be passed as flags can be kept in a file;
//! flags given on the command line win over file values:
//!
//! ```toml
//! # opus-convert.toml
//! [conversion]
//! format = "npy"
//! split = true
//! separator = "_"
//! drop_last_column = true
//! fix_table = false
//! search_depth = 2
//! output_directory = "converted"
//! update = false
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use opus_convert::export::OutputFormat;

/// Root configuration structure for opus-convert.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Conversion-specific settings.
    #[serde(default)]
    pub conversion: ConversionSettings,
}

/// Settings for the convert command.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConversionSettings {
    /// Output format: mat, csv or npy.
    pub format: Option<OutputFormat>,

    /// Join markup and spectra into one csv file.
    pub one_file: Option<bool>,

    /// Split sample names into columns.
    pub split: Option<bool>,

    /// Separator used when splitting.
    pub separator: Option<String>,

    /// Drop the last split column.
    pub drop_last_column: Option<bool>,

    /// Pad short split rows instead of failing.
    pub fix_table: Option<bool>,

    /// Deepest folder level searched.
    pub search_depth: Option<usize>,

    /// Directory receiving the results.
    pub output_directory: Option<PathBuf>,

    /// Save results next to the spectra.
    pub save_inplace: Option<bool>,

    /// Rewrite existing results.
    pub update: Option<bool>,

    /// Compress .mat variables.
    pub compress: Option<bool>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}
