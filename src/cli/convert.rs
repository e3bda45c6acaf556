use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use opus_convert::export::{ExportOptions, OutputFormat};
use opus_convert::markup::MarkupOptions;
use opus_convert::opus::OpusReader;
use opus_convert::walker::{
    aligned, ConversionConfig, DirectoryWalker, OutputLocation, DEFAULT_SEARCH_DEPTH,
};

use super::config::{Config, ConversionSettings};
use super::ConvertArgs;

const DEFAULT_SEPARATOR: &str = "_";

/// Merge command-line flags over file settings over defaults
pub(crate) fn build_config(args: &ConvertArgs, file: &ConversionSettings) -> ConversionConfig {
    let format = args
        .format
        .map(OutputFormat::from)
        .or(file.format)
        .unwrap_or_default();

    let split = args.split || file.split.unwrap_or(false);
    let separator = args
        .separator
        .clone()
        .or_else(|| file.separator.clone())
        .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());

    let output = if args.save_inplace || file.save_inplace.unwrap_or(false) {
        OutputLocation::InPlace
    } else {
        OutputLocation::Directory(
            args.output_directory
                .clone()
                .or_else(|| file.output_directory.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
        )
    };

    ConversionConfig {
        max_depth: args
            .search_depth
            .or(file.search_depth)
            .unwrap_or(DEFAULT_SEARCH_DEPTH),
        output,
        overwrite: args.update || file.update.unwrap_or(false),
        markup: MarkupOptions {
            separator: split.then_some(separator),
            drop_last_column: args.drop_last_column || file.drop_last_column.unwrap_or(false),
            fix_table: args.fix_table || file.fix_table.unwrap_or(false),
        },
        export: ExportOptions {
            format,
            one_file: args.one_file || file.one_file.unwrap_or(false),
            compress: args.compress || file.compress.unwrap_or(false),
        },
    }
}

/// Convert every folder of OPUS files below `args.directory`
pub fn run(args: ConvertArgs, quiet: bool) -> Result<()> {
    let settings = match &args.config {
        Some(path) => Config::from_file(path)?.conversion,
        None => ConversionSettings::default(),
    };
    let config = build_config(&args, &settings);
    config.validate().context("Invalid options")?;

    info!("OPUS Converter");
    info!("==============");
    info!("{}", aligned("Search root", args.directory.display()));
    match &config.output {
        OutputLocation::Directory(dir) => info!("{}", aligned("Output directory", dir.display())),
        OutputLocation::InPlace => info!("{}", aligned("Output directory", "next to the spectra")),
    }
    info!("{}", aligned("Format", config.export.format));
    info!("{}", aligned("Search depth", config.max_depth));

    let reader = OpusReader::new();
    let report = DirectoryWalker::new(&reader, &config)
        .run(&args.directory)
        .with_context(|| format!("Conversion of {} failed", args.directory.display()))?;

    if !quiet {
        #[cfg(feature = "colorized_output")]
        {
            println!("{}", report.format_colored());
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            println!("{}", report);
        }
    }

    if report.has_failures() {
        anyhow::bail!("{} folder(s) could not be converted", report.failure_count());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opus_convert::opus::OpusBuilder;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = build_config(&ConvertArgs::default(), &ConversionSettings::default());
        assert_eq!(config, ConversionConfig::default());
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.markup.separator, None);
    }

    #[test]
    fn test_flags_override_file() {
        let file = ConversionSettings {
            format: Some(OutputFormat::Npy),
            split: Some(true),
            separator: Some("-".to_string()),
            search_depth: Some(7),
            output_directory: Some(PathBuf::from("from_file")),
            ..Default::default()
        };
        let args = ConvertArgs {
            format: Some(super::super::FormatArg::Csv),
            search_depth: Some(1),
            ..Default::default()
        };

        let config = build_config(&args, &file);
        assert_eq!(config.export.format, OutputFormat::Csv);
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.markup.separator.as_deref(), Some("-"));
        assert_eq!(
            config.output,
            OutputLocation::Directory(PathBuf::from("from_file"))
        );
    }

    #[test]
    fn test_split_uses_default_separator() {
        let args = ConvertArgs {
            split: true,
            ..Default::default()
        };
        let config = build_config(&args, &ConversionSettings::default());
        assert_eq!(config.markup.separator.as_deref(), Some("_"));
    }

    #[test]
    fn test_inplace_from_file() {
        let file = ConversionSettings {
            save_inplace: Some(true),
            ..Default::default()
        };
        let config = build_config(&ConvertArgs::default(), &file);
        assert_eq!(config.output, OutputLocation::InPlace);
    }

    #[test]
    fn test_run_converts_tree() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        OpusBuilder::new()
            .absorbance(4000.0, 3998.0, &[0.1, 0.2, 0.3])
            .write_to(&root.join("a_1.0"))
            .unwrap();

        let out = tmp.path().join("out");
        let args = ConvertArgs {
            directory: root,
            format: Some(super::super::FormatArg::Npy),
            output_directory: Some(out.clone()),
            ..Default::default()
        };
        run(args, true).unwrap();

        assert!(out.join("root_spectra.npy").is_file());
    }

    #[test]
    fn test_run_rejects_joined_npy() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("out");
        let args = ConvertArgs {
            directory: tmp.path().to_path_buf(),
            format: Some(super::super::FormatArg::Npy),
            one_file: true,
            output_directory: Some(out.clone()),
            ..Default::default()
        };
        assert!(run(args, true).is_err());
        assert!(!out.exists());
    }
}
