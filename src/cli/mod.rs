use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use opus_convert::export::OutputFormat;

mod config;
mod convert;
mod demo;
mod info;

/// opus-convert - Batch converter from OPUS spectra to CSV, NPY and MAT
#[derive(Parser)]
#[command(name = "opus-convert")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// MATLAB level-5 container
    #[default]
    Mat,
    /// Delimited text
    Csv,
    /// NumPy arrays
    Npy,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Mat => OutputFormat::Mat,
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Npy => OutputFormat::Npy,
        }
    }
}

/// Options of the convert command
#[derive(Args, Debug, Clone, Default)]
pub struct ConvertArgs {
    /// Directory where the search starts
    #[arg(value_name = "DIRECTORY", default_value = ".")]
    pub directory: PathBuf,

    /// Output format (default: mat)
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<FormatArg>,

    /// Pack markup and spectra into one csv file (csv only)
    #[arg(long, alias = "onefile")]
    pub one_file: bool,

    /// Split sample names on --separator into columns
    #[arg(short = 's', long)]
    pub split: bool,

    /// Separator used by --split (default: "_")
    #[arg(long)]
    pub separator: Option<String>,

    /// Drop the last split column (usually the position)
    #[arg(long)]
    pub drop_last_column: bool,

    /// Pad short split rows with "Empty" instead of failing the folder
    #[arg(long)]
    pub fix_table: bool,

    /// Deepest folder level searched below the root (default: 3)
    #[arg(short = 'd', long)]
    pub search_depth: Option<usize>,

    /// Directory receiving the results (default: current directory)
    #[arg(short = 'o', long, value_name = "DIR", conflicts_with = "save_inplace")]
    pub output_directory: Option<PathBuf>,

    /// Save results next to the spectra as __<name>
    #[arg(short = 'i', long)]
    pub save_inplace: bool,

    /// Rewrite results which already exist
    #[arg(short = 'u', long)]
    pub update: bool,

    /// zlib-compress variables of .mat results
    #[arg(long)]
    pub compress: bool,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every folder of OPUS files below a directory
    Convert(ConvertArgs),

    /// Generate a small tree of synthetic OPUS files
    Demo {
        /// Directory to create the tree in
        #[arg(value_name = "DIR", default_value = "opus_demo")]
        output: PathBuf,
    },

    /// Display the entries of a converted .npy, .mat or .csv file
    Info {
        /// Artifact path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

pub fn init_logging(verbosity: u8, quiet: bool) {
    let log_level = match verbosity {
        0 if quiet => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Convert(args) => convert::run(args, quiet),
        Commands::Demo { output } => demo::run(output),
        Commands::Info { file, json } => info::run(file, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert_flags() {
        let cli = Cli::try_parse_from([
            "opus-convert", "convert", "data", "-f", "csv", "--one-file", "-s",
            "--separator", "-", "-d", "2", "-o", "out", "-u", "-v",
        ])
        .unwrap();
        assert_eq!(cli.verbosity(), 1);

        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.directory, PathBuf::from("data"));
        assert_eq!(args.format, Some(FormatArg::Csv));
        assert!(args.one_file && args.split && args.update);
        assert_eq!(args.separator.as_deref(), Some("-"));
        assert_eq!(args.search_depth, Some(2));
        assert_eq!(args.output_directory, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_convert_defaults() {
        let cli = Cli::try_parse_from(["opus-convert", "convert"]).unwrap();
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.directory, PathBuf::from("."));
        assert_eq!(args.format, None);
        assert!(!args.save_inplace);
    }

    #[test]
    fn test_inplace_conflicts_with_output_directory() {
        let result = Cli::try_parse_from(["opus-convert", "convert", "-i", "-o", "out"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["opus-convert", "-q", "-v", "demo"]).is_err());
        let cli = Cli::try_parse_from(["opus-convert", "-q", "demo"]).unwrap();
        assert!(cli.quiet());
    }

    #[test]
    fn test_format_arg_maps_to_output_format() {
        assert_eq!(OutputFormat::from(FormatArg::Npy), OutputFormat::Npy);
        assert_eq!(OutputFormat::from(FormatArg::default()), OutputFormat::Mat);
    }
}
