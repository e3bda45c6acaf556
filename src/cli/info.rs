use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use opus_convert::export::{read_mat, read_npy, MatValue, NpyArray};

/// One array or table inside an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub name: String,
    pub kind: String,
    pub shape: Vec<usize>,
}

/// Entries of a converted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
    pub file: String,
    pub format: String,
    pub entries: Vec<EntrySummary>,
}

fn npy_kind(array: &NpyArray) -> String {
    match array {
        NpyArray::Float64 { .. } => "float64".to_string(),
        NpyArray::Unicode { .. } => format!("unicode ({})", array.descr()),
    }
}

fn mat_kind(value: &MatValue) -> &'static str {
    match value {
        MatValue::Double { .. } => "double",
        MatValue::Char(_) => "char",
        MatValue::Cell { .. } => "cell",
    }
}

fn csv_shape(path: &Path) -> Result<Vec<usize>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context("Failed to open csv file")?;

    let mut rows = 0;
    let mut columns = 0;
    for record in reader.records() {
        let record = record.context("Failed to read csv record")?;
        rows += 1;
        columns = columns.max(record.len());
    }
    Ok(vec![rows, columns])
}

/// Read back an artifact and list its entries
pub(crate) fn summarize(file: &Path) -> Result<ArtifactSummary> {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = file
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let entries = match extension.as_str() {
        "npy" => {
            let mut reader = BufReader::new(File::open(file).context("Failed to open file")?);
            let array = read_npy(&mut reader).context("Failed to read npy file")?;
            vec![EntrySummary {
                name: stem,
                kind: npy_kind(&array),
                shape: array.shape().to_vec(),
            }]
        }
        "mat" => {
            let mut reader = BufReader::new(File::open(file).context("Failed to open file")?);
            read_mat(&mut reader)
                .context("Failed to read mat file")?
                .into_iter()
                .map(|(name, value)| EntrySummary {
                    kind: mat_kind(&value).to_string(),
                    shape: value.dims(),
                    name,
                })
                .collect()
        }
        "csv" => vec![EntrySummary {
            name: stem,
            kind: "table".to_string(),
            shape: csv_shape(file)?,
        }],
        other => anyhow::bail!("Unsupported file type '{}' (expected npy, mat or csv)", other),
    };

    Ok(ArtifactSummary {
        file: file.display().to_string(),
        format: extension,
        entries,
    })
}

/// Display the entries of a converted file
pub fn run(file: PathBuf, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let summary = summarize(&file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("OPUS Conversion Artifact");
    println!("========================");
    println!("File: {}", summary.file);
    println!("Format: {}", summary.format);
    println!();

    println!("Entries:");
    for (i, entry) in summary.entries.iter().enumerate() {
        let shape = entry
            .shape
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(" x ");
        println!("  {:3}. {} ({}, {})", i + 1, entry.name, entry.kind, shape);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opus_convert::export::{write_mat, write_npy};
    use tempfile::tempdir;

    #[test]
    fn test_summarize_npy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("root_spectra.npy");
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        write_npy(&mut File::create(&path).unwrap(), &NpyArray::matrix(&rows, 2)).unwrap();

        let summary = summarize(&path).unwrap();
        assert_eq!(summary.format, "npy");
        assert_eq!(
            summary.entries,
            vec![EntrySummary {
                name: "root_spectra".to_string(),
                kind: "float64".to_string(),
                shape: vec![3, 2],
            }]
        );
    }

    #[test]
    fn test_summarize_mat() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("root.mat");
        let variables = [
            ("wavenumbers", MatValue::row_vector(vec![1.0, 2.0, 3.0])),
            ("markup", MatValue::string_table(&[vec!["a".to_string()]])),
        ];
        write_mat(&mut File::create(&path).unwrap(), &variables, true).unwrap();

        let summary = summarize(&path).unwrap();
        let names: Vec<_> = summary.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["wavenumbers", "markup"]);
        assert_eq!(summary.entries[0].shape, vec![1, 3]);
        assert_eq!(summary.entries[1].kind, "cell");
    }

    #[test]
    fn test_summarize_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("root.csv");
        std::fs::write(&path, "sample_name,1.0,2.0\na,0.1,0.2\n").unwrap();

        let summary = summarize(&path).unwrap();
        assert_eq!(summary.entries[0].shape, vec![2, 3]);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"format\":\"csv\""));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "x").unwrap();
        assert!(summarize(&path).is_err());
    }
}
