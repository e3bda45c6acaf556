use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use opus_convert::opus::OpusBuilder;

const POINTS: usize = 1024;
const FIRST_WAVENUMBER: f64 = 4000.0;
const LAST_WAVENUMBER: f64 = 400.0;

/// Absorption bands as (center, width, height)
const BANDS: [(f64, f64, f64); 5] = [
    (3350.0, 180.0, 0.45),
    (2925.0, 35.0, 0.30),
    (1650.0, 40.0, 0.60),
    (1545.0, 35.0, 0.40),
    (1080.0, 60.0, 0.25),
];

/// Sessions of the demo tree: folder (relative) and sample file names
const LAYOUT: [(&str, &[&str]); 3] = [
    ("session_a", &["A_1_p1", "A_2_p2", "B_1_p3", "B_2_p4"]),
    ("session_b", &["C_1_p1", "C_2_p2", "D_p3"]),
    ("session_b/day_2", &["C_3_p1", "C_4_p2"]),
];

/// Synthetic absorbance spectrum on the demo grid
fn absorbance(seed: usize) -> Vec<f32> {
    let step = (LAST_WAVENUMBER - FIRST_WAVENUMBER) / (POINTS - 1) as f64;
    let scale = 1.0 + 0.08 * seed as f64;
    (0..POINTS)
        .map(|i| {
            let x = FIRST_WAVENUMBER + step * i as f64;
            let peaks: f64 = BANDS
                .iter()
                .map(|(center, width, height)| {
                    height * scale * (-((x - center) / width).powi(2)).exp()
                })
                .sum();
            let baseline = 0.02 + 0.00001 * (FIRST_WAVENUMBER - x);
            let ripple = 0.002 * ((i + seed * 7) as f64 * 0.37).sin();
            (peaks + baseline + ripple) as f32
        })
        .collect()
}

/// Single-channel sample block shown next to the absorbance in each file
fn single_channel(seed: usize) -> Vec<f32> {
    absorbance(seed)
        .iter()
        .map(|a| 10f32.powf(-a) * 1000.0)
        .collect()
}

fn write_sample(path: &Path, seed: usize) -> Result<()> {
    OpusBuilder::new()
        .single_channel_sample(FIRST_WAVENUMBER, LAST_WAVENUMBER, &single_channel(seed))
        .absorbance(FIRST_WAVENUMBER, LAST_WAVENUMBER, &absorbance(seed))
        .write_to(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Create the demo tree below `output`; returns the written files
pub(crate) fn generate(output: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut seed = 0;

    for (folder, samples) in LAYOUT {
        let dir = output.join(folder);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        for name in samples {
            let path = dir.join(format!("{name}.0"));
            write_sample(&path, seed)?;
            written.push(path);
            seed += 1;
        }
    }

    Ok(written)
}

/// Generate a small tree of synthetic OPUS files
pub fn run(output: PathBuf) -> Result<()> {
    info!("OPUS Converter Demo");
    info!("===================");

    let written = generate(&output)?;

    info!("Demo tree created: {}", output.display());
    info!("  Files written: {}", written.len());
    info!("  Points per spectrum: {}", POINTS);
    info!("");
    info!("Try:");
    info!("  opus-convert convert {} -f csv -s --drop-last-column", output.display());
    info!(
        "  opus-convert convert {} -f npy -s --fix-table -o converted",
        output.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opus_convert::opus::{BlockKind, OpusReader, SpectralSource};
    use tempfile::tempdir;

    #[test]
    fn test_generate_tree() {
        let dir = tempdir().unwrap();
        let written = generate(dir.path()).unwrap();
        assert_eq!(written.len(), 9);
        assert!(dir.path().join("session_b/day_2/C_4_p2.0").is_file());

        let reader = OpusReader::new();
        for path in &written {
            assert!(reader.is_eligible(path));
        }

        let blocks = reader.list_blocks(&written[0]).unwrap();
        let ab = blocks
            .iter()
            .find(|b| b.kind == BlockKind::Absorbance)
            .unwrap();
        let spectrum = reader.read_block(&written[0], ab).unwrap();
        assert_eq!(spectrum.x.len(), POINTS);
        assert_eq!(spectrum.x[0], FIRST_WAVENUMBER);
        assert_eq!(spectrum.x[POINTS - 1], LAST_WAVENUMBER);
    }

    #[test]
    fn test_spectra_differ_per_sample() {
        assert_ne!(absorbance(0), absorbance(1));
        assert!(absorbance(0).iter().all(|v| v.is_finite() && *v > 0.0));
    }
}
