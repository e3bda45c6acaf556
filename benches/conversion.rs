use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use opus_convert::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const POINTS: usize = 1764;

/// Generate a folder of synthetic OPUS files for benchmarking
fn generate_folder(dir: &Path, num_files: usize) -> Vec<PathBuf> {
    (0..num_files)
        .map(|i| {
            let values: Vec<f32> = (0..POINTS)
                .map(|j| ((i * 31 + j) as f32 * 0.01).sin().abs())
                .collect();
            let path = dir.join(format!("S{}_{}_p{}.0", i / 8, i % 8, i));
            OpusBuilder::new()
                .single_channel_sample(4000.0, 600.0, &values)
                .absorbance(4000.0, 600.0, &values)
                .write_to(&path)
                .unwrap();
            path
        })
        .collect()
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");

    for num_files in [10, 100] {
        let temp_dir = TempDir::new().unwrap();
        let files = generate_folder(temp_dir.path(), num_files);
        let reader = OpusReader::new();

        group.throughput(Throughput::Elements((num_files * POINTS) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_files), &files, |b, files| {
            b.iter(|| {
                SpectrumAggregator::new(&reader)
                    .aggregate(temp_dir.path(), files)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    let input_dir = TempDir::new().unwrap();
    let files = generate_folder(input_dir.path(), 100);
    let reader = OpusReader::new();
    let batch = SpectrumAggregator::new(&reader)
        .aggregate(input_dir.path(), &files)
        .unwrap();
    let markup_options = MarkupOptions::split_on("_");
    let markup = MarkupBuilder::new(&markup_options)
        .build(input_dir.path(), &batch.files)
        .unwrap();

    group.throughput(Throughput::Elements((batch.spectra_count() * POINTS) as u64));

    let variants = [
        ("csv_split", OutputFormat::Csv, false, false),
        ("csv_joined", OutputFormat::Csv, true, false),
        ("npy", OutputFormat::Npy, false, false),
        ("mat", OutputFormat::Mat, false, false),
        ("mat_compressed", OutputFormat::Mat, false, true),
    ];

    for (name, format, one_file, compress) in variants {
        let options = ExportOptions {
            format,
            one_file,
            compress,
        };
        group.bench_function(name, |b| {
            b.iter_batched(
                || TempDir::new().unwrap(),
                |out| {
                    ResultWriter::new(&options)
                        .write(&out.path().join("bench"), &markup, &batch)
                        .unwrap();
                    out
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk");

    let root = TempDir::new().unwrap();
    for session in ["a", "b", "c", "d"] {
        let dir = root.path().join(session);
        std::fs::create_dir_all(&dir).unwrap();
        generate_folder(&dir, 25);
    }

    group.bench_function("four_sessions_npy", |b| {
        b.iter_batched(
            || TempDir::new().unwrap(),
            |out| {
                let config = ConversionConfig {
                    output: OutputLocation::Directory(out.path().to_path_buf()),
                    export: ExportOptions {
                        format: OutputFormat::Npy,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                let reader = OpusReader::new();
                let report = DirectoryWalker::new(&reader, &config).run(root.path()).unwrap();
                assert_eq!(report.converted_count(), 4);
                out
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_aggregation, bench_export, bench_walk);
criterion_main!(benches);
