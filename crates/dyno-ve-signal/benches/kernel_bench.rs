//! Benchmarks for the K1 kernel and the full preview pipeline.
//!
//! Run with: cargo bench --package dyno-ve-signal

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use dyno_ve_core::{CorrectionConfig, Grid, PerBank};
use dyno_ve_ingest::SampleRecord;
use dyno_ve_signal::{CorrectionPipeline, K1Kernel};

/// Deterministic error surface with the given fraction of populated cells.
fn error_surface(coverage: f64) -> Grid {
    Grid::from_fn(|cell| {
        let k = (cell.row * 5 + cell.col) as f64;
        let keep = ((k * 0.618_034) % 1.0) < coverage;
        keep.then(|| 4.0 * (k * 0.37).sin())
    })
}

/// Deterministic sweep of `n` records across the grid.
fn sweep(n: usize) -> Vec<SampleRecord> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let rpm = 1500.0 + (t * 37.0) % 5000.0;
            let map = 35.0 + (t * 13.0) % 60.0;
            let meas = 13.0 + 0.6 * (t * 0.05).sin();
            SampleRecord {
                rpm,
                map_kpa: map,
                torque: 40.0 + map,
                horsepower: Some((40.0 + map) * rpm / 5252.0),
                afr_cmd: PerBank {
                    front: Some(13.0),
                    rear: Some(13.0),
                },
                afr_meas: PerBank {
                    front: Some(meas),
                    rear: Some(meas + 0.1),
                },
                knock: PerBank {
                    front: Some((t * 0.11).sin().abs() * 2.0),
                    rear: None,
                },
                iat: Some(100.0 + (t * 0.01).sin() * 30.0),
                tps: None,
                vbatt: None,
            }
        })
        .collect()
}

fn bench_k1_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("K1 Kernel");
    group.measurement_time(Duration::from_secs(3));

    for &coverage in &[0.25, 0.6, 1.0] {
        let grid = error_surface(coverage);
        for &passes in &[2u32, 8] {
            let kernel = K1Kernel::new(passes, 1.0);
            group.bench_with_input(
                BenchmarkId::new(format!("passes_{passes}"), format!("{:.0}%", coverage * 100.0)),
                &grid,
                |b, g| b.iter(|| kernel.apply(black_box(g))),
            );
        }
    }
    group.finish();
}

fn bench_preview_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Preview Pipeline");
    group.measurement_time(Duration::from_secs(5));
    let pipeline = CorrectionPipeline::new(CorrectionConfig::default()).unwrap();

    for &n in &[1_000usize, 10_000, 100_000] {
        let records = sweep(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("records", n), &records, |b, recs| {
            b.iter(|| pipeline.run_records(black_box(recs.clone())).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_k1_kernel, bench_preview_pipeline);
criterion_main!(benches);
