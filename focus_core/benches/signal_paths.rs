use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use focus_core::RollingWindow;
use focus_core::camera::{BlobCfg, blob_intensity};
use image::{Rgb, RgbImage};

// Synthetic spot: red disc on a dark background
fn spot_frame(w: u32, h: u32, radius: f64) -> RgbImage {
    let (cx, cy) = (f64::from(w) / 2.0, f64::from(h) / 2.0);
    RgbImage::from_fn(w, h, |x, y| {
        let dx = f64::from(x) - cx;
        let dy = f64::from(y) - cy;
        if dx.hypot(dy) <= radius {
            Rgb([220, 30, 25])
        } else {
            Rgb([12, 10, 14])
        }
    })
}

fn configure(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p focus_core --bench signal_paths
    match std::env::var("BENCH_SAMPLE_SIZE").ok().and_then(|s| s.parse::<usize>().ok()) {
        Some(n) => {
            g.sample_size(n.max(10));
        }
        None => {
            g.sample_size(50);
        }
    }
    if let Some(ms) = std::env::var("BENCH_MEAS_MS").ok().and_then(|s| s.parse::<u64>().ok()) {
        g.measurement_time(std::time::Duration::from_millis(ms));
    }
}

pub fn bench_window(c: &mut Criterion) {
    let mut g = c.benchmark_group("rolling_window");
    configure(&mut g);
    for &cap in &[50usize, 500] {
        g.bench_function(format!("push_mean_{cap}"), |b| {
            b.iter_batched(
                || RollingWindow::new(cap),
                |mut w| {
                    for i in 0..1_000 {
                        w.push(black_box(f64::from(i) * 1e-3));
                    }
                    black_box(w.mean());
                },
                BatchSize::SmallInput,
            );
        });
    }
    g.finish();
}

pub fn bench_blob(c: &mut Criterion) {
    let mut g = c.benchmark_group("blob_intensity");
    configure(&mut g);
    let cfg = BlobCfg::default();
    for &(w, h) in &[(320u32, 240u32), (640, 480)] {
        let frame = spot_frame(w, h, f64::from(h) / 8.0);
        g.bench_function(format!("{w}x{h}"), |b| {
            b.iter(|| black_box(blob_intensity(black_box(&frame), &cfg)));
        });
    }
    g.finish();
}

criterion_group!(signal_paths, bench_window, bench_blob);
criterion_main!(signal_paths);
