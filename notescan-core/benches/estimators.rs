//! Per-frame cost of the two estimators
//!
//! The monophonic lag search is quadratic in the half-frame length and is
//! the cost center of a monophonic scan; the direct spectrum is quadratic in
//! the frame length.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use notescan_core::config::{MonophonicConfig, SpectralConfig, SpectrumMethod};
use notescan_core::pitch::detect_pitch_correlation;
use notescan_core::spectral::detect_polyphonic;
use std::f32::consts::PI;

const SAMPLE_RATE: u32 = 44100;

fn test_frame(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.5 * (2.0 * PI * 220.0 * t).sin() + 0.3 * (2.0 * PI * 277.18 * t).sin()
        })
        .collect()
}

fn bench_monophonic(c: &mut Criterion) {
    let config = MonophonicConfig::default();
    let mut group = c.benchmark_group("monophonic");
    for size in [1024usize, 2048, 4096] {
        let frame = test_frame(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| detect_pitch_correlation(black_box(frame), SAMPLE_RATE, &config))
        });
    }
    group.finish();
}

fn bench_spectral(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectral");
    group.sample_size(20);
    for method in [SpectrumMethod::Direct, SpectrumMethod::Fft] {
        let config = SpectralConfig { method, ..SpectralConfig::default() };
        let frame = test_frame(2048);
        group.bench_with_input(
            BenchmarkId::new(format!("{:?}", method), 2048),
            &frame,
            |b, frame| b.iter(|| detect_polyphonic(black_box(frame), SAMPLE_RATE, &config)),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_monophonic, bench_spectral);
criterion_main!(benches);
