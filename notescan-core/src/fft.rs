//! # Spectrum Module
//!
//! Magnitude spectra for the polyphonic estimator. Bin `k` of a frame of
//! `N` samples is `|Σ x[n]·e^{-2πikn/N}| / N`, reported for the `N/2`
//! positive-frequency bins.
//!
//! ## Features
//! - Direct DFT summation (the reference computation)
//! - The same magnitudes through RustFFT for large frames
//! - Optional DC offset removal and Hann windowing

use rustfft::{FftPlanner, num_complex::Complex};
use std::f64::consts::PI;

use crate::config::{SpectrumMethod, WindowFunction};

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f64]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f64>() / len as f64;
    if avg.abs() > 1e-12 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the buffer in place.
fn apply_hann_window(buffer: &mut [f64]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f64;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * PI * i as f64 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Converts a frame to `f64` and applies the requested preconditioning.
fn precondition(frame: &[f32], window: WindowFunction, remove_dc: bool) -> Vec<f64> {
    let mut signal: Vec<f64> = frame.iter().map(|&s| s as f64).collect();
    if remove_dc {
        remove_dc_offset(&mut signal);
    }
    if window == WindowFunction::Hann {
        apply_hann_window(&mut signal);
    }
    signal
}

/// Magnitudes by direct summation of the DFT.
///
/// Twiddle factors are tabulated once per call; `(k·n) mod N` indexes them.
fn direct_magnitudes(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let twiddles: Vec<(f64, f64)> = (0..n)
        .map(|j| {
            let angle = -2.0 * PI * j as f64 / n as f64;
            (angle.cos(), angle.sin())
        })
        .collect();

    (0..n / 2)
        .map(|k| {
            let mut real = 0.0;
            let mut imag = 0.0;
            let mut index = 0;
            for &x in signal {
                let (cos, sin) = twiddles[index];
                real += x * cos;
                imag += x * sin;
                index = (index + k) % n;
            }
            (real * real + imag * imag).sqrt() / n as f64
        })
        .collect()
}

/// Magnitudes through a forward FFT.
fn fft_magnitudes(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);

    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .map(|&sample| Complex { re: sample, im: 0.0 })
        .collect();
    fft.process(&mut buffer);

    buffer
        .iter()
        .take(n / 2)
        .map(|c| c.norm() / n as f64) // .norm() is sqrt(re^2 + im^2)
        .collect()
}

/// Computes the normalized magnitude spectrum of a frame.
///
/// # Arguments
/// * `frame` - One analysis frame of `N` samples
/// * `method` - Direct summation or FFT; both give the same magnitudes
/// * `window` - Window applied before the transform
/// * `remove_dc` - Subtract the frame mean first
///
/// # Returns
/// * `Vec<f64>` - `N/2` magnitudes; bin `k` sits at `k · sample_rate / N` Hz
pub fn magnitude_spectrum(
    frame: &[f32],
    method: SpectrumMethod,
    window: WindowFunction,
    remove_dc: bool,
) -> Vec<f64> {
    if frame.len() < 2 {
        return Vec::new();
    }
    let signal = precondition(frame, window, remove_dc);
    match method {
        SpectrumMethod::Direct => direct_magnitudes(&signal),
        SpectrumMethod::Fft => fft_magnitudes(&signal),
    }
}

/// Frequency in Hz of a spectrum bin.
pub fn bin_to_hz(bin: usize, sample_rate: u32, frame_len: usize) -> f64 {
    bin as f64 * sample_rate as f64 / frame_len as f64
}
