//! FFT cross-correlation delay estimation.
//!
//! The correlation is linear (not circular): both inputs are zero-padded to
//! `len(reference) + len(target) - 1` before transforming. Resolution is one
//! sample; there is no sub-sample peak interpolation.

use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;

use crate::error::{DubsyncError, Result};
use crate::media::AudioSignal;

use super::Offset;

/// Full linear cross-correlation `r[m] = sum_t reference[t + m] * target[t]`,
/// indexed circularly over `len(reference) + len(target) - 1` lags.
pub fn cross_correlate(reference: &[f64], target: &[f64]) -> Vec<f64> {
    if reference.is_empty() || target.is_empty() {
        return Vec::new();
    }

    let n = reference.len() + target.len() - 1;

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut ref_complex: Vec<Complex<f64>> =
        reference.iter().map(|&x| Complex::new(x, 0.0)).collect();
    ref_complex.resize(n, Complex::new(0.0, 0.0));

    let mut target_complex: Vec<Complex<f64>> =
        target.iter().map(|&x| Complex::new(x, 0.0)).collect();
    target_complex.resize(n, Complex::new(0.0, 0.0));

    fft.process(&mut ref_complex);
    fft.process(&mut target_complex);

    let mut product: Vec<Complex<f64>> = ref_complex
        .iter()
        .zip(target_complex.iter())
        .map(|(a, b)| a * b.conj())
        .collect();

    ifft.process(&mut product);

    // rustfft leaves the inverse unscaled
    let scale = 1.0 / n as f64;
    product.iter().map(|c| c.re * scale).collect()
}

/// Lag (in samples) of the first correlation maximum, remapped to a signed lag.
fn peak_lag(correlation: &[f64]) -> i64 {
    let n = correlation.len();
    let mut best_idx = 0usize;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in correlation.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = i;
        }
    }

    if best_idx > n / 2 {
        best_idx as i64 - n as i64
    } else {
        best_idx as i64
    }
}

/// Offset that best aligns `target` onto `reference`.
///
/// Positive: `target` content arrives early and must be delayed by that much.
/// Negative: `target` content arrives late and must have its start trimmed.
pub fn estimate_offset_ms(reference: &[f64], target: &[f64], sample_rate: u32) -> Offset {
    let correlation = cross_correlate(reference, target);
    if correlation.is_empty() || sample_rate == 0 {
        return Offset::ZERO;
    }

    let lag = peak_lag(&correlation);
    let ms = lag as f64 / sample_rate as f64 * 1000.0;
    debug!(
        "Correlation peak at lag {} samples over {} lags ({:.3} ms)",
        lag,
        correlation.len(),
        ms
    );
    Offset::from_millis(ms)
}

/// Checked variant over loaded signals.
pub fn estimate(reference: &AudioSignal, target: &AudioSignal) -> Result<Offset> {
    if reference.sample_rate != target.sample_rate {
        return Err(DubsyncError::Precondition(format!(
            "Sample rates don't match: {} Hz vs {} Hz",
            reference.sample_rate, target.sample_rate
        )));
    }
    if reference.sample_rate == 0 {
        return Err(DubsyncError::Precondition(
            "Sample rate must be positive".to_string(),
        ));
    }
    if reference.samples.is_empty() || target.samples.is_empty() {
        return Err(DubsyncError::Precondition(
            "Cannot correlate an empty signal".to_string(),
        ));
    }
    Ok(estimate_offset_ms(
        &reference.samples,
        &target.samples,
        reference.sample_rate,
    ))
}
