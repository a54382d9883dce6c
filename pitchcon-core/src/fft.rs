//! # Fast Fourier Transform (FFT) Module
//!
//! Magnitude spectra for refining pitch estimates. The plan is built once per
//! analysis window size and reused for every frame.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 { return; }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Forward FFT of a fixed window size.
pub struct SpectrumAnalyzer {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self {
            size,
            fft,
            buffer: vec![Complex::default(); size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the magnitude spectrum up to the Nyquist bin.
    ///
    /// The signal is DC-corrected and Hann-windowed first. A signal shorter
    /// than the window is zero-padded; a longer one is truncated.
    pub fn magnitudes(&mut self, signal: &[f32]) -> Vec<f32> {
        let mut processed: Vec<f32> = signal.iter().take(self.size).copied().collect();
        remove_dc_offset(&mut processed);
        apply_hann_window(&mut processed);
        processed.resize(self.size, 0.0);

        for (slot, sample) in self.buffer.iter_mut().zip(processed) {
            *slot = Complex { re: sample, im: 0.0 };
        }
        self.fft.process(&mut self.buffer);

        self.buffer
            .iter()
            .take(self.size / 2)
            .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_peaks_at_expected_bin() {
        let size = 1024;
        let sample_rate = 8000.0;
        // 64 cycles per window lands exactly on bin 64.
        let freq = 64.0 * sample_rate / size as f32;
        let signal: Vec<f32> = (0..size)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let mut analyzer = SpectrumAnalyzer::new(size);
        let mags = analyzer.magnitudes(&signal);
        assert_eq!(mags.len(), size / 2);

        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(64));
    }

    #[test]
    fn dc_is_removed() {
        let mut signal = vec![0.5_f32; 16];
        remove_dc_offset(&mut signal);
        assert!(signal.iter().all(|s| s.abs() < 1e-6));
    }
}
