//! # Pitch Detection Module
//!
//! Produces one frequency estimate per audio frame using the YIN algorithm,
//! refined against an FFT magnitude spectrum.
//!
//! ## Features
//! - Sliding analysis window of two hops, advanced one hop per call
//! - Silence gate in dB, below which no pitch is reported
//! - Parabolic interpolation for sub-sample accuracy
//! - Spectrum refinement for improved precision

use crate::fft::SpectrumAnalyzer;

/// Maps one frame of audio to one frequency estimate in Hz.
///
/// `0.0` means no pitch (silence or an unvoiced frame). Implementations may
/// keep internal state across calls but must be deterministic given the same
/// sequence of frames.
pub trait FrequencyEstimator {
    fn estimate(&mut self, frame: &[f32]) -> f32;
}

/// Mean square of a frame.
pub fn frame_energy(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32
}

/// Frame level in dB relative to full scale power. Silence is `-inf`.
pub fn level_db(frame: &[f32]) -> f32 {
    10.0 * frame_energy(frame).log10()
}

/// YIN estimator over a window of `2 * hop_size` samples.
pub struct YinEstimator {
    sample_rate: u32,
    silence_db: f32,
    window: Vec<f32>,
    spectrum: SpectrumAnalyzer,
}

impl YinEstimator {
    pub fn new(sample_rate: u32, hop_size: usize, silence_db: f32) -> Self {
        let window_size = hop_size * 2;
        Self {
            sample_rate,
            silence_db,
            window: vec![0.0; window_size],
            spectrum: SpectrumAnalyzer::new(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Shifts `frame` into the end of the analysis window.
    fn push_frame(&mut self, frame: &[f32]) {
        let size = self.window.len();
        if frame.len() >= size {
            self.window.copy_from_slice(&frame[frame.len() - size..]);
        } else {
            self.window.copy_within(frame.len().., 0);
            self.window[size - frame.len()..].copy_from_slice(frame);
        }
    }
}

impl FrequencyEstimator for YinEstimator {
    fn estimate(&mut self, frame: &[f32]) -> f32 {
        self.push_frame(frame);

        if level_db(frame) < self.silence_db {
            return 0.0;
        }

        let Some(rough) = detect_pitch_yin(&self.window, self.sample_rate) else {
            return 0.0;
        };
        let magnitudes = self.spectrum.magnitudes(&self.window);
        refine_from_spectrum(&magnitudes, rough, self.sample_rate).unwrap_or(rough)
    }
}

/// The YIN pitch detection algorithm.
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz
/// * `None` - No clear periodicity (noise or invalid signal)
pub fn detect_pitch_yin(signal: &[f32], sample_rate: u32) -> Option<f32> {
    let frame_size = signal.len();
    let half = frame_size / 2;
    if half < 3 {
        return None;
    }
    let mut yin_buffer = vec![0.0; half];

    // --- Step 1 & 2: Difference function and squared difference ---
    for tau in 1..half {
        let mut diff = 0.0;
        for i in 0..half {
            let delta = signal[i] - signal[i + tau];
            diff += delta * delta;
        }
        yin_buffer[tau] = diff;
    }

    // --- Step 3: Cumulative mean normalized difference ---
    let mut running_sum = 0.0;
    yin_buffer[0] = 1.0;
    for tau in 1..half {
        running_sum += yin_buffer[tau];
        if running_sum != 0.0 {
            yin_buffer[tau] *= tau as f32 / running_sum;
        } else {
            yin_buffer[tau] = 1.0;
        }
    }

    // --- Step 4 & 5: Find the first significant dip to avoid octave errors ---
    let min_val = yin_buffer
        .iter()
        .skip(1) // Skip tau = 0
        .cloned()
        .fold(f32::INFINITY, f32::min);

    let mut period = 0;
    let threshold = min_val + 0.05;

    for tau in 2..half {
        if yin_buffer[tau] < threshold && yin_buffer[tau] < yin_buffer[tau - 1] {
            period = tau;
            break;
        }
    }
    if period == 0 {
        return None;
    }
    // Follow the dip down to its local minimum.
    while period + 1 < half && yin_buffer[period + 1] < yin_buffer[period] {
        period += 1;
    }

    // A clear tone has a very low value in the YIN buffer; noise does not.
    const CLARITY_THRESHOLD: f32 = 0.1;
    if yin_buffer[period] > CLARITY_THRESHOLD {
        return None;
    }

    // --- Step 6: Parabolic interpolation for better precision ---
    if period + 1 >= half {
        return None;
    }

    let y1 = yin_buffer[period - 1];
    let y2 = yin_buffer[period];
    let y3 = yin_buffer[period + 1];

    let period_float = if (y1 - 2.0 * y2 + y3) != 0.0 {
        let peak_shift = (y1 - y3) / (2.0 * (y1 - 2.0 * y2 + y3));
        period as f32 + peak_shift
    } else {
        period as f32
    };

    let frequency = sample_rate as f32 / period_float;

    if frequency.is_finite() && frequency > 20.0 {
        Some(frequency)
    } else {
        None
    }
}

/// Refines a frequency estimate using a pre-computed magnitude spectrum.
///
/// Looks for the strongest bin within two bins of the estimate and
/// interpolates the peak on a log scale.
///
/// # Returns
/// * `Some(refined_freq)` - Refined frequency estimate
/// * `None` - The estimate was not positive
pub fn refine_from_spectrum(
    spectrum_magnitudes: &[f32],
    rough_freq: f32,
    sample_rate: u32,
) -> Option<f32> {
    if rough_freq <= 0.0 { return None; }
    if spectrum_magnitudes.len() < 3 { return Some(rough_freq); }
    let buffer_size = spectrum_magnitudes.len() * 2;
    let target_bin = (rough_freq * buffer_size as f32) / sample_rate as f32;
    let search_radius = 2.0;
    let start_bin = (target_bin - search_radius).max(0.0) as usize;
    let end_bin = (target_bin + search_radius).min((spectrum_magnitudes.len() - 1) as f32) as usize;
    if start_bin >= end_bin { return Some(rough_freq); }

    let peak_bin_result = spectrum_magnitudes[start_bin..=end_bin]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));

    let peak_bin = if let Some((offset, _)) = peak_bin_result {
        start_bin + offset
    } else {
        return Some(rough_freq);
    };

    if peak_bin == 0 || peak_bin >= spectrum_magnitudes.len() - 1 { return Some(rough_freq); }

    let y1 = spectrum_magnitudes[peak_bin - 1].ln();
    let y2 = spectrum_magnitudes[peak_bin].ln();
    let y3 = spectrum_magnitudes[peak_bin + 1].ln();

    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() { return Some(rough_freq); }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 { return Some(rough_freq); }

    let peak_shift = (y3 - y1) / (2.0 * denominator);
    let interpolated_bin = peak_bin as f32 + peak_shift;
    let final_freq = (interpolated_bin * sample_rate as f32) / buffer_size as f32;

    if final_freq.is_finite() && final_freq > 0.0 {
        Some(final_freq)
    } else {
        Some(rough_freq)
    }
}
