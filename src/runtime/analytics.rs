//! analytics.rs
//! Derived health scores and error spectrum, computed from copied-out telemetry.

use std::sync::Arc;

use average::{Mean, Variance};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

/// Samples looked at by the radar scores.
pub const RADAR_WINDOW: usize = 50;
/// Below this many error samples the radar reports `DEFAULT_RADAR`.
pub const MIN_RADAR_SAMPLES: usize = 10;
/// `[stability, response, accuracy, efficiency, robustness]` before enough data exists.
pub const DEFAULT_RADAR: [f64; 5] = [0.8, 0.7, 0.9, 0.6, 0.8];
/// Not derived from telemetry.
pub const ROBUSTNESS_PLACEHOLDER: f64 = 0.8;

pub const FFT_WINDOW: usize = 64;
pub const SPECTRUM_BINS: usize = 10;
const SPECTRUM_EPS: f64 = 1e-6;

fn last(window: &[f64], n: usize) -> &[f64] {
    &window[window.len().saturating_sub(n)..]
}

fn mean_abs(values: &[f64]) -> f64 {
    values.iter().map(|v| v.abs()).collect::<Mean>().mean()
}

/// Radar scores over the newest `RADAR_WINDOW` samples of each channel.
///
/// - stability  = 1 / (1 + var(error)), population variance
/// - response   = clip(mean|velocity| / 5, 0.2, 1)
/// - accuracy   = clip(1 - mean|error|, 0, 1)
/// - efficiency = 1 / (1 + 0.1 mean|control|)
/// - robustness = 0.8
pub fn radar_scores(errors: &[f64], velocities: &[f64], controls: &[f64]) -> [f64; 5] {
    if errors.len() < MIN_RADAR_SAMPLES {
        return DEFAULT_RADAR;
    }

    let errors = last(errors, RADAR_WINDOW);
    let velocities = last(velocities, RADAR_WINDOW);
    let controls = last(controls, RADAR_WINDOW);

    let variance: Variance = errors.iter().copied().collect();
    let stability = 1.0 / (1.0 + variance.population_variance());
    let response = (mean_abs(velocities) / 5.0).clamp(0.2, 1.0);
    let accuracy = (1.0 - mean_abs(errors)).clamp(0.0, 1.0);
    let efficiency = 1.0 / (1.0 + 0.1 * mean_abs(controls));

    [stability, response, accuracy, efficiency, ROBUSTNESS_PLACEHOLDER]
}

/// Magnitude spectrum of the newest `FFT_WINDOW` error samples.
///
/// Holds its planned transform so repeated calls do not re-plan.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f64>>,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(FFT_WINDOW),
        }
    }

    /// First `SPECTRUM_BINS` DFT magnitudes, normalised by their maximum (+1e-6).
    /// All zeros with fewer than `FFT_WINDOW` samples.
    pub fn error_spectrum(&self, errors: &[f64]) -> [f64; SPECTRUM_BINS] {
        let mut out = [0.0; SPECTRUM_BINS];
        if errors.len() < FFT_WINDOW {
            return out;
        }

        let mut buffer: Vec<Complex64> = last(errors, FFT_WINDOW)
            .iter()
            .map(|&e| Complex64::new(e, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        for (slot, bin) in out.iter_mut().zip(&buffer) {
            *slot = bin.norm();
        }
        let peak = out.iter().copied().fold(0.0, f64::max);
        for slot in out.iter_mut() {
            *slot /= peak + SPECTRUM_EPS;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn radar_defaults_below_ten_samples() {
        let e = [1.0; 9];
        assert_eq!(radar_scores(&e, &e, &e), DEFAULT_RADAR);
    }

    #[test]
    fn radar_matches_formulas() {
        let errors: Vec<f64> = (0..60).map(|k| if k % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let velocities = vec![10.0; 60];
        let controls = vec![-2.0; 60];
        let r = radar_scores(&errors, &velocities, &controls);

        assert_relative_eq!(r[0], 1.0 / 1.25, epsilon = 1e-12);
        assert_relative_eq!(r[1], 1.0);
        assert_relative_eq!(r[2], 0.5, epsilon = 1e-12);
        assert_relative_eq!(r[3], 1.0 / 1.2, epsilon = 1e-12);
        assert_eq!(r[4], ROBUSTNESS_PLACEHOLDER);
    }

    #[test]
    fn radar_uses_only_newest_window() {
        let mut errors = vec![100.0; 30];
        errors.extend(std::iter::repeat_n(0.0, RADAR_WINDOW));
        let zeros = vec![0.0; errors.len()];
        let r = radar_scores(&errors, &zeros, &zeros);
        assert_eq!(r[0], 1.0);
        assert_eq!(r[1], 0.2);
        assert_eq!(r[2], 1.0);
        assert_eq!(r[3], 1.0);
    }

    #[test]
    fn spectrum_needs_full_window() {
        let a = SpectrumAnalyzer::new();
        assert_eq!(a.error_spectrum(&[1.0; 63]), [0.0; SPECTRUM_BINS]);
    }

    #[test]
    fn constant_error_is_all_dc() {
        let s = SpectrumAnalyzer::new().error_spectrum(&[2.0; 64]);
        assert_relative_eq!(s[0], 128.0 / (128.0 + 1e-6), epsilon = 1e-12);
        for bin in &s[1..] {
            assert!(bin.abs() < 1e-9);
        }
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let errors: Vec<f64> = (0..100)
            .map(|k| (2.0 * std::f64::consts::PI * 3.0 * k as f64 / 64.0).sin())
            .collect();
        let s = SpectrumAnalyzer::new().error_spectrum(&errors);
        let peak = s
            .iter()
            .enumerate()
            .fold((0, 0.0), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(peak.0, 3);
        assert!(s.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn flat_zero_signal_stays_finite() {
        let s = SpectrumAnalyzer::new().error_spectrum(&[0.0; 64]);
        assert_eq!(s, [0.0; SPECTRUM_BINS]);
    }
}
