//! Short-time band energy analysis.
//!
//! Each analysis window is Hann-weighted, transformed with a forward FFT,
//! and the power spectrum is grouped into log-spaced bands, one per bar.
//! An optional Butterworth high-pass removes DC and rumble that would
//! otherwise pin the lowest bars.

use std::f64::consts::PI;
use std::sync::Arc;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F64};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Parameters for the band analyzer.
#[derive(Debug, Clone)]
pub struct BandConfig {
    /// Number of output bands (bars).
    pub bar_count: usize,
    /// FFT window size in samples (power of two).
    pub window_size: usize,
    /// Sample rate of the analyzed audio.
    pub sample_rate: u32,
    /// Lower edge of the first band in Hz.
    pub min_band_hz: f64,
    /// Optional high-pass cutoff applied before the FFT.
    pub highpass_hz: Option<f64>,
}

/// Groups FFT bins into per-bar energies.
pub struct BandAnalyzer {
    config: BandConfig,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    /// Half-open bin ranges, one per band, in ascending order.
    band_ranges: Vec<(usize, usize)>,
}

impl BandAnalyzer {
    pub fn new(config: BandConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.window_size);
        let window = hann_window(config.window_size);
        let band_ranges = build_band_ranges(
            config.bar_count,
            config.window_size,
            config.sample_rate,
            config.min_band_hz,
        );
        Self {
            config,
            fft,
            window,
            band_ranges,
        }
    }

    /// Per-band energy in dB for one analysis window.
    ///
    /// `samples` must be exactly `window_size` long; callers zero-pad
    /// partial windows at the stream edges.
    pub fn analyze(&self, samples: &[f64]) -> Vec<f64> {
        debug_assert_eq!(samples.len(), self.config.window_size);

        let filtered;
        let samples = match self.config.highpass_hz {
            Some(cutoff) if cutoff > 0.0 => {
                filtered = apply_highpass(samples, self.config.sample_rate, cutoff);
                &filtered[..]
            }
            _ => samples,
        };

        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let scale = 1.0 / self.config.window_size as f64;
        self.band_ranges
            .iter()
            .map(|&(start, end)| {
                let power: f64 = buffer[start..end]
                    .iter()
                    .map(|c| (c.norm() * scale).powi(2))
                    .sum::<f64>()
                    / (end - start) as f64;
                10.0 * (power + 1e-12).log10()
            })
            .collect()
    }

    /// Band count this analyzer produces.
    pub fn band_count(&self) -> usize {
        self.band_ranges.len()
    }

    /// Center frequency of a band in Hz, for diagnostics.
    pub fn band_center_hz(&self, band: usize) -> f64 {
        let (start, end) = self.band_ranges[band];
        let bin_hz = self.config.sample_rate as f64 / self.config.window_size as f64;
        (start + end) as f64 / 2.0 * bin_hz
    }
}

/// Geometrically spaced bin ranges from `min_band_hz` to Nyquist.
///
/// Every band gets at least one bin, so a large bar count against a small
/// window degrades to adjacent single-bin bands instead of empty ones.
fn build_band_ranges(
    bar_count: usize,
    window_size: usize,
    sample_rate: u32,
    min_band_hz: f64,
) -> Vec<(usize, usize)> {
    let num_bins = window_size / 2 + 1;
    let bin_hz = sample_rate as f64 / window_size as f64;
    let nyquist = sample_rate as f64 / 2.0;
    let min_hz = min_band_hz.max(bin_hz).min(nyquist / 2.0);

    let mut ranges = Vec::with_capacity(bar_count);
    // Skip the DC bin
    let mut prev = ((min_hz / bin_hz) as usize).max(1).min(num_bins - 1);
    for i in 1..=bar_count {
        let edge_hz = min_hz * (nyquist / min_hz).powf(i as f64 / bar_count as f64);
        let mut end = (edge_hz / bin_hz).round() as usize;
        if end <= prev {
            end = prev + 1;
        }
        let end = end.min(num_bins);
        let start = prev.min(end - 1);
        ranges.push((start, end));
        prev = end;
    }
    ranges
}

/// Hann window of the given size.
fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

/// Second-order Butterworth high-pass.
fn apply_highpass(samples: &[f64], sample_rate: u32, cutoff_hz: f64) -> Vec<f64> {
    let fs = sample_rate.hz();
    let f0 = cutoff_hz.hz();
    let coeffs = match Coefficients::<f64>::from_params(Type::HighPass, fs, f0, Q_BUTTERWORTH_F64) {
        Ok(c) => c,
        Err(_) => return samples.to_vec(),
    };
    let mut filter = DirectForm2Transposed::<f64>::new(coeffs);
    samples.iter().map(|&s| filter.run(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(bar_count: usize) -> BandAnalyzer {
        BandAnalyzer::new(BandConfig {
            bar_count,
            window_size: 2048,
            sample_rate: 44100,
            min_band_hz: 40.0,
            highpass_hz: None,
        })
    }

    #[test]
    fn ranges_cover_requested_band_count() {
        let a = analyzer(32);
        assert_eq!(a.band_count(), 32);
    }

    #[test]
    fn ranges_are_ascending_and_non_empty() {
        let a = analyzer(32);
        let mut prev_end = 0;
        for &(start, end) in &a.band_ranges {
            assert!(start < end, "empty band range");
            assert!(end > prev_end, "band ranges must ascend");
            prev_end = end;
        }
        assert!(prev_end <= 2048 / 2 + 1);
    }

    #[test]
    fn silence_analyzes_to_the_noise_floor() {
        let a = analyzer(16);
        let bands = a.analyze(&vec![0.0; 2048]);
        assert_eq!(bands.len(), 16);
        for db in bands {
            assert!(db <= -100.0);
        }
    }

    #[test]
    fn tone_peaks_in_its_own_band() {
        let a = analyzer(16);
        let rate = 44100.0;
        let tone_hz = 1000.0;
        let samples: Vec<f64> = (0..2048)
            .map(|i| (2.0 * PI * tone_hz * i as f64 / rate).sin())
            .collect();
        let bands = a.analyze(&samples);

        let loudest = bands
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let center = a.band_center_hz(loudest);
        assert!(
            (center - tone_hz).abs() < tone_hz,
            "1kHz tone peaked in band centered at {:.0}Hz",
            center
        );
    }

    #[test]
    fn highpass_attenuates_dc() {
        let with_hp = BandAnalyzer::new(BandConfig {
            bar_count: 8,
            window_size: 2048,
            sample_rate: 44100,
            min_band_hz: 40.0,
            highpass_hz: Some(80.0),
        });
        let without_hp = analyzer(8);

        let dc = vec![0.9; 2048];
        let filtered = with_hp.analyze(&dc);
        let raw = without_hp.analyze(&dc);
        // DC offset energy leaks into the lowest band without the filter
        assert!(filtered[0] < raw[0]);
    }
}
