//! Frame-synchronized visualization rendering.
//!
//! The renderer is a lazy, seekable frame source over the merged stream:
//! frame `k` is computed from a short window centered at `k / frame_rate`,
//! so any frame can be produced independently. Iteration adds a one-pole
//! attack/decay smoother so bars rise fast and fall gradually; that
//! smoothing state is the only carry-over between frames and resets on
//! seek.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::MergedAudio;
use crate::viz::bands::{BandAnalyzer, BandConfig};

/// Bar heights for one output-frame tick, each in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationFrame {
    pub bars: Vec<f64>,
}

/// How band energies map onto the [0, 1] bar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationPolicy {
    /// Map a fixed dB range below `reference_db` onto [0, 1]. Frames are
    /// fully independent; quiet mixes render short bars.
    #[default]
    FixedReference,
    /// Prescan the whole merged stream once and use its loudest band as
    /// the reference, so the loudest moment of the mix reaches 1.0.
    StreamPeak,
}

/// Renderer parameters.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Number of bars per frame.
    pub bar_count: usize,
    /// Output video frame rate.
    pub frame_rate: f64,
    /// Analysis window length in seconds (rounded up to a power of two of
    /// samples).
    pub window_secs: f64,
    /// Attack time constant (bar rise).
    pub attack_secs: f64,
    /// Decay time constant (bar fall).
    pub decay_secs: f64,
    /// Normalization policy.
    pub normalization: NormalizationPolicy,
    /// Reference level in dB for `FixedReference`.
    pub reference_db: f64,
    /// Floor level in dB; energies at or below map to zero-height bars.
    pub floor_db: f64,
    /// Lower edge of the first band in Hz.
    pub min_band_hz: f64,
    /// Optional high-pass cutoff in Hz (None disables).
    pub highpass_hz: Option<f64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            bar_count: 32,
            frame_rate: 30.0,
            window_secs: 0.05,
            attack_secs: 0.03,
            decay_secs: 0.35,
            normalization: NormalizationPolicy::default(),
            reference_db: 0.0,
            floor_db: -60.0,
            min_band_hz: 40.0,
            highpass_hz: Some(40.0),
        }
    }
}

/// Renderer construction errors.
#[derive(Error, Debug)]
pub enum VizError {
    #[error("bar count must be at least 1")]
    InvalidBarCount,

    #[error("frame rate must be positive (got {0})")]
    InvalidFrameRate(f64),

    #[error("analysis window must be positive (got {0}s)")]
    InvalidWindow(f64),

    #[error("reference level ({reference_db} dB) must be above the floor ({floor_db} dB)")]
    InvalidRange { reference_db: f64, floor_db: f64 },
}

/// Result type for renderer operations.
pub type VizResult<T> = Result<T, VizError>;

/// Lazy, seekable visualization frame source over a merged stream.
pub struct VisualizationRenderer<'a> {
    audio: &'a MergedAudio,
    analyzer: BandAnalyzer,
    config: RenderConfig,
    window_size: usize,
    frame_count: u64,
    reference_db: f64,
}

impl<'a> VisualizationRenderer<'a> {
    pub fn new(audio: &'a MergedAudio, config: RenderConfig) -> VizResult<Self> {
        if config.bar_count == 0 {
            return Err(VizError::InvalidBarCount);
        }
        if !(config.frame_rate > 0.0) {
            return Err(VizError::InvalidFrameRate(config.frame_rate));
        }
        if !(config.window_secs > 0.0) {
            return Err(VizError::InvalidWindow(config.window_secs));
        }
        if config.reference_db <= config.floor_db {
            return Err(VizError::InvalidRange {
                reference_db: config.reference_db,
                floor_db: config.floor_db,
            });
        }

        let window_size = ((config.window_secs * audio.sample_rate as f64).round() as usize)
            .next_power_of_two()
            .max(64);
        let analyzer = BandAnalyzer::new(BandConfig {
            bar_count: config.bar_count,
            window_size,
            sample_rate: audio.sample_rate,
            min_band_hz: config.min_band_hz,
            highpass_hz: config.highpass_hz,
        });
        let frame_count = (audio.duration_secs() * config.frame_rate).ceil() as u64;

        let mut renderer = Self {
            audio,
            analyzer,
            config,
            window_size,
            frame_count,
            reference_db: 0.0,
        };
        renderer.reference_db = match renderer.config.normalization {
            NormalizationPolicy::FixedReference => renderer.config.reference_db,
            NormalizationPolicy::StreamPeak => renderer.scan_peak_db(),
        };
        Ok(renderer)
    }

    /// Total frames: `ceil(duration * frame_rate)`.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Unsmoothed frame at index `k`.
    pub fn frame_at(&self, k: u64) -> VisualizationFrame {
        let bars = self
            .raw_bands_db(k)
            .into_iter()
            .map(|db| self.normalize(db))
            .collect();
        VisualizationFrame { bars }
    }

    /// Iterate all frames in time order with smoothing applied.
    pub fn frames(&self) -> FrameIter<'_, 'a> {
        self.frames_from(0)
    }

    /// Iterate frames starting at index `start`; smoothing state restarts.
    pub fn frames_from(&self, start: u64) -> FrameIter<'_, 'a> {
        FrameIter {
            renderer: self,
            next: start,
            smoothed: None,
            attack_alpha: smoothing_alpha(self.config.attack_secs, self.config.frame_rate),
            decay_alpha: smoothing_alpha(self.config.decay_secs, self.config.frame_rate),
        }
    }

    /// Band energies in dB for the window centered at frame `k`.
    ///
    /// Samples outside the stream read as silence, which zero-pads the
    /// partial windows at both edges.
    fn raw_bands_db(&self, k: u64) -> Vec<f64> {
        let center_frame =
            (k as f64 / self.config.frame_rate * self.audio.sample_rate as f64).round() as isize;
        let half = (self.window_size / 2) as isize;

        let mut window = Vec::with_capacity(self.window_size);
        for i in 0..self.window_size as isize {
            window.push(self.audio.mono_frame(center_frame - half + i));
        }
        self.analyzer.analyze(&window)
    }

    fn normalize(&self, db: f64) -> f64 {
        ((db - self.config.floor_db) / (self.reference_db - self.config.floor_db)).clamp(0.0, 1.0)
    }

    /// Loudest band energy across the whole stream, for `StreamPeak`.
    fn scan_peak_db(&self) -> f64 {
        let mut peak = f64::NEG_INFINITY;
        for k in 0..self.frame_count {
            for db in self.raw_bands_db(k) {
                peak = peak.max(db);
            }
        }
        if peak > self.config.floor_db {
            peak
        } else {
            // Silent stream: fall back to the fixed reference
            self.config.reference_db
        }
    }
}

/// One-pole smoothing coefficient for a time constant at a frame rate.
fn smoothing_alpha(tau_secs: f64, frame_rate: f64) -> f64 {
    if tau_secs <= 0.0 {
        1.0
    } else {
        1.0 - (-1.0 / (tau_secs * frame_rate)).exp()
    }
}

/// Iterator over smoothed visualization frames.
pub struct FrameIter<'r, 'a> {
    renderer: &'r VisualizationRenderer<'a>,
    next: u64,
    smoothed: Option<Vec<f64>>,
    attack_alpha: f64,
    decay_alpha: f64,
}

impl Iterator for FrameIter<'_, '_> {
    type Item = VisualizationFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.renderer.frame_count() {
            return None;
        }
        let raw = self.renderer.frame_at(self.next).bars;
        let bars = match self.smoothed.take() {
            None => raw,
            Some(prev) => prev
                .iter()
                .zip(&raw)
                .map(|(&p, &r)| {
                    let alpha = if r > p {
                        self.attack_alpha
                    } else {
                        self.decay_alpha
                    };
                    p + alpha * (r - p)
                })
                .collect(),
        };
        self.smoothed = Some(bars.clone());
        self.next += 1;
        Some(VisualizationFrame { bars })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const RATE: u32 = 8000;

    fn audio_from(samples: Vec<f64>) -> MergedAudio {
        MergedAudio {
            samples,
            sample_rate: RATE,
            channels: 1,
            timestamps: Vec::new(),
        }
    }

    fn sine(secs: f64, hz: f64, amp: f64) -> Vec<f64> {
        let frames = (secs * RATE as f64) as usize;
        (0..frames)
            .map(|i| amp * (2.0 * PI * hz * i as f64 / RATE as f64).sin())
            .collect()
    }

    fn config(frame_rate: f64) -> RenderConfig {
        RenderConfig {
            bar_count: 8,
            frame_rate,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn frame_count_is_ceiling_of_duration_times_rate() {
        let audio = audio_from(vec![0.0; 8160]); // 1.02s
        let renderer = VisualizationRenderer::new(&audio, config(30.0)).unwrap();
        assert_eq!(renderer.frame_count(), 31);
    }

    #[test]
    fn silence_renders_zero_bars() {
        let audio = audio_from(vec![0.0; RATE as usize]);
        let renderer = VisualizationRenderer::new(&audio, config(10.0)).unwrap();
        for frame in renderer.frames() {
            assert!(frame.bars.iter().all(|&b| b == 0.0));
        }
    }

    #[test]
    fn bars_stay_within_unit_range() {
        // Loud tone driven well past full scale
        let audio = audio_from(sine(1.0, 440.0, 2.0));
        let renderer = VisualizationRenderer::new(&audio, config(10.0)).unwrap();
        let mut produced = 0;
        for frame in renderer.frames() {
            assert_eq!(frame.bars.len(), 8);
            for &b in &frame.bars {
                assert!((0.0..=1.0).contains(&b), "bar height {} out of range", b);
            }
            produced += 1;
        }
        assert_eq!(produced, renderer.frame_count());
    }

    #[test]
    fn tone_lights_at_least_one_bar() {
        let audio = audio_from(sine(1.0, 440.0, 0.8));
        let renderer = VisualizationRenderer::new(&audio, config(10.0)).unwrap();
        let frame = renderer.frame_at(5);
        assert!(frame.bars.iter().any(|&b| b > 0.1));
    }

    #[test]
    fn stream_peak_reaches_full_height() {
        let mut cfg = config(10.0);
        cfg.normalization = NormalizationPolicy::StreamPeak;
        let audio = audio_from(sine(1.0, 440.0, 0.5));
        let renderer = VisualizationRenderer::new(&audio, cfg).unwrap();

        let mut max = 0.0f64;
        for k in 0..renderer.frame_count() {
            for b in renderer.frame_at(k).bars {
                max = max.max(b);
            }
        }
        assert!((max - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bars_decay_gradually_after_the_tone_stops() {
        let mut samples = sine(0.5, 440.0, 0.8);
        samples.extend(vec![0.0; RATE as usize]); // 1s of silence
        let audio = audio_from(samples);
        let renderer = VisualizationRenderer::new(&audio, config(10.0)).unwrap();

        let frames: Vec<VisualizationFrame> = renderer.frames().collect();
        let band = frames[3]
            .bars
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        // Tone ends near frame 5; the smoothed bar falls over several
        // frames instead of dropping straight to zero.
        let during = frames[3].bars[band];
        let after1 = frames[7].bars[band];
        let after2 = frames[9].bars[band];
        assert!(during > after1);
        assert!(after1 > after2);
        assert!(after1 > 0.0);
    }

    #[test]
    fn seeking_restarts_smoothing_cleanly() {
        let audio = audio_from(sine(1.0, 440.0, 0.8));
        let renderer = VisualizationRenderer::new(&audio, config(10.0)).unwrap();

        let direct = renderer.frame_at(5);
        let seeked = renderer.frames_from(5).next().unwrap();
        assert_eq!(direct, seeked);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let audio = audio_from(vec![0.0; 100]);
        let mut cfg = config(10.0);
        cfg.bar_count = 0;
        assert!(matches!(
            VisualizationRenderer::new(&audio, cfg),
            Err(VizError::InvalidBarCount)
        ));

        let mut cfg = config(0.0);
        cfg.frame_rate = 0.0;
        assert!(matches!(
            VisualizationRenderer::new(&audio, cfg),
            Err(VizError::InvalidFrameRate(_))
        ));
    }
}
