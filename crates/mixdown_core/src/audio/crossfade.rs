//! Equal-power crossfade merging.
//!
//! Merges an ordered sequence of decoded tracks into one continuous stream,
//! overlapping each adjacent pair by the configured crossfade duration. The
//! outgoing track's tail is weighted `cos(t*pi/2)`, the incoming track's
//! head `sin(t*pi/2)`, so the squared weights always sum to one and the
//! perceived loudness holds steady through the transition.
//!
//! Summation happens in f64 and can exceed [-1, 1]; the stream is rescaled
//! once at the end of the merge if its peak exceeds full scale. Boundaries
//! for the tracklist are recorded at the midpoint of each fade window.

use std::f64::consts::FRAC_PI_2;

use thiserror::Error;

use crate::audio::timestamps::TimestampTracker;
use crate::audio::types::{MergedAudio, TrackBuffer};

/// Errors raised while validating or merging a mix.
#[derive(Error, Debug)]
pub enum MergeError {
    /// The track list is empty.
    #[error("track list is empty")]
    EmptyMix,

    /// Crossfade duration is negative.
    #[error("crossfade duration must not be negative (got {0}s)")]
    NegativeCrossfade(f64),

    /// A crossfade does not fit between two adjacent tracks.
    #[error(
        "crossfade of {crossfade_secs}s must be shorter than both '{left}' ({left_secs:.2}s) and '{right}' ({right_secs:.2}s)"
    )]
    CrossfadeTooLong {
        crossfade_secs: f64,
        left: String,
        left_secs: f64,
        right: String,
        right_secs: f64,
    },

    /// An interior track cannot hold both its incoming and outgoing fades.
    #[error(
        "interior track '{title}' is {duration_secs:.2}s, shorter than two crossfades of {crossfade_secs}s"
    )]
    InteriorTrackTooShort {
        title: String,
        duration_secs: f64,
        crossfade_secs: f64,
    },

    /// A track arrived with an unexpected sample rate.
    #[error("track '{title}' has sample rate {actual} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        title: String,
        actual: u32,
        expected: u32,
    },

    /// A track arrived with an unexpected channel count.
    #[error("track '{title}' has {actual} channels, expected {expected}")]
    ChannelMismatch {
        title: String,
        actual: u16,
        expected: u16,
    },
}

/// Result type for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// Fade-out weight at normalized position `t` in [0, 1].
pub fn fade_out_weight(t: f64) -> f64 {
    (t.clamp(0.0, 1.0) * FRAC_PI_2).cos()
}

/// Fade-in weight at normalized position `t` in [0, 1].
pub fn fade_in_weight(t: f64) -> f64 {
    (t.clamp(0.0, 1.0) * FRAC_PI_2).sin()
}

/// Merges ordered tracks with a fixed crossfade duration.
pub struct CrossfadeMerger {
    crossfade_secs: f64,
}

impl CrossfadeMerger {
    pub fn new(crossfade_secs: f64) -> Self {
        Self { crossfade_secs }
    }

    /// Crossfade length in sample frames at the given rate.
    fn crossfade_frames(&self, sample_rate: u32) -> usize {
        (self.crossfade_secs * sample_rate as f64).round() as usize
    }

    /// Validate the mix without merging.
    ///
    /// Checks format uniformity and that every crossfade fits: strictly
    /// shorter than both tracks it joins, and interior tracks long enough
    /// to hold an incoming and an outgoing fade without overlap.
    pub fn validate(&self, tracks: &[TrackBuffer]) -> MergeResult<()> {
        if tracks.is_empty() {
            return Err(MergeError::EmptyMix);
        }
        if self.crossfade_secs < 0.0 {
            return Err(MergeError::NegativeCrossfade(self.crossfade_secs));
        }

        let sample_rate = tracks[0].sample_rate;
        let channels = tracks[0].channels;
        for track in tracks {
            if track.sample_rate != sample_rate {
                return Err(MergeError::SampleRateMismatch {
                    title: track.title.clone(),
                    actual: track.sample_rate,
                    expected: sample_rate,
                });
            }
            if track.channels != channels {
                return Err(MergeError::ChannelMismatch {
                    title: track.title.clone(),
                    actual: track.channels,
                    expected: channels,
                });
            }
        }

        let fade = self.crossfade_frames(sample_rate);
        for pair in tracks.windows(2) {
            let (left, right) = (&pair[0], &pair[1]);
            if fade >= left.frames() || fade >= right.frames() {
                return Err(MergeError::CrossfadeTooLong {
                    crossfade_secs: self.crossfade_secs,
                    left: left.title.clone(),
                    left_secs: left.duration_secs(),
                    right: right.title.clone(),
                    right_secs: right.duration_secs(),
                });
            }
        }
        if tracks.len() > 2 {
            for track in &tracks[1..tracks.len() - 1] {
                if track.frames() < 2 * fade {
                    return Err(MergeError::InteriorTrackTooShort {
                        title: track.title.clone(),
                        duration_secs: track.duration_secs(),
                        crossfade_secs: self.crossfade_secs,
                    });
                }
            }
        }
        Ok(())
    }

    /// Merge the tracks into one continuous stream.
    ///
    /// A single track passes through untouched. Otherwise each adjacent
    /// pair is overlapped by the crossfade length and summed with
    /// complementary equal-power weights; the merged duration equals the
    /// sum of track durations minus `(n-1) * crossfade`.
    pub fn merge(&self, tracks: Vec<TrackBuffer>) -> MergeResult<MergedAudio> {
        self.validate(&tracks)?;

        let sample_rate = tracks[0].sample_rate;
        let channels = tracks[0].channels;
        let ch = channels as usize;

        if tracks.len() == 1 {
            let track = tracks.into_iter().next().expect("validated non-empty");
            let duration = track.duration_secs();
            let mut tracker = TimestampTracker::new();
            tracker.open(&track.title);
            return Ok(MergedAudio {
                samples: track.samples,
                sample_rate,
                channels,
                timestamps: tracker.finish(duration),
            });
        }

        let fade = self.crossfade_frames(sample_rate);
        let total_frames: usize = tracks.iter().map(TrackBuffer::frames).sum::<usize>()
            - (tracks.len() - 1) * fade;

        let mut out: Vec<f64> = Vec::with_capacity(total_frames * ch);
        let mut tracker = TimestampTracker::new();

        let mut iter = tracks.into_iter();
        let first = iter.next().expect("validated non-empty");
        tracker.open(&first.title);
        out.extend_from_slice(&first.samples);

        for track in iter {
            let out_frames = out.len() / ch;
            let fade_start = out_frames - fade;

            // Tracklist boundary at the midpoint of the fade window
            let boundary_secs = (fade_start as f64 + fade as f64 / 2.0) / sample_rate as f64;
            tracker.boundary(boundary_secs, &track.title);

            for j in 0..fade {
                let t = if fade > 1 {
                    j as f64 / (fade - 1) as f64
                } else {
                    0.5
                };
                let out_w = fade_out_weight(t);
                let in_w = fade_in_weight(t);
                for c in 0..ch {
                    let idx = (fade_start + j) * ch + c;
                    out[idx] = out[idx] * out_w + track.samples[j * ch + c] * in_w;
                }
            }
            out.extend_from_slice(&track.samples[fade * ch..]);
        }

        debug_assert_eq!(out.len(), total_frames * ch);

        // Summed overlaps can exceed full scale; rescale once at the end so
        // quantization error is not compounded per pair.
        let peak = out.iter().fold(0.0f64, |acc, s| acc.max(s.abs()));
        if peak > 1.0 {
            let scale = 1.0 / peak;
            for sample in &mut out {
                *sample *= scale;
            }
        }

        let total_secs = total_frames as f64 / sample_rate as f64;
        Ok(MergedAudio {
            samples: out,
            sample_rate,
            channels,
            timestamps: tracker.finish(total_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1000;

    fn track(title: &str, secs: f64, value: f64) -> TrackBuffer {
        let frames = (secs * RATE as f64).round() as usize;
        TrackBuffer::new(title, vec![value; frames], RATE, 1)
    }

    #[test]
    fn merged_duration_matches_formula() {
        let merger = CrossfadeMerger::new(2.0);
        let merged = merger
            .merge(vec![
                track("a", 10.0, 0.1),
                track("b", 8.0, 0.1),
                track("c", 12.0, 0.1),
            ])
            .unwrap();
        // 10 + 8 + 12 - 2*2 = 26
        assert_eq!(merged.frames(), 26_000);
        assert!((merged.duration_secs() - 26.0).abs() < 1.0 / RATE as f64);
    }

    #[test]
    fn boundaries_sit_at_fade_midpoints() {
        let merger = CrossfadeMerger::new(2.0);
        let merged = merger
            .merge(vec![
                track("a", 10.0, 0.1),
                track("b", 8.0, 0.1),
                track("c", 12.0, 0.1),
            ])
            .unwrap();

        let ts = &merged.timestamps;
        assert_eq!(ts.len(), 3);
        // First fade window spans [8, 10] of the merged stream, second [14, 16]
        assert!((ts[0].end_secs - 9.0).abs() < 1e-9);
        assert!((ts[1].end_secs - 15.0).abs() < 1e-9);
        assert_eq!(ts[0].start_secs, 0.0);
        assert!((ts[2].end_secs - 26.0).abs() < 1e-9);

        let span_sum: f64 = ts.iter().map(|e| e.span_secs()).sum();
        assert!((span_sum - 26.0).abs() < 1e-9);
        for pair in ts.windows(2) {
            assert_eq!(pair[0].end_secs, pair[1].start_secs);
        }
    }

    #[test]
    fn single_track_passes_through_unchanged() {
        let input = track("solo", 3.0, 0.7);
        let expected = input.samples.clone();
        let merged = CrossfadeMerger::new(5.0).merge(vec![input]).unwrap();

        assert_eq!(merged.samples, expected);
        assert_eq!(merged.timestamps.len(), 1);
        assert_eq!(merged.timestamps[0].start_secs, 0.0);
        assert!((merged.timestamps[0].end_secs - 3.0).abs() < 1e-9);
    }

    #[test]
    fn equal_power_weights_hold_at_midpoint() {
        let sum = fade_out_weight(0.5).powi(2) + fade_in_weight(0.5).powi(2);
        assert!((sum - 1.0).abs() < 1e-12);
        // The property holds across the whole window, not just the midpoint
        for i in 0..=100 {
            let t = i as f64 / 100.0;
            let sum = fade_out_weight(t).powi(2) + fade_in_weight(t).powi(2);
            assert!((sum - 1.0).abs() < 1e-12, "t={}", t);
        }
    }

    #[test]
    fn crossfade_longer_than_tracks_is_rejected() {
        let err = CrossfadeMerger::new(5.0)
            .merge(vec![track("a", 3.0, 0.1), track("b", 3.0, 0.1)])
            .unwrap_err();
        assert!(matches!(err, MergeError::CrossfadeTooLong { .. }));
    }

    #[test]
    fn short_interior_track_is_rejected() {
        let err = CrossfadeMerger::new(2.0)
            .merge(vec![
                track("a", 10.0, 0.1),
                track("mid", 3.0, 0.1),
                track("c", 10.0, 0.1),
            ])
            .unwrap_err();
        assert!(matches!(err, MergeError::InteriorTrackTooShort { .. }));
    }

    #[test]
    fn negative_crossfade_is_rejected() {
        let err = CrossfadeMerger::new(-1.0)
            .merge(vec![track("a", 3.0, 0.1), track("b", 3.0, 0.1)])
            .unwrap_err();
        assert!(matches!(err, MergeError::NegativeCrossfade(_)));
    }

    #[test]
    fn empty_mix_is_rejected() {
        let err = CrossfadeMerger::new(1.0).merge(Vec::new()).unwrap_err();
        assert!(matches!(err, MergeError::EmptyMix));
    }

    #[test]
    fn sample_rate_mismatch_is_rejected() {
        let odd = TrackBuffer::new("odd", vec![0.0; 4800], 4800, 1);
        let err = CrossfadeMerger::new(0.5)
            .merge(vec![track("a", 3.0, 0.1), odd])
            .unwrap_err();
        assert!(matches!(err, MergeError::SampleRateMismatch { .. }));
    }

    #[test]
    fn zero_crossfade_concatenates() {
        let merged = CrossfadeMerger::new(0.0)
            .merge(vec![track("a", 1.0, 0.25), track("b", 1.0, 0.5)])
            .unwrap();
        assert_eq!(merged.frames(), 2000);
        assert_eq!(merged.samples[999], 0.25);
        assert_eq!(merged.samples[1000], 0.5);
        assert!((merged.timestamps[0].end_secs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hot_overlap_is_rescaled_to_full_scale() {
        // 0.8*cos(t) + 0.8*sin(t) peaks at ~1.13 mid-fade
        let merged = CrossfadeMerger::new(1.0)
            .merge(vec![track("a", 2.0, 0.8), track("b", 2.0, 0.8)])
            .unwrap();
        let peak = merged.samples.iter().fold(0.0f64, |acc, s| acc.max(s.abs()));
        assert!(peak <= 1.0 + 1e-12);
        assert!(peak > 0.99);
    }
}
