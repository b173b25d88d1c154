//! Seamless background-clip looping.
//!
//! The clip is decoded once at the output frame rate; the looper then maps
//! any output frame index onto a clip frame by modulo over the clip's
//! frame count. Working in frame indices rather than time keeps the wrap
//! exact even when the clip length is not a multiple of the frame
//! interval.

use thiserror::Error;

use crate::media::ClipFrames;

/// Looper construction errors.
#[derive(Error, Debug)]
pub enum LooperError {
    /// The clip decoded to no complete frames at the output frame interval.
    #[error("background clip is shorter than a single output frame")]
    EmptyClip,

    /// The requested total duration is not positive.
    #[error("total duration must be positive (got {0}s)")]
    InvalidDuration(f64),
}

/// Frame source that repeats a background clip to cover a total duration.
pub struct BackgroundLooper {
    clip: ClipFrames,
    total_frames: u64,
}

impl BackgroundLooper {
    /// Build a looper covering `total_duration_secs` at `frame_rate`.
    pub fn new(
        clip: ClipFrames,
        total_duration_secs: f64,
        frame_rate: f64,
    ) -> Result<Self, LooperError> {
        if clip.is_empty() {
            return Err(LooperError::EmptyClip);
        }
        if !(total_duration_secs > 0.0) {
            return Err(LooperError::InvalidDuration(total_duration_secs));
        }
        let total_frames = (total_duration_secs * frame_rate).ceil() as u64;
        Ok(Self { clip, total_frames })
    }

    /// Number of output frames this source produces.
    pub fn len(&self) -> u64 {
        self.total_frames
    }

    /// Check if the source produces no frames.
    pub fn is_empty(&self) -> bool {
        self.total_frames == 0
    }

    /// Frame geometry in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.clip.dimensions()
    }

    /// RGB24 bytes for output frame `k`, wrapping over the clip.
    pub fn frame_at(&self, k: u64) -> &[u8] {
        self.clip.frame((k % self.clip.count() as u64) as usize)
    }

    /// Iterate all output frames in order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        (0..self.total_frames).map(move |k| self.frame_at(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x1 clip whose frames are filled with their own index.
    fn clip(frames: usize) -> ClipFrames {
        let mut data = Vec::new();
        for i in 0..frames {
            data.extend_from_slice(&[i as u8; 6]);
        }
        ClipFrames::from_raw(data, 2, 1)
    }

    #[test]
    fn wraps_by_exact_modulo() {
        // 4-frame clip, 11 = 2*4 + 3 output frames
        let looper = BackgroundLooper::new(clip(4), 1.1, 10.0).unwrap();
        assert_eq!(looper.len(), 11);

        // The 3 frames after two full loops equal the clip's first 3
        for r in 0..3u64 {
            assert_eq!(looper.frame_at(8 + r), looper.frame_at(r));
            assert_eq!(looper.frame_at(8 + r)[0], r as u8);
        }
    }

    #[test]
    fn wrap_point_has_no_duplicate_frame() {
        let looper = BackgroundLooper::new(clip(3), 1.0, 6.0).unwrap();
        // ... 0 1 2 | 0 1 2, never 2 2 or 0 0 at the seam
        let seq: Vec<u8> = looper.iter().map(|f| f[0]).collect();
        assert_eq!(seq, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn frame_count_is_ceiling() {
        let looper = BackgroundLooper::new(clip(2), 1.05, 10.0).unwrap();
        assert_eq!(looper.len(), 11);
    }

    #[test]
    fn empty_clip_is_rejected() {
        let empty = ClipFrames::from_raw(Vec::new(), 2, 1);
        assert!(matches!(
            BackgroundLooper::new(empty, 1.0, 10.0),
            Err(LooperError::EmptyClip)
        ));
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        assert!(matches!(
            BackgroundLooper::new(clip(2), 0.0, 10.0),
            Err(LooperError::InvalidDuration(_))
        ));
    }
}
