//! Frame-by-frame compositing.
//!
//! For each output tick the composer copies the looped background frame,
//! alpha-blends the rasterized visualization overlay at the configured
//! position and opacity, and streams the result into the encoder sink.
//! Audio and video share the same origin; the composer introduces no
//! retiming of its own.

use image::RgbaImage;

use crate::media::{FrameSink, MediaResult};
use crate::video::looper::BackgroundLooper;
use crate::viz::{render_overlay, OverlayStyle, VisualizationRenderer};

/// Where and how strongly the overlay lands on the background frame.
#[derive(Debug, Clone)]
pub struct OverlayPlacement {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Overall overlay opacity in [0, 1], multiplied with per-pixel alpha.
    pub opacity: f64,
}

impl Default for OverlayPlacement {
    fn default() -> Self {
        Self {
            x: 160,
            y: 420,
            opacity: 0.85,
        }
    }
}

/// Alpha-blend an RGBA overlay onto an RGB24 frame in place.
///
/// Overlay pixels falling outside the frame are dropped rather than
/// wrapped.
pub fn blend_overlay(
    frame_rgb: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    overlay: &RgbaImage,
    placement: &OverlayPlacement,
) {
    let opacity = placement.opacity.clamp(0.0, 1.0);
    if opacity == 0.0 {
        return;
    }

    for (ox, oy, pixel) in overlay.enumerate_pixels() {
        let alpha = pixel.0[3] as f64 / 255.0 * opacity;
        if alpha <= 0.0 {
            continue;
        }
        let x = placement.x + ox;
        let y = placement.y + oy;
        if x >= frame_width || y >= frame_height {
            continue;
        }
        let idx = ((y * frame_width + x) * 3) as usize;
        for c in 0..3 {
            let bg = frame_rgb[idx + c] as f64;
            let fg = pixel.0[c] as f64;
            frame_rgb[idx + c] = (bg * (1.0 - alpha) + fg * alpha).round() as u8;
        }
    }
}

/// Combines looped background frames with visualization overlays and
/// streams the composited frames into an encoder sink.
pub struct VideoComposer {
    style: OverlayStyle,
    placement: OverlayPlacement,
}

impl VideoComposer {
    pub fn new(style: OverlayStyle, placement: OverlayPlacement) -> Self {
        Self { style, placement }
    }

    /// Composite every output frame in time order.
    ///
    /// Returns the number of frames written. `progress` is called after
    /// each frame with (written, total).
    pub fn compose(
        &self,
        looper: &BackgroundLooper,
        renderer: &VisualizationRenderer<'_>,
        sink: &mut dyn FrameSink,
        mut progress: impl FnMut(u64, u64),
    ) -> MediaResult<u64> {
        let total = renderer.frame_count();
        debug_assert_eq!(total, looper.len());

        let (width, height) = looper.dimensions();
        let mut viz_frames = renderer.frames();
        let mut buf: Vec<u8> = Vec::with_capacity((width * height * 3) as usize);

        let mut written = 0;
        for k in 0..total {
            let Some(viz) = viz_frames.next() else {
                break;
            };
            buf.clear();
            buf.extend_from_slice(looper.frame_at(k));

            let overlay = render_overlay(&viz, &self.style);
            blend_overlay(&mut buf, width, height, &overlay, &self.placement);

            sink.write_frame(&buf)?;
            written += 1;
            progress(written, total);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MergedAudio;
    use crate::media::ClipFrames;
    use crate::viz::{RenderConfig, VisualizationFrame};
    use std::f64::consts::PI;

    struct CollectingSink {
        frames: Vec<Vec<u8>>,
    }

    impl FrameSink for CollectingSink {
        fn write_frame(&mut self, rgb: &[u8]) -> MediaResult<()> {
            self.frames.push(rgb.to_vec());
            Ok(())
        }

        fn finish(self: Box<Self>) -> MediaResult<()> {
            Ok(())
        }
    }

    fn background(width: u32, height: u32, frames: usize, fill: u8) -> BackgroundLooper {
        let data = vec![fill; (width * height * 3) as usize * frames];
        let clip = ClipFrames::from_raw(data, width, height);
        BackgroundLooper::new(clip, 1.0, 10.0).unwrap()
    }

    fn audio(samples: Vec<f64>) -> MergedAudio {
        MergedAudio {
            samples,
            sample_rate: 8000,
            channels: 1,
            timestamps: Vec::new(),
        }
    }

    fn small_style() -> OverlayStyle {
        OverlayStyle {
            width: 8,
            height: 4,
            bar_gap: 0,
            color: [255, 255, 255, 255],
        }
    }

    fn render_cfg() -> RenderConfig {
        RenderConfig {
            bar_count: 4,
            frame_rate: 10.0,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn blend_at_full_opacity_replaces_pixels() {
        let mut frame = vec![0u8; 4 * 4 * 3];
        let overlay = render_overlay(
            &VisualizationFrame { bars: vec![1.0] },
            &OverlayStyle {
                width: 2,
                height: 2,
                bar_gap: 0,
                color: [255, 255, 255, 255],
            },
        );
        let placement = OverlayPlacement {
            x: 1,
            y: 1,
            opacity: 1.0,
        };
        blend_overlay(&mut frame, 4, 4, &overlay, &placement);

        let idx = ((1 * 4 + 1) * 3) as usize;
        assert_eq!(frame[idx], 255);
        // Outside the placement stays untouched
        assert_eq!(frame[0], 0);
    }

    #[test]
    fn blend_at_half_opacity_mixes_pixels() {
        let mut frame = vec![0u8; 2 * 2 * 3];
        let overlay = render_overlay(
            &VisualizationFrame { bars: vec![1.0] },
            &OverlayStyle {
                width: 1,
                height: 1,
                bar_gap: 0,
                color: [255, 255, 255, 255],
            },
        );
        let placement = OverlayPlacement {
            x: 0,
            y: 0,
            opacity: 0.5,
        };
        blend_overlay(&mut frame, 2, 2, &overlay, &placement);
        assert_eq!(frame[0], 128);
    }

    #[test]
    fn blend_clips_overlay_at_frame_edge() {
        let mut frame = vec![0u8; 2 * 2 * 3];
        let overlay = render_overlay(
            &VisualizationFrame { bars: vec![1.0] },
            &OverlayStyle {
                width: 4,
                height: 4,
                bar_gap: 0,
                color: [255, 255, 255, 255],
            },
        );
        let placement = OverlayPlacement {
            x: 1,
            y: 1,
            opacity: 1.0,
        };
        // Must not panic or wrap; only the in-frame quadrant is touched
        blend_overlay(&mut frame, 2, 2, &overlay, &placement);
        assert_eq!(frame[0], 0);
    }

    #[test]
    fn compose_writes_every_frame() {
        let looper = background(8, 8, 3, 10);
        let merged = audio(vec![0.0; 8000]);
        let renderer = VisualizationRenderer::new(&merged, render_cfg()).unwrap();
        let composer = VideoComposer::new(
            small_style(),
            OverlayPlacement {
                x: 0,
                y: 4,
                opacity: 1.0,
            },
        );

        let mut sink = CollectingSink { frames: Vec::new() };
        let mut last_progress = (0, 0);
        let written = composer
            .compose(&looper, &renderer, &mut sink, |done, total| {
                last_progress = (done, total)
            })
            .unwrap();

        assert_eq!(written, 10);
        assert_eq!(sink.frames.len(), 10);
        assert_eq!(last_progress, (10, 10));
    }

    #[test]
    fn silent_audio_leaves_background_untouched() {
        let looper = background(8, 8, 2, 42);
        let merged = audio(vec![0.0; 8000]);
        let renderer = VisualizationRenderer::new(&merged, render_cfg()).unwrap();
        let composer = VideoComposer::new(small_style(), OverlayPlacement::default());

        let mut sink = CollectingSink { frames: Vec::new() };
        composer
            .compose(&looper, &renderer, &mut sink, |_, _| {})
            .unwrap();
        for frame in &sink.frames {
            assert!(frame.iter().all(|&b| b == 42));
        }
    }

    #[test]
    fn loud_audio_marks_the_overlay_region() {
        let samples: Vec<f64> = (0..8000)
            .map(|i| 0.9 * (2.0 * PI * 440.0 * i as f64 / 8000.0).sin())
            .collect();
        let looper = background(8, 8, 2, 0);
        let merged = audio(samples);
        let renderer = VisualizationRenderer::new(&merged, render_cfg()).unwrap();
        let composer = VideoComposer::new(
            small_style(),
            OverlayPlacement {
                x: 0,
                y: 4,
                opacity: 1.0,
            },
        );

        let mut sink = CollectingSink { frames: Vec::new() };
        composer
            .compose(&looper, &renderer, &mut sink, |_, _| {})
            .unwrap();
        let mid = &sink.frames[5];
        assert!(mid.iter().any(|&b| b > 0), "overlay never touched the frame");
    }
}
