//! Overlay rasterization.
//!
//! Turns one visualization frame into an RGBA image: bottom-aligned bars,
//! evenly slotted across the overlay width, transparent background. The
//! composer alpha-blends the result onto the background frame.

use image::{Rgba, RgbaImage};

use crate::viz::renderer::VisualizationFrame;

/// Visual style of the bar overlay.
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    /// Overlay width in pixels.
    pub width: u32,
    /// Overlay height in pixels; a full bar spans it exactly.
    pub height: u32,
    /// Horizontal gap between bars in pixels.
    pub bar_gap: u32,
    /// Bar color (RGBA).
    pub color: [u8; 4],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            width: 960,
            height: 240,
            bar_gap: 4,
            color: [255, 255, 255, 230],
        }
    }
}

/// Rasterize one frame of bars into an RGBA image.
pub fn render_overlay(frame: &VisualizationFrame, style: &OverlayStyle) -> RgbaImage {
    let mut img = RgbaImage::new(style.width, style.height);
    if frame.bars.is_empty() || style.width == 0 || style.height == 0 {
        return img;
    }

    let slot = (style.width / frame.bars.len() as u32).max(1);
    let bar_width = slot.saturating_sub(style.bar_gap).max(1);
    let pixel = Rgba(style.color);

    for (i, &height) in frame.bars.iter().enumerate() {
        let bar_px = (height.clamp(0.0, 1.0) * style.height as f64).round() as u32;
        if bar_px == 0 {
            continue;
        }
        let x0 = i as u32 * slot + (slot - bar_width) / 2;
        let x1 = (x0 + bar_width).min(style.width);
        for y in (style.height - bar_px)..style.height {
            for x in x0..x1 {
                img.put_pixel(x, y, pixel);
            }
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> OverlayStyle {
        OverlayStyle {
            width: 80,
            height: 40,
            bar_gap: 2,
            color: [255, 255, 255, 255],
        }
    }

    fn frame(bars: Vec<f64>) -> VisualizationFrame {
        VisualizationFrame { bars }
    }

    #[test]
    fn zero_bars_render_fully_transparent() {
        let img = render_overlay(&frame(vec![0.0; 8]), &style());
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn full_bar_reaches_the_top() {
        let img = render_overlay(&frame(vec![1.0]), &style());
        // Column through the single bar's center
        let x = 40;
        assert_eq!(img.get_pixel(x, 0).0[3], 255);
        assert_eq!(img.get_pixel(x, 39).0[3], 255);
    }

    #[test]
    fn half_bar_fills_the_lower_half() {
        let img = render_overlay(&frame(vec![0.5]), &style());
        let x = 40;
        assert_eq!(img.get_pixel(x, 39).0[3], 255, "bottom should be filled");
        assert_eq!(img.get_pixel(x, 0).0[3], 0, "top should stay empty");
    }

    #[test]
    fn gaps_between_bars_stay_transparent() {
        let img = render_overlay(&frame(vec![1.0, 1.0]), &style());
        // Slot width 40, bar width 38, so x=0 falls in the leading gap
        assert_eq!(img.get_pixel(0, 39).0[3], 0);
    }
}
