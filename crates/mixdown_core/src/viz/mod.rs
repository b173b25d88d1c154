//! Audio visualization: band analysis, frame rendering, and overlay
//! rasterization.
//!
//! The renderer turns the merged stream into a lazy sequence of bar-height
//! frames, one per output video tick; the overlay module rasterizes each
//! frame for compositing.

mod bands;
mod overlay;
mod renderer;

pub use bands::{BandAnalyzer, BandConfig};
pub use overlay::{render_overlay, OverlayStyle};
pub use renderer::{
    FrameIter, NormalizationPolicy, RenderConfig, VisualizationFrame, VisualizationRenderer,
    VizError, VizResult,
};
