//! Settings struct with TOML-based sections.
//!
//! Settings map to TOML tables, one per pipeline concern. Every recognized
//! option has an explicit default; the whole structure is validated
//! eagerly at pipeline start so a bad value fails before any track is
//! fetched or decoded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acquire::TrackErrorPolicy;
use crate::describe::DescribeConfig;
use crate::video::OverlayPlacement;
use crate::viz::{NormalizationPolicy, OverlayStyle, RenderConfig};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Output, temp, and log locations.
    #[serde(default)]
    pub paths: PathSettings,

    /// Crossfade and sample format.
    #[serde(default)]
    pub audio: AudioSettings,

    /// Bar overlay analysis and appearance.
    #[serde(default)]
    pub visualization: VizSettings,

    /// Output video geometry, codecs, and overlay placement.
    #[serde(default)]
    pub video: VideoSettings,

    /// Track acquisition behavior.
    #[serde(default)]
    pub acquisition: AcquisitionSettings,

    /// External tool locations and deadline.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Description collaborator.
    #[serde(default)]
    pub description: DescribeConfig,
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder for the final video, tracklist, and description.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Root folder for per-run working directories.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,

    /// Folder for log files.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    /// Remove the working directory when the run ends (any exit path).
    #[serde(default = "default_true")]
    pub cleanup_on_exit: bool,
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_temp_dir() -> String {
    ".temp".to_string()
}

fn default_logs_dir() -> String {
    ".logs".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
            logs_dir: default_logs_dir(),
            cleanup_on_exit: true,
        }
    }
}

/// Audio merge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Crossfade overlap between adjacent tracks in seconds.
    #[serde(default = "default_crossfade_secs")]
    pub crossfade_secs: f64,

    /// Uniform sample rate every track is decoded to.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Uniform channel count every track is decoded to.
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_crossfade_secs() -> f64 {
    5.0
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u16 {
    2
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            crossfade_secs: default_crossfade_secs(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

/// Visualization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizSettings {
    /// Number of bars.
    #[serde(default = "default_bar_count")]
    pub bar_count: usize,

    /// Analysis window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Bar rise time constant in seconds.
    #[serde(default = "default_attack_secs")]
    pub attack_secs: f64,

    /// Bar fall time constant in seconds.
    #[serde(default = "default_decay_secs")]
    pub decay_secs: f64,

    /// Bar height normalization policy.
    #[serde(default)]
    pub normalization: NormalizationPolicy,

    /// Reference level in dB for fixed-reference normalization.
    #[serde(default)]
    pub reference_db: f64,

    /// Floor level in dB mapping to zero-height bars.
    #[serde(default = "default_floor_db")]
    pub floor_db: f64,

    /// Lower edge of the first band in Hz.
    #[serde(default = "default_min_band_hz")]
    pub min_band_hz: f64,

    /// High-pass cutoff in Hz before analysis; 0 disables.
    #[serde(default = "default_highpass_hz")]
    pub highpass_hz: f64,
}

fn default_bar_count() -> usize {
    32
}

fn default_window_secs() -> f64 {
    0.05
}

fn default_attack_secs() -> f64 {
    0.03
}

fn default_decay_secs() -> f64 {
    0.35
}

fn default_floor_db() -> f64 {
    -60.0
}

fn default_min_band_hz() -> f64 {
    40.0
}

fn default_highpass_hz() -> f64 {
    40.0
}

impl Default for VizSettings {
    fn default() -> Self {
        Self {
            bar_count: default_bar_count(),
            window_secs: default_window_secs(),
            attack_secs: default_attack_secs(),
            decay_secs: default_decay_secs(),
            normalization: NormalizationPolicy::default(),
            reference_db: 0.0,
            floor_db: default_floor_db(),
            min_band_hz: default_min_band_hz(),
            highpass_hz: default_highpass_hz(),
        }
    }
}

/// Video output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Output width in pixels (must be even for yuv420p).
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels (must be even for yuv420p).
    #[serde(default = "default_height")]
    pub height: u32,

    /// Output frame rate.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,

    /// Video codec handed to the encoder.
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Video bitrate string.
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Audio codec handed to the encoder.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate string.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Overlay opacity in [0, 1].
    #[serde(default = "default_overlay_opacity")]
    pub overlay_opacity: f64,

    /// Overlay left edge in pixels.
    #[serde(default = "default_overlay_x")]
    pub overlay_x: u32,

    /// Overlay top edge in pixels.
    #[serde(default = "default_overlay_y")]
    pub overlay_y: u32,

    /// Overlay width in pixels.
    #[serde(default = "default_overlay_width")]
    pub overlay_width: u32,

    /// Overlay height in pixels.
    #[serde(default = "default_overlay_height")]
    pub overlay_height: u32,

    /// Gap between bars in pixels.
    #[serde(default = "default_bar_gap")]
    pub bar_gap: u32,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_frame_rate() -> f64 {
    30.0
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_video_bitrate() -> String {
    "4M".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_overlay_opacity() -> f64 {
    0.85
}

fn default_overlay_x() -> u32 {
    160
}

fn default_overlay_y() -> u32 {
    420
}

fn default_overlay_width() -> u32 {
    960
}

fn default_overlay_height() -> u32 {
    240
}

fn default_bar_gap() -> u32 {
    4
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            video_codec: default_video_codec(),
            video_bitrate: default_video_bitrate(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            overlay_opacity: default_overlay_opacity(),
            overlay_x: default_overlay_x(),
            overlay_y: default_overlay_y(),
            overlay_width: default_overlay_width(),
            overlay_height: default_overlay_height(),
            bar_gap: default_bar_gap(),
        }
    }
}

/// Acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Abort the mix or skip the track when acquisition fails.
    #[serde(default)]
    pub on_track_error: TrackErrorPolicy,

    /// Downloader executable for remote sources.
    #[serde(default = "default_ytdlp_program")]
    pub ytdlp_program: String,

    /// Per-download deadline in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_ytdlp_program() -> String {
    "yt-dlp".to_string()
}

fn default_download_timeout_secs() -> u64 {
    600
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            on_track_error: TrackErrorPolicy::default(),
            ytdlp_program: default_ytdlp_program(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

/// External tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// ffmpeg executable (name in PATH or absolute path).
    #[serde(default = "default_ffmpeg_program")]
    pub ffmpeg_program: String,

    /// ffprobe executable.
    #[serde(default = "default_ffprobe_program")]
    pub ffprobe_program: String,

    /// Deadline for any single encode/decode call in seconds.
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ffmpeg_program() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_program() -> String {
    "ffprobe".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    1800
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg_program: default_ffmpeg_program(),
            ffprobe_program: default_ffprobe_program(),
            timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// A configuration value failed validation.
#[derive(Error, Debug)]
#[error("invalid setting '{field}': {message}")]
pub struct SettingsError {
    pub field: String,
    pub message: String,
}

impl SettingsError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl Settings {
    /// Validate every recognized option against its allowed range.
    ///
    /// Called once at pipeline start; any violation is a configuration
    /// error and nothing is processed.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.audio.crossfade_secs < 0.0 {
            return Err(SettingsError::new(
                "audio.crossfade_secs",
                "must not be negative",
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err(SettingsError::new("audio.sample_rate", "must be positive"));
        }
        if self.audio.channels == 0 {
            return Err(SettingsError::new("audio.channels", "must be at least 1"));
        }

        if self.visualization.bar_count == 0 {
            return Err(SettingsError::new(
                "visualization.bar_count",
                "must be at least 1",
            ));
        }
        if !(self.visualization.window_secs > 0.0) {
            return Err(SettingsError::new(
                "visualization.window_secs",
                "must be positive",
            ));
        }
        if self.visualization.attack_secs < 0.0 || self.visualization.decay_secs < 0.0 {
            return Err(SettingsError::new(
                "visualization.attack_secs/decay_secs",
                "must not be negative",
            ));
        }
        if self.visualization.reference_db <= self.visualization.floor_db {
            return Err(SettingsError::new(
                "visualization.reference_db",
                "must be above floor_db",
            ));
        }

        if !(self.video.frame_rate > 0.0) {
            return Err(SettingsError::new("video.frame_rate", "must be positive"));
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(SettingsError::new(
                "video.width/height",
                "must be positive",
            ));
        }
        if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
            return Err(SettingsError::new(
                "video.width/height",
                "must be even for yuv420p output",
            ));
        }
        if !(0.0..=1.0).contains(&self.video.overlay_opacity) {
            return Err(SettingsError::new(
                "video.overlay_opacity",
                "must be within [0, 1]",
            ));
        }
        if self.video.overlay_x.saturating_add(self.video.overlay_width) > self.video.width
            || self.video.overlay_y.saturating_add(self.video.overlay_height) > self.video.height
        {
            return Err(SettingsError::new(
                "video.overlay_*",
                "overlay must fit inside the video frame",
            ));
        }

        if self.tools.timeout_secs == 0 {
            return Err(SettingsError::new("tools.timeout_secs", "must be positive"));
        }

        Ok(())
    }

    /// Renderer configuration derived from the visualization/video sections.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            bar_count: self.visualization.bar_count,
            frame_rate: self.video.frame_rate,
            window_secs: self.visualization.window_secs,
            attack_secs: self.visualization.attack_secs,
            decay_secs: self.visualization.decay_secs,
            normalization: self.visualization.normalization,
            reference_db: self.visualization.reference_db,
            floor_db: self.visualization.floor_db,
            min_band_hz: self.visualization.min_band_hz,
            highpass_hz: (self.visualization.highpass_hz > 0.0)
                .then_some(self.visualization.highpass_hz),
        }
    }

    /// Overlay geometry for the rasterizer.
    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            width: self.video.overlay_width,
            height: self.video.overlay_height,
            bar_gap: self.video.bar_gap,
            ..OverlayStyle::default()
        }
    }

    /// Overlay placement for the composer.
    pub fn overlay_placement(&self) -> OverlayPlacement {
        OverlayPlacement {
            x: self.video.overlay_x,
            y: self.video.overlay_y,
            opacity: self.video.overlay_opacity,
        }
    }
}
