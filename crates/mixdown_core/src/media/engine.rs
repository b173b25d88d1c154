//! The encode/decode subsystem boundary.
//!
//! All interaction with external media tooling goes through the
//! [`MediaEngine`] trait so pipeline steps can be exercised in tests with a
//! fake engine instead of a real FFmpeg install.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from the media subsystem boundary.
#[derive(Error, Debug)]
pub enum MediaError {
    /// Input file does not exist.
    #[error("source not found: {0}")]
    SourceNotFound(PathBuf),

    /// The external tool could not be started.
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The external tool exited with a non-zero status.
    #[error("{tool} failed with exit code {exit_code}: {detail}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        detail: String,
    },

    /// The external tool stalled past the configured deadline.
    #[error("{tool} did not finish within {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// The external tool succeeded but produced nothing usable.
    #[error("{tool} produced no {what}")]
    EmptyOutput { tool: String, what: String },

    /// Tool output could not be parsed.
    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    /// A frame handed to the encoder had the wrong size.
    #[error("raw frame is {actual} bytes, expected {expected}")]
    InvalidFrame { expected: usize, actual: usize },

    /// File I/O error with operation context.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl MediaError {
    /// Create a command failed error.
    pub fn command_failed(
        tool: impl Into<String>,
        exit_code: i32,
        detail: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            detail: detail.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Decoded background-clip frames held as contiguous RGB24 bytes.
#[derive(Debug, Clone)]
pub struct ClipFrames {
    data: Vec<u8>,
    width: u32,
    height: u32,
    count: usize,
}

impl ClipFrames {
    /// Wrap raw RGB24 bytes; a trailing partial frame is discarded.
    pub fn from_raw(mut data: Vec<u8>, width: u32, height: u32) -> Self {
        let frame_len = (width * height * 3) as usize;
        let count = if frame_len == 0 { 0 } else { data.len() / frame_len };
        data.truncate(count * frame_len);
        Self {
            data,
            width,
            height,
            count,
        }
    }

    /// Bytes per frame (RGB24).
    pub fn frame_len(&self) -> usize {
        (self.width * self.height * 3) as usize
    }

    /// Number of complete frames.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Check if the clip decoded to no complete frames.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Frame geometry.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Borrow one frame's bytes.
    ///
    /// # Panics
    /// Panics if `idx >= count()`.
    pub fn frame(&self, idx: usize) -> &[u8] {
        let len = self.frame_len();
        &self.data[idx * len..(idx + 1) * len]
    }
}

/// Parameters for the final encode/mux.
#[derive(Debug, Clone)]
pub struct EncodeSpec {
    /// Output frame width in pixels.
    pub width: u32,
    /// Output frame height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub frame_rate: f64,
    /// Video codec name passed to the encoder.
    pub video_codec: String,
    /// Video bitrate string (e.g. "4M").
    pub video_bitrate: String,
    /// Audio codec name.
    pub audio_codec: String,
    /// Audio bitrate string (e.g. "192k").
    pub audio_bitrate: String,
    /// Path of the merged audio stream to mux in.
    pub audio_path: PathBuf,
    /// Final container path.
    pub output_path: PathBuf,
}

/// Streaming sink for composited RGB24 frames.
///
/// Frames must be written in increasing time order; `finish` closes the
/// stream and surfaces any encoder failure.
pub trait FrameSink: Send {
    /// Write one RGB24 frame.
    fn write_frame(&mut self, rgb: &[u8]) -> MediaResult<()>;

    /// Close the stream and wait for the encoder to finish.
    fn finish(self: Box<Self>) -> MediaResult<()>;
}

/// External media subsystem: probing, decoding, and encoding.
///
/// Every call is blocking and bounded by the implementation's subprocess
/// timeout. Failures surface as typed [`MediaError`]s, never as silently
/// truncated output.
pub trait MediaEngine: Send + Sync {
    /// Duration of a media file in seconds.
    fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Decode a file's audio to interleaved f64 at the given rate/layout.
    fn decode_audio(&self, path: &Path, sample_rate: u32, channels: u16) -> MediaResult<Vec<f64>>;

    /// Decode a video clip to RGB24 frames at the output rate and geometry.
    fn decode_clip_frames(
        &self,
        path: &Path,
        frame_rate: f64,
        width: u32,
        height: u32,
    ) -> MediaResult<ClipFrames>;

    /// Encode interleaved f64 samples to an audio file.
    fn write_audio(
        &self,
        samples: &[f64],
        sample_rate: u32,
        channels: u16,
        out: &Path,
    ) -> MediaResult<()>;

    /// Start the final video encode; frames stream through the returned sink.
    fn start_video_encode(&self, spec: &EncodeSpec) -> MediaResult<Box<dyn FrameSink>>;
}
