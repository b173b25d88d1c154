//! FFmpeg-backed media engine.
//!
//! Decoding pipes raw samples/frames over stdout, encoding pipes raw frames
//! into stdin; ffprobe answers duration queries. Every subprocess call is
//! bounded by the engine's timeout.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::media::engine::{
    ClipFrames, EncodeSpec, FrameSink, MediaEngine, MediaError, MediaResult,
};
use crate::media::runner::{drain_pipe, run_with_timeout, stderr_tail, wait_with_timeout};

/// Default subprocess deadline (30 minutes covers long encodes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;

const ERROR_TAIL_LINES: usize = 20;

/// Media engine backed by the `ffmpeg` and `ffprobe` executables.
pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
    timeout: Duration,
}

impl FfmpegEngine {
    /// Create an engine that finds ffmpeg/ffprobe in PATH.
    pub fn new() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Use explicit executable paths.
    pub fn with_programs(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    /// Override the subprocess deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if ffmpeg is runnable.
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn require_file(path: &Path) -> MediaResult<()> {
        if !path.exists() {
            return Err(MediaError::SourceNotFound(path.to_path_buf()));
        }
        Ok(())
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEngine for FfmpegEngine {
    fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        Self::require_file(path)?;

        let mut cmd = Command::new(&self.ffprobe);
        cmd.arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path);

        let output = run_with_timeout(&mut cmd, "ffprobe", self.timeout)?;
        if !output.success() {
            return Err(MediaError::command_failed(
                "ffprobe",
                output.exit_code,
                stderr_tail(&output.stderr, ERROR_TAIL_LINES),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .parse::<f64>()
            .map_err(|e| MediaError::parse("duration", e.to_string()))
    }

    fn decode_audio(&self, path: &Path, sample_rate: u32, channels: u16) -> MediaResult<Vec<f64>> {
        Self::require_file(path)?;

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-i")
            .arg(path)
            .arg("-vn")
            .arg("-ac")
            .arg(channels.to_string())
            .arg("-ar")
            .arg(sample_rate.to_string())
            .arg("-f")
            .arg("f64le")
            .arg("-acodec")
            .arg("pcm_f64le")
            .arg("pipe:1");

        let output = run_with_timeout(&mut cmd, "ffmpeg", self.timeout)?;
        if !output.success() {
            return Err(MediaError::command_failed(
                "ffmpeg",
                output.exit_code,
                stderr_tail(&output.stderr, ERROR_TAIL_LINES),
            ));
        }

        let samples = bytes_to_f64_samples(&output.stdout);
        if samples.is_empty() {
            return Err(MediaError::EmptyOutput {
                tool: "ffmpeg".to_string(),
                what: "audio samples".to_string(),
            });
        }

        tracing::debug!(
            "Decoded {} samples ({:.2}s) from {}",
            samples.len(),
            samples.len() as f64 / (sample_rate as f64 * channels as f64),
            path.display()
        );

        Ok(samples)
    }

    fn decode_clip_frames(
        &self,
        path: &Path,
        frame_rate: f64,
        width: u32,
        height: u32,
    ) -> MediaResult<ClipFrames> {
        Self::require_file(path)?;

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-i")
            .arg(path)
            .arg("-an")
            .arg("-vf")
            .arg(format!("fps={},scale={}:{}", frame_rate, width, height))
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("pipe:1");

        let output = run_with_timeout(&mut cmd, "ffmpeg", self.timeout)?;
        if !output.success() {
            return Err(MediaError::command_failed(
                "ffmpeg",
                output.exit_code,
                stderr_tail(&output.stderr, ERROR_TAIL_LINES),
            ));
        }

        let clip = ClipFrames::from_raw(output.stdout, width, height);
        if clip.is_empty() {
            return Err(MediaError::EmptyOutput {
                tool: "ffmpeg".to_string(),
                what: "video frames".to_string(),
            });
        }

        tracing::debug!(
            "Decoded {} background frames ({}x{}) from {}",
            clip.count(),
            width,
            height,
            path.display()
        );

        Ok(clip)
    }

    fn write_audio(
        &self,
        samples: &[f64],
        sample_rate: u32,
        channels: u16,
        out: &Path,
    ) -> MediaResult<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-f")
            .arg("f64le")
            .arg("-ar")
            .arg(sample_rate.to_string())
            .arg("-ac")
            .arg(channels.to_string())
            .arg("-i")
            .arg("pipe:0")
            .arg(out)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| MediaError::Spawn {
            tool: "ffmpeg".to_string(),
            source: e,
        })?;

        let bytes = f64_samples_to_bytes(samples);
        let mut stdin = child.stdin.take().ok_or_else(|| {
            MediaError::io(
                "opening ffmpeg stdin",
                std::io::Error::other("stdin not captured"),
            )
        })?;
        // Feed on a thread; ffmpeg may emit stderr while we still write
        let writer = std::thread::spawn(move || {
            let result = stdin.write_all(&bytes);
            drop(stdin);
            result
        });
        let stderr_handle = drain_pipe(child.stderr.take());

        let status = wait_with_timeout(&mut child, "ffmpeg", self.timeout)?;
        let _ = writer.join();
        let stderr = stderr_handle.join().unwrap_or_default();

        if !status.success() {
            return Err(MediaError::command_failed(
                "ffmpeg",
                status.code().unwrap_or(-1),
                stderr_tail(&stderr, ERROR_TAIL_LINES),
            ));
        }
        Ok(())
    }

    fn start_video_encode(&self, spec: &EncodeSpec) -> MediaResult<Box<dyn FrameSink>> {
        Self::require_file(&spec.audio_path)?;

        if let Some(parent) = spec.output_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MediaError::io("creating output directory", e))?;
        }

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", spec.width, spec.height))
            .arg("-r")
            .arg(spec.frame_rate.to_string())
            .arg("-i")
            .arg("pipe:0")
            .arg("-i")
            .arg(&spec.audio_path)
            .arg("-map")
            .arg("0:v")
            .arg("-map")
            .arg("1:a")
            .arg("-c:v")
            .arg(&spec.video_codec)
            .arg("-b:v")
            .arg(&spec.video_bitrate)
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-c:a")
            .arg(&spec.audio_codec)
            .arg("-b:a")
            .arg(&spec.audio_bitrate)
            .arg("-shortest")
            .arg(&spec.output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::debug!("Starting encoder: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| MediaError::Spawn {
            tool: "ffmpeg".to_string(),
            source: e,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            MediaError::io(
                "opening ffmpeg stdin",
                std::io::Error::other("stdin not captured"),
            )
        })?;
        let stderr_handle = drain_pipe(child.stderr.take());

        Ok(Box::new(FfmpegFrameSink {
            child,
            stdin: Some(stdin),
            stderr_handle: Some(stderr_handle),
            frame_len: (spec.width * spec.height * 3) as usize,
            output_path: spec.output_path.clone(),
            timeout: self.timeout,
        }))
    }
}

/// Streaming sink feeding raw frames into a running ffmpeg encode.
struct FfmpegFrameSink {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_handle: Option<JoinHandle<Vec<u8>>>,
    frame_len: usize,
    output_path: PathBuf,
    timeout: Duration,
}

impl FrameSink for FfmpegFrameSink {
    fn write_frame(&mut self, rgb: &[u8]) -> MediaResult<()> {
        if rgb.len() != self.frame_len {
            return Err(MediaError::InvalidFrame {
                expected: self.frame_len,
                actual: rgb.len(),
            });
        }
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            MediaError::io(
                "writing frame",
                std::io::Error::other("encoder already finished"),
            )
        })?;
        stdin
            .write_all(rgb)
            .map_err(|e| MediaError::io("writing frame to encoder", e))
    }

    fn finish(mut self: Box<Self>) -> MediaResult<()> {
        // Closing stdin signals end of stream
        drop(self.stdin.take());

        let status = wait_with_timeout(&mut self.child, "ffmpeg", self.timeout)?;
        let stderr = self
            .stderr_handle
            .take()
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();

        if !status.success() {
            return Err(MediaError::command_failed(
                "ffmpeg",
                status.code().unwrap_or(-1),
                stderr_tail(&stderr, ERROR_TAIL_LINES),
            ));
        }
        if !self.output_path.exists() {
            return Err(MediaError::EmptyOutput {
                tool: "ffmpeg".to_string(),
                what: "output container".to_string(),
            });
        }
        Ok(())
    }
}

/// Convert raw little-endian bytes to f64 samples.
fn bytes_to_f64_samples(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let arr: [u8; 8] = chunk.try_into().unwrap();
            f64::from_le_bytes(arr)
        })
        .collect()
}

/// Convert f64 samples to raw little-endian bytes.
fn f64_samples_to_bytes(samples: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 8);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_bytes_round_trip() {
        let samples = vec![0.5, -0.25, 1.0];
        let bytes = f64_samples_to_bytes(&samples);
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes_to_f64_samples(&bytes), samples);
    }

    #[test]
    fn bytes_to_samples_ignores_remainder() {
        let samples = bytes_to_f64_samples(&[0u8; 10]);
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn decode_audio_rejects_missing_file() {
        let engine = FfmpegEngine::new();
        let result = engine.decode_audio(Path::new("/nonexistent/track.mp3"), 44100, 2);
        assert!(matches!(result, Err(MediaError::SourceNotFound(_))));
    }

    #[test]
    fn probe_rejects_missing_file() {
        let engine = FfmpegEngine::new();
        let result = engine.probe_duration(Path::new("/nonexistent/bg.mp4"));
        assert!(matches!(result, Err(MediaError::SourceNotFound(_))));
    }
}
