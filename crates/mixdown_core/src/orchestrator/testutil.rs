//! Shared fixtures for orchestrator tests: a stub media engine and
//! context builders that avoid any external tooling.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::acquire::TrackSource;
use crate::config::Settings;
use crate::logging::RunLogger;
use crate::media::{ClipFrames, EncodeSpec, FrameSink, MediaEngine, MediaError, MediaResult};
use crate::orchestrator::types::{Context, MixJob, OutputPaths};

/// Stub engine producing deterministic audio and frames in memory.
pub struct StubEngine {
    /// Duration every decoded track reports.
    pub track_secs: f64,
    /// Frames the background clip decodes to.
    pub clip_frames: usize,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self {
            track_secs: 4.0,
            clip_frames: 4,
        }
    }
}

impl MediaEngine for StubEngine {
    fn probe_duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(self.track_secs)
    }

    fn decode_audio(&self, _path: &Path, sample_rate: u32, channels: u16) -> MediaResult<Vec<f64>> {
        let frames = (self.track_secs * sample_rate as f64) as usize;
        Ok(vec![0.05; frames * channels as usize])
    }

    fn decode_clip_frames(
        &self,
        _path: &Path,
        _frame_rate: f64,
        width: u32,
        height: u32,
    ) -> MediaResult<ClipFrames> {
        let data = vec![40u8; (width * height * 3) as usize * self.clip_frames];
        Ok(ClipFrames::from_raw(data, width, height))
    }

    fn write_audio(
        &self,
        _samples: &[f64],
        _sample_rate: u32,
        _channels: u16,
        out: &Path,
    ) -> MediaResult<()> {
        std::fs::write(out, b"stub audio").map_err(|e| MediaError::io("writing stub audio", e))
    }

    fn start_video_encode(&self, spec: &EncodeSpec) -> MediaResult<Box<dyn FrameSink>> {
        Ok(Box::new(StubSink {
            output_path: spec.output_path.clone(),
            frames: 0,
        }))
    }
}

/// Sink that counts frames and records the count in the output file.
struct StubSink {
    output_path: PathBuf,
    frames: u64,
}

impl FrameSink for StubSink {
    fn write_frame(&mut self, _rgb: &[u8]) -> MediaResult<()> {
        self.frames += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> MediaResult<()> {
        std::fs::write(&self.output_path, self.frames.to_string())
            .map_err(|e| MediaError::io("writing stub video", e))
    }
}

/// Create an empty file and return it as a local track source.
pub fn touch(dir: &Path, name: &str) -> TrackSource {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    TrackSource::Local(path)
}

/// Small, fast settings rooted under `dir`.
pub fn test_settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.output_dir = dir.join("output").display().to_string();
    settings.paths.temp_dir = dir.join("temp").display().to_string();
    settings.paths.logs_dir = dir.join("logs").display().to_string();
    settings.audio.crossfade_secs = 1.0;
    settings.audio.sample_rate = 8000;
    settings.audio.channels = 1;
    settings.video.width = 64;
    settings.video.height = 32;
    settings.video.frame_rate = 10.0;
    settings.video.overlay_x = 0;
    settings.video.overlay_y = 0;
    settings.video.overlay_width = 32;
    settings.video.overlay_height = 16;
    settings.video.bar_gap = 1;
    settings.visualization.bar_count = 4;
    settings.description.api_key_env = "MIXDOWN_TEST_KEY_UNSET".to_string();
    settings
}

/// Context with a stub engine, discard logger, and a background file.
pub fn test_context(dir: &Path, sources: Vec<TrackSource>) -> Context {
    test_context_with(dir, sources, test_settings(dir), StubEngine::default())
}

/// Context with custom settings and engine.
pub fn test_context_with(
    dir: &Path,
    sources: Vec<TrackSource>,
    settings: Settings,
    engine: StubEngine,
) -> Context {
    let background = dir.join("bg.mp4");
    std::fs::write(&background, b"clip").unwrap();

    let work_dir = dir.join("work");
    std::fs::create_dir_all(&work_dir).unwrap();
    let outputs = OutputPaths::allocate(Path::new(&settings.paths.output_dir)).unwrap();

    Context::new(
        MixJob {
            sources,
            background,
        },
        settings,
        "test_run",
        work_dir,
        outputs,
        Arc::new(engine),
        Arc::new(RunLogger::discard("test_run")),
    )
}
