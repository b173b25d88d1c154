//! Core types for the orchestrator pipeline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::acquire::TrackSource;
use crate::audio::{MergedAudio, TrackBuffer};
use crate::config::Settings;
use crate::logging::RunLogger;
use crate::media::MediaEngine;

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// One requested mix: ordered sources plus the background clip.
#[derive(Debug, Clone)]
pub struct MixJob {
    /// Track sources in play order.
    pub sources: Vec<TrackSource>,
    /// Background video clip to loop behind the visualization.
    pub background: PathBuf,
}

/// Final artifact paths for one run.
///
/// Numbered so reruns never clobber earlier results; the video, tracklist,
/// and description of one run share a counter.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub video: PathBuf,
    pub tracklist: PathBuf,
    pub description: PathBuf,
}

impl OutputPaths {
    /// Allocate the first unused numbered slot in `output_dir`.
    pub fn allocate(output_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(output_dir)?;
        for counter in 1..10_000u32 {
            let video = output_dir.join(format!("mix_{:03}.mp4", counter));
            if !video.exists() {
                return Ok(Self {
                    video,
                    tracklist: output_dir.join(format!("tracklist_{:03}.txt", counter)),
                    description: output_dir.join(format!("description_{:03}.txt", counter)),
                });
            }
        }
        Err(io::Error::other("no free output slot"))
    }
}

/// Read-only context passed to pipeline steps.
///
/// Contains the job, configuration, and shared resources that steps can
/// read but not modify. Mutable state goes in [`RunState`].
pub struct Context {
    /// The requested mix.
    pub job: MixJob,
    /// Application settings.
    pub settings: Settings,
    /// Run name/identifier.
    pub run_name: String,
    /// Run-specific working directory (under temp_dir).
    pub work_dir: PathBuf,
    /// Final artifact paths.
    pub outputs: OutputPaths,
    /// Media subsystem boundary.
    pub engine: Arc<dyn MediaEngine>,
    /// Per-run logger.
    pub logger: Arc<RunLogger>,
    /// Optional progress callback.
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    /// Create a new context for a run.
    pub fn new(
        job: MixJob,
        settings: Settings,
        run_name: impl Into<String>,
        work_dir: PathBuf,
        outputs: OutputPaths,
        engine: Arc<dyn MediaEngine>,
        logger: Arc<RunLogger>,
    ) -> Self {
        Self {
            job,
            settings,
            run_name: run_name.into(),
            work_dir,
            outputs,
            engine,
            logger,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Report progress to the callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }
}

/// Mutable run state that accumulates results from pipeline steps.
///
/// Steps add their outputs here; later steps read what earlier steps
/// produced.
#[derive(Default)]
pub struct RunState {
    /// Acquired tracks awaiting the merge (drained by the merge step).
    pub tracks: Vec<TrackBuffer>,
    /// Sources that were skipped under the skip policy.
    pub skipped: Vec<String>,
    /// The merged stream with its timestamps.
    pub merged: Option<MergedAudio>,
    /// Whether the tracklist side file has been written.
    pub tracklist_written: bool,
    /// Compose step results.
    pub video: Option<VideoOutput>,
    /// Path of the written description, if any.
    pub description: Option<PathBuf>,
}

impl RunState {
    /// Check if the merge has completed.
    pub fn has_merged(&self) -> bool {
        self.merged.is_some()
    }
}

/// Output from the compose step.
#[derive(Debug, Clone)]
pub struct VideoOutput {
    /// Path to the final muxed video.
    pub path: PathBuf,
    /// Frames streamed into the encoder.
    pub frames_written: u64,
    /// Video duration implied by the frame count.
    pub duration_secs: f64,
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (preconditions not met, but not an error).
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_use_first_free_slot() {
        let dir = tempfile::tempdir().unwrap();
        let first = OutputPaths::allocate(dir.path()).unwrap();
        assert!(first.video.ends_with("mix_001.mp4"));
        assert!(first.tracklist.ends_with("tracklist_001.txt"));

        // Occupy slot 1; the next allocation moves on
        fs::write(&first.video, b"").unwrap();
        let second = OutputPaths::allocate(dir.path()).unwrap();
        assert!(second.video.ends_with("mix_002.mp4"));
        assert!(second.description.ends_with("description_002.txt"));
    }

    #[test]
    fn run_state_tracks_completion() {
        let mut state = RunState::default();
        assert!(!state.has_merged());
        state.merged = Some(MergedAudio {
            samples: vec![0.0],
            sample_rate: 44100,
            channels: 1,
            timestamps: Vec::new(),
        });
        assert!(state.has_merged());
    }
}
