//! Pipeline orchestration.
//!
//! The orchestrator owns the run lifecycle: eager configuration
//! validation, scoped working-directory acquisition, step sequencing with
//! cancellation, and the abort-vs-skip policy for failed tracks. Steps
//! run strictly in order: Acquire, Merge, Tracklist, Compose, Describe.

mod errors;
mod pipeline;
mod step;
pub mod steps;
#[cfg(test)]
pub(crate) mod testutil;
mod types;
mod workdir;

pub use errors::{
    FailureCategory, PipelineError, PipelineResult, StepError, StepResult,
};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use types::{
    Context, MixJob, OutputPaths, ProgressCallback, RunState, StepOutcome, VideoOutput,
};
pub use workdir::WorkDir;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::logging::{LogConfig, RunLogger};
use crate::media::MediaEngine;
use steps::{AcquireStep, ComposeStep, DescribeStep, MergeStep, TracklistStep};

/// Result of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// Run identifier (also the working directory and log file name).
    pub run_name: String,
    /// Final video artifact.
    pub video: Option<VideoOutput>,
    /// Path of the written tracklist.
    pub tracklist: PathBuf,
    /// Path of the written description, if the collaborator succeeded.
    pub description: Option<PathBuf>,
    /// Sources skipped under the skip policy.
    pub skipped_tracks: Vec<String>,
    /// Names of steps that were skipped.
    pub steps_skipped: Vec<String>,
}

/// Run one complete mix job.
///
/// Validates configuration and inputs before anything touches the
/// filesystem, then executes the step pipeline. The working directory is
/// held by an RAII guard, so temporary files are cleaned up on success,
/// failure, and timeout alike (unless `cleanup_on_exit` is off).
pub fn run_mix_job(
    settings: Settings,
    job: MixJob,
    engine: Arc<dyn MediaEngine>,
    progress: Option<ProgressCallback>,
) -> PipelineResult<RunSummary> {
    let run_name = format!(
        "mix_{}_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        std::process::id()
    );

    // Fail fast: no directories, no partial output on bad configuration
    settings
        .validate()
        .map_err(|e| PipelineError::validation_failed(&run_name, e.to_string()))?;
    if job.sources.is_empty() {
        return Err(PipelineError::validation_failed(
            &run_name,
            "track list is empty",
        ));
    }
    if !job.background.is_file() {
        return Err(PipelineError::validation_failed(
            &run_name,
            format!(
                "background video not found: {}",
                job.background.display()
            ),
        ));
    }

    let work = WorkDir::create(
        Path::new(&settings.paths.temp_dir),
        &run_name,
        settings.paths.cleanup_on_exit,
    )
    .map_err(|e| {
        PipelineError::setup_failed(&run_name, format!("creating working directory: {}", e))
    })?;

    let logger = Arc::new(
        RunLogger::new(&run_name, &settings.paths.logs_dir, LogConfig::default()).map_err(
            |e| PipelineError::setup_failed(&run_name, format!("opening run log: {}", e)),
        )?,
    );

    let outputs = OutputPaths::allocate(Path::new(&settings.paths.output_dir)).map_err(|e| {
        PipelineError::setup_failed(&run_name, format!("allocating output paths: {}", e))
    })?;

    logger.info(&format!(
        "Run '{}': {} tracks, background {}",
        run_name,
        job.sources.len(),
        job.background.display()
    ));

    let mut ctx = Context::new(
        job,
        settings,
        &run_name,
        work.path().to_path_buf(),
        outputs,
        engine,
        Arc::clone(&logger),
    );
    if let Some(callback) = progress {
        ctx = ctx.with_progress_callback(callback);
    }

    let pipeline = Pipeline::new()
        .with_step(AcquireStep)
        .with_step(MergeStep)
        .with_step(TracklistStep)
        .with_step(ComposeStep)
        .with_step(DescribeStep);

    let mut state = RunState::default();
    let run_result = pipeline.run(&ctx, &mut state)?;
    // `work` drops here and removes the temp directory on every exit path

    Ok(RunSummary {
        run_name,
        video: state.video,
        tracklist: ctx.outputs.tracklist.clone(),
        description: state.description,
        skipped_tracks: state.skipped,
        steps_skipped: run_result.steps_skipped,
    })
}
