//! Acquire step - fetches and decodes every requested track.

use std::time::Duration;

use crate::acquire::{SourceAcquirer, TrackErrorPolicy, YtDlpProvider};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};

/// Acquire step: local files are decoded in place, remote URLs are
/// downloaded first. Failed tracks abort the run or are skipped according
/// to the configured policy; skipping is always logged, never silent.
pub struct AcquireStep;

impl PipelineStep for AcquireStep {
    fn name(&self) -> &str {
        "Acquire"
    }

    fn description(&self) -> &str {
        "Fetch and decode source tracks"
    }

    fn validate_input(&self, ctx: &Context, _state: &RunState) -> StepResult<()> {
        if ctx.job.sources.is_empty() {
            return Err(StepError::invalid_input("track list is empty"));
        }
        if !ctx.job.background.is_file() {
            return Err(StepError::invalid_input(format!(
                "background video not found: {}",
                ctx.job.background.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let settings = &ctx.settings;
        let acquirer = SourceAcquirer::new(
            ctx.engine.clone(),
            YtDlpProvider::new(
                &settings.acquisition.ytdlp_program,
                Duration::from_secs(settings.acquisition.download_timeout_secs),
            ),
            settings.audio.sample_rate,
            settings.audio.channels,
        );

        let total = ctx.job.sources.len();
        for (i, source) in ctx.job.sources.iter().enumerate() {
            ctx.logger
                .info(&format!("Acquiring track {}/{}: {}", i + 1, total, source.describe()));
            ctx.report_progress(
                self.name(),
                ((i as f64 / total as f64) * 100.0) as u32,
                &source.describe(),
            );

            match acquirer.acquire(source, &ctx.work_dir) {
                Ok(track) => {
                    ctx.logger.info(&format!(
                        "Acquired '{}' ({:.1}s)",
                        track.title,
                        track.duration_secs()
                    ));
                    state.tracks.push(track);
                }
                Err(e) => match settings.acquisition.on_track_error {
                    TrackErrorPolicy::Abort => {
                        return Err(StepError::acquire(source.describe(), e));
                    }
                    TrackErrorPolicy::Skip => {
                        ctx.logger
                            .warn(&format!("Skipping '{}': {}", source.describe(), e));
                        state.skipped.push(source.describe());
                    }
                },
            }
        }

        if state.tracks.is_empty() {
            return Err(StepError::invalid_output(
                "no track could be acquired; nothing to mix",
            ));
        }
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, state: &RunState) -> StepResult<()> {
        if state.tracks.is_empty() {
            return Err(StepError::invalid_output("no tracks recorded"));
        }
        let expected_rate = ctx.settings.audio.sample_rate;
        let expected_channels = ctx.settings.audio.channels;
        for track in &state.tracks {
            if track.sample_rate != expected_rate || track.channels != expected_channels {
                return Err(StepError::invalid_output(format!(
                    "track '{}' decoded to {} Hz / {} ch, expected {} Hz / {} ch",
                    track.title,
                    track.sample_rate,
                    track.channels,
                    expected_rate,
                    expected_channels
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testutil;

    #[test]
    fn acquire_step_has_correct_name() {
        assert_eq!(AcquireStep.name(), "Acquire");
    }

    #[test]
    fn empty_track_list_fails_input_validation() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testutil::test_context(dir.path(), Vec::new());
        let err = AcquireStep
            .validate_input(&ctx, &RunState::default())
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidInput(_)));
    }

    #[test]
    fn missing_background_fails_input_validation() {
        let dir = tempfile::tempdir().unwrap();
        let track = testutil::touch(dir.path(), "a.wav");
        let mut ctx = testutil::test_context(dir.path(), vec![track]);
        ctx.job.background = dir.path().join("no_such_bg.mp4");

        let err = AcquireStep
            .validate_input(&ctx, &RunState::default())
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidInput(_)));
    }
}
