//! Merge step - crossfades the acquired tracks into one stream.

use crate::audio::CrossfadeMerger;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};

/// Merge step: validates the mix against the configured crossfade and
/// produces the merged stream plus its timestamp entries.
pub struct MergeStep;

impl PipelineStep for MergeStep {
    fn name(&self) -> &str {
        "Merge"
    }

    fn description(&self) -> &str {
        "Crossfade tracks into one continuous stream"
    }

    fn validate_input(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        if state.tracks.is_empty() {
            return Err(StepError::invalid_input("no acquired tracks to merge"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let crossfade = ctx.settings.audio.crossfade_secs;
        let tracks = std::mem::take(&mut state.tracks);

        ctx.logger.info(&format!(
            "Merging {} tracks with {:.1}s crossfade",
            tracks.len(),
            crossfade
        ));
        for track in &tracks {
            ctx.logger
                .debug(&format!("  '{}': {:.2}s", track.title, track.duration_secs()));
        }

        let merged = CrossfadeMerger::new(crossfade).merge(tracks)?;
        ctx.logger.info(&format!(
            "Merged stream: {:.2}s, {} Hz, {} channels",
            merged.duration_secs(),
            merged.sample_rate,
            merged.channels
        ));

        state.merged = Some(merged);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        let merged = state
            .merged
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("merge results not recorded"))?;

        if merged.samples.is_empty() {
            return Err(StepError::invalid_output("merged stream is empty"));
        }

        // Timestamp entries must tile [0, duration] with no gaps
        let one_sample = 1.0 / merged.sample_rate as f64;
        let mut cursor = 0.0;
        for entry in &merged.timestamps {
            if (entry.start_secs - cursor).abs() > one_sample {
                return Err(StepError::invalid_output(format!(
                    "timestamp gap before '{}' at {:.3}s",
                    entry.title, entry.start_secs
                )));
            }
            cursor = entry.end_secs;
        }
        if (cursor - merged.duration_secs()).abs() > one_sample {
            return Err(StepError::invalid_output(
                "timestamps do not span the merged duration",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TrackBuffer;
    use crate::orchestrator::testutil;

    #[test]
    fn merge_step_has_correct_name() {
        assert_eq!(MergeStep.name(), "Merge");
    }

    #[test]
    fn merge_without_tracks_fails_input_validation() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testutil::test_context(dir.path(), Vec::new());
        let err = MergeStep
            .validate_input(&ctx, &RunState::default())
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidInput(_)));
    }

    #[test]
    fn merge_records_stream_and_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testutil::test_context(dir.path(), Vec::new());
        let mut state = RunState::default();
        let rate = ctx.settings.audio.sample_rate;
        for title in ["one", "two"] {
            state.tracks.push(TrackBuffer::new(
                title,
                vec![0.1; rate as usize * 4],
                rate,
                1,
            ));
        }

        let outcome = MergeStep.execute(&ctx, &mut state).unwrap();
        assert_eq!(outcome, StepOutcome::Success);
        assert!(state.has_merged());
        MergeStep.validate_output(&ctx, &state).unwrap();

        let merged = state.merged.as_ref().unwrap();
        assert_eq!(merged.timestamps.len(), 2);
        // 4 + 4 - 1 (test settings use a 1s crossfade)
        assert!((merged.duration_secs() - 7.0).abs() < 1e-6);
    }
}
