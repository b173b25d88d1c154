//! Tracklist step - writes the timestamp side file.

use crate::audio::timestamps;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};

/// Tracklist step: renders the timestamp entries to the numbered side
/// file, one `title — start–end` line per track.
pub struct TracklistStep;

impl PipelineStep for TracklistStep {
    fn name(&self) -> &str {
        "Tracklist"
    }

    fn description(&self) -> &str {
        "Write the timestamp listing"
    }

    fn validate_input(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        if !state.has_merged() {
            return Err(StepError::invalid_input("merged stream not available"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let merged = state
            .merged
            .as_ref()
            .ok_or_else(|| StepError::invalid_input("merged stream not available"))?;

        timestamps::write_tracklist(&ctx.outputs.tracklist, &merged.timestamps)
            .map_err(|e| StepError::io_error("writing tracklist", e))?;

        ctx.logger.info(&format!(
            "Tracklist written to {}",
            ctx.outputs.tracklist.display()
        ));
        state.tracklist_written = true;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, state: &RunState) -> StepResult<()> {
        if !state.tracklist_written {
            return Err(StepError::invalid_output("tracklist not recorded"));
        }
        let content = std::fs::read_to_string(&ctx.outputs.tracklist)
            .map_err(|e| StepError::io_error("reading back tracklist", e))?;
        let expected = state.merged.as_ref().map(|m| m.timestamps.len()).unwrap_or(0);
        if content.lines().count() != expected {
            return Err(StepError::invalid_output(format!(
                "tracklist has {} lines, expected {}",
                content.lines().count(),
                expected
            )));
        }
        Ok(())
    }
}
