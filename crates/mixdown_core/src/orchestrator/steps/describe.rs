//! Describe step - best-effort description and tags for the finished mix.

use crate::audio::timestamps;
use crate::describe::DescriptionGenerator;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};

/// Describe step: runs after the video is complete and never fails the
/// pipeline. A missing API key or a failed request downgrades to a
/// skipped step; generated titles are substituted into the tracklist when
/// the counts line up.
pub struct DescribeStep;

impl PipelineStep for DescribeStep {
    fn name(&self) -> &str {
        "Describe"
    }

    fn description(&self) -> &str {
        "Generate mix description and tags"
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn validate_input(&self, _ctx: &Context, _state: &RunState) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let config = &ctx.settings.description;
        if !config.enabled {
            return Ok(StepOutcome::Skipped("disabled in configuration".into()));
        }

        let generator = DescriptionGenerator::new(config.clone());
        if !generator.has_api_key() {
            return Ok(StepOutcome::Skipped(format!(
                "API key not set ({})",
                config.api_key_env
            )));
        }

        let track_count = state
            .merged
            .as_ref()
            .map(|m| m.timestamps.len())
            .unwrap_or(0);
        ctx.logger
            .info(&format!("Requesting description for {} tracks", track_count));

        let description = match generator.generate(track_count) {
            Ok(d) => d,
            Err(e) => {
                ctx.logger
                    .error(&format!("Description generation failed: {}", e));
                return Ok(StepOutcome::Skipped(e.to_string()));
            }
        };

        std::fs::write(&ctx.outputs.description, &description.content)
            .map_err(|e| StepError::io_error("writing description", e))?;
        ctx.logger.info(&format!(
            "Description written to {}",
            ctx.outputs.description.display()
        ));
        state.description = Some(ctx.outputs.description.clone());

        if config.update_titles
            && state.tracklist_written
            && description.titles.len() == track_count
        {
            match timestamps::rewrite_titles(&ctx.outputs.tracklist, &description.titles) {
                Ok(()) => ctx.logger.info("Tracklist titles updated"),
                Err(e) => ctx
                    .logger
                    .warn(&format!("Could not update tracklist titles: {}", e)),
            }
        } else if config.update_titles && !description.titles.is_empty() {
            ctx.logger.warn(&format!(
                "Got {} generated titles for {} tracks; keeping original titles",
                description.titles.len(),
                track_count
            ));
        }

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        let Some(path) = state.description.as_ref() else {
            return Ok(());
        };
        if !path.exists() {
            return Err(StepError::invalid_output("description file not created"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testutil;

    #[test]
    fn describe_step_is_optional() {
        assert!(DescribeStep.is_optional());
    }

    #[test]
    fn disabled_collaborator_skips() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = testutil::test_context(dir.path(), Vec::new());
        ctx.settings.description.enabled = false;

        let outcome = DescribeStep
            .execute(&ctx, &mut RunState::default())
            .unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
    }

    #[test]
    fn missing_api_key_skips_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = testutil::test_context(dir.path(), Vec::new());
        ctx.settings.description.api_key_env = "MIXDOWN_KEY_THAT_IS_NOT_SET".to_string();

        let outcome = DescribeStep
            .execute(&ctx, &mut RunState::default())
            .unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
    }
}
