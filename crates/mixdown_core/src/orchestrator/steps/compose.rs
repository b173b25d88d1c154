//! Compose step - renders the visualization over the looped background
//! and muxes the result with the merged audio.

use crate::media::EncodeSpec;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome, VideoOutput};
use crate::video::{BackgroundLooper, VideoComposer};
use crate::viz::VisualizationRenderer;

/// Compose step: background loop + visualization overlay + encode.
///
/// The merged stream is written to the working directory first so the
/// encoder muxes audio and video from a common origin; frames then stream
/// into the encoder in time order.
pub struct ComposeStep;

impl PipelineStep for ComposeStep {
    fn name(&self) -> &str {
        "Compose"
    }

    fn description(&self) -> &str {
        "Composite frames and encode the final video"
    }

    fn validate_input(&self, ctx: &Context, state: &RunState) -> StepResult<()> {
        if !state.has_merged() {
            return Err(StepError::invalid_input("merged stream not available"));
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
        let merged = state
            .merged
            .as_ref()
            .ok_or_else(|| StepError::invalid_input("merged stream not available"))?;

        let audio_path = ctx.work_dir.join("merged_audio.wav");
        ctx.logger
            .info(&format!("Writing merged audio to {}", audio_path.display()));
        ctx.engine.write_audio(
            &merged.samples,
            merged.sample_rate,
            merged.channels,
            &audio_path,
        )?;

        ctx.logger.info(&format!(
            "Decoding background clip {}",
            ctx.job.background.display()
        ));
        let clip = ctx.engine.decode_clip_frames(
            &ctx.job.background,
            settings.video.frame_rate,
            settings.video.width,
            settings.video.height,
        )?;
        let looper = BackgroundLooper::new(clip, merged.duration_secs(), settings.video.frame_rate)?;

        let renderer = VisualizationRenderer::new(merged, settings.render_config())?;
        let total_frames = renderer.frame_count();
        ctx.logger.info(&format!(
            "Composing {} frames at {} fps",
            total_frames, settings.video.frame_rate
        ));

        let spec = EncodeSpec {
            width: settings.video.width,
            height: settings.video.height,
            frame_rate: settings.video.frame_rate,
            video_codec: settings.video.video_codec.clone(),
            video_bitrate: settings.video.video_bitrate.clone(),
            audio_codec: settings.video.audio_codec.clone(),
            audio_bitrate: settings.video.audio_bitrate.clone(),
            audio_path,
            output_path: ctx.outputs.video.clone(),
        };
        let mut sink = ctx.engine.start_video_encode(&spec)?;

        let composer = VideoComposer::new(settings.overlay_style(), settings.overlay_placement());
        let mut last_pct = 0;
        let written = composer.compose(&looper, &renderer, sink.as_mut(), |done, total| {
            let pct = ((done as f64 / total as f64) * 100.0) as u32;
            if pct >= last_pct + 5 || pct == 100 {
                last_pct = pct;
                ctx.report_progress("Compose", pct, &format!("{}/{} frames", done, total));
            }
        })?;
        sink.finish()?;

        ctx.logger
            .success(&format!("Encoded {} frames to {}", written, ctx.outputs.video.display()));
        state.video = Some(VideoOutput {
            path: ctx.outputs.video.clone(),
            frames_written: written,
            duration_secs: written as f64 / settings.video.frame_rate,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, state: &RunState) -> StepResult<()> {
        let video = state
            .video
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("compose results not recorded"))?;

        if !video.path.exists() {
            return Err(StepError::invalid_output(format!(
                "output video not created: {}",
                video.path.display()
            )));
        }

        // Output covers the merged duration within one frame interval
        if let Some(merged) = state.merged.as_ref() {
            let expected =
                (merged.duration_secs() * ctx.settings.video.frame_rate).ceil() as u64;
            if video.frames_written != expected {
                return Err(StepError::invalid_output(format!(
                    "encoded {} frames, expected {}",
                    video.frames_written, expected
                )));
            }
        }
        Ok(())
    }
}
