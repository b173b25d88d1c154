//! mixdown - Main entry point
//!
//! Reads a track list, merges the tracks with equal-power crossfades,
//! renders a bar-visualization overlay onto a looping background clip,
//! and writes the muxed video plus a timestamp tracklist.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing::info;

use mixdown_core::acquire::{read_track_list, TrackErrorPolicy};
use mixdown_core::config::ConfigManager;
use mixdown_core::logging::{init_tracing, LogLevel};
use mixdown_core::media::FfmpegEngine;
use mixdown_core::orchestrator::{run_mix_job, FailureCategory, MixJob};

/// Command-line arguments for mixdown
#[derive(Parser, Debug)]
#[command(name = "mixdown")]
#[command(about = "Assemble a crossfaded music mix video from a track list")]
#[command(version)]
struct Args {
    /// Track list file: one URL or local path per line
    #[arg(short, long, default_value = "song_list.txt")]
    tracks: PathBuf,

    /// Background video clip to loop behind the visualization
    #[arg(short, long, env = "MIXDOWN_BACKGROUND")]
    background: PathBuf,

    /// Configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "mixdown.toml")]
    config: PathBuf,

    /// Override the configured output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override the configured crossfade duration in seconds
    #[arg(long)]
    crossfade: Option<f64>,

    /// Skip tracks that fail to acquire instead of aborting
    #[arg(long)]
    skip_failed_tracks: bool,

    /// Keep the temporary working directory after the run
    #[arg(long)]
    keep_temp: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut manager = ConfigManager::new(&args.config);
    if let Err(e) = manager.load_or_create() {
        eprintln!("Configuration error: {}", e);
        return ExitCode::from(2);
    }
    apply_overrides(&mut manager, &args);

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_dir = PathBuf::from(&manager.settings().paths.logs_dir);
    let _log_guard = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => init_tracing(level, Some(log_dir.as_path())),
        Err(_) => init_tracing(level, None),
    };

    match run(args, manager) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Pipeline(e)) => {
            let category = e.category();
            eprintln!("{}: {}", category.label(), e);
            ExitCode::from(exit_code_for(category))
        }
        Err(RunError::Setup(e)) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

enum RunError {
    Setup(anyhow::Error),
    Pipeline(mixdown_core::orchestrator::PipelineError),
}

impl From<anyhow::Error> for RunError {
    fn from(e: anyhow::Error) -> Self {
        Self::Setup(e)
    }
}

fn run(args: Args, manager: ConfigManager) -> Result<(), RunError> {
    let settings = manager.settings().clone();

    let sources = read_track_list(&args.tracks)
        .with_context(|| format!("reading track list {}", args.tracks.display()))?;
    info!(
        "Loaded {} sources from {}",
        sources.len(),
        args.tracks.display()
    );

    let engine = FfmpegEngine::new()
        .with_programs(
            settings.tools.ffmpeg_program.clone(),
            settings.tools.ffprobe_program.clone(),
        )
        .with_timeout(Duration::from_secs(settings.tools.timeout_secs));

    let job = MixJob {
        sources,
        background: args.background.clone(),
    };

    let summary = run_mix_job(settings, job, Arc::new(engine), None).map_err(RunError::Pipeline)?;

    if let Some(video) = &summary.video {
        info!(
            "Mix video created: {} ({:.1}s, {} frames)",
            video.path.display(),
            video.duration_secs,
            video.frames_written
        );
        println!("{}", video.path.display());
    }
    info!("Tracklist: {}", summary.tracklist.display());
    if !summary.skipped_tracks.is_empty() {
        info!(
            "Skipped {} track(s): {}",
            summary.skipped_tracks.len(),
            summary.skipped_tracks.join(", ")
        );
    }
    Ok(())
}

/// Fold CLI overrides into the loaded settings.
fn apply_overrides(manager: &mut ConfigManager, args: &Args) {
    let settings = manager.settings_mut();
    if let Some(dir) = &args.output_dir {
        settings.paths.output_dir = dir.display().to_string();
    }
    if let Some(crossfade) = args.crossfade {
        settings.audio.crossfade_secs = crossfade;
    }
    if args.skip_failed_tracks {
        settings.acquisition.on_track_error = TrackErrorPolicy::Skip;
    }
    if args.keep_temp {
        settings.paths.cleanup_on_exit = false;
    }
}

/// Map failure categories to distinct exit codes.
///
/// Description-generation failures never reach here; they are best-effort
/// and the run still exits 0.
fn exit_code_for(category: FailureCategory) -> u8 {
    match category {
        FailureCategory::Configuration => 2,
        FailureCategory::Acquisition => 3,
        FailureCategory::Processing => 4,
        FailureCategory::Cancelled => 130,
    }
}
