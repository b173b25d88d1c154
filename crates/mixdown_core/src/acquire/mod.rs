//! Track acquisition.
//!
//! Turns track-list entries (local paths or remote URLs) into decoded
//! [`TrackBuffer`]s. Remote sources are fetched with an external `yt-dlp`
//! process that extracts audio to the working directory; local sources are
//! decoded in place. All decoding funnels through the media engine, which
//! resamples and remixes every track to the mix's uniform format. The core
//! never retries a failed fetch.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::TrackBuffer;
use crate::media::runner::{run_with_timeout, stderr_tail};
use crate::media::{MediaEngine, MediaError};

/// One requested track: a local file or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    Local(PathBuf),
    Remote(String),
}

impl TrackSource {
    /// Parse one track-list line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.starts_with("http://") || line.starts_with("https://") {
            Self::Remote(line.to_string())
        } else {
            Self::Local(PathBuf::from(line))
        }
    }

    /// Short label for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Remote(url) => url.clone(),
        }
    }
}

/// Read a track list file: one source per line, blanks and `#` comments
/// skipped.
pub fn read_track_list(path: &Path) -> std::io::Result<Vec<TrackSource>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(TrackSource::parse)
        .collect())
}

/// What to do when one track cannot be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackErrorPolicy {
    /// Abort the whole mix (default).
    #[default]
    Abort,
    /// Log the failure, drop the track, and continue.
    Skip,
}

/// Errors while acquiring a single track.
#[derive(Error, Debug)]
pub enum AcquireError {
    /// Local file missing or unreadable.
    #[error("source unavailable: {0}")]
    Unavailable(PathBuf),

    /// The downloader failed.
    #[error("download of '{src}' failed: {detail}")]
    DownloadFailed { src: String, detail: String },

    /// The downloader finished but left no usable file behind.
    #[error("download of '{src}' produced no audio file")]
    NothingDownloaded { src: String },

    /// Decoding failed (unsupported format, corrupt file).
    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Fetches a source to a local audio file in the working directory.
pub trait TrackProvider: Send + Sync {
    /// Returns the path of the fetched file and its display title.
    fn fetch(&self, source: &TrackSource, work_dir: &Path) -> Result<(PathBuf, String), AcquireError>;
}

/// Provider for local files: verifies existence, derives the title from
/// the file stem.
pub struct LocalProvider;

impl TrackProvider for LocalProvider {
    fn fetch(
        &self,
        source: &TrackSource,
        _work_dir: &Path,
    ) -> Result<(PathBuf, String), AcquireError> {
        let TrackSource::Local(path) = source else {
            unreachable!("local provider only receives local sources");
        };
        if !path.is_file() {
            return Err(AcquireError::Unavailable(path.clone()));
        }
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok((path.clone(), title))
    }
}

/// Provider for remote URLs via the external `yt-dlp` tool.
///
/// Audio is extracted to WAV in the working directory under a
/// title-derived filename; yt-dlp prints the final path on stdout.
pub struct YtDlpProvider {
    program: String,
    timeout: Duration,
}

impl YtDlpProvider {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn download_error(&self, source: &TrackSource, detail: impl Into<String>) -> AcquireError {
        AcquireError::DownloadFailed {
            src: source.describe(),
            detail: detail.into(),
        }
    }
}

impl TrackProvider for YtDlpProvider {
    fn fetch(
        &self,
        source: &TrackSource,
        work_dir: &Path,
    ) -> Result<(PathBuf, String), AcquireError> {
        let TrackSource::Remote(url) = source else {
            unreachable!("yt-dlp provider only receives remote sources");
        };

        let template = work_dir.join("%(title)s.%(ext)s");
        let mut cmd = Command::new(&self.program);
        cmd.arg("-f")
            .arg("bestaudio")
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg("wav")
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-o")
            .arg(&template)
            .arg(url);

        let output = run_with_timeout(&mut cmd, &self.program, self.timeout)
            .map_err(AcquireError::Media)?;
        if !output.success() {
            return Err(self.download_error(source, stderr_tail(&output.stderr, 10)));
        }

        let printed = String::from_utf8_lossy(&output.stdout);
        let path = printed
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .next_back()
            .map(PathBuf::from)
            .filter(|p| p.is_file())
            .ok_or_else(|| AcquireError::NothingDownloaded {
                src: source.describe(),
            })?;

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| source.describe());
        Ok((path, title))
    }
}

/// Acquires and decodes tracks to the mix's uniform sample format.
pub struct SourceAcquirer {
    engine: Arc<dyn MediaEngine>,
    local: LocalProvider,
    remote: YtDlpProvider,
    sample_rate: u32,
    channels: u16,
}

impl SourceAcquirer {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        remote: YtDlpProvider,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            engine,
            local: LocalProvider,
            remote,
            sample_rate,
            channels,
        }
    }

    /// Fetch and decode one track.
    pub fn acquire(
        &self,
        source: &TrackSource,
        work_dir: &Path,
    ) -> Result<TrackBuffer, AcquireError> {
        let (path, title) = match source {
            TrackSource::Local(_) => self.local.fetch(source, work_dir)?,
            TrackSource::Remote(_) => self.remote.fetch(source, work_dir)?,
        };

        tracing::info!("Decoding '{}' from {}", title, path.display());
        let samples = self
            .engine
            .decode_audio(&path, self.sample_rate, self.channels)?;
        Ok(TrackBuffer::new(title, samples, self.sample_rate, self.channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_distinguishes_urls_from_paths() {
        assert_eq!(
            TrackSource::parse("https://example.com/watch?v=abc"),
            TrackSource::Remote("https://example.com/watch?v=abc".to_string())
        );
        assert_eq!(
            TrackSource::parse("audio/song.wav"),
            TrackSource::Local(PathBuf::from("audio/song.wav"))
        );
    }

    #[test]
    fn track_list_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("song_list.txt");
        std::fs::write(
            &list,
            "# my mix\n\nhttps://example.com/a\n  local/b.wav  \n#https://example.com/c\n",
        )
        .unwrap();

        let sources = read_track_list(&list).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(matches!(sources[0], TrackSource::Remote(_)));
        assert!(matches!(sources[1], TrackSource::Local(_)));
    }

    #[test]
    fn local_provider_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = TrackSource::Local(dir.path().join("missing.wav"));
        let err = LocalProvider.fetch(&source, dir.path()).unwrap_err();
        assert!(matches!(err, AcquireError::Unavailable(_)));
    }

    #[test]
    fn local_provider_titles_from_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Night Drive.wav");
        std::fs::write(&path, b"").unwrap();

        let source = TrackSource::Local(path.clone());
        let (fetched, title) = LocalProvider.fetch(&source, dir.path()).unwrap();
        assert_eq!(fetched, path);
        assert_eq!(title, "Night Drive");
    }

    #[test]
    fn ytdlp_failure_is_a_download_error() {
        // `false` exits non-zero without touching the network
        let provider = YtDlpProvider::new("false", Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();
        let source = TrackSource::Remote("https://example.com/x".to_string());
        let err = provider.fetch(&source, dir.path()).unwrap_err();
        assert!(matches!(err, AcquireError::DownloadFailed { .. }));
    }
}
