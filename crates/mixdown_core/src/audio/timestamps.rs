//! Track boundary bookkeeping for the merged stream.
//!
//! The tracker is built incrementally as the merger advances: each crossfade
//! contributes one boundary, placed at the midpoint of the shared fade
//! window in the merged timeline. Entries are contiguous, ordered, and
//! together span exactly `[0, total_duration]`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// One track's span within the merged output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampEntry {
    /// Track title as shown in the tracklist.
    pub title: String,
    /// Start offset in seconds.
    pub start_secs: f64,
    /// End offset in seconds.
    pub end_secs: f64,
}

impl TimestampEntry {
    /// Span length in seconds.
    pub fn span_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Incremental builder for the timestamp list.
///
/// Usage mirrors the merge loop: `open` the first track at zero, call
/// `boundary` once per crossfade with the midpoint offset, and `finish`
/// with the total merged duration to close the last entry.
#[derive(Debug, Default)]
pub struct TimestampTracker {
    entries: Vec<TimestampEntry>,
    pending: Option<(String, f64)>,
}

impl TimestampTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the first entry at offset zero.
    pub fn open(&mut self, title: impl Into<String>) {
        debug_assert!(self.pending.is_none(), "tracker already has an open entry");
        self.pending = Some((title.into(), 0.0));
    }

    /// Close the current entry at `at_secs` and open the next one there.
    pub fn boundary(&mut self, at_secs: f64, next_title: impl Into<String>) {
        if let Some((title, start)) = self.pending.take() {
            self.entries.push(TimestampEntry {
                title,
                start_secs: start,
                end_secs: at_secs,
            });
        }
        self.pending = Some((next_title.into(), at_secs));
    }

    /// Close the last entry at `total_secs` and return the full list.
    pub fn finish(mut self, total_secs: f64) -> Vec<TimestampEntry> {
        if let Some((title, start)) = self.pending.take() {
            self.entries.push(TimestampEntry {
                title,
                start_secs: start,
                end_secs: total_secs,
            });
        }
        self.entries
    }
}

/// Format seconds as `HH:MM:SS`.
pub fn format_offset(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Format one tracklist line: `title — HH:MM:SS–HH:MM:SS`.
pub fn format_entry(entry: &TimestampEntry) -> String {
    format!(
        "{} — {}–{}",
        entry.title,
        format_offset(entry.start_secs),
        format_offset(entry.end_secs)
    )
}

/// Render the full tracklist, one line per entry.
pub fn format_tracklist(entries: &[TimestampEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format_entry(entry));
        out.push('\n');
    }
    out
}

/// Write the tracklist side file.
pub fn write_tracklist(path: &Path, entries: &[TimestampEntry]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(format_tracklist(entries).as_bytes())?;
    Ok(())
}

/// Rewrite the titles in an existing tracklist file, keeping the offsets.
///
/// Used when the description collaborator returns generated titles. Fails
/// if the line count does not match the title count, leaving the file
/// untouched.
pub fn rewrite_titles(path: &Path, titles: &[String]) -> io::Result<()> {
    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() != titles.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "tracklist has {} lines but {} titles were provided",
                lines.len(),
                titles.len()
            ),
        ));
    }

    let mut out = String::new();
    for (line, title) in lines.iter().zip(titles) {
        // Offsets sit after the last " — " separator
        let offsets = line.rsplit(" — ").next().unwrap_or(line);
        out.push_str(&format!("{} — {}\n", title, offsets));
    }
    fs::write(path, out)
}
