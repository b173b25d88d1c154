//! Audio merging: buffer types, equal-power crossfades, and the timestamp
//! records derived while merging.

mod crossfade;
pub mod timestamps;
mod types;

pub use crossfade::{fade_in_weight, fade_out_weight, CrossfadeMerger, MergeError, MergeResult};
pub use timestamps::{TimestampEntry, TimestampTracker};
pub use types::{MergedAudio, TrackBuffer};
