//! Concrete pipeline steps, in run order: Acquire, Merge, Tracklist,
//! Compose, Describe.

mod acquire;
mod compose;
mod describe;
mod merge;
mod tracklist;

pub use acquire::AcquireStep;
pub use compose::ComposeStep;
pub use describe::DescribeStep;
pub use merge::MergeStep;
pub use tracklist::TracklistStep;
