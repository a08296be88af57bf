//! Streaming order-book maintenance
//!
//! Exchanges stream book deltas after an initial snapshot. [`merge_side`]
//! folds a batch of deltas into one sorted side; [`BookSequencer`] rejects
//! batches that are older than what the cached book already reflects.

mod merge;
mod sequencer;

pub use merge::{BookDelta, BookSide, LevelDelta, apply_delta, merge_side};
pub use sequencer::{BookSequencer, SequenceCheck};
