//! Read models over the conversation log
//!
//! Projections are rebuilt from the Events log and never feed back into the
//! runtime.

use crate::areas::LogRecord;

pub mod transcript;

pub use transcript::{Agent, Transcript, TranscriptEntry, TranscriptGroup};

/// Common trait for log projections
pub trait LogProjection: Send + Sync {
    /// Update the projection with one log record
    fn apply(&mut self, record: &LogRecord);

    /// Get the projection name
    fn name(&self) -> &str;
}
