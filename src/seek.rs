//! Seek classification and undo history
//!
//! This module holds the pure, runtime-free half of the system:
//! - `SeekClassifier` - decides whether a position change was a user scrub
//! - `SeekHistory` - bounded log of accepted scrubs, most recent last
//! - `SeekEvent` - one accepted scrub (where it started, where it landed)

mod classifier;
mod history;

pub use classifier::{Classification, OtherReason, ScrubState, SeekClassifier};
pub use history::{HISTORY_CAPACITY, SeekHistory};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A confirmed user scrub on the progress control
///
/// Positions are playback timestamps in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekEvent {
    /// Position before the scrub started
    pub origin: f64,
    /// Position the scrub landed on
    pub target: f64,
    /// Wall-clock instant the scrub completed
    pub captured_at: DateTime<Utc>,
}

impl SeekEvent {
    /// Create an event captured now
    pub fn new(origin: f64, target: f64) -> Self {
        Self {
            origin,
            target,
            captured_at: Utc::now(),
        }
    }
}

/// Persisted form of a `SeekEvent`
///
/// `timestamp` is Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredSeek {
    pub origin: f64,
    pub target: f64,
    pub timestamp: i64,
}

impl From<&SeekEvent> for StoredSeek {
    fn from(event: &SeekEvent) -> Self {
        Self {
            origin: event.origin,
            target: event.target,
            timestamp: event.captured_at.timestamp_millis(),
        }
    }
}
