//! Seek-intent classifier
//!
//! Tells a user scrub on the progress control apart from every other cause of
//! a position change. A scrub is armed by a pointer-down on the progress
//! control and completed by the next seek-finished signal; anything else
//! (keyboard seeks, buffering, autoplay, our own corrective seeks) is "other".
//!
//! ```text
//! Idle --pointer_down--> Armed --seek_started--> Active
//!   ^                      |                       |
//!   +-----seek_finished----+-----seek_finished-----+
//! ```

use tracing::debug;

use super::SeekEvent;

/// Scrub state of one session
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ScrubState {
    #[default]
    Idle,
    /// Pointer is down on the progress control
    Armed { origin: Option<f64> },
    /// The media element acknowledged the seek
    Active { origin: Option<f64> },
}

impl ScrubState {
    fn origin(&self) -> Option<f64> {
        match self {
            ScrubState::Idle => None,
            ScrubState::Armed { origin } | ScrubState::Active { origin } => *origin,
        }
    }
}

/// Why a signal was not counted as part of a scrub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherReason {
    /// A programmatic seek was in flight
    Programmatic,
    /// No pointer-down preceded the signal (keyboard seek, autoplay, ...)
    NotArmed,
    /// The scrub completed but its origin was never captured
    MissingOrigin,
    /// No media element is attached to the session
    Detached,
    /// Attached without a progress control, so nothing can arm a scrub
    NoProgressControl,
}

/// Result of feeding one signal to the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    /// Pointer-down armed a scrub
    Armed,
    /// Seek start acknowledged for an armed scrub
    Acknowledged,
    /// A scrub completed
    Scrub(SeekEvent),
    /// The signal belongs to something other than a user scrub
    Other(OtherReason),
}

/// State machine over pointer and media signals
#[derive(Debug, Clone, Default)]
pub struct SeekClassifier {
    state: ScrubState,
}

impl SeekClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScrubState {
        self.state
    }

    /// True between pointer-down and the completing seek-finished signal
    pub fn is_scrubbing(&self) -> bool {
        !matches!(self.state, ScrubState::Idle)
    }

    /// Captured pre-scrub position, if a scrub is armed
    pub fn origin(&self) -> Option<f64> {
        self.state.origin()
    }

    /// Pointer-down on the progress control
    ///
    /// `position` is the media position at the moment of the press, or `None`
    /// if the media element could not be read. Pressing again while armed
    /// re-arms with the new origin.
    pub fn pointer_down(&mut self, position: Option<f64>, programmatic: bool) -> Classification {
        if programmatic {
            return Classification::Other(OtherReason::Programmatic);
        }

        self.state = ScrubState::Armed { origin: position };
        debug!("Progress control pressed, origin position: {:?}", position);
        Classification::Armed
    }

    /// The media element started changing position
    pub fn seek_started(&mut self, programmatic: bool) -> Classification {
        if programmatic {
            return Classification::Other(OtherReason::Programmatic);
        }

        match self.state {
            ScrubState::Idle => Classification::Other(OtherReason::NotArmed),
            ScrubState::Armed { origin } | ScrubState::Active { origin } => {
                self.state = ScrubState::Active { origin };
                debug!("Scrub seek started");
                Classification::Acknowledged
            }
        }
    }

    /// The media element finished changing position and now sits at `position`
    pub fn seek_finished(&mut self, position: f64, programmatic: bool) -> Classification {
        if programmatic {
            return Classification::Other(OtherReason::Programmatic);
        }

        let origin = match self.state {
            ScrubState::Idle => {
                debug!("Seek finished at {} without a scrub, ignoring", position);
                return Classification::Other(OtherReason::NotArmed);
            }
            ScrubState::Armed { origin } | ScrubState::Active { origin } => origin,
        };

        self.state = ScrubState::Idle;

        match origin {
            Some(origin) => {
                debug!("Scrub completed: {} -> {}", origin, position);
                Classification::Scrub(SeekEvent::new(origin, position))
            }
            None => Classification::Other(OtherReason::MissingOrigin),
        }
    }

    /// Drop any scrub in progress without emitting an event
    pub fn reset(&mut self) {
        self.state = ScrubState::Idle;
    }
}
