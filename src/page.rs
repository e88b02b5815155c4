//! Host page abstractions
//!
//! The core never owns page objects. Hosts hand out `Arc`s to the media
//! element and progress control; sessions keep only `Weak` references.
//! Signals from the page are delivered as `PageSignal` values.

pub mod pattern;
pub mod simulated;

use std::sync::Arc;

pub use pattern::PlaybackPagePattern;

/// The playback (video) element of a page
pub trait MediaElement: Send + Sync {
    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Move the playback position
    ///
    /// The host reports the resulting seek through `PageSignal::SeekStarted`
    /// and `PageSignal::SeekFinished` like any other position change.
    fn set_current_time(&self, seconds: f64);

    /// Whether the element is still part of the document
    fn is_connected(&self) -> bool;
}

/// The progress bar the user scrubs on
pub trait ProgressControl: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Read access to the page document
pub trait PageDocument: Send + Sync {
    /// Current page URL
    fn location(&self) -> String;

    /// Look up the playback element
    fn find_media_element(&self) -> Option<Arc<dyn MediaElement>>;

    /// Look up the progress control
    fn find_progress_control(&self) -> Option<Arc<dyn ProgressControl>>;
}

/// Signals delivered by the page to its monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    /// Pointer pressed on the progress control
    PointerDown,
    /// Media element started a position change (`seeking`)
    SeekStarted,
    /// Media element finished a position change (`seeked`)
    SeekFinished,
    /// The document subtree changed
    Mutation,
    /// The page is about to unload
    Unload,
}
