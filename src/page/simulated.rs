//! In-process page model
//!
//! A headless stand-in for a watch page: one URL, at most one player with an
//! optional progress bar. Used by the replay binary and by tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use super::{MediaElement, PageDocument, ProgressControl};

/// Simulated video element
#[derive(Debug)]
pub struct SimulatedMedia {
    position: Mutex<f64>,
    connected: AtomicBool,
    /// Every position written through `set_current_time`
    assignments: Mutex<Vec<f64>>,
}

impl SimulatedMedia {
    pub fn new(position: f64) -> Self {
        Self {
            position: Mutex::new(position),
            connected: AtomicBool::new(true),
            assignments: Mutex::new(Vec::new()),
        }
    }

    /// Move the playhead without going through `set_current_time`
    /// (playback progressing, a keyboard seek, the user dragging)
    pub fn advance_to(&self, seconds: f64) {
        *self.position.lock() = seconds;
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn assignments(&self) -> Vec<f64> {
        self.assignments.lock().clone()
    }
}

impl MediaElement for SimulatedMedia {
    fn current_time(&self) -> f64 {
        *self.position.lock()
    }

    fn set_current_time(&self, seconds: f64) {
        *self.position.lock() = seconds;
        self.assignments.lock().push(seconds);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Simulated progress bar
#[derive(Debug)]
pub struct SimulatedProgressBar {
    connected: AtomicBool,
}

impl SimulatedProgressBar {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
        }
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Default for SimulatedProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressControl for SimulatedProgressBar {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Simulated page document
#[derive(Debug)]
pub struct SimulatedPage {
    url: RwLock<String>,
    media: RwLock<Option<Arc<SimulatedMedia>>>,
    progress: RwLock<Option<Arc<SimulatedProgressBar>>>,
}

impl SimulatedPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: RwLock::new(url.into()),
            media: RwLock::new(None),
            progress: RwLock::new(None),
        }
    }

    /// Change the URL in place (single-page-app navigation)
    pub fn navigate(&self, url: impl Into<String>) {
        *self.url.write() = url.into();
    }

    /// Insert a player, replacing (and disconnecting) any previous one
    pub fn mount_player(&self, position: f64, with_progress_bar: bool) -> Arc<SimulatedMedia> {
        self.unmount_player();

        let media = Arc::new(SimulatedMedia::new(position));
        *self.media.write() = Some(media.clone());
        if with_progress_bar {
            *self.progress.write() = Some(Arc::new(SimulatedProgressBar::new()));
        }
        media
    }

    /// Remove the player from the document
    pub fn unmount_player(&self) {
        if let Some(media) = self.media.write().take() {
            media.disconnect();
        }
        if let Some(progress) = self.progress.write().take() {
            progress.disconnect();
        }
    }

    pub fn media(&self) -> Option<Arc<SimulatedMedia>> {
        self.media.read().clone()
    }
}

impl PageDocument for SimulatedPage {
    fn location(&self) -> String {
        self.url.read().clone()
    }

    fn find_media_element(&self) -> Option<Arc<dyn MediaElement>> {
        self.media
            .read()
            .clone()
            .map(|media| media as Arc<dyn MediaElement>)
    }

    fn find_progress_control(&self) -> Option<Arc<dyn ProgressControl>> {
        self.progress
            .read()
            .clone()
            .map(|progress| progress as Arc<dyn ProgressControl>)
    }
}
