//! Page lifecycle monitor
//!
//! Keeps a session attached to the right media element while the page
//! changes underneath it (single-page-app navigation, player re-creation):
//! - off a playback page: tear the session down
//! - tracked element gone or disconnected: tear down and detect again
//!
//! Detection probes the page immediately and then retries with exponential
//! backoff (see `DetectionPolicy`). Stale retry tasks are aborted and also
//! check a generation counter before attaching.

mod detection;

pub use detection::{DetectionPolicy, DetectionState};

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::features::Settings;
use crate::page::{PageDocument, PageSignal, PlaybackPagePattern};
use crate::seek::Classification;
use crate::session::{AttachMode, Session};

#[derive(Default)]
struct Detection {
    generation: u64,
    state: DetectionState,
    task: Option<JoinHandle<()>>,
}

impl Detection {
    /// Invalidate any running retry task
    fn cancel(&mut self) {
        self.generation += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct MonitorInner {
    page: Arc<dyn PageDocument>,
    session: Session,
    pattern: PlaybackPagePattern,
    policy: DetectionPolicy,
    detection: Mutex<Detection>,
}

impl MonitorInner {
    /// Look for the player once and attach to it
    fn probe(&self) -> Option<AttachMode> {
        let media = self.page.find_media_element()?;
        info!("Video player detected");

        // Single lookup, never retried
        let progress = self.page.find_progress_control();
        Some(self.session.attach(&media, progress.as_ref()))
    }
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        self.detection.get_mut().cancel();
    }
}

/// Watches one page and keeps its session attached
pub struct PageMonitor {
    inner: Arc<MonitorInner>,
}

impl PageMonitor {
    pub fn new(
        page: Arc<dyn PageDocument>,
        session: Session,
        pattern: PlaybackPagePattern,
        policy: DetectionPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                page,
                session,
                pattern,
                policy,
                detection: Mutex::new(Detection::default()),
            }),
        }
    }

    pub fn from_settings(page: Arc<dyn PageDocument>, session: Session, settings: &Settings) -> Self {
        Self::new(page, session, settings.site.clone(), settings.detection)
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn detection_state(&self) -> DetectionState {
        self.inner.detection.lock().state
    }

    /// Begin monitoring; detects the player if already on a playback page
    pub fn start(&self) {
        info!("Initializing page monitor");
        if self.inner.pattern.matches(&self.inner.page.location()) {
            self.start_detection();
        } else {
            debug!("Not a playback page, waiting for navigation");
        }
    }

    /// Route one page signal
    ///
    /// Returns the classification for pointer and media signals.
    pub fn handle(&self, signal: PageSignal) -> Option<Classification> {
        let session = &self.inner.session;
        match signal {
            PageSignal::PointerDown => Some(session.pointer_down()),
            PageSignal::SeekStarted => Some(session.seek_started()),
            PageSignal::SeekFinished => Some(session.seek_finished()),
            PageSignal::Mutation => {
                self.on_mutation();
                None
            }
            PageSignal::Unload => {
                self.teardown();
                None
            }
        }
    }

    /// React to a document change
    pub fn on_mutation(&self) {
        let location = self.inner.page.location();
        if !self.inner.pattern.matches(&location) {
            self.teardown();
            return;
        }

        if self.inner.session.has_live_media() {
            return;
        }
        if self.probe_pending() {
            return;
        }

        self.inner.session.teardown();
        self.start_detection();
    }

    /// Probe once for a detection run that is waiting between retries
    ///
    /// Returns false if no run is pending. The backoff schedule is left
    /// alone when the probe misses.
    fn probe_pending(&self) -> bool {
        let mut detection = self.inner.detection.lock();
        if !matches!(detection.state, DetectionState::Pending { .. }) {
            return false;
        }
        if self.inner.probe().is_some() {
            detection.cancel();
            detection.state = DetectionState::Attached;
        }
        true
    }

    /// Stop detection and reset the session
    pub fn teardown(&self) {
        let was_detecting = {
            let mut detection = self.inner.detection.lock();
            let was_detecting = matches!(detection.state, DetectionState::Pending { .. });
            detection.cancel();
            detection.state = DetectionState::Idle;
            was_detecting
        };
        if was_detecting {
            debug!("Player detection cancelled");
        }
        self.inner.session.teardown();
    }

    fn start_detection(&self) {
        let mut detection = self.inner.detection.lock();
        if matches!(detection.state, DetectionState::Pending { .. }) {
            debug!("Player detection already pending");
            return;
        }
        detection.cancel();

        if self.inner.probe().is_some() {
            detection.state = DetectionState::Attached;
            return;
        }
        if self.inner.policy.max_attempts == 0 {
            warn!("Failed to detect video player, retries disabled");
            detection.state = DetectionState::GaveUp;
            return;
        }

        detection.state = DetectionState::Pending { attempt: 1 };
        let generation = detection.generation;
        let weak = Arc::downgrade(&self.inner);
        detection.task = Some(tokio::spawn(run_detection(
            weak,
            self.inner.policy,
            generation,
        )));
    }
}

/// Retry loop for one detection run
async fn run_detection(weak: Weak<MonitorInner>, policy: DetectionPolicy, generation: u64) {
    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_for(attempt);
        info!(
            "Video player not found, retrying in {}ms (attempt {}/{})",
            delay.as_millis(),
            attempt,
            policy.max_attempts
        );
        tokio::time::sleep(delay).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        let mut detection = inner.detection.lock();
        if detection.generation != generation {
            return;
        }

        if inner.probe().is_some() {
            detection.state = DetectionState::Attached;
            detection.task = None;
            return;
        }

        if attempt == policy.max_attempts {
            warn!(
                "Failed to detect video player after {} attempts",
                policy.max_attempts
            );
            detection.state = DetectionState::GaveUp;
            detection.task = None;
        } else {
            detection.state = DetectionState::Pending {
                attempt: attempt + 1,
            };
        }
    }
}
