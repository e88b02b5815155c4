//! Playback sessions
//!
//! A `Session` is one playback-page instance: its scrub state, its seek
//! history, its programmatic-seek guard and weak references to the page
//! elements it listens to. Sessions never share state; the
//! `SessionRegistry` maps session ids to sessions.
//!
//! ## Threading
//! Session state sits behind a mutex that is never held across an `.await`
//! or across a media position assignment. Timers and the persistence writer
//! are tokio tasks, so sessions must be created inside a tokio runtime.

mod guard;
mod identity;
mod registry;

pub use guard::{GuardTicket, ProgrammaticSeekGuard};
pub use identity::{FixedIdentity, IdentityError, SessionIdentity};
pub use registry::SessionRegistry;

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::features::Settings;
use crate::page::{MediaElement, ProgressControl};
use crate::seek::{
    Classification, OtherReason, ScrubState, SeekClassifier, SeekEvent, SeekHistory, StoredSeek,
};
use crate::storage::{self, SeekStore};

/// Default time the guard stays up after an undo's position assignment
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Identifier of one playback context (a browser tab)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-session tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            settle_delay: settings.settle_delay(),
        }
    }
}

/// How a session was attached to a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMode {
    /// Media element and progress control both found
    Full,
    /// Progress control missing: position changes are observed but nothing
    /// can arm a scrub
    Degraded,
}

/// Result of an undo request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UndoOutcome {
    /// Position moved back to the origin of the undone scrub
    Restored { position: f64, from: f64 },
    /// Nothing to undo
    Empty,
    /// History is not empty but no live media element is attached; nothing
    /// was consumed
    Detached,
}

// ============ Internal state ============

struct Attachment {
    media: Weak<dyn MediaElement>,
    progress: Option<Weak<dyn ProgressControl>>,
}

impl Attachment {
    fn live_media(&self) -> Option<Arc<dyn MediaElement>> {
        self.media.upgrade().filter(|media| media.is_connected())
    }

    fn has_live_progress(&self) -> bool {
        self.progress
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|progress| progress.is_connected())
    }
}

#[derive(Default)]
struct SessionState {
    classifier: SeekClassifier,
    history: SeekHistory,
    guard: ProgrammaticSeekGuard,
    attachment: Option<Attachment>,
    /// Set once anything was written to the store since the last clear
    persisted: bool,
}

impl SessionState {
    fn live_media(&self) -> Option<Arc<dyn MediaElement>> {
        self.attachment.as_ref().and_then(Attachment::live_media)
    }
}

enum PersistCommand {
    Save(Vec<StoredSeek>),
    Clear,
    Flush(oneshot::Sender<()>),
    /// Hold later commands until another writer has flushed
    After(oneshot::Receiver<()>),
}

struct SessionInner {
    state: Mutex<SessionState>,
    persist_tx: mpsc::UnboundedSender<PersistCommand>,
    config: SessionConfig,
}

/// Classifier and undo history for one playback context
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Session")
            .field("scrub", &state.classifier.state())
            .field("history_len", &state.history.len())
            .field("programmatic", &state.guard.is_active())
            .field("attached", &state.attachment.is_some())
            .finish()
    }
}

impl Session {
    /// Create a session and spawn its persistence writer
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn SeekStore>,
        identity: Arc<dyn SessionIdentity>,
    ) -> Self {
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_persistence(persist_rx, store, identity));

        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::default()),
                persist_tx,
                config,
            }),
        }
    }

    pub fn config(&self) -> SessionConfig {
        self.inner.config
    }

    // ============ Attachment ============

    /// Start listening to a media element and, if present, a progress control
    ///
    /// Any scrub in progress on a previous element is dropped.
    pub fn attach(
        &self,
        media: &Arc<dyn MediaElement>,
        progress: Option<&Arc<dyn ProgressControl>>,
    ) -> AttachMode {
        let mode = if progress.is_some() {
            AttachMode::Full
        } else {
            AttachMode::Degraded
        };

        let mut state = self.inner.state.lock();
        state.classifier.reset();
        state.attachment = Some(Attachment {
            media: Arc::downgrade(media),
            progress: progress.map(Arc::downgrade),
        });

        match mode {
            AttachMode::Full => info!("Session attached to media element and progress control"),
            AttachMode::Degraded => {
                warn!("Progress control not found, scrub tracking disabled for this element")
            }
        }
        mode
    }

    /// Whether the tracked media element is still alive and in the document
    pub fn has_live_media(&self) -> bool {
        self.inner.state.lock().live_media().is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.state.lock().attachment.is_some()
    }

    /// Drop element references, scrub state, guard and history
    ///
    /// No event is emitted for a scrub in progress. Returns false if there
    /// was nothing to tear down.
    pub fn teardown(&self) -> bool {
        self.teardown_with(true)
    }

    /// Take over from a session replaced under the same id
    ///
    /// The stored history belongs to this session afterwards. The old
    /// writer's queued saves land before this session's clear.
    fn take_over(&self, previous: &Session) {
        previous.teardown_with(false);

        let (done_tx, done_rx) = oneshot::channel();
        previous.send_persist(PersistCommand::Flush(done_tx));
        self.send_persist(PersistCommand::After(done_rx));
        self.send_persist(PersistCommand::Clear);
    }

    fn teardown_with(&self, clear_store: bool) -> bool {
        let mut state = self.inner.state.lock();
        let was_active = state.attachment.is_some()
            || state.classifier.is_scrubbing()
            || state.guard.is_active()
            || !state.history.is_empty();
        if !was_active {
            return false;
        }

        info!("Cleaning up session");
        state.attachment = None;
        state.classifier.reset();
        state.guard.reset();
        state.history.clear();

        if state.persisted {
            state.persisted = false;
            if clear_store {
                self.send_persist(PersistCommand::Clear);
            }
        }
        true
    }

    // ============ Signals ============

    /// Pointer pressed on the progress control
    pub fn pointer_down(&self) -> Classification {
        let mut state = self.inner.state.lock();
        let Some(attachment) = state.attachment.as_ref() else {
            return Classification::Other(OtherReason::Detached);
        };
        if !attachment.has_live_progress() {
            return Classification::Other(OtherReason::NoProgressControl);
        }

        let position = attachment.live_media().map(|media| media.current_time());
        let programmatic = state.guard.is_active();
        state.classifier.pointer_down(position, programmatic)
    }

    /// Media element started a position change
    pub fn seek_started(&self) -> Classification {
        let mut state = self.inner.state.lock();
        if state.attachment.is_none() {
            return Classification::Other(OtherReason::Detached);
        }
        let programmatic = state.guard.is_active();
        state.classifier.seek_started(programmatic)
    }

    /// Media element finished a position change
    ///
    /// A completed scrub is recorded before this returns.
    pub fn seek_finished(&self) -> Classification {
        let mut state = self.inner.state.lock();
        let Some(media) = state.live_media() else {
            return Classification::Other(OtherReason::Detached);
        };

        let position = media.current_time();
        let programmatic = state.guard.is_active();
        let classification = state.classifier.seek_finished(position, programmatic);

        if let Classification::Scrub(event) = classification {
            self.record_locked(&mut state, event);
        }
        classification
    }

    // ============ History ============

    /// Append an accepted scrub to the history
    ///
    /// Never fails; persistence happens afterwards in the background.
    pub fn record(&self, event: SeekEvent) {
        let mut state = self.inner.state.lock();
        self.record_locked(&mut state, event);
    }

    fn record_locked(&self, state: &mut SessionState, event: SeekEvent) {
        if let Some(evicted) = state.history.push(event) {
            debug!(
                "History full, evicted scrub {} -> {}",
                evicted.origin, evicted.target
            );
        }
        info!(
            "Seek event stored: {} -> {} ({} in history)",
            event.origin,
            event.target,
            state.history.len()
        );

        state.persisted = true;
        self.send_persist(PersistCommand::Save(state.history.to_stored()));
    }

    /// Move the playhead back to where the latest scrub started
    ///
    /// Consumes exactly one history entry. The position assignment and the
    /// settle delay after it are covered by the programmatic-seek guard, so
    /// the resulting seek signals are never recorded as a scrub.
    pub fn undo(&self) -> UndoOutcome {
        let (media, event, ticket) = {
            let mut state = self.inner.state.lock();
            debug!("Undo requested, history length: {}", state.history.len());

            if state.history.is_empty() {
                info!("No seek history to undo");
                return UndoOutcome::Empty;
            }
            let Some(media) = state.live_media() else {
                warn!("Undo requested but no media element is attached, keeping history");
                return UndoOutcome::Detached;
            };
            let Some(event) = state.history.pop_latest() else {
                return UndoOutcome::Empty;
            };

            let ticket = state.guard.acquire();
            state.persisted = true;
            self.send_persist(PersistCommand::Save(state.history.to_stored()));
            (media, event, ticket)
        };

        info!("Undoing seek: {} -> {}", event.target, event.origin);
        media.set_current_time(event.origin);
        self.schedule_guard_release(ticket);

        UndoOutcome::Restored {
            position: event.origin,
            from: event.target,
        }
    }

    fn schedule_guard_release(&self, ticket: GuardTicket) {
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.config.settle_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut state = inner.state.lock();
            if !state.guard.release(ticket) {
                debug!("Undo settled after teardown, ignoring");
            } else if !state.guard.is_active() {
                debug!("Undo completed");
            }
        });
    }

    // ============ Inspection ============

    /// Copy of the current history, oldest first
    pub fn history(&self) -> Vec<SeekEvent> {
        self.inner.state.lock().history.iter().copied().collect()
    }

    pub fn history_len(&self) -> usize {
        self.inner.state.lock().history.len()
    }

    pub fn scrub_state(&self) -> ScrubState {
        self.inner.state.lock().classifier.state()
    }

    pub fn is_scrubbing(&self) -> bool {
        self.inner.state.lock().classifier.is_scrubbing()
    }

    /// Whether an undo is still inside its settle window
    pub fn is_programmatic_seek(&self) -> bool {
        self.inner.state.lock().guard.is_active()
    }

    /// Wait until every queued persistence write has been attempted
    pub async fn flush_persistence(&self) {
        let (tx, rx) = oneshot::channel();
        self.send_persist(PersistCommand::Flush(tx));
        let _ = rx.await;
    }

    fn send_persist(&self, command: PersistCommand) {
        if self.inner.persist_tx.send(command).is_err() {
            warn!("Persistence writer stopped, history kept in memory only");
        }
    }
}

/// Persistence writer: applies saves and clears in order
async fn run_persistence(
    mut persist_rx: mpsc::UnboundedReceiver<PersistCommand>,
    store: Arc<dyn SeekStore>,
    identity: Arc<dyn SessionIdentity>,
) {
    let mut session_id: Option<SessionId> = None;

    while let Some(command) = persist_rx.recv().await {
        let command = match command {
            PersistCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            PersistCommand::After(previous) => {
                let _ = previous.await;
                continue;
            }
            command => command,
        };

        let id = match session_id {
            Some(id) => id,
            None => match identity.current_session_id().await {
                Ok(Some(id)) => {
                    session_id = Some(id);
                    id
                }
                Ok(None) => {
                    warn!("Host returned no session id, seek history not persisted");
                    continue;
                }
                Err(e) => {
                    error!("Failed to get session id: {}", e);
                    continue;
                }
            },
        };

        match command {
            PersistCommand::Save(records) => {
                if let Err(e) = storage::save_history(store.as_ref(), id, &records).await {
                    error!("Failed to persist seek history for session {}: {}", id, e);
                }
            }
            PersistCommand::Clear => storage::clear_history(store.as_ref(), id).await,
            PersistCommand::Flush(_) | PersistCommand::After(_) => {}
        }
    }

    debug!("Session persistence channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::simulated::{SimulatedMedia, SimulatedProgressBar};
    use crate::storage::{MemoryStore, StorageError, history_key};
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl SeekStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<StoredSeek>>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }

        async fn set(&self, _key: &str, _value: &[StoredSeek]) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    struct Fixture {
        session: Session,
        store: Arc<MemoryStore>,
        media: Arc<SimulatedMedia>,
        _progress: Arc<SimulatedProgressBar>,
    }

    fn attached_session(position: f64) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(
            SessionConfig::default(),
            store.clone(),
            Arc::new(FixedIdentity(Some(SessionId(1)))),
        );
        let media = Arc::new(SimulatedMedia::new(position));
        let progress = Arc::new(SimulatedProgressBar::new());

        let media_dyn: Arc<dyn MediaElement> = media.clone();
        let progress_dyn: Arc<dyn ProgressControl> = progress.clone();
        assert_eq!(
            session.attach(&media_dyn, Some(&progress_dyn)),
            AttachMode::Full
        );

        Fixture {
            session,
            store,
            media,
            _progress: progress,
        }
    }

    fn scrub(fixture: &Fixture, to: f64) -> Classification {
        fixture.session.pointer_down();
        fixture.media.advance_to(to);
        fixture.session.seek_started();
        fixture.session.seek_finished()
    }

    /// Deliver the seek signals a real element fires after an assignment
    fn settle_signals(fixture: &Fixture) -> Classification {
        fixture.session.seek_started();
        fixture.session.seek_finished()
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrub_records_origin_and_target() {
        let fixture = attached_session(30.0);

        let classification = scrub(&fixture, 75.0);
        assert!(matches!(classification, Classification::Scrub(_)));

        let history = fixture.session.history();
        assert_eq!(history.len(), 1);
        assert_eq!((history[0].origin, history[0].target), (30.0, 75.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_seek_is_not_recorded() {
        let fixture = attached_session(10.0);

        fixture.media.advance_to(15.0);
        fixture.session.seek_started();
        let classification = fixture.session.seek_finished();

        assert_eq!(
            classification,
            Classification::Other(OtherReason::NotArmed)
        );
        assert_eq!(fixture.session.history_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_round_trip() {
        let fixture = attached_session(10.0);
        scrub(&fixture, 50.0);
        fixture.media.advance_to(60.0);
        scrub(&fixture, 120.0);

        let outcome = fixture.session.undo();
        assert_eq!(
            outcome,
            UndoOutcome::Restored {
                position: 60.0,
                from: 120.0
            }
        );
        assert_eq!(fixture.media.current_time(), 60.0);

        let history = fixture.session.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].origin, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_on_empty_history_is_noop() {
        let fixture = attached_session(10.0);
        assert_eq!(fixture.session.undo(), UndoOutcome::Empty);
        assert!(fixture.media.assignments().is_empty());
        assert!(!fixture.session.is_programmatic_seek());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_seek_is_not_recaptured() {
        let fixture = attached_session(10.0);
        scrub(&fixture, 90.0);

        fixture.session.undo();
        assert!(fixture.session.is_programmatic_seek());

        // A press on the bar during the settle window cannot arm either
        assert_eq!(
            fixture.session.pointer_down(),
            Classification::Other(OtherReason::Programmatic)
        );
        assert_eq!(
            settle_signals(&fixture),
            Classification::Other(OtherReason::Programmatic)
        );
        assert_eq!(fixture.session.history_len(), 0);

        tokio::time::sleep(DEFAULT_SETTLE_DELAY + Duration::from_millis(1)).await;
        assert!(!fixture.session.is_programmatic_seek());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_undo_walks_back_and_exhausts() {
        let fixture = attached_session(0.0);
        for (from, to) in [(0.0, 100.0), (100.0, 200.0), (200.0, 300.0), (300.0, 400.0)] {
            fixture.media.advance_to(from);
            scrub(&fixture, to);
        }
        assert_eq!(fixture.session.history_len(), 3);

        let mut positions = Vec::new();
        while let UndoOutcome::Restored { position, .. } = fixture.session.undo() {
            positions.push(position);
            settle_signals(&fixture);
        }

        // The 0 -> 100 scrub was evicted
        assert_eq!(positions, vec![300.0, 200.0, 100.0]);
        assert_eq!(fixture.session.undo(), UndoOutcome::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_undos_keep_guard_until_last_settles() {
        let fixture = attached_session(0.0);
        scrub(&fixture, 100.0);
        fixture.media.advance_to(150.0);
        scrub(&fixture, 300.0);

        fixture.session.undo();
        tokio::time::sleep(Duration::from_millis(60)).await;
        fixture.session.undo();

        // First undo's settle delay has expired, second is still in flight
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fixture.session.is_programmatic_seek());
        assert_eq!(
            settle_signals(&fixture),
            Classification::Other(OtherReason::Programmatic)
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fixture.session.is_programmatic_seek());
        assert_eq!(fixture.media.assignments(), vec![150.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_mid_scrub_emits_nothing() {
        let fixture = attached_session(20.0);
        fixture.session.pointer_down();
        fixture.session.seek_started();
        assert!(fixture.session.is_scrubbing());

        assert!(fixture.session.teardown());
        assert!(!fixture.session.is_scrubbing());
        assert_eq!(
            fixture.session.seek_finished(),
            Classification::Other(OtherReason::Detached)
        );
        assert_eq!(fixture.session.history_len(), 0);
        assert!(!fixture.session.teardown(), "second teardown is a no-op");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_timer_after_teardown_does_not_touch_new_guard() {
        let fixture = attached_session(0.0);
        scrub(&fixture, 100.0);
        fixture.session.undo();
        fixture.session.teardown();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let media_dyn: Arc<dyn MediaElement> = fixture.media.clone();
        let progress = Arc::new(SimulatedProgressBar::new());
        let progress_dyn: Arc<dyn ProgressControl> = progress.clone();
        fixture.session.attach(&media_dyn, Some(&progress_dyn));
        scrub(&fixture, 200.0);
        fixture.session.undo();

        // The old ticket fires at 100ms and must not clear the new undo's guard
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fixture.session.is_programmatic_seek());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fixture.session.is_programmatic_seek());
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_attach_never_scrubs() {
        let session = Session::new(
            SessionConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(FixedIdentity(Some(SessionId(2)))),
        );
        let media = Arc::new(SimulatedMedia::new(5.0));
        let media_dyn: Arc<dyn MediaElement> = media.clone();
        assert_eq!(session.attach(&media_dyn, None), AttachMode::Degraded);

        assert_eq!(
            session.pointer_down(),
            Classification::Other(OtherReason::NoProgressControl)
        );
        media.advance_to(65.0);
        session.seek_started();
        session.seek_finished();
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_without_media_keeps_history() {
        let fixture = attached_session(0.0);
        scrub(&fixture, 100.0);
        fixture.media.disconnect();

        assert_eq!(fixture.session.undo(), UndoOutcome::Detached);
        assert_eq!(fixture.session.history_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_persisted_and_cleared() {
        let fixture = attached_session(0.0);
        scrub(&fixture, 100.0);
        fixture.session.flush_persistence().await;

        let key = history_key(SessionId(1));
        let stored = fixture.store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!((stored[0].origin, stored[0].target), (0.0, 100.0));

        fixture.session.undo();
        fixture.session.flush_persistence().await;
        assert!(fixture.store.get(&key).await.unwrap().unwrap().is_empty());

        fixture.session.teardown();
        fixture.session.flush_persistence().await;
        assert!(fixture.store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_does_not_fail_record() {
        let session = Session::new(
            SessionConfig::default(),
            Arc::new(FailingStore),
            Arc::new(FixedIdentity(Some(SessionId(3)))),
        );
        session.record(SeekEvent::new(1.0, 2.0));
        session.record(SeekEvent::new(3.0, 4.0));
        session.flush_persistence().await;

        assert_eq!(session.history_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_session_id_skips_persistence() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(
            SessionConfig::default(),
            store.clone(),
            Arc::new(FixedIdentity(None)),
        );
        session.record(SeekEvent::new(1.0, 2.0));
        session.flush_persistence().await;

        assert_eq!(session.history_len(), 1);
        assert!(store.is_empty());
    }
}
