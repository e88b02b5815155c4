//! Scripted replay of page activity
//!
//! Drives simulated tabs through a JSON script so the whole pipeline
//! (detection, scrub classification, hotkey dispatch, undo, persistence)
//! can be exercised without a browser. The position assignment of an undo is
//! reported back to the page as a seek, like a real player would.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::dispatch::{DispatchOutcome, ForegroundTab, TabInfo, UndoDispatcher};
use crate::features::{Hotkey, HotkeyError, Settings};
use crate::lifecycle::PageMonitor;
use crate::page::simulated::{SimulatedMedia, SimulatedPage};
use crate::page::{PageDocument, PageSignal};
use crate::session::{Session, SessionConfig, SessionId, SessionRegistry};
use crate::storage::SeekStore;

fn default_tab() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

/// One scripted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Open a tab and bring it to the foreground
    OpenTab {
        #[serde(default = "default_tab")]
        tab: u64,
        url: String,
    },
    /// Single-page-app navigation
    Navigate {
        #[serde(default = "default_tab")]
        tab: u64,
        url: String,
    },
    /// Insert a player (replacing any existing one)
    MountPlayer {
        #[serde(default = "default_tab")]
        tab: u64,
        #[serde(default)]
        position: f64,
        #[serde(default = "default_true")]
        progress_bar: bool,
    },
    UnmountPlayer {
        #[serde(default = "default_tab")]
        tab: u64,
    },
    /// Playback moves the playhead without seeking
    Play {
        #[serde(default = "default_tab")]
        tab: u64,
        to: f64,
    },
    /// Drag on the progress bar
    Scrub {
        #[serde(default = "default_tab")]
        tab: u64,
        to: f64,
    },
    /// Seek without touching the progress bar (arrow keys, chapter links)
    KeyboardSeek {
        #[serde(default = "default_tab")]
        tab: u64,
        to: f64,
    },
    /// Change the foreground tab; `null` for none
    Focus { tab: Option<u64> },
    /// Key press seen by the host
    Key { hotkey: String },
    /// Named command fired by the host
    Command { name: String },
    Wait { ms: u64 },
    CloseTab {
        #[serde(default = "default_tab")]
        tab: u64,
    },
}

/// A replay script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = std::fs::read_to_string(path).map_err(|e| ReplayError::Io(e.to_string()))?;
        Self::from_json(&text).map_err(|e| ReplayError::Parse(e.to_string()))
    }

    /// Built-in scenario: two scrubs, a keyboard seek, then two undos
    pub fn demo() -> Self {
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string();
        Self {
            steps: vec![
                Step::OpenTab { tab: 1, url },
                Step::Wait { ms: 800 },
                Step::MountPlayer {
                    tab: 1,
                    position: 0.0,
                    progress_bar: true,
                },
                Step::Wait { ms: 1_200 },
                Step::Play { tab: 1, to: 42.0 },
                Step::Scrub { tab: 1, to: 180.0 },
                Step::Play { tab: 1, to: 195.0 },
                Step::Scrub { tab: 1, to: 60.0 },
                Step::KeyboardSeek { tab: 1, to: 65.0 },
                Step::Key {
                    hotkey: "Ctrl+Z".to_string(),
                },
                Step::Wait { ms: 150 },
                Step::Command {
                    name: "undo-seek".to_string(),
                },
                Step::Wait { ms: 150 },
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read script: {0}")]
    Io(String),
    #[error("Failed to parse script: {0}")]
    Parse(String),
    #[error("Tab {0} is not open")]
    UnknownTab(u64),
    #[error("Tab {0} is already open")]
    TabExists(u64),
    #[error("Tab {0} has no player")]
    NoPlayer(u64),
    #[error("Invalid hotkey in script: {0}")]
    Hotkey(#[from] HotkeyError),
}

struct Tab {
    page: Arc<SimulatedPage>,
    monitor: PageMonitor,
}

/// Runs scripts against simulated tabs
pub struct Replayer {
    settings: Settings,
    registry: SessionRegistry,
    foreground: Arc<ForegroundTab>,
    dispatcher: UndoDispatcher,
    tabs: HashMap<SessionId, Tab>,
}

impl Replayer {
    /// Must be called inside a tokio runtime
    pub fn new(settings: Settings, store: Arc<dyn SeekStore>) -> Self {
        let registry = SessionRegistry::new(store);
        let foreground = Arc::new(ForegroundTab::new());
        let dispatcher =
            UndoDispatcher::new(foreground.clone(), Arc::new(registry.clone()), &settings);
        Self {
            settings,
            registry,
            foreground,
            dispatcher,
            tabs: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn session(&self, tab: u64) -> Option<Session> {
        self.registry.get(SessionId(tab))
    }

    pub fn media(&self, tab: u64) -> Option<Arc<SimulatedMedia>> {
        self.tabs
            .get(&SessionId(tab))
            .and_then(|tab| tab.page.media())
    }

    pub fn open_tabs(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.tabs.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Run every step, stopping at the first error
    pub async fn run(&mut self, script: &Script) -> Result<(), ReplayError> {
        info!("Replaying {} steps", script.steps.len());
        for (index, step) in script.steps.iter().enumerate() {
            debug!("Step {}: {:?}", index + 1, step);
            self.apply(step).await?;
        }
        self.flush().await;
        Ok(())
    }

    /// Wait for every open session's pending writes
    pub async fn flush(&self) {
        for id in self.open_tabs() {
            if let Some(session) = self.registry.get(id) {
                session.flush_persistence().await;
            }
        }
    }

    pub async fn apply(&mut self, step: &Step) -> Result<(), ReplayError> {
        match step {
            Step::OpenTab { tab, url } => self.open_tab(*tab, url)?,
            Step::Navigate { tab, url } => {
                let entry = self.tab(*tab)?;
                entry.page.navigate(url.as_str());
                entry.monitor.handle(PageSignal::Mutation);
                if self.foreground.get().is_some_and(|info| info.id.0 == *tab) {
                    self.focus(Some(*tab))?;
                }
            }
            Step::MountPlayer {
                tab,
                position,
                progress_bar,
            } => {
                let entry = self.tab(*tab)?;
                entry.page.mount_player(*position, *progress_bar);
                entry.monitor.handle(PageSignal::Mutation);
            }
            Step::UnmountPlayer { tab } => {
                let entry = self.tab(*tab)?;
                entry.page.unmount_player();
                entry.monitor.handle(PageSignal::Mutation);
            }
            Step::Play { tab, to } => {
                self.player(*tab)?.advance_to(*to);
            }
            Step::Scrub { tab, to } => {
                let media = self.player(*tab)?;
                let monitor = &self.tab(*tab)?.monitor;
                monitor.handle(PageSignal::PointerDown);
                media.advance_to(*to);
                monitor.handle(PageSignal::SeekStarted);
                monitor.handle(PageSignal::SeekFinished);
            }
            Step::KeyboardSeek { tab, to } => {
                let media = self.player(*tab)?;
                let monitor = &self.tab(*tab)?.monitor;
                media.advance_to(*to);
                monitor.handle(PageSignal::SeekStarted);
                monitor.handle(PageSignal::SeekFinished);
            }
            Step::Focus { tab } => self.focus(*tab)?,
            Step::Key { hotkey } => {
                let pressed = Hotkey::parse(hotkey)?;
                let before = self.assignment_counts();
                let outcome = self.dispatcher.on_key(&pressed).await;
                self.report_undo(outcome, &before);
            }
            Step::Command { name } => {
                let before = self.assignment_counts();
                let outcome = self.dispatcher.on_command(name).await;
                self.report_undo(outcome, &before);
            }
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::CloseTab { tab } => {
                let id = SessionId(*tab);
                let entry = self.tabs.remove(&id).ok_or(ReplayError::UnknownTab(*tab))?;
                entry.monitor.teardown();
                self.registry.close_tab(id).await;
                if self.foreground.get().is_some_and(|info| info.id == id) {
                    self.foreground.set(None);
                }
            }
        }
        Ok(())
    }

    fn open_tab(&mut self, tab: u64, url: &str) -> Result<(), ReplayError> {
        let id = SessionId(tab);
        if self.tabs.contains_key(&id) {
            return Err(ReplayError::TabExists(tab));
        }

        let page = Arc::new(SimulatedPage::new(url));
        let session = self
            .registry
            .open(id, SessionConfig::from(&self.settings));
        let monitor = PageMonitor::from_settings(page.clone(), session, &self.settings);
        monitor.start();

        self.tabs.insert(id, Tab { page, monitor });
        self.focus(Some(tab))
    }

    fn focus(&self, tab: Option<u64>) -> Result<(), ReplayError> {
        let info = match tab {
            Some(tab) => {
                let entry = self.tab(tab)?;
                Some(TabInfo {
                    id: SessionId(tab),
                    url: Some(entry.page.location()),
                })
            }
            None => None,
        };
        self.foreground.set(info);
        Ok(())
    }

    fn tab(&self, tab: u64) -> Result<&Tab, ReplayError> {
        self.tabs
            .get(&SessionId(tab))
            .ok_or(ReplayError::UnknownTab(tab))
    }

    fn player(&self, tab: u64) -> Result<Arc<SimulatedMedia>, ReplayError> {
        self.tab(tab)?
            .page
            .media()
            .ok_or(ReplayError::NoPlayer(tab))
    }

    fn assignment_counts(&self) -> HashMap<SessionId, usize> {
        self.tabs
            .iter()
            .filter_map(|(id, tab)| tab.page.media().map(|media| (*id, media.assignments().len())))
            .collect()
    }

    /// Feed the seek caused by an undo back to the page
    fn report_undo(&self, outcome: Option<DispatchOutcome>, before: &HashMap<SessionId, usize>) {
        let Some(DispatchOutcome::Delivered(id)) = outcome else {
            return;
        };
        let Some(tab) = self.tabs.get(&id) else {
            return;
        };
        let moved = tab.page.media().is_some_and(|media| {
            media.assignments().len() > before.get(&id).copied().unwrap_or_default()
        });
        if moved {
            tab.monitor.handle(PageSignal::SeekStarted);
            tab.monitor.handle(PageSignal::SeekFinished);
        }
    }
}
