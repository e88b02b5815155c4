//! Undo trigger dispatch
//!
//! Host side of the hotkey: when the undo command fires (or the configured
//! hotkey is pressed), find the foreground tab, check that it is a playback
//! page, and send it an undo. Every way this can fall through is a silent
//! no-op for the user, logged with its own message.
//!
//! ```text
//! hotkey / "undo-seek" --> UndoDispatcher --TabQuery--> foreground tab
//!                                         --UndoTransport--> Session::undo
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::features::{Hotkey, Settings};
use crate::page::PlaybackPagePattern;
use crate::session::SessionId;

/// Command name bound to the undo hotkey
pub const UNDO_COMMAND: &str = "undo-seek";

/// A browser tab as seen by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: SessionId,
    pub url: Option<String>,
}

/// Reply from a session to an undo message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoAck {
    pub success: bool,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No session is listening in tab {0}")]
    NoReceiver(SessionId),
    #[error("Tab query failed: {0}")]
    TabQuery(String),
    #[error("Message transport failed: {0}")]
    Transport(String),
}

/// Looks up the foreground tab
#[async_trait]
pub trait TabQuery: Send + Sync {
    async fn active_tab(&self) -> Result<Option<TabInfo>, DispatchError>;
}

/// Delivers an undo message to a tab's session
#[async_trait]
pub trait UndoTransport: Send + Sync {
    async fn send_undo(&self, tab: SessionId) -> Result<UndoAck, DispatchError>;
}

/// What happened to one undo trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The session acknowledged the undo
    Delivered(SessionId),
    NoActiveTab,
    /// Foreground tab is not a playback page
    NotPlaybackPage,
    /// The session answered without success
    NotAcknowledged(SessionId),
    /// Tab query or transport failed
    Failed,
}

/// Turns hotkey presses into undo messages
pub struct UndoDispatcher {
    tabs: Arc<dyn TabQuery>,
    transport: Arc<dyn UndoTransport>,
    pattern: PlaybackPagePattern,
    hotkey: Hotkey,
}

impl UndoDispatcher {
    pub fn new(
        tabs: Arc<dyn TabQuery>,
        transport: Arc<dyn UndoTransport>,
        settings: &Settings,
    ) -> Self {
        info!(
            "Undo dispatcher ready, hotkey {}",
            settings.undo_hotkey.display()
        );
        Self {
            tabs,
            transport,
            pattern: settings.site.clone(),
            hotkey: settings.undo_hotkey.clone(),
        }
    }

    pub fn hotkey(&self) -> &Hotkey {
        &self.hotkey
    }

    /// Handle a named command; `None` for commands other than `undo-seek`
    pub async fn on_command(&self, command: &str) -> Option<DispatchOutcome> {
        if command != UNDO_COMMAND {
            debug!("Ignoring command {:?}", command);
            return None;
        }
        info!("Undo command received");
        Some(self.trigger().await)
    }

    /// Handle a key press; `None` unless it is the undo hotkey
    pub async fn on_key(&self, pressed: &Hotkey) -> Option<DispatchOutcome> {
        if *pressed != self.hotkey {
            return None;
        }
        self.on_command(UNDO_COMMAND).await
    }

    /// Send an undo to the foreground playback tab, if there is one
    pub async fn trigger(&self) -> DispatchOutcome {
        let tab = match self.tabs.active_tab().await {
            Ok(Some(tab)) => tab,
            Ok(None) => {
                info!("No active tab found");
                return DispatchOutcome::NoActiveTab;
            }
            Err(e) => {
                error!("Error handling undo command: {}", e);
                return DispatchOutcome::Failed;
            }
        };

        let is_playback_page = tab
            .url
            .as_deref()
            .is_some_and(|url| self.pattern.matches(url));
        if !is_playback_page {
            info!("Active tab is not a playback page");
            return DispatchOutcome::NotPlaybackPage;
        }

        match self.transport.send_undo(tab.id).await {
            Ok(ack) if ack.success => {
                info!("Undo command sent to tab {}", tab.id);
                DispatchOutcome::Delivered(tab.id)
            }
            Ok(_) => {
                warn!("Undo command failed or no response from tab {}", tab.id);
                DispatchOutcome::NotAcknowledged(tab.id)
            }
            Err(e) => {
                error!("Failed to send undo message: {}", e);
                DispatchOutcome::Failed
            }
        }
    }
}

/// Foreground-tab tracker fed by the host
#[derive(Debug, Default)]
pub struct ForegroundTab {
    tab: RwLock<Option<TabInfo>>,
}

impl ForegroundTab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tab: Option<TabInfo>) {
        *self.tab.write() = tab;
    }

    pub fn get(&self) -> Option<TabInfo> {
        self.tab.read().clone()
    }
}

#[async_trait]
impl TabQuery for ForegroundTab {
    async fn active_tab(&self) -> Result<Option<TabInfo>, DispatchError> {
        Ok(self.get())
    }
}
