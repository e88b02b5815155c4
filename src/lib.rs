//! Seekback - undo accidental progress-bar seeks
//!
//! A scrub on a video page's progress bar is classified apart from every
//! other position change (playback, keyboard seeks, the player correcting
//! itself) and kept in a short per-session history. Pressing the undo
//! hotkey moves the playhead back to where the latest scrub started.
//!
//! - [`seek`]: scrub classifier and bounded history
//! - [`session`]: per-tab sessions, undo and the programmatic-seek guard
//! - [`lifecycle`]: player detection and page-change teardown
//! - [`dispatch`]: routing the hotkey to the foreground tab
//! - [`storage`]: history persistence
//! - [`features`]: hotkey and settings
//! - [`replay`]: scripted simulation used by the binary

pub mod dispatch;
pub mod features;
pub mod lifecycle;
pub mod page;
pub mod replay;
pub mod seek;
pub mod session;
pub mod storage;

pub use dispatch::{DispatchOutcome, UndoDispatcher};
pub use features::{Hotkey, Settings};
pub use lifecycle::PageMonitor;
pub use seek::{Classification, SeekEvent};
pub use session::{Session, SessionId, SessionRegistry, UndoOutcome};
