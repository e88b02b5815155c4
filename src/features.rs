//! User-facing configuration
//!
//! The undo hotkey and the settings file it lives in.

pub mod hotkey;
pub mod settings;

pub use hotkey::{DEFAULT_HOTKEY, Hotkey, HotkeyError, ModifierSet, RESERVED_HOTKEYS};
pub use settings::{Settings, SettingsError};
