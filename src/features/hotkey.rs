//! Undo hotkey
//!
//! A hotkey is a set of modifiers plus one main key, written as
//! `Ctrl+Shift+Z`. Valid undo hotkeys carry at least one modifier and are not
//! one of the browser's reserved combinations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hotkey used when none is configured
pub const DEFAULT_HOTKEY: &str = "Ctrl+Z";

/// Combinations the browser keeps for itself
pub const RESERVED_HOTKEYS: &[&str] = &[
    "Ctrl+T",
    "Ctrl+W",
    "Ctrl+N",
    "Ctrl+Shift+N",
    "Ctrl+Tab",
    "Ctrl+Shift+Tab",
    "Ctrl+Q",
    "Command+T",
    "Command+W",
    "Command+N",
    "Command+Q",
];

/// Key names that are modifiers on their own
const MODIFIER_KEYS: &[&str] = &["Control", "Alt", "Shift", "Meta"];

/// Set of modifier keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModifierSet {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub command: bool,
}

impl ModifierSet {
    /// True if at least one modifier is held
    pub fn any(&self) -> bool {
        self.ctrl || self.alt || self.shift || self.command
    }
}

/// Errors from parsing or validating a hotkey
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyError {
    #[error("Please enter a hotkey combination")]
    Empty,
    #[error("Hotkey has no main key")]
    MissingKey,
    #[error("Hotkey has more than one main key: {0}")]
    MultipleKeys(String),
    #[error(
        "Hotkey should include at least one modifier key (Ctrl, Alt, Shift, or Command) to avoid conflicts"
    )]
    MissingModifier,
    #[error("{0} is reserved by the browser and cannot be used")]
    Reserved(String),
}

/// A keyboard shortcut consisting of modifiers and a key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hotkey {
    pub modifiers: ModifierSet,
    /// Main key, single characters upper-cased (`Z`, `F5`, `ArrowLeft`)
    pub key: String,
}

impl Default for Hotkey {
    fn default() -> Self {
        Self::new("Z").ctrl()
    }
}

impl Hotkey {
    /// Create a hotkey with no modifiers
    pub fn new(key: &str) -> Self {
        Self {
            modifiers: ModifierSet::default(),
            key: normalize_key(key),
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.modifiers.ctrl = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.modifiers.alt = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }

    pub fn command(mut self) -> Self {
        self.modifiers.command = true;
        self
    }

    /// Build a hotkey from a captured key event
    ///
    /// Returns `None` while only a modifier key is pressed.
    pub fn from_key_event(modifiers: ModifierSet, key: &str) -> Option<Self> {
        if key.is_empty() || MODIFIER_KEYS.contains(&key) {
            return None;
        }
        Some(Self {
            modifiers,
            key: normalize_key(key),
        })
    }

    /// Parse `Mod+Mod+Key` without applying the undo-hotkey rules
    pub fn parse(text: &str) -> Result<Self, HotkeyError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(HotkeyError::Empty);
        }

        // `+` as the main key is written `Ctrl++`
        let (head, mut key) = if text == "+" {
            ("", Some("+".to_string()))
        } else if let Some(head) = text.strip_suffix("++") {
            (head, Some("+".to_string()))
        } else {
            (text, None)
        };

        let mut modifiers = ModifierSet::default();
        let parts = head.split('+').map(str::trim).filter(|_| !head.is_empty());
        for part in parts {
            match part.to_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "option" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "command" | "cmd" | "meta" => modifiers.command = true,
                "" => return Err(HotkeyError::MissingKey),
                _ => {
                    if key.is_some() {
                        return Err(HotkeyError::MultipleKeys(text.to_string()));
                    }
                    key = Some(normalize_key(part));
                }
            }
        }

        let key = key.ok_or(HotkeyError::MissingKey)?;
        Ok(Self { modifiers, key })
    }

    /// Check the undo-hotkey rules: a modifier is required and reserved
    /// browser shortcuts are rejected
    pub fn validate(&self) -> Result<(), HotkeyError> {
        if !self.modifiers.any() {
            return Err(HotkeyError::MissingModifier);
        }

        let display = self.display();
        if RESERVED_HOTKEYS.contains(&display.as_str()) {
            return Err(HotkeyError::Reserved(display));
        }
        Ok(())
    }

    /// Format as `Ctrl+Alt+Shift+Command+Key`
    pub fn display(&self) -> String {
        let mut parts = Vec::new();

        if self.modifiers.ctrl {
            parts.push("Ctrl");
        }
        if self.modifiers.alt {
            parts.push("Alt");
        }
        if self.modifiers.shift {
            parts.push("Shift");
        }
        if self.modifiers.command {
            parts.push("Command");
        }

        parts.push(&self.key);
        parts.join("+")
    }
}

fn normalize_key(key: &str) -> String {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_uppercase().collect(),
        _ => key.to_string(),
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Parses and validates
impl FromStr for Hotkey {
    type Err = HotkeyError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let hotkey = Self::parse(text)?;
        hotkey.validate()?;
        Ok(hotkey)
    }
}

impl TryFrom<String> for Hotkey {
    type Error = HotkeyError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<Hotkey> for String {
    fn from(hotkey: Hotkey) -> Self {
        hotkey.display()
    }
}
