//! Modifier key definitions and normalized key events
//!
//! Provides the modifier set carried by every key event, the designated
//! gesture modifier, and the handful of macOS virtual key codes the core
//! needs to recognise.

use serde::{Deserialize, Serialize};

/// macOS virtual key codes (Carbon `kVK_*`)
pub mod key_codes {
    pub const ESCAPE: u16 = 53;
    pub const COMMAND: u16 = 55;
    pub const RIGHT_COMMAND: u16 = 54;
    pub const SHIFT: u16 = 56;
    pub const RIGHT_SHIFT: u16 = 60;
    pub const OPTION: u16 = 58;
    pub const RIGHT_OPTION: u16 = 61;
    pub const CONTROL: u16 = 59;
    pub const RIGHT_CONTROL: u16 = 62;
}

/// Modifier key flag masks from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub mod flags {
    use core_graphics::event::CGEventFlags;

    /// Control key modifier flag
    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
    /// Option/Alt key modifier flag
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    /// Command key modifier flag
    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
    /// Shift key modifier flag
    pub const SHIFT: CGEventFlags = CGEventFlags::CGEventFlagShift;
}

/// A single modifier key, used to designate the gesture key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Command,
    Option,
    Control,
    Shift,
}

impl Default for Modifier {
    fn default() -> Self {
        Self::Command
    }
}

impl std::fmt::Display for Modifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modifier::Command => write!(f, "command"),
            Modifier::Option => write!(f, "option"),
            Modifier::Control => write!(f, "control"),
            Modifier::Shift => write!(f, "shift"),
        }
    }
}

/// The set of modifier keys held during an event
///
/// Equality is set equality: two states are equal exactly when the same
/// modifiers are held, independent of the order they were pressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierState {
    /// Command key is held
    pub command: bool,
    /// Option/Alt key is held
    pub option: bool,
    /// Control key is held
    pub control: bool,
    /// Shift key is held
    pub shift: bool,
}

impl ModifierState {
    /// Create a new ModifierState from CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_flags(raw: core_graphics::event::CGEventFlags) -> Self {
        Self {
            command: raw.contains(flags::COMMAND),
            option: raw.contains(flags::OPTION),
            control: raw.contains(flags::CONTROL),
            shift: raw.contains(flags::SHIFT),
        }
    }

    /// A state holding exactly one modifier
    pub fn only(modifier: Modifier) -> Self {
        let mut state = Self::default();
        state.set(modifier, true);
        state
    }

    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        !self.command && !self.option && !self.control && !self.shift
    }

    /// Check if the given modifier is held, regardless of the others
    pub fn contains(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Command => self.command,
            Modifier::Option => self.option,
            Modifier::Control => self.control,
            Modifier::Shift => self.shift,
        }
    }

    /// Check if the given modifier is the only one held
    pub fn is_only(&self, modifier: Modifier) -> bool {
        *self == Self::only(modifier)
    }

    fn set(&mut self, modifier: Modifier, held: bool) {
        match modifier {
            Modifier::Command => self.command = held,
            Modifier::Option => self.option = held,
            Modifier::Control => self.control = held,
            Modifier::Shift => self.shift = held,
        }
    }
}

/// A normalized keyboard event as delivered by the event source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// macOS virtual key code
    pub key_code: u16,
    /// Modifiers held when the event was generated
    pub modifiers: ModifierState,
    /// Key-down (true) or key-up (false); for modifier changes, whether any
    /// modifier remains held
    pub is_key_down: bool,
    /// The event reports a modifier press/release rather than a key
    pub is_modifier_change: bool,
}

impl KeyEvent {
    pub fn key_down(key_code: u16, modifiers: ModifierState) -> Self {
        Self {
            key_code,
            modifiers,
            is_key_down: true,
            is_modifier_change: false,
        }
    }

    pub fn key_up(key_code: u16, modifiers: ModifierState) -> Self {
        Self {
            key_code,
            modifiers,
            is_key_down: false,
            is_modifier_change: false,
        }
    }

    pub fn modifiers_changed(key_code: u16, modifiers: ModifierState) -> Self {
        Self {
            key_code,
            modifiers,
            is_key_down: !modifiers.is_empty(),
            is_modifier_change: true,
        }
    }
}
