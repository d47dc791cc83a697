//! Trigger preferences and their write-boundary validation
//!
//! The state machine caches a `Preferences` snapshot by value and assumes
//! it already passed `validate()`.

mod store;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::hotkey::{KeyEvent, Modifier, ModifierState};

pub use store::PreferencesStore;

/// Which gesture activates the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Hold the designated modifier alone for `hold_duration_seconds`
    #[serde(alias = "holdCommand")]
    HoldModifier,
    /// Tap the designated modifier twice in quick succession
    #[serde(alias = "commandDoubleTap")]
    DoubleTapModifier,
    /// Press one of `custom_hotkeys`
    #[serde(alias = "customShortcut", alias = "globalHotkey")]
    CustomHotkey,
}

impl Default for Trigger {
    fn default() -> Self {
        Self::HoldModifier
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::HoldModifier => write!(f, "hold_modifier"),
            Trigger::DoubleTapModifier => write!(f, "double_tap_modifier"),
            Trigger::CustomHotkey => write!(f, "custom_hotkey"),
        }
    }
}

/// An explicit key code + modifier set that activates on key-down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HotkeyBinding {
    pub key_code: u16,
    pub modifiers: ModifierState,
}

impl HotkeyBinding {
    pub fn new(key_code: u16, modifiers: ModifierState) -> Self {
        Self { key_code, modifiers }
    }

    /// Exact key code and exact modifier set
    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.key_code == event.key_code && self.modifiers == event.modifiers
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub trigger: Trigger,
    /// Modifier watched by the hold and double-tap gestures
    pub trigger_modifier: Modifier,
    pub custom_hotkeys: Vec<HotkeyBinding>,
    pub hold_duration_seconds: f64,
    pub auto_hide_on_esc: bool,
    pub auto_hide_on_app_switch: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            trigger: Trigger::HoldModifier,
            trigger_modifier: Modifier::Command,
            custom_hotkeys: Vec::new(),
            hold_duration_seconds: DEFAULT_HOLD_DURATION_SECONDS,
            auto_hide_on_esc: true,
            auto_hide_on_app_switch: true,
        }
    }
}

/// Rejections at the preferences write boundary
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PreferencesError {
    #[error("hotkey binding for key code {key_code} has no modifiers")]
    InvalidHotkey { key_code: u16 },

    #[error("hotkey binding for key code {key_code} is listed more than once")]
    DuplicateHotkey { key_code: u16 },

    #[error("hold duration must be a positive number of seconds, got {0}")]
    InvalidHoldDuration(f64),

    #[error("failed to persist preferences: {0}")]
    Persist(String),
}

impl PreferencesError {
    /// Stable code reported over IPC
    pub fn code(&self) -> &'static str {
        match self {
            PreferencesError::InvalidHotkey { .. } => "invalid_hotkey",
            PreferencesError::DuplicateHotkey { .. } => "duplicate_hotkey",
            PreferencesError::InvalidHoldDuration(_) => "invalid_hold_duration",
            PreferencesError::Persist(_) => "persist_failed",
        }
    }
}

/// Longest accepted hold before activation
pub const MAX_HOLD_DURATION_SECONDS: f64 = 60.0;

const DEFAULT_HOLD_DURATION_SECONDS: f64 = 1.0;

impl Preferences {
    pub fn validate(&self) -> Result<(), PreferencesError> {
        if !self.hold_duration_seconds.is_finite()
            || self.hold_duration_seconds <= 0.0
            || self.hold_duration_seconds > MAX_HOLD_DURATION_SECONDS
        {
            return Err(PreferencesError::InvalidHoldDuration(self.hold_duration_seconds));
        }

        let mut seen = HashSet::with_capacity(self.custom_hotkeys.len());
        for binding in &self.custom_hotkeys {
            if binding.modifiers.is_empty() {
                return Err(PreferencesError::InvalidHotkey {
                    key_code: binding.key_code,
                });
            }
            if !seen.insert(*binding) {
                return Err(PreferencesError::DuplicateHotkey {
                    key_code: binding.key_code,
                });
            }
        }

        Ok(())
    }

    /// Unvalidated values that do not fit a `Duration` use the default
    pub fn hold_duration(&self) -> std::time::Duration {
        std::time::Duration::try_from_secs_f64(self.hold_duration_seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| std::time::Duration::from_secs_f64(DEFAULT_HOLD_DURATION_SECONDS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> ModifierState {
        ModifierState::only(Modifier::Command)
    }

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        assert_eq!(prefs.trigger, Trigger::HoldModifier);
        assert_eq!(prefs.trigger_modifier, Modifier::Command);
        assert!(prefs.auto_hide_on_esc);
        assert!(prefs.validate().is_ok());
    }

    #[test]
    fn test_binding_without_modifiers_is_rejected() {
        let prefs = Preferences {
            custom_hotkeys: vec![HotkeyBinding::new(8, ModifierState::default())],
            ..Default::default()
        };
        assert_eq!(prefs.validate(), Err(PreferencesError::InvalidHotkey { key_code: 8 }));
    }

    #[test]
    fn test_duplicate_bindings_are_rejected() {
        let prefs = Preferences {
            custom_hotkeys: vec![HotkeyBinding::new(8, command()), HotkeyBinding::new(8, command())],
            ..Default::default()
        };
        assert_eq!(prefs.validate(), Err(PreferencesError::DuplicateHotkey { key_code: 8 }));
    }

    #[test]
    fn test_same_key_with_different_modifiers_is_allowed() {
        let command_shift = ModifierState {
            command: true,
            shift: true,
            ..Default::default()
        };
        let prefs = Preferences {
            custom_hotkeys: vec![HotkeyBinding::new(8, command()), HotkeyBinding::new(8, command_shift)],
            ..Default::default()
        };
        assert!(prefs.validate().is_ok());
    }

    #[test]
    fn test_non_positive_hold_duration_is_rejected() {
        let prefs = Preferences {
            hold_duration_seconds: 0.0,
            ..Default::default()
        };
        assert!(matches!(prefs.validate(), Err(PreferencesError::InvalidHoldDuration(_))));
    }

    #[test]
    fn test_oversized_hold_duration_is_rejected() {
        let prefs = Preferences {
            hold_duration_seconds: 1e20,
            ..Default::default()
        };
        assert!(matches!(prefs.validate(), Err(PreferencesError::InvalidHoldDuration(_))));

        let at_limit = Preferences {
            hold_duration_seconds: MAX_HOLD_DURATION_SECONDS,
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_unrepresentable_hold_duration_falls_back_to_default() {
        for seconds in [1e20, f64::NAN, -3.0, 0.0] {
            let prefs = Preferences {
                hold_duration_seconds: seconds,
                ..Default::default()
            };
            assert_eq!(prefs.hold_duration(), std::time::Duration::from_secs(1));
        }
    }

    #[test]
    fn test_legacy_trigger_names_decode() {
        let json = r#"{"trigger":"commandDoubleTap","hold_duration_seconds":0.8}"#;
        let prefs: Preferences = serde_json::from_str(json).unwrap();
        assert_eq!(prefs.trigger, Trigger::DoubleTapModifier);
        assert_eq!(prefs.hold_duration_seconds, 0.8);
        assert!(prefs.auto_hide_on_app_switch);

        let legacy: Preferences = serde_json::from_str(r#"{"trigger":"globalHotkey"}"#).unwrap();
        assert_eq!(legacy.trigger, Trigger::CustomHotkey);
    }

    #[test]
    fn test_binding_matches_exact_modifier_set() {
        let binding = HotkeyBinding::new(8, command());
        assert!(binding.matches(&KeyEvent::key_down(8, command())));

        let extra_shift = ModifierState {
            command: true,
            shift: true,
            ..Default::default()
        };
        assert!(!binding.matches(&KeyEvent::key_down(8, extra_shift)));
        assert!(!binding.matches(&KeyEvent::key_down(9, command())));
    }
}
