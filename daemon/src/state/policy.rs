//! Stateless activation policy for the simple, single-event cases

use crate::hotkey::{key_codes, KeyEvent};
use crate::preferences::{Preferences, Trigger};

/// What the core should do in response to input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationDecision {
    Activate,
    Hide,
    Ignore,
}

/// Decide the custom-hotkey and escape-to-hide cases for one event
pub fn evaluate(event: &KeyEvent, preferences: &Preferences) -> ActivationDecision {
    if preferences.trigger == Trigger::CustomHotkey
        && event.is_key_down
        && preferences
            .custom_hotkeys
            .iter()
            .any(|binding| binding.matches(event))
    {
        return ActivationDecision::Activate;
    }

    if is_escape_to_hide(event, preferences) {
        return ActivationDecision::Hide;
    }

    ActivationDecision::Ignore
}

/// Escape key-down with auto-hide enabled, in any trigger mode
pub fn is_escape_to_hide(event: &KeyEvent, preferences: &Preferences) -> bool {
    preferences.auto_hide_on_esc
        && event.is_key_down
        && !event.is_modifier_change
        && event.key_code == key_codes::ESCAPE
}
