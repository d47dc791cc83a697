//! Key event source for global keyboard listening
//!
//! Uses macOS CGEventTap to observe key and modifier events system-wide
//! and hands them to the trigger state machine.

mod keys;
mod listener;

pub use keys::{key_codes, KeyEvent, Modifier, ModifierState};
pub use listener::{HotkeyError, HotkeyEvent, HotkeyListener};
