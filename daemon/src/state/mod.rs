//! Trigger state machine and activation policy
//!
//! Turns raw key events into activation decisions:
//! - Hold: designated modifier held alone for the configured duration
//! - Double tap: designated modifier tapped twice within a short window
//! - Custom hotkey: exact key code + modifier set on key-down
//! - Escape hides the overlay in every mode

mod machine;
mod policy;
mod timer;

pub use machine::{State, TriggerStateMachine};
pub use policy::{evaluate, is_escape_to_hide, ActivationDecision};
pub use timer::{TimerHandle, TimerPurpose, TimerScheduler, TimerToken, TokioTimerScheduler};
