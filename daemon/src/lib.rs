//! keyglance-daemon: shows the focused app's keyboard shortcuts on demand
//!
//! - Global modifier/key listening via CGEventTap
//! - Trigger state machine for hold, double-tap and custom hotkey gestures
//! - Menu bar shortcut extraction through the accessibility API
//! - IPC server for the status-bar app that renders the overlay

pub mod catalog;
pub mod config;
pub mod events;
pub mod hotkey;
pub mod ipc;
pub mod lifecycle;
pub mod orchestrator;
pub mod pipeline;
pub mod platform;
pub mod preferences;
pub mod state;
