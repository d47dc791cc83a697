//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.
//! Subscribed clients also receive `OverlayEvent` frames between responses.

use serde::{Deserialize, Serialize};

use crate::pipeline::ShowResult;
use crate::preferences::{Preferences, Trigger};

/// Requests from UI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Subscribe to overlay events
    Subscribe,

    /// Show the overlay for the focused app, as if triggered
    ShowOverlay,

    HideOverlay,

    GetPreferences,

    /// Validate, persist and apply new preferences
    SetPreferences { preferences: Preferences },
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Outcome of a show request
    ShowResult { result: ShowResult },

    Hidden,

    Preferences { preferences: Preferences },

    PreferencesUpdated,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether the global key listener is installed
    pub listener_running: bool,

    pub overlay_visible: bool,

    /// Active trigger mode
    pub trigger: Trigger,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            listener_running: false,
            overlay_visible: false,
            trigger: Trigger::default(),
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::ShowOverlay;
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"type":"show_overlay"}"#);
    }

    #[test]
    fn test_set_preferences_accepts_partial_payload() {
        let json = r#"{"type":"set_preferences","preferences":{"trigger":"commandDoubleTap"}}"#;
        match serde_json::from_str::<Request>(json).unwrap() {
            Request::SetPreferences { preferences } => {
                assert_eq!(preferences.trigger, Trigger::DoubleTapModifier);
                assert_eq!(preferences.hold_duration_seconds, 1.0);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["trigger"], "hold_modifier");

        let resp = Response::ShowResult {
            result: ShowResult::NeedsPermission,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("needs_permission"));
    }
}
