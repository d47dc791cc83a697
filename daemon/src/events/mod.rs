//! Events broadcast to IPC subscribers
//!
//! The overlay UI renders from `OverlayShown`/`OverlayHidden`; the
//! status-bar app surfaces `Hint`s.

use serde::{Deserialize, Serialize};

use crate::catalog::{AppContext, ShortcutCatalog};
use crate::pipeline::{Hint, ShowResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayEvent {
    /// Present the catalog for the given app
    OverlayShown {
        app: AppContext,
        catalog: ShortcutCatalog,
    },

    /// Dismiss the overlay
    OverlayHidden,

    /// A show attempt finished
    ShowFinished {
        result: ShowResult,
        /// Time from activation to outcome in milliseconds
        duration_ms: u64,
    },

    /// Something the user should be told about
    Hint(Hint),
}

impl std::fmt::Display for OverlayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayEvent::OverlayShown { app, catalog } => {
                write!(f, "OVERLAY_SHOWN ({}, {} shortcuts)", app.bundle_id, catalog.shortcuts.len())
            }
            OverlayEvent::OverlayHidden => write!(f, "OVERLAY_HIDDEN"),
            OverlayEvent::ShowFinished { result, duration_ms } => {
                write!(f, "SHOW_FINISHED ({}, {}ms)", result, duration_ms)
            }
            OverlayEvent::Hint(hint) => write!(f, "HINT ({})", hint.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = OverlayEvent::ShowFinished {
            result: ShowResult::NoCatalog,
            duration_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("show_finished"));
        assert!(json.contains("no_catalog"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"overlay_hidden"}"#;
        let event: OverlayEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, OverlayEvent::OverlayHidden));
    }

    #[test]
    fn test_hint_is_flattened_into_tagged_object() {
        let event = OverlayEvent::Hint(Hint {
            key: "overlay.error.permission_required".into(),
            message: "needs access".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "hint");
        assert_eq!(json["key"], "overlay.error.permission_required");
    }
}
