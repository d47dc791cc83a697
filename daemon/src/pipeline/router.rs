//! Maps show outcomes to user-facing hints and follow-up actions

use serde::{Deserialize, Serialize};

use super::ShowResult;

/// A message for the UI, identified by a localization key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub key: String,
    pub message: String,
}

/// What to do after a show attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Route {
    pub hint: Option<Hint>,
    /// Prompt for accessibility access and retry once it is granted
    pub request_permission: bool,
}

#[derive(Debug, Default)]
pub struct ResultRouter;

impl ResultRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, result: ShowResult) -> Route {
        match result {
            ShowResult::Shown | ShowResult::NoCatalog => Route::default(),
            ShowResult::NeedsPermission => Route {
                hint: Some(Hint {
                    key: "overlay.error.permission_required".to_string(),
                    message: "Accessibility permission is required to read app shortcuts.".to_string(),
                }),
                request_permission: true,
            },
            ShowResult::NoFocusedApp => Route {
                hint: Some(Hint {
                    key: "overlay.error.focused_app_unavailable".to_string(),
                    message: "Could not determine the focused app.".to_string(),
                }),
                request_permission: false,
            },
        }
    }
}
