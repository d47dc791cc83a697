//! Activation pipeline
//!
//! Permission gate -> focused app -> shortcut catalog -> presenter, with
//! each external collaborator behind a small trait.

mod router;
mod show;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{AppContext, ShortcutCatalog};

pub use router::{Hint, ResultRouter, Route};
pub use show::{Preflight, PendingShow, ShowOverlay};

/// Outcome of one show attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowResult {
    Shown,
    NoCatalog,
    NeedsPermission,
    NoFocusedApp,
}

impl std::fmt::Display for ShowResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShowResult::Shown => write!(f, "shown"),
            ShowResult::NoCatalog => write!(f, "no_catalog"),
            ShowResult::NeedsPermission => write!(f, "needs_permission"),
            ShowResult::NoFocusedApp => write!(f, "no_focused_app"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    NotDetermined,
}

/// Shows and hides the overlay; must not block
pub trait Presenter: Send + Sync {
    fn show(&self, catalog: &ShortcutCatalog, app: &AppContext);
    fn hide(&self);
}

pub trait PermissionChecker: Send + Sync {
    /// Cheap enough to call on every activation attempt
    fn state(&self) -> PermissionState;

    /// Ask the system to prompt the user for access
    fn request_access(&self);
}

pub trait AppContextProvider: Send + Sync {
    fn current_app(&self) -> Option<AppContext>;
}

/// Produces a catalog for an app; never fails, may be slow
pub trait ShortcutSource: Send + Sync {
    fn shortcuts(&self, app: &AppContext) -> ShortcutCatalog;
}

/// The collaborators the pipeline talks to
#[derive(Clone)]
pub struct Ports {
    pub permissions: Arc<dyn PermissionChecker>,
    pub apps: Arc<dyn AppContextProvider>,
    pub shortcuts: Arc<dyn ShortcutSource>,
    pub presenter: Arc<dyn Presenter>,
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Test doubles shared by pipeline and orchestrator tests

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::catalog::Shortcut;

    pub struct StubPermissions {
        pub state: Mutex<PermissionState>,
        pub requests: AtomicUsize,
    }

    impl StubPermissions {
        pub fn new(state: PermissionState) -> Self {
            Self {
                state: Mutex::new(state),
                requests: AtomicUsize::new(0),
            }
        }

        pub fn set(&self, state: PermissionState) {
            *self.state.lock().unwrap() = state;
        }
    }

    impl PermissionChecker for StubPermissions {
        fn state(&self) -> PermissionState {
            *self.state.lock().unwrap()
        }

        fn request_access(&self) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub struct StubApps {
        pub app: Mutex<Option<AppContext>>,
    }

    impl StubApps {
        pub fn new(app: Option<AppContext>) -> Self {
            Self { app: Mutex::new(app) }
        }

        pub fn set(&self, app: Option<AppContext>) {
            *self.app.lock().unwrap() = app;
        }
    }

    impl AppContextProvider for StubApps {
        fn current_app(&self) -> Option<AppContext> {
            self.app.lock().unwrap().clone()
        }
    }

    /// Returns a fixed number of shortcuts for whatever app is asked
    pub struct StubShortcuts {
        pub count: usize,
        pub calls: AtomicUsize,
    }

    impl StubShortcuts {
        pub fn new(count: usize) -> Self {
            Self {
                count,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ShortcutSource for StubShortcuts {
        fn shortcuts(&self, app: &AppContext) -> ShortcutCatalog {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut catalog = ShortcutCatalog::empty(app);
            catalog.shortcuts = (0..self.count)
                .map(|i| Shortcut {
                    id: format!("ax_{i}"),
                    title: format!("Item {i}"),
                    keys: "⌘N".to_string(),
                    section: Some("File".to_string()),
                })
                .collect();
            catalog
        }
    }

    pub struct PanickingShortcuts;

    impl ShortcutSource for PanickingShortcuts {
        fn shortcuts(&self, _app: &AppContext) -> ShortcutCatalog {
            panic!("accessibility tree went away");
        }
    }

    #[derive(Default)]
    pub struct SpyPresenter {
        pub shown: Mutex<Vec<(ShortcutCatalog, AppContext)>>,
        pub hides: AtomicUsize,
    }

    impl SpyPresenter {
        pub fn show_count(&self) -> usize {
            self.shown.lock().unwrap().len()
        }

        pub fn hide_count(&self) -> usize {
            self.hides.load(Ordering::SeqCst)
        }

        pub fn last_catalog(&self) -> Option<ShortcutCatalog> {
            self.shown.lock().unwrap().last().map(|(c, _)| c.clone())
        }
    }

    impl Presenter for SpyPresenter {
        fn show(&self, catalog: &ShortcutCatalog, app: &AppContext) {
            self.shown.lock().unwrap().push((catalog.clone(), app.clone()));
        }

        fn hide(&self) {
            self.hides.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn finder() -> AppContext {
        AppContext {
            pid: 42,
            bundle_id: "com.apple.finder".to_string(),
            name: "Finder".to_string(),
        }
    }
}
