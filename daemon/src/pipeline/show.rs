//! Show-overlay operation
//!
//! Split in three so the orchestrator can keep the slow middle step off
//! its own task: `preflight` and `present` run on the serialized context,
//! `load_catalog` runs on the blocking pool.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{PermissionState, Ports, ShortcutSource, ShowResult};
use crate::catalog::{AppContext, ShortcutCatalog};

/// A show attempt that passed the permission and focus checks
#[derive(Debug, Clone)]
pub struct PendingShow {
    pub app: AppContext,
    started_at: Instant,
}

#[derive(Debug)]
pub enum Preflight {
    /// Catalog retrieval may proceed for this app
    Ready(PendingShow),
    /// Finished early; the presenter must not be called
    Done(ShowResult),
}

pub struct ShowOverlay {
    ports: Ports,
    last_app: Option<AppContext>,
}

impl ShowOverlay {
    pub fn new(ports: Ports) -> Self {
        Self {
            ports,
            last_app: None,
        }
    }

    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    /// Run the whole operation inline
    pub async fn attempt_show(&mut self) -> ShowResult {
        match self.preflight() {
            Preflight::Done(result) => result,
            Preflight::Ready(pending) => {
                let catalog =
                    Self::load_catalog(Arc::clone(&self.ports.shortcuts), pending.app.clone()).await;
                self.present(pending, catalog)
            }
        }
    }

    /// Permission gate, then focused-app resolution with last-known fallback
    pub fn preflight(&mut self) -> Preflight {
        let permission = self.ports.permissions.state();
        if permission != PermissionState::Granted {
            info!(?permission, "accessibility permission missing");
            return Preflight::Done(ShowResult::NeedsPermission);
        }

        let app = match self.ports.apps.current_app() {
            Some(app) => {
                self.last_app = Some(app.clone());
                app
            }
            None => match &self.last_app {
                Some(app) => {
                    debug!(bundle_id = %app.bundle_id, "no frontmost app, using last known");
                    app.clone()
                }
                None => {
                    info!("no focused app to show shortcuts for");
                    return Preflight::Done(ShowResult::NoFocusedApp);
                }
            },
        };

        Preflight::Ready(PendingShow {
            app,
            started_at: Instant::now(),
        })
    }

    /// Extract on the blocking pool; a failed extraction is an empty catalog
    pub async fn load_catalog(shortcuts: Arc<dyn ShortcutSource>, app: AppContext) -> ShortcutCatalog {
        let fallback = ShortcutCatalog::empty(&app);
        match tokio::task::spawn_blocking(move || shortcuts.shortcuts(&app)).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(?e, bundle_id = %fallback.app_identifier, "shortcut extraction aborted");
                fallback
            }
        }
    }

    /// Hand the catalog to the presenter, empty or not
    pub fn present(&self, pending: PendingShow, catalog: ShortcutCatalog) -> ShowResult {
        self.ports.presenter.show(&catalog, &pending.app);

        let result = if catalog.is_empty() {
            ShowResult::NoCatalog
        } else {
            ShowResult::Shown
        };

        info!(
            bundle_id = %pending.app.bundle_id,
            shortcuts = catalog.shortcuts.len(),
            elapsed_ms = pending.started_at.elapsed().as_millis() as u64,
            %result,
            "show attempt finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::pipeline::fakes::*;

    struct Harness {
        permissions: Arc<StubPermissions>,
        apps: Arc<StubApps>,
        shortcuts: Arc<StubShortcuts>,
        presenter: Arc<SpyPresenter>,
    }

    impl Harness {
        fn new(permission: PermissionState, app: Option<AppContext>, shortcut_count: usize) -> Self {
            Self {
                permissions: Arc::new(StubPermissions::new(permission)),
                apps: Arc::new(StubApps::new(app)),
                shortcuts: Arc::new(StubShortcuts::new(shortcut_count)),
                presenter: Arc::new(SpyPresenter::default()),
            }
        }

        fn pipeline(&self) -> ShowOverlay {
            ShowOverlay::new(Ports {
                permissions: self.permissions.clone(),
                apps: self.apps.clone(),
                shortcuts: self.shortcuts.clone(),
                presenter: self.presenter.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_denied_permission_never_presents() {
        let h = Harness::new(PermissionState::Denied, Some(finder()), 3);

        assert_eq!(h.pipeline().attempt_show().await, ShowResult::NeedsPermission);
        assert_eq!(h.presenter.show_count(), 0);
        assert_eq!(h.shortcuts.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_undetermined_permission_needs_permission() {
        let h = Harness::new(PermissionState::NotDetermined, Some(finder()), 3);
        assert_eq!(h.pipeline().attempt_show().await, ShowResult::NeedsPermission);
        assert_eq!(h.presenter.show_count(), 0);
    }

    #[tokio::test]
    async fn test_no_focused_app() {
        let h = Harness::new(PermissionState::Granted, None, 3);

        assert_eq!(h.pipeline().attempt_show().await, ShowResult::NoFocusedApp);
        assert_eq!(h.presenter.show_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_catalog_still_presents() {
        let h = Harness::new(PermissionState::Granted, Some(finder()), 0);

        assert_eq!(h.pipeline().attempt_show().await, ShowResult::NoCatalog);
        assert_eq!(h.presenter.show_count(), 1);
        assert_eq!(h.presenter.last_catalog().unwrap().shortcuts.len(), 0);
    }

    #[tokio::test]
    async fn test_catalog_with_shortcuts_is_shown() {
        let h = Harness::new(PermissionState::Granted, Some(finder()), 2);

        assert_eq!(h.pipeline().attempt_show().await, ShowResult::Shown);
        assert_eq!(h.presenter.show_count(), 1);
        let catalog = h.presenter.last_catalog().unwrap();
        assert_eq!(catalog.shortcuts.len(), 2);
        assert_eq!(catalog.app_identifier, "com.apple.finder");
    }

    #[tokio::test]
    async fn test_last_known_app_used_when_focus_unavailable() {
        let h = Harness::new(PermissionState::Granted, Some(finder()), 1);
        let mut pipeline = h.pipeline();

        assert_eq!(pipeline.attempt_show().await, ShowResult::Shown);
        h.apps.set(None);
        assert_eq!(pipeline.attempt_show().await, ShowResult::Shown);

        let shown = h.presenter.shown.lock().unwrap();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[1].1, finder());
    }

    #[tokio::test]
    async fn test_panicking_extractor_degrades_to_empty_catalog() {
        let presenter = Arc::new(SpyPresenter::default());
        let mut pipeline = ShowOverlay::new(Ports {
            permissions: Arc::new(StubPermissions::new(PermissionState::Granted)),
            apps: Arc::new(StubApps::new(Some(finder()))),
            shortcuts: Arc::new(PanickingShortcuts),
            presenter: presenter.clone(),
        });

        assert_eq!(pipeline.attempt_show().await, ShowResult::NoCatalog);
        assert_eq!(presenter.show_count(), 1);
        assert_eq!(presenter.last_catalog().unwrap().app_name, "Finder");
    }

    #[test]
    fn test_preflight_is_synchronous() {
        let h = Harness::new(PermissionState::Granted, Some(finder()), 1);
        let mut pipeline = h.pipeline();

        let pending = match pipeline.preflight() {
            Preflight::Ready(pending) => pending,
            Preflight::Done(result) => panic!("unexpected early result {result}"),
        };
        assert_eq!(pending.app, finder());

        let catalog = tokio_test::block_on(ShowOverlay::load_catalog(h.shortcuts.clone(), pending.app.clone()));
        assert_eq!(pipeline.present(pending, catalog), ShowResult::Shown);
    }
}
