//! Presenter that hands the overlay to the UI process
//!
//! The panel itself lives in the status-bar app; the daemon only tells it
//! what to render through the subscriber broadcast.

use tokio::sync::broadcast;
use tracing::debug;

use crate::catalog::{AppContext, ShortcutCatalog};
use crate::events::OverlayEvent;
use crate::pipeline::Presenter;

pub struct IpcPresenter {
    event_tx: broadcast::Sender<OverlayEvent>,
}

impl IpcPresenter {
    pub fn new(event_tx: broadcast::Sender<OverlayEvent>) -> Self {
        Self { event_tx }
    }

    fn publish(&self, event: OverlayEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("no overlay subscribers connected");
        }
    }
}

impl Presenter for IpcPresenter {
    fn show(&self, catalog: &ShortcutCatalog, app: &AppContext) {
        self.publish(OverlayEvent::OverlayShown {
            app: app.clone(),
            catalog: catalog.clone(),
        });
    }

    fn hide(&self) {
        self.publish(OverlayEvent::OverlayHidden);
    }
}
