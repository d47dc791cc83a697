use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use keyglance_daemon::config::Config;
use keyglance_daemon::events::OverlayEvent;
use keyglance_daemon::hotkey::HotkeyListener;
use keyglance_daemon::ipc::{IpcPresenter, Server};
use keyglance_daemon::lifecycle::ShutdownSignal;
use keyglance_daemon::orchestrator::Orchestrator;
use keyglance_daemon::platform;
use keyglance_daemon::preferences::PreferencesStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "keyglance-daemon starting");

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.preferences_path, "configuration loaded");

    let mut shutdown = ShutdownSignal::new()?;

    let preferences = Arc::new(PreferencesStore::open(&config.preferences_path));

    // Hotkey listener -> orchestrator
    let (hotkey_tx, hotkey_rx) = mpsc::channel(64);
    // IPC server -> orchestrator
    let (command_tx, command_rx) = mpsc::channel(16);
    // Orchestrator and presenter -> subscribed IPC clients
    let (event_tx, _event_rx) = broadcast::channel::<OverlayEvent>(64);

    let presenter = Arc::new(IpcPresenter::new(event_tx.clone()));
    let ports = platform::system_ports(&config, presenter)?;

    let orchestrator = Orchestrator::new(
        preferences.current(),
        ports,
        event_tx.clone(),
        config.double_tap_window,
        config.poll_interval,
    );

    let hotkey_listener = HotkeyListener::new(hotkey_tx);
    match hotkey_listener.start() {
        Ok(()) => info!("hotkey listener started"),
        Err(e) => {
            error!(%e, "failed to start hotkey listener");
            warn!("continuing without gesture support");
        }
    }

    let server = Server::new(&config.socket_path, preferences.clone(), command_tx, event_tx.clone())?;
    let mut tap_active_rx = hotkey_listener.subscribe_tap_active();
    let tap_active = *tap_active_rx.borrow_and_update();
    server.set_listener_running(tap_active).await;

    let mut ipc_event_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = orchestrator.run(hotkey_rx, command_rx, preferences.subscribe()) => {
            info!("orchestrator exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // The tap comes up late when Accessibility is granted after launch
        _ = async {
            while tap_active_rx.changed().await.is_ok() {
                let active = *tap_active_rx.borrow_and_update();
                info!(active, "event tap state changed");
                server_for_events.set_listener_running(active).await;
            }
            std::future::pending::<()>().await
        } => {}

        // Keep the status snapshot in sync with what the UI was told
        _ = async {
            loop {
                match ipc_event_rx.recv().await {
                    Ok(OverlayEvent::OverlayShown { .. }) => server_for_events.set_overlay_visible(true).await,
                    Ok(OverlayEvent::OverlayHidden) => server_for_events.set_overlay_visible(false).await,
                    Ok(event) => info!(%event, "overlay event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "overlay event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("overlay event handler exited");
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");

    hotkey_listener.stop();
    server.shutdown().await;

    info!("keyglance-daemon stopped");

    Ok(())
}
