//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of
//! overlay events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::OverlayEvent;
use crate::orchestrator::Command;
use crate::preferences::PreferencesStore;

use super::protocol::{DaemonStatus, Request, Response};

const MAX_FRAME_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// State handed to every client handler
struct Shared {
    status: RwLock<ServerState>,
    preferences: Arc<PreferencesStore>,
    command_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<OverlayEvent>,
}

struct ServerState {
    listener_running: bool,
    overlay_visible: bool,
    start_time: Instant,
}

impl Server {
    /// Bind the socket, replacing a stale one
    pub fn new(
        socket_path: &Path,
        preferences: Arc<PreferencesStore>,
        command_tx: mpsc::Sender<Command>,
        event_tx: broadcast::Sender<OverlayEvent>,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            shared: Arc::new(Shared {
                status: RwLock::new(ServerState {
                    listener_running: false,
                    overlay_visible: false,
                    start_time: Instant::now(),
                }),
                preferences,
                command_tx,
                event_tx,
            }),
            shutdown_tx,
        })
    }

    pub async fn set_listener_running(&self, running: bool) {
        self.shared.status.write().await.listener_running = running;
    }

    pub async fn set_overlay_visible(&self, visible: bool) {
        let mut status = self.shared.status.write().await;
        if status.overlay_visible != visible {
            debug!(visible, "overlay visibility changed");
        }
        status.overlay_visible = visible;
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Serve one connection until it closes
///
/// Frames are read on a separate task so a subscribed client can receive
/// events while no request is pending.
async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let (request_tx, mut request_rx) = mpsc::channel::<Result<Request, String>>(8);

    let reader_task = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    let parsed = serde_json::from_slice::<Request>(&frame).map_err(|e| e.to_string());
                    if request_tx.send(parsed).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("client disconnected");
                    break;
                }
                Err(e) => {
                    warn!(?e, "failed to read from client");
                    break;
                }
            }
        }
    });

    let result = serve_requests(&mut request_rx, &mut writer, &shared).await;
    reader_task.abort();
    result
}

async fn serve_requests<W: AsyncWrite + Unpin>(
    request_rx: &mut mpsc::Receiver<Result<Request, String>>,
    writer: &mut W,
    shared: &Shared,
) -> Result<()> {
    let mut events: Option<broadcast::Receiver<OverlayEvent>> = None;

    loop {
        tokio::select! {
            request = request_rx.recv() => match request {
                Some(Ok(request)) => {
                    debug!(?request, "received request");
                    if matches!(request, Request::Subscribe) && events.is_none() {
                        events = Some(shared.event_tx.subscribe());
                        debug!("client subscribed to overlay events");
                    }
                    let response = process_request(request, shared).await;
                    write_frame(writer, &response).await?;
                }
                Some(Err(message)) => {
                    warn!(%message, "malformed request");
                    write_frame(writer, &Response::error("invalid_request", message)).await?;
                }
                None => return Ok(()),
            },

            event = next_event(&mut events), if events.is_some() => match event {
                Ok(event) => write_frame(writer, &event).await?,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged behind overlay events");
                }
                Err(broadcast::error::RecvError::Closed) => events = None,
            },
        }
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<OverlayEvent>>,
) -> Result<OverlayEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn process_request(request: Request, shared: &Shared) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::GetStatus => {
            let status = shared.status.read().await;
            Response::Status(DaemonStatus {
                listener_running: status.listener_running,
                overlay_visible: status.overlay_visible,
                trigger: shared.preferences.current().trigger,
                uptime_secs: status.start_time.elapsed().as_secs(),
                ..DaemonStatus::default()
            })
        }

        Request::Subscribe => Response::Subscribed,

        Request::ShowOverlay => {
            let (reply, rx) = oneshot::channel();
            if shared.command_tx.send(Command::Show { reply: Some(reply) }).await.is_err() {
                return Response::error("unavailable", "overlay core is not running");
            }
            match rx.await {
                Ok(result) => Response::ShowResult { result },
                Err(_) => Response::error("unavailable", "show request was dropped"),
            }
        }

        Request::HideOverlay => match shared.command_tx.send(Command::Hide).await {
            Ok(()) => Response::Hidden,
            Err(_) => Response::error("unavailable", "overlay core is not running"),
        },

        Request::GetPreferences => Response::Preferences {
            preferences: shared.preferences.current(),
        },

        Request::SetPreferences { preferences } => {
            let store = Arc::clone(&shared.preferences);
            match tokio::task::spawn_blocking(move || store.update(preferences)).await {
                Ok(Ok(())) => Response::PreferencesUpdated,
                Ok(Err(e)) => {
                    warn!(%e, "rejected preferences update");
                    Response::error(e.code(), e.to_string())
                }
                Err(e) => {
                    error!(?e, "preferences update task failed");
                    Response::error("persist_failed", "preferences update did not complete")
                }
            }
        }
    }
}

/// Read one length-prefixed frame; `None` on a clean disconnect
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("message too large: {len} bytes");
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

/// Send a length-prefixed JSON message
async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}
