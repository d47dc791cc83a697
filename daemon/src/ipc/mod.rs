//! IPC module for daemon-UI communication

mod presenter;
mod protocol;
mod server;

pub use presenter::IpcPresenter;
pub use protocol::{DaemonStatus, Request, Response};
pub use server::Server;
