//! macOS adapters for the pipeline ports

#[cfg(target_os = "macos")]
mod ax;
#[cfg(target_os = "macos")]
mod permission;
#[cfg(target_os = "macos")]
mod workspace;

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::pipeline::{Ports, Presenter};

/// Wire the live permission, focus and menu sources to `presenter`
#[cfg(target_os = "macos")]
pub fn system_ports(config: &Config, presenter: Arc<dyn Presenter>) -> Result<Ports> {
    Ok(Ports {
        permissions: Arc::new(permission::AxPermissions),
        apps: Arc::new(workspace::Workspace::new()),
        shortcuts: Arc::new(ax::AxShortcutSource::new(config.ax_timeout)),
        presenter,
    })
}

#[cfg(not(target_os = "macos"))]
pub fn system_ports(_config: &Config, _presenter: Arc<dyn Presenter>) -> Result<Ports> {
    anyhow::bail!("menu shortcut extraction requires macOS accessibility APIs")
}
