//! Frontmost application lookup via NSWorkspace

use objc::rc::autoreleasepool;
use objc::runtime::{Class, Object};
use objc::{msg_send, sel, sel_impl};
use tracing::trace;

use crate::catalog::AppContext;
use crate::pipeline::AppContextProvider;

#[link(name = "AppKit", kind = "framework")]
extern "C" {}

/// Reports the frontmost app, never this process
pub struct Workspace {
    own_pid: i32,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            own_pid: std::process::id() as i32,
        }
    }
}

impl AppContextProvider for Workspace {
    fn current_app(&self) -> Option<AppContext> {
        let app = autoreleasepool(|| unsafe { frontmost_application() })?;
        if app.pid == self.own_pid {
            trace!("frontmost app is this process");
            return None;
        }
        Some(app)
    }
}

unsafe fn frontmost_application() -> Option<AppContext> {
    let workspace_class = Class::get("NSWorkspace")?;
    let workspace: *mut Object = msg_send![workspace_class, sharedWorkspace];
    if workspace.is_null() {
        return None;
    }

    let app: *mut Object = msg_send![workspace, frontmostApplication];
    if app.is_null() {
        return None;
    }

    let pid: i32 = msg_send![app, processIdentifier];
    let name = nsstring(msg_send![app, localizedName]).unwrap_or_default();
    // Unbundled executables have no identifier; fall back to the name
    let bundle_id = nsstring(msg_send![app, bundleIdentifier]).unwrap_or_else(|| name.clone());

    Some(AppContext {
        pid,
        bundle_id,
        name,
    })
}

unsafe fn nsstring(string: *mut Object) -> Option<String> {
    if string.is_null() {
        return None;
    }

    let utf8: *const std::os::raw::c_char = msg_send![string, UTF8String];
    if utf8.is_null() {
        return None;
    }

    std::ffi::CStr::from_ptr(utf8).to_str().ok().map(str::to_string)
}
