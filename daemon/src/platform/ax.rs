//! Accessibility tree access for live menu bars
//!
//! Hierarchy: AXApplication -> AXMenuBar -> AXMenuBarItem -> AXMenu -> AXMenuItem

#![allow(non_upper_case_globals)]

use std::time::Duration;

use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::number::CFNumber;
use core_foundation::string::{CFString, CFStringRef};
use tracing::trace;

use crate::catalog::{extract_catalog, AppContext, AttributeValue, ShortcutCatalog, TreeNode};
use crate::pipeline::ShortcutSource;

type AXUIElementRef = CFTypeRef;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
    fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> i32;
    fn AXUIElementSetMessagingTimeout(element: AXUIElementRef, timeout_in_seconds: f32) -> i32;
}

const kAXErrorSuccess: i32 = 0;

const AX_MENU_BAR: &str = "AXMenuBar";
const AX_CHILDREN: &str = "AXChildren";
const AX_TITLE: &str = "AXTitle";

/// A retained AXUIElement whose calls are bounded by `timeout`
pub struct AxElement {
    element: CFType,
    timeout: Duration,
}

impl AxElement {
    /// Application element for `pid`
    pub fn application(pid: i32, timeout: Duration) -> Option<Self> {
        let raw = unsafe { AXUIElementCreateApplication(pid) };
        if raw.is_null() {
            return None;
        }
        Some(Self::bounded(unsafe { CFType::wrap_under_create_rule(raw) }, timeout))
    }

    /// Every element gets its own messaging timeout; it is not inherited
    /// from the application element
    fn bounded(element: CFType, timeout: Duration) -> Self {
        let err = unsafe {
            AXUIElementSetMessagingTimeout(element.as_CFTypeRef(), timeout.as_secs_f32())
        };
        if err != kAXErrorSuccess {
            trace!(err, "failed to set messaging timeout");
        }
        Self { element, timeout }
    }

    fn raw(&self) -> AXUIElementRef {
        self.element.as_CFTypeRef()
    }

    fn copy(&self, attribute: &str) -> Option<CFType> {
        let name = CFString::new(attribute);
        let mut value: CFTypeRef = std::ptr::null();

        let err = unsafe {
            AXUIElementCopyAttributeValue(self.raw(), name.as_concrete_TypeRef(), &mut value)
        };
        if err != kAXErrorSuccess || value.is_null() {
            trace!(attribute, err, "attribute unavailable");
            return None;
        }
        Some(unsafe { CFType::wrap_under_create_rule(value) })
    }

    pub fn menu_bar(&self) -> Option<AxElement> {
        self.copy(AX_MENU_BAR).map(|e| Self::bounded(e, self.timeout))
    }
}

impl TreeNode for AxElement {
    fn title(&self) -> Option<String> {
        self.copy(AX_TITLE)?
            .downcast::<CFString>()
            .map(|s| s.to_string())
    }

    fn children(&self) -> Option<Vec<Self>> {
        let value = self.copy(AX_CHILDREN)?;
        if value.type_of() != CFArray::<CFType>::type_id() {
            return None;
        }

        let array: CFArray<CFType> =
            unsafe { CFArray::wrap_under_get_rule(value.as_CFTypeRef() as CFArrayRef) };
        Some(
            array
                .iter()
                .map(|child| Self::bounded((*child).clone(), self.timeout))
                .collect(),
        )
    }

    fn attribute(&self, key: &str) -> Option<AttributeValue> {
        let value = self.copy(key)?;
        if let Some(s) = value.downcast::<CFString>() {
            return Some(AttributeValue::Text(s.to_string()));
        }
        value
            .downcast::<CFNumber>()
            .and_then(|n| n.to_i64())
            .map(AttributeValue::Integer)
    }
}

/// Reads the focused app's menu bar through the accessibility API
pub struct AxShortcutSource {
    timeout: Duration,
}

impl AxShortcutSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ShortcutSource for AxShortcutSource {
    fn shortcuts(&self, app: &AppContext) -> ShortcutCatalog {
        let menu_bar = AxElement::application(app.pid, self.timeout).and_then(|a| a.menu_bar());
        extract_catalog(menu_bar.as_ref(), &app.bundle_id, &app.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_elements_carry_the_timeout() {
        let timeout = Duration::from_millis(250);
        let app = AxElement::application(std::process::id() as i32, timeout).unwrap();
        assert_eq!(app.timeout, timeout);

        let child = AxElement::bounded(app.element.clone(), app.timeout);
        assert_eq!(child.timeout, timeout);
    }

    #[test]
    fn test_unknown_pid_yields_empty_catalog() {
        let app = AppContext {
            pid: i32::MAX,
            bundle_id: "com.example.gone".to_string(),
            name: "Gone".to_string(),
        };
        let catalog = AxShortcutSource::new(Duration::from_millis(50)).shortcuts(&app);
        assert!(catalog.is_empty());
        assert_eq!(catalog.app_name, "Gone");
    }
}
