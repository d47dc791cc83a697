//! Shortcut catalog model and the accessibility menu extractor

mod extractor;
mod glyphs;

use serde::{Deserialize, Serialize};

pub use extractor::{extract_catalog, AttributeValue, TreeNode};
pub use glyphs::{render_shortcut, virtual_key_glyph, MenuModifiers};

/// The application an overlay is shown for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppContext {
    pub pid: i32,
    /// Bundle identifier (or best available app identifier)
    pub bundle_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    /// Unique within its catalog
    pub id: String,
    pub title: String,
    /// Rendered glyph form, e.g. `⇧⌘N`
    pub keys: String,
    pub section: Option<String>,
}

/// Shortcuts of one application, in menu traversal order
///
/// An empty `shortcuts` list is a valid result and is distinct from a
/// failed extraction only in how it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutCatalog {
    pub app_identifier: String,
    pub app_name: String,
    pub shortcuts: Vec<Shortcut>,
}

impl ShortcutCatalog {
    pub fn empty(app: &AppContext) -> Self {
        Self {
            app_identifier: app.bundle_id.clone(),
            app_name: app.name.clone(),
            shortcuts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shortcuts.is_empty()
    }
}
