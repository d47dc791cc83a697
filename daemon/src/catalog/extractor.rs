//! Menu tree walk
//!
//! The walk is written once against `TreeNode`, a read-only view of a
//! foreign UI tree in which every access may come back empty. The macOS
//! accessibility adapter implements it for live menu bars; tests use an
//! in-memory tree.
//!
//! Hierarchy: menu bar -> menu bar item (section) -> menu -> menu item
//! -> (optional) submenu -> menu item ...

use tracing::{debug, trace};

use super::glyphs::{render_shortcut, virtual_key_glyph, MenuModifiers};
use super::{Shortcut, ShortcutCatalog};

/// Character-based shortcut key
pub const ATTR_CMD_CHAR: &str = "AXMenuItemCmdChar";
/// Carbon modifier mask for the shortcut
pub const ATTR_CMD_MODIFIERS: &str = "AXMenuItemCmdModifiers";
/// Virtual key code for non-character shortcuts
pub const ATTR_CMD_VIRTUAL_KEY: &str = "AXMenuItemCmdVirtualKey";

/// Value of a scalar attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
}

impl AttributeValue {
    fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Integer(_) => None,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(n) => Some(*n),
            AttributeValue::Text(_) => None,
        }
    }
}

/// Read-only access to one node of a foreign UI tree
///
/// `None` means unavailable, for whatever reason; callers treat it as
/// absence and move on.
pub trait TreeNode: Sized {
    fn title(&self) -> Option<String>;
    fn children(&self) -> Option<Vec<Self>>;
    fn attribute(&self, key: &str) -> Option<AttributeValue>;
}

/// Build a catalog from an application's menu bar
///
/// A missing menu bar yields an empty catalog, the same as a menu bar
/// whose every node is unreadable.
pub fn extract_catalog<N: TreeNode>(
    menu_bar: Option<&N>,
    app_identifier: &str,
    app_name: &str,
) -> ShortcutCatalog {
    let mut walk = Walk::default();

    match menu_bar {
        Some(menu_bar) => walk.menu_bar(menu_bar, app_name),
        None => debug!(app_identifier, "no menu bar available"),
    }

    debug!(
        app_identifier,
        shortcuts = walk.shortcuts.len(),
        skipped = walk.skipped,
        "menu bar walked"
    );

    ShortcutCatalog {
        app_identifier: app_identifier.to_string(),
        app_name: app_name.to_string(),
        shortcuts: walk.shortcuts,
    }
}

#[derive(Default)]
struct Walk {
    shortcuts: Vec<Shortcut>,
    skipped: usize,
}

impl Walk {
    fn menu_bar<N: TreeNode>(&mut self, menu_bar: &N, app_name: &str) {
        let Some(bar_items) = menu_bar.children() else {
            debug!("menu bar has no readable items");
            return;
        };

        for bar_item in &bar_items {
            let section = bar_item
                .title()
                .filter(|t| !is_separator(t))
                .unwrap_or_else(|| app_name.to_string());

            let Some(menus) = bar_item.children() else {
                trace!(%section, "menu bar item has no menu");
                continue;
            };

            for menu in &menus {
                self.menu(menu, &section);
            }
        }
    }

    fn menu<N: TreeNode>(&mut self, menu: &N, section: &str) {
        let Some(items) = menu.children() else {
            return;
        };

        for item in &items {
            let Some(title) = item.title().filter(|t| !is_separator(t)) else {
                self.skipped += 1;
                continue;
            };

            if let Some(keys) = shortcut_keys(item) {
                let id = format!("ax_{}", self.shortcuts.len());
                self.shortcuts.push(Shortcut {
                    id,
                    title,
                    keys,
                    section: Some(section.to_string()),
                });
            }

            // Submenus are walked whether or not the item had a shortcut
            if let Some(submenus) = item.children() {
                for submenu in &submenus {
                    self.menu(submenu, section);
                }
            }
        }
    }
}

fn is_separator(title: &str) -> bool {
    title.trim().is_empty()
}

/// Character shortcut first, virtual key second
fn shortcut_keys<N: TreeNode>(item: &N) -> Option<String> {
    let modifiers = MenuModifiers(
        item.attribute(ATTR_CMD_MODIFIERS)
            .and_then(|v| v.as_integer())
            .unwrap_or(0),
    );

    let character = item
        .attribute(ATTR_CMD_CHAR)
        .and_then(|v| v.as_text().map(str::to_owned))
        .filter(|c| !c.is_empty() && !c.chars().all(char::is_control));

    if let Some(character) = character {
        return Some(render_shortcut(&character.to_uppercase(), modifiers));
    }

    let glyph = item
        .attribute(ATTR_CMD_VIRTUAL_KEY)
        .and_then(|v| v.as_integer())
        .and_then(virtual_key_glyph)?;

    Some(render_shortcut(glyph, modifiers))
}
