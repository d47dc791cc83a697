//! Menu shortcut rendering
//!
//! Menu items report their modifiers as a Carbon `kMenu*Modifier` mask.
//! Command is the odd one out: it is present unless the mask explicitly
//! suppresses it.

/// Decoded `AXMenuItemCmdModifiers` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuModifiers(pub i64);

impl MenuModifiers {
    /// kMenuShiftModifier
    pub const SHIFT: i64 = 1 << 0;
    /// kMenuOptionModifier
    pub const OPTION: i64 = 1 << 1;
    /// kMenuControlModifier
    pub const CONTROL: i64 = 1 << 2;
    /// kMenuNoCommandModifier
    pub const NO_COMMAND: i64 = 1 << 3;

    pub fn shift(self) -> bool {
        self.0 & Self::SHIFT != 0
    }

    pub fn option(self) -> bool {
        self.0 & Self::OPTION != 0
    }

    pub fn control(self) -> bool {
        self.0 & Self::CONTROL != 0
    }

    /// Command is implied unless suppressed
    pub fn command(self) -> bool {
        self.0 & Self::NO_COMMAND == 0
    }

    /// Glyphs in macOS display order: control, option, shift, command
    pub fn glyphs(self) -> String {
        let mut out = String::new();
        if self.control() {
            out.push('⌃');
        }
        if self.option() {
            out.push('⌥');
        }
        if self.shift() {
            out.push('⇧');
        }
        if self.command() {
            out.push('⌘');
        }
        out
    }
}

/// Modifier glyphs followed by the key glyph
pub fn render_shortcut(key: &str, modifiers: MenuModifiers) -> String {
    let mut out = modifiers.glyphs();
    out.push_str(key);
    out
}

/// Display glyph for the virtual key codes menus use instead of a character
pub fn virtual_key_glyph(code: i64) -> Option<&'static str> {
    let glyph = match code {
        122 => "F1",
        120 => "F2",
        99 => "F3",
        118 => "F4",
        96 => "F5",
        97 => "F6",
        98 => "F7",
        100 => "F8",
        101 => "F9",
        109 => "F10",
        103 => "F11",
        111 => "F12",
        51 => "⌫",
        117 => "⌦",
        36 => "↩",
        76 => "⌅",
        53 => "⎋",
        48 => "⇥",
        49 => "Space",
        126 => "↑",
        125 => "↓",
        123 => "←",
        124 => "→",
        115 => "Home",
        119 => "End",
        116 => "PgUp",
        121 => "PgDn",
        _ => return None,
    };
    Some(glyph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_implied_by_default() {
        assert_eq!(render_shortcut("C", MenuModifiers(0)), "⌘C");
    }

    #[test]
    fn test_control_renders_before_command() {
        assert_eq!(render_shortcut("C", MenuModifiers(4)), "⌃⌘C");
    }

    #[test]
    fn test_no_command_flag_suppresses_command() {
        assert_eq!(render_shortcut("C", MenuModifiers(8)), "C");
    }

    #[test]
    fn test_full_modifier_order() {
        let all = MenuModifiers(MenuModifiers::SHIFT | MenuModifiers::OPTION | MenuModifiers::CONTROL);
        assert_eq!(render_shortcut("Z", all), "⌃⌥⇧⌘Z");
        assert_eq!(render_shortcut("N", MenuModifiers(MenuModifiers::SHIFT)), "⇧⌘N");
    }

    #[test]
    fn test_virtual_key_table() {
        assert_eq!(virtual_key_glyph(122), Some("F1"));
        assert_eq!(virtual_key_glyph(53), Some("⎋"));
        assert_eq!(virtual_key_glyph(51), Some("⌫"));
        assert_eq!(virtual_key_glyph(126), Some("↑"));
        assert_eq!(virtual_key_glyph(0), None);
    }
}
