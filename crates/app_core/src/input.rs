//! Keyboard input types and key-string parsing
//!
//! Key strings use the same `Modifier+Key` notation as the config file,
//! e.g. `Ctrl+e`, `Shift+Right`, `Escape`, `1`.

use std::fmt;
use std::str::FromStr;

/// Logical key, independent of any windowing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
    PageUp,
    PageDown,
    Enter,
    Space,
    Escape,
    Char(char),
}

/// Modifier state for a key press or click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Cmd on macOS, Super elsewhere
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self { shift: false, ctrl: false, alt: false, meta: false };
    pub const SHIFT: Self = Self { shift: true, ctrl: false, alt: false, meta: false };
    pub const CTRL: Self = Self { shift: false, ctrl: true, alt: false, meta: false };
    pub const META: Self = Self { shift: false, ctrl: false, alt: false, meta: true };

    /// Ctrl or Cmd: the platform "command" modifier
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// Error returned when a key string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid key string: {0:?}")]
pub struct ParseKeyError(pub String);

/// A key together with its modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl FromStr for KeyChord {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseKeyError(s.to_string()));
        }

        // "Ctrl++" style: a trailing '+' is the plus key itself
        let (mods_part, key_part) = match s.strip_suffix("++") {
            Some(rest) => (rest, "+"),
            None => match s.rfind('+') {
                Some(pos) if pos + 1 < s.len() => (&s[..pos], &s[pos + 1..]),
                _ => ("", s),
            },
        };

        let mut modifiers = Modifiers::NONE;
        for part in mods_part.split('+').filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "shift" => modifiers.shift = true,
                "alt" | "option" => modifiers.alt = true,
                "cmd" | "super" | "meta" => modifiers.meta = true,
                _ => return Err(ParseKeyError(s.to_string())),
            }
        }

        let key = parse_key(key_part).ok_or_else(|| ParseKeyError(s.to_string()))?;
        Ok(KeyChord { key, modifiers })
    }
}

fn parse_key(name: &str) -> Option<Key> {
    let key = match name.to_ascii_lowercase().as_str() {
        "left" | "arrowleft" => Key::ArrowLeft,
        "right" | "arrowright" => Key::ArrowRight,
        "up" | "arrowup" => Key::ArrowUp,
        "down" | "arrowdown" => Key::ArrowDown,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "return" | "enter" => Key::Enter,
        "space" => Key::Space,
        "escape" | "esc" => Key::Escape,
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                _ => return None,
            }
        }
    };
    Some(key)
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::ArrowLeft => f.write_str("Left"),
            Key::ArrowRight => f.write_str("Right"),
            Key::ArrowUp => f.write_str("Up"),
            Key::ArrowDown => f.write_str("Down"),
            Key::Home => f.write_str("Home"),
            Key::End => f.write_str("End"),
            Key::PageUp => f.write_str("PageUp"),
            Key::PageDown => f.write_str("PageDown"),
            Key::Enter => f.write_str("Return"),
            Key::Space => f.write_str("Space"),
            Key::Escape => f.write_str("Escape"),
            Key::Char(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        if self.modifiers.meta {
            f.write_str("Super+")?;
        }
        write!(f, "{}", self.key)
    }
}
