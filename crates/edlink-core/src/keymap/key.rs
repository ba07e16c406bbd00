//! Key names accepted in the keymap and their Windows Virtual Key codes.
//!
//! # Why Virtual Key codes?
//!
//! The game reads DirectInput scan codes, but scan codes depend on the
//! keyboard layout.  The keymap therefore names *logical* keys; the Windows
//! input adapter converts the VK code to the layout's scan code with
//! `MapVirtualKeyW` right before injecting it.
//!
//! Reference: https://learn.microsoft.com/windows/win32/inputdev/virtual-key-codes

use std::fmt;
use std::str::FromStr;

/// A key that can be pressed by an inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// `a`–`z` (stored lowercase).
    Letter(char),
    /// `0`–`9` on the main row.
    Digit(u8),
    /// `F1`–`F12`.
    Function(u8),
    /// `numpad0`–`numpad9`.
    Numpad(u8),
    Space,
    Enter,
    Escape,
    Tab,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
    Minus,
    Equals,
    Comma,
    Period,
}

/// Error returned when a key name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown key name '{}'", self.0)
    }
}

impl std::error::Error for UnknownKey {}

/// Named keys and their canonical spelling.
const NAMED: &[(&str, KeyCode)] = &[
    ("space", KeyCode::Space),
    ("enter", KeyCode::Enter),
    ("return", KeyCode::Enter),
    ("escape", KeyCode::Escape),
    ("esc", KeyCode::Escape),
    ("tab", KeyCode::Tab),
    ("backspace", KeyCode::Backspace),
    ("up", KeyCode::Up),
    ("down", KeyCode::Down),
    ("left", KeyCode::Left),
    ("right", KeyCode::Right),
    ("insert", KeyCode::Insert),
    ("delete", KeyCode::Delete),
    ("home", KeyCode::Home),
    ("end", KeyCode::End),
    ("pageup", KeyCode::PageUp),
    ("pagedown", KeyCode::PageDown),
    ("lshift", KeyCode::LeftShift),
    ("rshift", KeyCode::RightShift),
    ("lctrl", KeyCode::LeftCtrl),
    ("rctrl", KeyCode::RightCtrl),
    ("lalt", KeyCode::LeftAlt),
    ("ralt", KeyCode::RightAlt),
    ("minus", KeyCode::Minus),
    ("equals", KeyCode::Equals),
    ("comma", KeyCode::Comma),
    ("period", KeyCode::Period),
];

impl FromStr for KeyCode {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let unknown = || UnknownKey(s.trim().to_string());

        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return match c {
                'a'..='z' => Ok(KeyCode::Letter(c)),
                '0'..='9' => Ok(KeyCode::Digit(c as u8 - b'0')),
                _ => Err(unknown()),
            };
        }

        if let Some((_, key)) = NAMED.iter().find(|(n, _)| *n == name) {
            return Ok(*key);
        }

        let numbered = |prefix: &str, range: std::ops::RangeInclusive<u8>| {
            name.strip_prefix(prefix)
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| range.contains(n))
        };
        if let Some(n) = numbered("numpad", 0..=9) {
            return Ok(KeyCode::Numpad(n));
        }
        if let Some(n) = numbered("f", 1..=12) {
            return Ok(KeyCode::Function(n));
        }
        Err(unknown())
    }
}

impl KeyCode {
    /// Windows Virtual Key code.
    pub fn windows_vk(self) -> u8 {
        match self {
            KeyCode::Letter(c) => c.to_ascii_uppercase() as u8, // VK_A..VK_Z == 'A'..'Z'
            KeyCode::Digit(d) => b'0' + d,                      // VK_0..VK_9 == '0'..'9'
            KeyCode::Function(n) => 0x6F + n,                   // VK_F1 = 0x70
            KeyCode::Numpad(n) => 0x60 + n,                     // VK_NUMPAD0 = 0x60
            KeyCode::Space => 0x20,
            KeyCode::Enter => 0x0D,
            KeyCode::Escape => 0x1B,
            KeyCode::Tab => 0x09,
            KeyCode::Backspace => 0x08,
            KeyCode::PageUp => 0x21,
            KeyCode::PageDown => 0x22,
            KeyCode::End => 0x23,
            KeyCode::Home => 0x24,
            KeyCode::Left => 0x25,
            KeyCode::Up => 0x26,
            KeyCode::Right => 0x27,
            KeyCode::Down => 0x28,
            KeyCode::Insert => 0x2D,
            KeyCode::Delete => 0x2E,
            KeyCode::LeftShift => 0xA0,
            KeyCode::RightShift => 0xA1,
            KeyCode::LeftCtrl => 0xA2,
            KeyCode::RightCtrl => 0xA3,
            KeyCode::LeftAlt => 0xA4,
            KeyCode::RightAlt => 0xA5,
            KeyCode::Equals => 0xBB,
            KeyCode::Comma => 0xBC,
            KeyCode::Minus => 0xBD,
            KeyCode::Period => 0xBE,
        }
    }

    /// Keys that need `KEYEVENTF_EXTENDEDKEY` when injected by scan code.
    pub fn is_extended(self) -> bool {
        matches!(
            self,
            KeyCode::PageUp
                | KeyCode::PageDown
                | KeyCode::End
                | KeyCode::Home
                | KeyCode::Left
                | KeyCode::Up
                | KeyCode::Right
                | KeyCode::Down
                | KeyCode::Insert
                | KeyCode::Delete
                | KeyCode::RightCtrl
                | KeyCode::RightAlt
        )
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Letter(c) => write!(f, "{c}"),
            KeyCode::Digit(d) => write!(f, "{d}"),
            KeyCode::Function(n) => write!(f, "f{n}"),
            KeyCode::Numpad(n) => write!(f, "numpad{n}"),
            named => {
                let name = NAMED
                    .iter()
                    .find(|(_, k)| k == named)
                    .map(|(n, _)| *n)
                    .unwrap_or("?");
                f.write_str(name)
            }
        }
    }
}
