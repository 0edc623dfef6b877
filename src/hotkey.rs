use std::{fmt, str::FromStr};

use thiserror::Error;

/// Modifier flags, using the Win32 `MOD_*` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers(pub u32);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const ALT: Self = Self(0x1);
    pub const CONTROL: Self = Self(0x2);
    pub const SHIFT: Self = Self(0x4);
    pub const WIN: Self = Self(0x8);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A global hotkey: a virtual-key code plus modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub virtual_key: u32,
}

impl Hotkey {
    pub const F9: Self = Self {
        modifiers: Modifiers::NONE,
        virtual_key: 0x78,
    };
}

impl Default for Hotkey {
    fn default() -> Self {
        Self::F9
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hotkey: {0}")]
pub struct ParseHotkeyError(String);

fn virtual_key(name: &str) -> Option<u32> {
    let upper = name.to_ascii_uppercase();
    match upper.as_bytes() {
        [c @ (b'A'..=b'Z' | b'0'..=b'9')] => Some(*c as u32),
        [b'F', n @ ..] if !n.is_empty() => match upper[1..].parse::<u32>() {
            Ok(n @ 1..=24) => Some(0x70 + n - 1),
            _ => None,
        },
        _ => None,
    }
}

fn key_name(vk: u32) -> Option<String> {
    match vk {
        0x30..=0x39 | 0x41..=0x5A => char::from_u32(vk).map(String::from),
        0x70..=0x87 => Some(format!("F{}", vk - 0x70 + 1)),
        _ => None,
    }
}

impl FromStr for Hotkey {
    type Err = ParseHotkeyError;

    /// Parses strings such as `F9` or `Ctrl+Shift+B`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseHotkeyError(s.to_owned());

        let mut parts: Vec<_> = s.split('+').map(str::trim).collect();
        let key = parts.pop().filter(|k| !k.is_empty()).ok_or_else(err)?;

        let mut modifiers = Modifiers::NONE;
        for part in parts {
            modifiers = modifiers
                | match part.to_ascii_lowercase().as_str() {
                    "ctrl" | "control" => Modifiers::CONTROL,
                    "alt" => Modifiers::ALT,
                    "shift" => Modifiers::SHIFT,
                    "win" | "super" => Modifiers::WIN,
                    _ => return Err(err()),
                };
        }

        Ok(Self {
            modifiers,
            virtual_key: virtual_key(key).ok_or_else(err)?,
        })
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Modifiers::CONTROL, "Ctrl+"),
            (Modifiers::ALT, "Alt+"),
            (Modifiers::SHIFT, "Shift+"),
            (Modifiers::WIN, "Win+"),
        ] {
            if self.modifiers.contains(flag) {
                f.write_str(name)?;
            }
        }
        match key_name(self.virtual_key) {
            Some(name) => f.write_str(&name),
            None => write!(f, "VK_{:02X}", self.virtual_key),
        }
    }
}

/// Something that reports presses of a hotkey.
pub trait HotkeySource {
    /// Returns true if the hotkey was pressed since the last call.
    fn poll(&mut self) -> bool;

    /// Registers or releases the hotkey. Inactive sources never report presses.
    ///
    /// Returns whether the hotkey is usable afterwards. Registration fails when another
    /// application already owns the key combination.
    fn set_active(&mut self, active: bool) -> bool {
        active
    }
}
