//! Key and modifier encoding for native key events.
//!
//! Keys resolve through a fixed name table onto W3C key codes before hitting
//! the wire: named keys, arrows under both spellings, `F1`-`F12`,
//! `KeyA`-`KeyZ` / `Digit0`-`Digit9`, and bare alphanumerics. The compound
//! `"Ctrl+C"` form is split and merged with any explicitly supplied
//! modifiers.

use std::collections::BTreeSet;

use crate::error::Error;

/// Modifier keys accepted in `mods` strings, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Super,
}

impl Modifier {
    fn parse(token: &str) -> Result<Self, Error> {
        match token.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Ok(Modifier::Ctrl),
            "shift" => Ok(Modifier::Shift),
            "alt" => Ok(Modifier::Alt),
            "super" | "meta" => Ok(Modifier::Super),
            other => Err(Error::UnknownModifier(other.to_string())),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Shift => "shift",
            Modifier::Alt => "alt",
            Modifier::Super => "super",
        }
    }
}

/// A resolved key plus its modifier set, ready to encode as a key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub mods: BTreeSet<Modifier>,
}

impl KeyChord {
    /// Comma-joined modifier string for the wire, `None` when empty.
    pub fn mods_param(&self) -> Option<String> {
        if self.mods.is_empty() {
            return None;
        }
        Some(
            self.mods
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// Parse a comma-separated modifier set. Unknown tokens fail.
pub fn parse_mods(input: &str) -> Result<BTreeSet<Modifier>, Error> {
    let mut mods = BTreeSet::new();
    for token in input.split(',') {
        if token.trim().is_empty() {
            continue;
        }
        mods.insert(Modifier::parse(token)?);
    }
    Ok(mods)
}

/// Resolve a key name (optionally in compound `"Modifier+Key"` form) and an
/// optional explicit modifier string into a [`KeyChord`]. Modifiers from
/// both sources are unioned.
pub fn resolve(key: &str, explicit_mods: Option<&str>) -> Result<KeyChord, Error> {
    let mut mods = match explicit_mods {
        Some(raw) => parse_mods(raw)?,
        None => BTreeSet::new(),
    };

    let mut name = key;
    if let Some((prefix, last)) = key.rsplit_once('+') {
        for token in prefix.split('+') {
            mods.insert(Modifier::parse(token)?);
        }
        name = last;
    }

    let resolved = resolve_name(name).ok_or_else(|| Error::UnknownKey(name.to_string()))?;
    Ok(KeyChord {
        key: resolved,
        mods,
    })
}

fn resolve_name(name: &str) -> Option<String> {
    let lower = name.to_ascii_lowercase();

    let named = match lower.as_str() {
        "enter" | "return" => "Enter",
        "tab" => "Tab",
        "escape" | "esc" => "Escape",
        "backspace" => "Backspace",
        "delete" => "Delete",
        "space" => "Space",
        "home" => "Home",
        "end" => "End",
        "pageup" => "PageUp",
        "pagedown" => "PageDown",
        "insert" => "Insert",
        // Arrow keys under both accepted spellings.
        "up" | "arrowup" => "ArrowUp",
        "down" | "arrowdown" => "ArrowDown",
        "left" | "arrowleft" => "ArrowLeft",
        "right" | "arrowright" => "ArrowRight",
        _ => "",
    };
    if !named.is_empty() {
        return Some(named.to_string());
    }

    // Function keys F1-F12.
    if let Some(digits) = lower.strip_prefix('f') {
        if let Ok(n) = digits.parse::<u8>() {
            if (1..=12).contains(&n) {
                return Some(format!("F{n}"));
            }
        }
    }

    // W3C alphanumeric codes: KeyA-KeyZ, Digit0-Digit9.
    if let Some(letter) = lower.strip_prefix("key") {
        let mut chars = letter.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphabetic() {
                return Some(format!("Key{}", c.to_ascii_uppercase()));
            }
        }
    }
    if let Some(digit) = lower.strip_prefix("digit") {
        let mut chars = digit.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_digit() {
                return Some(format!("Digit{c}"));
            }
        }
    }

    // Bare alphanumerics resolve to their key codes.
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(format!("Key{}", c.to_ascii_uppercase()));
        }
        if c.is_ascii_digit() {
            return Some(format!("Digit{c}"));
        }
    }

    None
}
