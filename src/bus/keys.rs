//! Key-combination descriptors
//!
//! Parses descriptors such as `Control-Shift-F1` or `Mod4-x` into a
//! normalized [`KeyCombo`], so that equivalent spellings (`Ctrl-Alt-t`,
//! `Mod1-Control-t`) bind to the same key.

use std::fmt;
use std::str::FromStr;

/// Modifier names accepted in descriptors, with their canonical spelling
const MODIFIER_ALIASES: &[(&str, &str)] = &[
    ("shift", "Shift"),
    ("lock", "Lock"),
    ("control", "Control"),
    ("ctrl", "Control"),
    ("mod1", "Mod1"),
    ("alt", "Mod1"),
    ("mod2", "Mod2"),
    ("mod3", "Mod3"),
    ("mod4", "Mod4"),
    ("super", "Mod4"),
    ("mod5", "Mod5"),
    ("any", "Any"),
];

/// Tracks which modifier keys a combination requires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Shift key is held
    pub shift: bool,
    /// Caps lock is on
    pub lock: bool,
    /// Control key is held
    pub control: bool,
    /// Mod1 (usually Alt) is held
    pub mod1: bool,
    /// Mod2 (usually Num Lock) is on
    pub mod2: bool,
    /// Mod3 is held
    pub mod3: bool,
    /// Mod4 (usually Super) is held
    pub mod4: bool,
    /// Mod5 is held
    pub mod5: bool,
    /// Match regardless of the modifier state
    pub any: bool,
}

impl Modifiers {
    /// Check if no modifier is required
    pub fn is_empty(&self) -> bool {
        self.names().next().is_none()
    }

    /// Canonical modifier names in a stable order
    fn names(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.shift, "Shift"),
            (self.lock, "Lock"),
            (self.control, "Control"),
            (self.mod1, "Mod1"),
            (self.mod2, "Mod2"),
            (self.mod3, "Mod3"),
            (self.mod4, "Mod4"),
            (self.mod5, "Mod5"),
            (self.any, "Any"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
    }

    /// Set the flag for a canonical modifier name, returning false if it was
    /// already set
    fn insert(&mut self, canonical: &str) -> bool {
        let flag = match canonical {
            "Shift" => &mut self.shift,
            "Lock" => &mut self.lock,
            "Control" => &mut self.control,
            "Mod1" => &mut self.mod1,
            "Mod2" => &mut self.mod2,
            "Mod3" => &mut self.mod3,
            "Mod4" => &mut self.mod4,
            "Mod5" => &mut self.mod5,
            _ => &mut self.any,
        };
        !std::mem::replace(flag, true)
    }
}

/// A parsed key combination: a set of modifiers plus one key name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    /// Required modifiers
    pub modifiers: Modifiers,
    /// Key name as written (`F1`, `x`, `Return`)
    pub key: String,
}

/// Errors produced while parsing a key descriptor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("key descriptor is empty")]
    Empty,

    #[error("key descriptor {0:?} contains an empty component")]
    EmptyComponent(String),

    #[error("unknown modifier {0:?}")]
    UnknownModifier(String),

    #[error("modifier {0:?} given more than once")]
    DuplicateModifier(String),

    #[error("key descriptor {0:?} combines Any with other modifiers")]
    AnyWithModifiers(String),

    #[error("key name {0:?} contains whitespace")]
    InvalidKeyName(String),
}

impl FromStr for KeyCombo {
    type Err = KeyParseError;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return Err(KeyParseError::Empty);
        }

        let mut parts: Vec<&str> = descriptor.split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(KeyParseError::EmptyComponent(descriptor.to_string()));
        }

        // split() always yields at least one part
        let key = parts.pop().unwrap_or_default();
        if key.chars().any(char::is_whitespace) {
            return Err(KeyParseError::InvalidKeyName(key.to_string()));
        }

        let mut modifiers = Modifiers::default();
        for part in parts {
            let lowered = part.to_ascii_lowercase();
            let canonical = MODIFIER_ALIASES
                .iter()
                .find(|(alias, _)| *alias == lowered)
                .map(|(_, canonical)| *canonical)
                .ok_or_else(|| KeyParseError::UnknownModifier(part.to_string()))?;

            if !modifiers.insert(canonical) {
                return Err(KeyParseError::DuplicateModifier(canonical.to_string()));
            }
        }

        // Any already matches every modifier state
        if modifiers.any && modifiers.names().nth(1).is_some() {
            return Err(KeyParseError::AnyWithModifiers(descriptor.to_string()));
        }

        Ok(Self {
            modifiers,
            key: key.to_string(),
        })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in self.modifiers.names() {
            write!(f, "{}-", name)?;
        }
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key() {
        let combo: KeyCombo = "F1".parse().unwrap();
        assert!(combo.modifiers.is_empty());
        assert_eq!(combo.key, "F1");
    }

    #[test]
    fn test_control_shift() {
        let combo: KeyCombo = "Control-Shift-F1".parse().unwrap();
        assert!(combo.modifiers.control);
        assert!(combo.modifiers.shift);
        assert!(!combo.modifiers.mod1);
        assert_eq!(combo.to_string(), "Shift-Control-F1");
    }

    #[test]
    fn test_aliases_normalize() {
        let a: KeyCombo = "Ctrl-Alt-t".parse().unwrap();
        let b: KeyCombo = "mod1-control-t".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Control-Mod1-t");

        let s: KeyCombo = "Super-x".parse().unwrap();
        assert!(s.modifiers.mod4);
    }

    #[test]
    fn test_any_alone_is_accepted() {
        let combo: KeyCombo = "any-Return".parse().unwrap();
        assert!(combo.modifiers.any);
        assert_eq!(combo.to_string(), "Any-Return");
    }

    #[test]
    fn test_key_case_is_kept() {
        let lower: KeyCombo = "Mod4-x".parse().unwrap();
        let upper: KeyCombo = "Mod4-X".parse().unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_rejects_bad_descriptors() {
        assert_eq!("".parse::<KeyCombo>(), Err(KeyParseError::Empty));
        assert!(matches!(
            "Control-".parse::<KeyCombo>(),
            Err(KeyParseError::EmptyComponent(_))
        ));
        assert_eq!(
            "Hyper-x".parse::<KeyCombo>(),
            Err(KeyParseError::UnknownModifier("Hyper".into()))
        );
        assert_eq!(
            "Ctrl-Control-x".parse::<KeyCombo>(),
            Err(KeyParseError::DuplicateModifier("Control".into()))
        );
        assert!(matches!(
            "Any-Shift-x".parse::<KeyCombo>(),
            Err(KeyParseError::AnyWithModifiers(_))
        ));
        assert!(matches!(
            "Control-Any-x".parse::<KeyCombo>(),
            Err(KeyParseError::AnyWithModifiers(_))
        ));
        assert!(matches!(
            "Control-Page Up".parse::<KeyCombo>(),
            Err(KeyParseError::InvalidKeyName(_))
        ));
    }
}
