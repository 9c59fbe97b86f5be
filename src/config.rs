//! Configuration loading and management
//!
//! Two kinds of configuration live here: the hotkey file (a JSON array of
//! `{"key": ..., "signal": ...}` objects) and the daemon settings resolved
//! from the environment.
//!
//! # Example hotkey file
//!
//! ```json
//! [
//!   { "key": "Control-F1", "signal": "toggle" },
//!   { "key": "Mod4-q", "signal": "quit" }
//! ]
//! ```

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::KeybindError;

/// One key combination and the signal it sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotkey {
    /// Key-combination descriptor, validated by the event bus at binding time
    pub key: String,
    /// Application-defined string forwarded verbatim to the catcher
    pub signal: String,
}

impl Hotkey {
    pub fn new(key: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            signal: signal.into(),
        }
    }
}

/// Load a hotkey list from a JSON file
pub fn load_hotkeys(path: &Path) -> Result<Vec<Hotkey>, KeybindError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(KeybindError::NotFound {
                path: path.to_owned(),
            })
        }
        Err(source) => {
            return Err(KeybindError::Io {
                path: path.to_owned(),
                source,
            })
        }
    };

    serde_json::from_str(&contents).map_err(|source| KeybindError::Decode {
        path: path.to_owned(),
        source,
    })
}

/// Write a hotkey list as pretty-printed JSON, creating parent directories
pub fn save_hotkeys(path: &Path, hotkeys: &[Hotkey]) -> Result<(), KeybindError> {
    let json = serde_json::to_string_pretty(hotkeys).map_err(KeybindError::Encode)?;
    let io_err = |source| KeybindError::Io {
        path: path.to_owned(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, json + "\n").map_err(io_err)
}

/// Starter hotkeys written by `keybind-daemon init-config`
pub fn default_hotkeys() -> Vec<Hotkey> {
    vec![
        Hotkey::new("Control-F1", "toggle"),
        Hotkey::new("Mod4-Shift-q", "quit"),
    ]
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the hotkey file
    pub hotkeys_path: PathBuf,

    /// Path to the Unix domain socket the event bus listens on
    pub socket_path: PathBuf,

    /// Extra log detail: 0 info, 1 debug, 2 and above trace
    pub verbosity: u8,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = || {
            lookup("HOME")
                .map(PathBuf::from)
                .context("HOME is not set")
        };

        let hotkeys_path = match lookup("KEYBIND_HOTKEYS") {
            Some(path) => PathBuf::from(path),
            None => {
                let config_dir = match lookup("XDG_CONFIG_HOME") {
                    Some(dir) => PathBuf::from(dir),
                    None => home()?.join(".config"),
                };
                config_dir.join("keybind").join("hotkeys.json")
            }
        };

        let socket_path = match lookup("KEYBIND_SOCKET") {
            Some(path) => PathBuf::from(path),
            None => match lookup("XDG_RUNTIME_DIR") {
                Some(dir) => PathBuf::from(dir).join("keybind.sock"),
                None => home()?
                    .join(".local")
                    .join("share")
                    .join("keybind")
                    .join("keybind.sock"),
            },
        };

        let verbosity = match lookup("KEYBIND_VERBOSE") {
            Some(level) => level
                .trim()
                .parse()
                .with_context(|| format!("KEYBIND_VERBOSE must be 0-255, got {level:?}"))?,
            None => 0,
        };

        Ok(Self {
            hotkeys_path,
            socket_path,
            verbosity,
        })
    }

    /// Log filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
