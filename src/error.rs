//! Error types for hotkey loading, binding and release

use std::path::PathBuf;

use crate::bus::BusError;

/// Errors surfaced by a [`Keybind`](crate::Keybind) session and the hotkey
/// file helpers
#[derive(Debug, thiserror::Error)]
pub enum KeybindError {
    #[error("hotkey file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode hotkeys: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to connect to event bus: {0}")]
    Connection(#[source] BusError),

    #[error("failed to bind {key:?} to signal {signal:?}: {source}")]
    Registration {
        key: String,
        signal: String,
        #[source]
        source: BusError,
    },

    #[error("failed to release {key:?}: {source}")]
    Release {
        key: String,
        #[source]
        source: BusError,
    },

    #[error("registration task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("keybind session was already initialized")]
    AlreadyInitialized,

    #[error("hotkeys cannot change once the session has been initialized")]
    SessionActive,
}

pub type Result<T, E = KeybindError> = std::result::Result<T, E>;
