//! Event bus abstraction
//!
//! A [`Keybind`](crate::Keybind) session talks to the windowing system only
//! through these traits: open a connection, register a key combination with
//! a callback, run the event loop, unregister by token. Two buses ship with
//! the crate:
//!
//! - [`MemoryBus`]: in-process bus, key presses are injected programmatically
//! - [`SocketBus`]: key presses arrive as JSON frames on a Unix socket

mod keys;
mod memory;
pub mod protocol;
mod socket;
mod table;

use std::fmt;
use std::sync::Arc;

pub use keys::{KeyCombo, KeyParseError, Modifiers};
pub use memory::{MemoryBus, MemoryConnection};
pub use socket::{send_request, SocketBus, SocketConnection};

/// Callback invoked by the bus for every key press matching a binding
pub type KeyCallback = Arc<dyn Fn(&KeyCombo) + Send + Sync>;

/// Opaque handle identifying one registered binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Factory for event-bus connections
pub trait EventBus: Send + Sync {
    /// The connection type produced by [`connect`](EventBus::connect)
    type Connection: Connection;

    /// Open a new connection to the bus
    fn connect(&self) -> Result<Self::Connection, BusError>;
}

/// One open connection to an event bus
///
/// Connections are shared between the registration tasks, the dispatch
/// thread and whoever calls [`close`](Connection::close), so every method
/// takes `&self` and implementations must be thread-safe.
pub trait Connection: Send + Sync + 'static {
    /// Bind `key` so that `callback` runs on every matching key press
    fn register(&self, key: &str, callback: KeyCallback) -> Result<Token, BusError>;

    /// Remove a binding. Unknown or already removed tokens are ignored.
    fn unregister(&self, token: Token) -> Result<(), BusError>;

    /// Run the event loop, blocking until [`close`](Connection::close) is
    /// called
    fn run(&self) -> Result<(), BusError>;

    /// Stop the event loop and drop all remaining bindings
    fn close(&self);
}

/// Errors reported by an event bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("invalid key descriptor {key:?}: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: KeyParseError,
    },

    #[error("key {key:?} rejected by event bus: {reason}")]
    Rejected { key: String, reason: String },

    #[error("event bus unavailable: {0}")]
    Unavailable(String),

    #[error("event bus connection is closed")]
    Closed,

    #[error("malformed message: {0}")]
    Protocol(String),

    #[error("event bus I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a descriptor, mapping failures to [`BusError::InvalidKey`]
pub(crate) fn parse_key(key: &str) -> Result<KeyCombo, BusError> {
    key.parse().map_err(|source| BusError::InvalidKey {
        key: key.to_string(),
        source,
    })
}
