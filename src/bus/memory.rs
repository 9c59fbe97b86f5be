//! In-process event bus
//!
//! Key presses are injected with [`MemoryBus::press`] instead of coming from
//! a display server. Useful for applications that synthesise their own key
//! events and for exercising a session deterministically.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use super::table::BindingTable;
use super::{parse_key, BusError, Connection, EventBus, KeyCallback, Token};

/// Faults injected into the bus
#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    rejected: Mutex<HashSet<String>>,
    stuck: Mutex<HashSet<String>>,
}

#[derive(Default)]
struct BusState {
    faults: Faults,
    connections: Mutex<Vec<Arc<ConnectionState>>>,
}

struct ConnectionState {
    table: BindingTable,
    closed: Mutex<bool>,
    wake: Condvar,
}

impl ConnectionState {
    fn closed(&self) -> MutexGuard<'_, bool> {
        self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_open(&self) -> bool {
        !*self.closed()
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Event bus living entirely in memory
///
/// Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Arc<BusState>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make [`connect`](EventBus::connect) fail until re-enabled
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Refuse registrations for `key`, as if another client had grabbed it
    pub fn reject(&self, key: &str) {
        locked(&self.state.faults.rejected).insert(key.to_string());
    }

    /// Make unregistering bindings made for `key` fail
    pub fn stick(&self, key: &str) {
        locked(&self.state.faults.stuck).insert(key.to_string());
    }

    /// Allow bindings made for `key` to be unregistered again
    pub fn unstick(&self, key: &str) {
        locked(&self.state.faults.stuck).remove(key);
    }

    /// Deliver a key press to every open connection, returning how many
    /// callbacks ran
    pub fn press(&self, key: &str) -> Result<usize, BusError> {
        let pressed = parse_key(key)?;
        let delivered: usize = self
            .open_connections_list()
            .iter()
            .map(|conn| conn.table.dispatch(&pressed))
            .sum();
        trace!(key = %pressed, delivered, "key press injected");
        Ok(delivered)
    }

    /// Number of connections that have not been closed
    pub fn open_connections(&self) -> usize {
        self.open_connections_list().len()
    }

    /// Number of live bindings across all open connections
    pub fn live_registrations(&self) -> usize {
        self.open_connections_list()
            .iter()
            .map(|conn| conn.table.len())
            .sum()
    }

    /// Normalized descriptors of all live bindings
    pub fn bound_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .open_connections_list()
            .iter()
            .flat_map(|conn| conn.table.descriptors())
            .collect();
        keys.sort();
        keys
    }

    fn open_connections_list(&self) -> Vec<Arc<ConnectionState>> {
        let mut connections = locked(&self.state.connections);
        connections.retain(|conn| conn.is_open());
        connections.clone()
    }
}

impl EventBus for MemoryBus {
    type Connection = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection, BusError> {
        if self.state.faults.unavailable.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable("memory bus is offline".into()));
        }

        let conn = Arc::new(ConnectionState {
            table: BindingTable::default(),
            closed: Mutex::new(false),
            wake: Condvar::new(),
        });
        locked(&self.state.connections).push(Arc::clone(&conn));
        debug!("memory bus connection opened");

        Ok(MemoryConnection {
            bus: Arc::clone(&self.state),
            conn,
        })
    }
}

/// Connection to a [`MemoryBus`]
pub struct MemoryConnection {
    bus: Arc<BusState>,
    conn: Arc<ConnectionState>,
}

impl Connection for MemoryConnection {
    fn register(&self, key: &str, callback: KeyCallback) -> Result<Token, BusError> {
        if !self.conn.is_open() {
            return Err(BusError::Closed);
        }
        if locked(&self.bus.faults.rejected).contains(key) {
            return Err(BusError::Rejected {
                key: key.to_string(),
                reason: "already grabbed by another client".into(),
            });
        }

        let combo = parse_key(key)?;
        let token = self.conn.table.insert(combo, key, callback);
        debug!(key, %token, "memory bus binding added");
        Ok(token)
    }

    fn unregister(&self, token: Token) -> Result<(), BusError> {
        if let Some(key) = self.conn.table.descriptor(token) {
            if locked(&self.bus.faults.stuck).contains(&key) {
                return Err(BusError::Rejected {
                    key,
                    reason: "binding is stuck".into(),
                });
            }
        }

        match self.conn.table.remove(token) {
            Some(key) => debug!(key = %key, %token, "memory bus binding removed"),
            None => debug!(%token, "unknown token, nothing to remove"),
        }
        Ok(())
    }

    fn run(&self) -> Result<(), BusError> {
        let mut closed = self.conn.closed();
        while !*closed {
            closed = self
                .conn
                .wake
                .wait(closed)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }

    fn close(&self) {
        *self.conn.closed() = true;
        self.conn.table.clear();
        self.conn.wake.notify_all();
        debug!("memory bus connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn noop() -> KeyCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn test_register_and_press() {
        let bus = MemoryBus::new();
        let conn = bus.connect().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let cb_hits = Arc::clone(&hits);
        conn.register(
            "Ctrl-F1",
            Arc::new(move |_| {
                cb_hits.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        assert_eq!(bus.press("Control-F1").unwrap(), 1);
        assert_eq!(bus.press("F1").unwrap(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.bound_keys(), vec!["Control-F1".to_string()]);
    }

    #[test]
    fn test_faults() {
        let bus = MemoryBus::new();
        bus.set_unavailable(true);
        assert!(matches!(bus.connect(), Err(BusError::Unavailable(_))));
        bus.set_unavailable(false);

        let conn = bus.connect().unwrap();
        bus.reject("Mod4-x");
        assert!(matches!(
            conn.register("Mod4-x", noop()),
            Err(BusError::Rejected { .. })
        ));
        assert!(matches!(
            conn.register("Bogus-x", noop()),
            Err(BusError::InvalidKey { .. })
        ));
        assert!(matches!(
            conn.register("Any-Shift-x", noop()),
            Err(BusError::InvalidKey { .. })
        ));
        assert_eq!(bus.live_registrations(), 0);

        bus.stick("Mod4-y");
        let token = conn.register("Mod4-y", noop()).unwrap();
        assert!(conn.unregister(token).is_err());
        bus.unstick("Mod4-y");
        conn.unregister(token).unwrap();
        conn.unregister(token).unwrap();
    }

    #[test]
    fn test_close_stops_run() {
        let bus = MemoryBus::new();
        let conn = Arc::new(bus.connect().unwrap());
        conn.register("F2", noop()).unwrap();

        let runner = {
            let conn = Arc::clone(&conn);
            thread::spawn(move || conn.run())
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(bus.open_connections(), 1);

        conn.close();
        runner.join().unwrap().unwrap();
        assert_eq!(bus.open_connections(), 0);
        assert_eq!(bus.live_registrations(), 0);
        assert!(matches!(conn.register("F3", noop()), Err(BusError::Closed)));
    }
}
