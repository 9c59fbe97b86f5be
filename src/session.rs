//! Keybind session: binds a hotkey list on an event bus and forwards key
//! presses to a [`Catcher`]
//!
//! Lifecycle: [`Keybind::set_hotkeys`] or [`Keybind::load_from_file`] →
//! [`Keybind::init`] → [`Keybind::wait`] (blocking) → [`Keybind::release`]
//! from another thread. A released session cannot be initialized again.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::bus::{Connection, EventBus, KeyCallback, KeyCombo, Token};
use crate::catcher::Catcher;
use crate::config::{load_hotkeys, Hotkey};
use crate::error::{KeybindError, Result};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Hotkeys may still be replaced
    #[default]
    Idle,
    /// Connection open, registrations running or interrupted
    Binding,
    /// Hotkeys are registered on an open connection
    Bound,
    /// Bindings released and connection closed
    Released,
}

/// A hotkey together with the token the bus issued for it
#[derive(Debug)]
struct Registration {
    hotkey: Hotkey,
    token: Token,
}

struct Session<C> {
    phase: Phase,
    connection: Option<Arc<C>>,
    registrations: Vec<Registration>,
}

/// Binds hotkeys on an event bus and forwards their signals to a catcher
pub struct Keybind<B: EventBus> {
    bus: B,
    catcher: Arc<dyn Catcher>,
    hotkeys: Vec<Hotkey>,
    session: Mutex<Session<B::Connection>>,
}

impl<B: EventBus> Keybind<B> {
    /// Create an idle session with an empty hotkey list
    pub fn new(bus: B, catcher: Arc<dyn Catcher>) -> Self {
        Self {
            bus,
            catcher,
            hotkeys: Vec::new(),
            session: Mutex::new(Session {
                phase: Phase::Idle,
                connection: None,
                registrations: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session<B::Connection>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_mut(&mut self) -> &mut Session<B::Connection> {
        self.session.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn hotkeys(&self) -> &[Hotkey] {
        &self.hotkeys
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Number of hotkeys currently registered on the bus
    pub fn bound(&self) -> usize {
        self.lock().registrations.len()
    }

    /// Replace the hotkey list
    pub fn set_hotkeys(&mut self, hotkeys: Vec<Hotkey>) -> Result<()> {
        if self.session_mut().phase != Phase::Idle {
            return Err(KeybindError::SessionActive);
        }
        self.hotkeys = hotkeys;
        Ok(())
    }

    /// Replace the hotkey list with the contents of a JSON file
    ///
    /// On failure the current list is left untouched.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.session_mut().phase != Phase::Idle {
            return Err(KeybindError::SessionActive);
        }

        let hotkeys = load_hotkeys(path)?;
        info!(path = ?path, count = hotkeys.len(), "hotkeys loaded");
        self.hotkeys = hotkeys;
        Ok(())
    }

    /// Connect to the bus and register every hotkey
    ///
    /// Each registration runs on its own blocking task so the bus may block
    /// inside `register` without stalling the caller. All tasks are joined
    /// before returning. The first failure observed is returned, after every
    /// registration that did succeed has been rolled back and the connection
    /// closed.
    pub async fn init(&mut self) -> Result<()> {
        if self.session_mut().phase != Phase::Idle {
            return Err(KeybindError::AlreadyInitialized);
        }

        let connection = Arc::new(self.bus.connect().map_err(KeybindError::Connection)?);
        info!(hotkeys = self.hotkeys.len(), "event bus connected, binding hotkeys");

        // Recorded before any task starts, so a cancelled init can still be
        // released or dropped
        let session = self.session_mut();
        session.connection = Some(Arc::clone(&connection));
        session.phase = Phase::Binding;

        let mut tasks = JoinSet::new();
        for hotkey in self.hotkeys.iter().cloned() {
            let connection = Arc::clone(&connection);
            let callback = catch_callback(Arc::clone(&self.catcher), hotkey.signal.clone());
            tasks.spawn_blocking(move || {
                let result = connection.register(&hotkey.key, callback);
                (hotkey, result)
            });
        }

        let mut registrations = Vec::with_capacity(self.hotkeys.len());
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((hotkey, Ok(token))) => {
                    debug!(key = %hotkey.key, signal = %hotkey.signal, %token, "hotkey bound");
                    registrations.push(Registration { hotkey, token });
                }
                Ok((hotkey, Err(source))) => {
                    warn!(key = %hotkey.key, signal = %hotkey.signal, error = %source, "failed to bind hotkey");
                    if first_error.is_none() {
                        first_error = Some(KeybindError::Registration {
                            key: hotkey.key,
                            signal: hotkey.signal,
                            source,
                        });
                    }
                }
                Err(e) => {
                    error!(?e, "registration task failed");
                    if first_error.is_none() {
                        first_error = Some(KeybindError::Task(e));
                    }
                }
            }
        }

        let session = self.session_mut();
        if let Some(err) = first_error {
            rollback(connection.as_ref(), &registrations);
            connection.close();
            session.connection = None;
            session.phase = Phase::Released;
            return Err(err);
        }

        info!(bound = registrations.len(), "hotkeys bound");
        session.registrations = registrations;
        session.phase = Phase::Bound;
        Ok(())
    }

    /// Run the bus event loop on the calling thread until the session is
    /// released
    ///
    /// Returns immediately when there is no open connection.
    pub fn wait(&self) -> Result<()> {
        let Some(connection) = self.lock().connection.clone() else {
            debug!("no open connection, nothing to dispatch");
            return Ok(());
        };

        info!("dispatching key events");
        connection.run().map_err(KeybindError::Connection)?;
        info!("dispatch loop stopped");
        Ok(())
    }

    /// Unregister every hotkey and close the connection, which makes
    /// [`wait`](Keybind::wait) return
    ///
    /// Stops at the first failing unregistration; that binding and the ones
    /// after it stay recorded so a later call can retry them. A session
    /// whose init was cancelled only has its connection closed, which drops
    /// whatever the interrupted tasks managed to bind. Releasing a session
    /// that was never initialized, or already released, is a no-op.
    pub fn release(&self) -> Result<()> {
        let mut session = self.lock();
        if !matches!(session.phase, Phase::Binding | Phase::Bound) {
            debug!(phase = ?session.phase, "nothing to release");
            return Ok(());
        }
        let Some(connection) = session.connection.clone() else {
            return Ok(());
        };

        let failure = session
            .registrations
            .iter()
            .enumerate()
            .find_map(|(index, registration)| {
                match connection.unregister(registration.token) {
                    Ok(()) => {
                        debug!(key = %registration.hotkey.key, token = %registration.token, "hotkey released");
                        None
                    }
                    Err(source) => Some((index, source)),
                }
            });

        if let Some((index, source)) = failure {
            session.registrations.drain(..index);
            let key = session.registrations[0].hotkey.key.clone();
            warn!(key = %key, error = %source, remaining = session.registrations.len(), "failed to release hotkey");
            return Err(KeybindError::Release { key, source });
        }

        let released = session.registrations.len();
        session.registrations.clear();
        connection.close();
        session.connection = None;
        session.phase = Phase::Released;
        info!(released, "hotkeys released");
        Ok(())
    }
}

impl<B: EventBus> Drop for Keybind<B> {
    fn drop(&mut self) {
        if let Some(connection) = self.session_mut().connection.take() {
            warn!("keybind session dropped without release, closing connection");
            connection.close();
        }
    }
}

/// Build the bus callback for one hotkey
///
/// Catcher errors and panics stop here; they are logged and never reach the
/// bus event loop.
fn catch_callback(catcher: Arc<dyn Catcher>, signal: String) -> KeyCallback {
    Arc::new(move |combo: &KeyCombo| {
        match panic::catch_unwind(AssertUnwindSafe(|| catcher.catch(&signal))) {
            Ok(Ok(())) => debug!(key = %combo, signal = %signal, "signal caught"),
            Ok(Err(e)) => warn!(key = %combo, signal = %signal, error = %e, "catcher failed"),
            Err(_) => error!(key = %combo, signal = %signal, "catcher panicked"),
        }
    })
}

/// Best-effort removal of bindings left over by a failed init
fn rollback<C: Connection>(connection: &C, registrations: &[Registration]) {
    for registration in registrations {
        if let Err(e) = connection.unregister(registration.token) {
            warn!(key = %registration.hotkey.key, error = %e, "failed to roll back hotkey");
        }
    }
    if !registrations.is_empty() {
        info!(count = registrations.len(), "rolled back partial registration");
    }
}
