//! Binding table shared by the bundled buses

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{KeyCallback, KeyCombo, Modifiers, Token};

struct Binding {
    token: Token,
    descriptor: String,
    callback: KeyCallback,
}

/// Maps normalized key combinations to their callbacks
#[derive(Default)]
pub(crate) struct BindingTable {
    next_token: AtomicU64,
    bindings: Mutex<HashMap<KeyCombo, Vec<Binding>>>,
}

impl BindingTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<KeyCombo, Vec<Binding>>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a binding and hand out a fresh token for it
    pub fn insert(&self, combo: KeyCombo, descriptor: &str, callback: KeyCallback) -> Token {
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed) + 1);
        self.lock().entry(combo).or_default().push(Binding {
            token,
            descriptor: descriptor.to_string(),
            callback,
        });
        token
    }

    /// Remove the binding for `token`, returning its descriptor if it existed
    pub fn remove(&self, token: Token) -> Option<String> {
        let mut bindings = self.lock();
        let combo = bindings
            .iter()
            .find(|(_, list)| list.iter().any(|b| b.token == token))
            .map(|(combo, _)| combo.clone())?;

        let list = bindings.get_mut(&combo)?;
        let index = list.iter().position(|b| b.token == token)?;
        let removed = list.remove(index);
        if list.is_empty() {
            bindings.remove(&combo);
        }
        Some(removed.descriptor)
    }

    /// Descriptor a token was registered with
    pub fn descriptor(&self, token: Token) -> Option<String> {
        self.lock()
            .values()
            .flatten()
            .find(|b| b.token == token)
            .map(|b| b.descriptor.clone())
    }

    /// Callbacks bound to a pressed combination, including `Any` bindings
    /// for the same key
    pub fn matching(&self, pressed: &KeyCombo) -> Vec<KeyCallback> {
        let any = KeyCombo {
            modifiers: Modifiers {
                any: true,
                ..Modifiers::default()
            },
            key: pressed.key.clone(),
        };

        let bindings = self.lock();
        let mut callbacks: Vec<KeyCallback> = bindings
            .get(pressed)
            .into_iter()
            .flatten()
            .map(|b| b.callback.clone())
            .collect();
        if any != *pressed {
            callbacks.extend(
                bindings
                    .get(&any)
                    .into_iter()
                    .flatten()
                    .map(|b| b.callback.clone()),
            );
        }
        callbacks
    }

    /// Invoke every callback matching `pressed`; the table lock is not held
    /// while callbacks run
    pub fn dispatch(&self, pressed: &KeyCombo) -> usize {
        let callbacks = self.matching(pressed);
        for callback in &callbacks {
            callback(pressed);
        }
        callbacks.len()
    }

    /// Normalized descriptors of all live bindings, sorted
    pub fn descriptors(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .iter()
            .flat_map(|(combo, list)| list.iter().map(move |_| combo.to_string()))
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
