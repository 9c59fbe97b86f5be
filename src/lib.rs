//! keybind: global hotkeys mapped to application signals
//!
//! A [`Keybind`] session loads `{key, signal}` pairs, binds each key
//! combination on an [`EventBus`](bus::EventBus), and forwards every
//! matching key press to a [`Catcher`] as its signal string.
//!
//! ```no_run
//! use std::sync::Arc;
//! use keybind::bus::MemoryBus;
//! use keybind::{Hotkey, Keybind};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let bus = MemoryBus::new();
//! let catcher = |signal: &str| -> anyhow::Result<()> {
//!     println!("caught signal: {signal}");
//!     Ok(())
//! };
//! let mut kb = Keybind::new(bus.clone(), Arc::new(catcher));
//! kb.set_hotkeys(vec![Hotkey::new("Control-F1", "toggle")])?;
//! kb.init().await?;
//! bus.press("Control-F1")?;
//! kb.release()?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod catcher;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod session;

pub use catcher::{Catcher, WriterCatcher};
pub use config::{load_hotkeys, save_hotkeys, Config, Hotkey};
pub use error::KeybindError;
pub use session::{Keybind, Phase};
