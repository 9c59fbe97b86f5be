//! Receivers for caught signals

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use anyhow::Context;

/// Receiver of the signals bound to hotkeys
///
/// Implementations are invoked from whichever thread the event bus delivers
/// key presses on, possibly several at once, so they must be `Send + Sync`.
/// Errors are logged by the session and never stop the dispatch loop.
pub trait Catcher: Send + Sync {
    fn catch(&self, signal: &str) -> anyhow::Result<()>;
}

impl<F> Catcher for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    fn catch(&self, signal: &str) -> anyhow::Result<()> {
        self(signal)
    }
}

/// Writes every caught signal as one line to a writer
///
/// The daemon uses this on stdout so signals can be piped into a shell loop.
pub struct WriterCatcher<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterCatcher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WriterCatcher<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> Catcher for WriterCatcher<W> {
    fn catch(&self, signal: &str) -> anyhow::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{signal}").context("failed to write signal")?;
        writer.flush().context("failed to flush signal")?;
        Ok(())
    }
}
