//! Drives a bound session until shutdown

use std::future::Future;
use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::bus::EventBus;
use crate::session::Keybind;

/// Run the dispatch loop on a blocking thread until `shutdown` resolves,
/// then release the session and wait for the loop to stop
///
/// A failing `shutdown` future (signal handlers could not be installed)
/// still releases the session, then returns the error.
pub async fn supervise<B, F>(keybind: Arc<Keybind<B>>, shutdown: F) -> Result<()>
where
    B: EventBus + 'static,
    F: Future<Output = io::Result<&'static str>>,
{
    // Dispatch loop blocks, keep it off the runtime threads
    let mut dispatcher = {
        let keybind = Arc::clone(&keybind);
        tokio::task::spawn_blocking(move || keybind.wait())
    };

    let (dispatcher_done, shutdown_error) = tokio::select! {
        joined = &mut dispatcher => {
            match joined {
                Ok(Ok(())) => warn!("dispatch loop exited before shutdown"),
                Ok(Err(e)) => error!(?e, "dispatch loop failed"),
                Err(e) => error!(?e, "dispatch thread panicked"),
            }
            (true, None)
        }

        cause = shutdown => match cause {
            Ok(cause) => {
                info!(cause, "shutdown signal received");
                (false, None)
            }
            Err(e) => {
                error!(?e, "failed to install signal handlers");
                (false, Some(e))
            }
        },
    };

    info!("shutting down...");
    keybind.release().context("failed to release hotkeys")?;
    if !dispatcher_done {
        dispatcher.await??;
    }

    match shutdown_error {
        Some(e) => Err(e).context("failed to install signal handlers"),
        None => Ok(()),
    }
}
