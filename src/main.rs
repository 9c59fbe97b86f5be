//! keybind-daemon: binds global hotkeys and prints their signals
//!
//! Commands:
//! - `run` (default): load the hotkey file, bind every hotkey on the socket
//!   event bus, print each caught signal on stdout, release on SIGINT/SIGTERM
//! - `press <key>`: report one key press to a running daemon
//! - `init-config`: write a starter hotkey file if none exists
//!
//! Logs go to stderr so stdout carries only signals.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use keybind::bus::protocol::{Request, Response};
use keybind::bus::{send_request, SocketBus};
use keybind::config::{default_hotkeys, save_hotkeys};
use keybind::lifecycle::{supervise, ShutdownSignal};
use keybind::{Config, Keybind, WriterCatcher};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter())),
        )
        .init();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None | Some("run") => run(config).await,
        Some("press") => {
            let key = args.next().context("usage: keybind-daemon press <key>")?;
            press(&config, key)
        }
        Some("init-config") => init_config(&config),
        Some(other) => bail!("unknown command {other:?}, expected run, press or init-config"),
    }
}

async fn run(config: Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "keybind-daemon starting"
    );
    info!(?config.hotkeys_path, ?config.socket_path, "configuration loaded");

    let mut keybind = Keybind::new(
        SocketBus::new(&config.socket_path),
        Arc::new(WriterCatcher::stdout()),
    );
    keybind.load_from_file(&config.hotkeys_path)?;
    keybind.init().await?;
    let keybind = Arc::new(keybind);

    info!("daemon initialized, waiting for hotkeys");
    supervise(keybind, ShutdownSignal::new().wait()).await?;

    info!("keybind-daemon stopped");
    Ok(())
}

fn press(config: &Config, key: String) -> Result<()> {
    let response = send_request(&config.socket_path, &Request::Press { key: key.clone() })
        .with_context(|| format!("is keybind-daemon running on {}?", config.socket_path.display()))?;

    match response {
        Response::Delivered { bindings } => {
            info!(key = %key, bindings, "key press delivered");
            Ok(())
        }
        Response::Error { code, message } => bail!("daemon refused {key:?}: {message} ({code})"),
        other => bail!("unexpected response {other:?}"),
    }
}

fn init_config(config: &Config) -> Result<()> {
    let path = &config.hotkeys_path;
    if path.exists() {
        info!(?path, "hotkey file already exists, leaving it alone");
        return Ok(());
    }

    save_hotkeys(path, &default_hotkeys())?;
    info!(?path, "starter hotkey file written");
    Ok(())
}
