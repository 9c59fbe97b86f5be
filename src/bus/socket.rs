//! Unix domain socket event bus
//!
//! Key-event producers (a compositor hook, a shell script,
//! `keybind-daemon press`) connect to the socket and send
//! [`Request::Press`] frames. Each press is dispatched to the callbacks
//! bound on the connection.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::protocol::{read_frame, write_frame, Request, Response};
use super::table::BindingTable;
use super::{parse_key, BusError, Connection, EventBus, KeyCallback, Token};

/// How often the accept loop checks whether it was closed
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Event bus fed by a Unix stream socket
#[derive(Debug, Clone)]
pub struct SocketBus {
    socket_path: PathBuf,
}

impl SocketBus {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl EventBus for SocketBus {
    type Connection = SocketConnection;

    fn connect(&self) -> Result<SocketConnection, BusError> {
        let path = &self.socket_path;
        let unavailable =
            |what: &str, e: io::Error| BusError::Unavailable(format!("{what} {}: {e}", path.display()));

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| unavailable("failed to create socket directory for", e))?;
        }

        // A socket that still accepts connections belongs to a live bus
        if path.exists() && UnixStream::connect(path).is_ok() {
            return Err(BusError::Unavailable(format!(
                "{} is in use by another event bus",
                path.display()
            )));
        }

        // Remove stale socket if it exists
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| unavailable("failed to remove stale socket", e))?;
        }

        let listener =
            UnixListener::bind(path).map_err(|e| unavailable("failed to bind", e))?;
        listener.set_nonblocking(true)?;

        // Set socket permissions to owner-only (0600)
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(socket_path = ?path, "socket bus listening");

        Ok(SocketConnection {
            socket_path: path.clone(),
            listener,
            table: Arc::new(BindingTable::default()),
            running: Arc::new(AtomicBool::new(true)),
        })
    }
}

/// Open connection to a [`SocketBus`]
pub struct SocketConnection {
    socket_path: PathBuf,
    listener: UnixListener,
    table: Arc<BindingTable>,
    running: Arc<AtomicBool>,
}

impl SocketConnection {
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Handle a single producer connection
    fn handle_client(
        mut stream: UnixStream,
        table: Arc<BindingTable>,
        running: Arc<AtomicBool>,
    ) -> io::Result<()> {
        while let Some(request) = read_frame::<_, Request>(&mut stream)? {
            debug!(?request, "received request");

            let response = if running.load(Ordering::SeqCst) {
                Self::process_request(request, &table)
            } else {
                Response::error("closed", "event bus connection is closed")
            };
            write_frame(&mut stream, &response)?;
        }

        debug!("client disconnected");
        Ok(())
    }

    fn process_request(request: Request, table: &BindingTable) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::Press { key } => match key.parse() {
                Ok(pressed) => {
                    let bindings = table.dispatch(&pressed);
                    debug!(key = %pressed, bindings, "key press dispatched");
                    Response::Delivered { bindings }
                }
                Err(e) => Response::error("invalid_key", e.to_string()),
            },

            Request::Status => Response::Status {
                bindings: table.descriptors(),
            },
        }
    }
}

impl Connection for SocketConnection {
    fn register(&self, key: &str, callback: KeyCallback) -> Result<Token, BusError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }

        let combo = parse_key(key)?;
        let token = self.table.insert(combo, key, callback);
        debug!(key, %token, "socket bus binding added");
        Ok(token)
    }

    fn unregister(&self, token: Token) -> Result<(), BusError> {
        match self.table.remove(token) {
            Some(key) => debug!(key = %key, %token, "socket bus binding removed"),
            None => debug!(%token, "unknown token, nothing to remove"),
        }
        Ok(())
    }

    fn run(&self) -> Result<(), BusError> {
        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    stream.set_nonblocking(false)?;
                    let table = Arc::clone(&self.table);
                    let running = Arc::clone(&self.running);

                    thread::Builder::new()
                        .name("keybind-client".to_string())
                        .spawn(move || {
                            if let Err(e) = Self::handle_client(stream, table, running) {
                                warn!(?e, "client handler error");
                            }
                        })?;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    error!(?e, "accept error");
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }

        debug!("socket bus loop exited");
        Ok(())
    }

    fn close(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.table.clear();

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(?e, "failed to remove socket file");
            }
        }
        info!("socket bus closed");
    }
}

/// Send one request to a running socket bus and wait for the response
pub fn send_request(socket_path: &Path, request: &Request) -> Result<Response, BusError> {
    let mut stream = UnixStream::connect(socket_path).map_err(|e| {
        BusError::Unavailable(format!("failed to connect to {}: {e}", socket_path.display()))
    })?;

    write_frame(&mut stream, request)?;
    read_frame(&mut stream)?
        .ok_or_else(|| BusError::Protocol("bus closed the connection without replying".into()))
}
