//! TCP Server
//!
//! Accepts connections and hands each one to its own handler thread.
//!
//! ## Lifecycle
//! ```text
//! Starting ──run()──▶ Accepting ──shutdown()──▶ Draining ──▶ Stopped
//! ```
//! - `Starting`: listener bound, not yet accepting
//! - `Accepting`: blocking accept loop, one thread per connection
//! - `Draining`: no new connections; waiting for open handlers to finish
//!   (after aborting them under [`ShutdownPolicy::Abort`])
//! - `Stopped`: every handler has returned; `run()` returns

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;

use super::Connection;
use crate::config::{Config, ShutdownPolicy};
use crate::error::Result;
use crate::store::ObjectStore;

/// Server lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Accepting,
    Draining,
    Stopped,
}

/// State shared between the accept loop, handlers and shutdown handles
#[derive(Debug)]
struct Shared {
    local_addr: SocketAddr,
    state: Mutex<ServerState>,
    stop: AtomicBool,

    /// Clones of every open connection's socket, for aborting handlers
    open: Mutex<HashMap<u64, TcpStream>>,
}

impl Shared {
    fn set_state(&self, state: ServerState) {
        *self.state.lock() = state;
    }

    fn abort_connections(&self) -> usize {
        let open = self.open.lock();
        for stream in open.values() {
            // The handler sees end-of-stream on its next read
            let _ = stream.shutdown(Shutdown::Both);
        }
        open.len()
    }
}

/// TCP server for RUStore
pub struct Server {
    config: Arc<Config>,
    listener: TcpListener,
    store: Arc<ObjectStore>,
    shared: Arc<Shared>,
}

impl Server {
    /// Bind a server with a fresh, empty store
    ///
    /// Fails if the listen address cannot be bound (e.g. port in use).
    pub fn bind(config: Config) -> Result<Self> {
        Self::with_store(config, Arc::new(ObjectStore::new()))
    }

    /// Bind a server around an existing store
    pub fn with_store(config: Config, store: Arc<ObjectStore>) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config: Arc::new(config),
            listener,
            store,
            shared: Arc::new(Shared {
                local_addr,
                state: Mutex::new(ServerState::Starting),
                stop: AtomicBool::new(false),
                open: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Address the listener is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    pub fn state(&self) -> ServerState {
        *self.shared.state.lock()
    }

    /// Get a handle that can stop this server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Start the server (blocking)
    ///
    /// Returns once a stop has been requested and every handler has finished.
    pub fn run(self) -> Result<()> {
        let Server {
            config,
            listener,
            store,
            shared,
        } = self;

        shared.set_state(ServerState::Accepting);
        tracing::info!("RUStore server listening on {}", shared.local_addr);

        let handlers = WaitGroup::new();
        let mut next_id: u64 = 0;

        for stream in listener.incoming() {
            if shared.stop.load(Ordering::SeqCst) {
                break;
            }

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            next_id += 1;
            dispatch(next_id, stream, &config, &store, &shared, handlers.clone());
        }

        drop(listener);
        shared.set_state(ServerState::Draining);

        if config.shutdown_policy == ShutdownPolicy::Abort {
            let aborted = shared.abort_connections();
            tracing::info!("Aborted {} open connection(s)", aborted);
        } else {
            tracing::info!(
                "Draining {} open connection(s)",
                shared.open.lock().len()
            );
        }

        handlers.wait();
        shared.set_state(ServerState::Stopped);
        tracing::info!("Server stopped");

        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.shared.local_addr)
            .field("state", &self.state())
            .finish()
    }
}

/// Register an accepted connection and spawn its handler thread
fn dispatch(
    id: u64,
    stream: TcpStream,
    config: &Arc<Config>,
    store: &Arc<ObjectStore>,
    shared: &Arc<Shared>,
    handlers: WaitGroup,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    {
        let mut open = shared.open.lock();
        if open.len() >= config.max_connections {
            tracing::warn!(
                "Rejecting {}: {} connections already open",
                peer,
                open.len()
            );
            return;
        }

        match stream.try_clone() {
            Ok(clone) => {
                open.insert(id, clone);
            }
            Err(e) => {
                tracing::warn!("Failed to register connection from {}: {}", peer, e);
                return;
            }
        }
    }

    tracing::info!("Client connected from {}", peer);

    let config = Arc::clone(config);
    let store = Arc::clone(store);
    let worker_shared = Arc::clone(shared);

    let spawned = thread::Builder::new()
        .name(format!("rustore-conn-{}", id))
        .spawn(move || {
            let _handlers = handlers;
            if let Err(e) = serve(stream, store, &config) {
                tracing::debug!("Handler for {} ended with error: {}", peer, e);
            }
            worker_shared.open.lock().remove(&id);
        });

    if let Err(e) = spawned {
        tracing::warn!("Failed to spawn connection handler: {}", e);
        shared.open.lock().remove(&id);
    }
}

fn serve(stream: TcpStream, store: Arc<ObjectStore>, config: &Config) -> Result<()> {
    let mut connection = Connection::new(stream, store)?;
    connection.set_timeouts(config.read_timeout_ms, config.write_timeout_ms)?;
    connection.set_max_payload_size(config.max_payload_size);
    connection.handle()
}

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
}

impl ShutdownHandle {
    /// Ask the server to stop accepting connections
    ///
    /// The accept loop is blocked in `accept`, so this raises the stop flag
    /// and then makes a throwaway connection to wake it up. Open handlers are
    /// left to the configured [`ShutdownPolicy`].
    pub fn shutdown(&self) {
        if self.shared.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Stop requested, no longer accepting connections");

        let addr = wake_addr(self.shared.local_addr);
        if let Err(e) = TcpStream::connect_timeout(&addr, Duration::from_secs(1)) {
            tracing::debug!("Wake-up connection to {} failed: {}", addr, e);
        }
    }

    /// Close every open connection now, returning how many were open
    pub fn abort_connections(&self) -> usize {
        self.shared.abort_connections()
    }

    pub fn state(&self) -> ServerState {
        *self.shared.state.lock()
    }

    /// Number of connections with a live handler
    pub fn open_connections(&self) -> usize {
        self.shared.open.lock().len()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }
}

/// A wildcard bind address is not connectable; use loopback instead
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    let mut addr = addr;
    if addr.ip().is_unspecified() {
        match addr {
            SocketAddr::V4(_) => addr.set_ip(Ipv4Addr::LOCALHOST.into()),
            SocketAddr::V6(_) => addr.set_ip(Ipv6Addr::LOCALHOST.into()),
        }
    }
    addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_addr_maps_wildcard_to_loopback() {
        let addr: SocketAddr = "0.0.0.0:7000".parse().unwrap();
        assert_eq!(wake_addr(addr), "127.0.0.1:7000".parse().unwrap());

        let addr: SocketAddr = "[::]:7000".parse().unwrap();
        assert_eq!(wake_addr(addr), "[::1]:7000".parse().unwrap());

        let addr: SocketAddr = "10.1.2.3:7000".parse().unwrap();
        assert_eq!(wake_addr(addr), addr);
    }

    #[test]
    fn test_bind_starts_in_starting_state() {
        let server = Server::bind(Config::builder().listen_addr("127.0.0.1:0").build()).unwrap();
        assert_eq!(server.state(), ServerState::Starting);
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.store().is_empty());
    }
}
