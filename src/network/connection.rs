//! Connection Handler
//!
//! Handles individual client connections.
//!
//! Each connection is a small state machine: it waits for the opcode of the
//! next request, reads the rest of the frame, applies it to the store and
//! writes the response, until the client disconnects or the stream fails.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::protocol::codec::{read_frame_start, read_opcode_rest, read_request_body};
use crate::protocol::{write_response, OpCode, Request};
use crate::store::ObjectStore;

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the operation code of the next request
    AwaitingRequest,

    /// Terminal; the handler stops reading
    Closed,
}

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Shared object store
    store: Arc<ObjectStore>,

    /// Peer address for logging
    peer_addr: String,

    /// Bound on each field read once a frame has started
    frame_timeout: Option<Duration>,

    /// Largest accepted key or object length
    max_payload_size: u32,

    state: ConnectionState,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, store: Arc<ObjectStore>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            store,
            peer_addr,
            frame_timeout: None,
            max_payload_size: u32::MAX,
            state: ConnectionState::AwaitingRequest,
        })
    }

    /// Configure connection timeouts (0 disables)
    ///
    /// The read timeout applies to each field inside a frame. Waiting for the
    /// next request is never timed out.
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        self.frame_timeout = (read_ms > 0).then(|| Duration::from_millis(read_ms));

        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    pub fn set_max_payload_size(&mut self, bytes: u32) {
        self.max_payload_size = bytes;
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Returns `Ok(())` when the client disconnects, by request or by closing
    /// its end. Malformed frames and other stream failures are returned as
    /// errors; either way the connection is finished afterwards.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        while self.state == ConnectionState::AwaitingRequest {
            match self.step() {
                Ok(state) => self.state = state,
                Err(e) if e.is_disconnect() => {
                    tracing::debug!("Client {} went away: {}", self.peer_addr, e);
                    self.state = ConnectionState::Closed;
                }
                Err(e) if e.is_timeout() => {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    self.state = ConnectionState::Closed;
                }
                Err(e) => {
                    tracing::warn!("Closing connection from {}: {}", self.peer_addr, e);
                    self.state = ConnectionState::Closed;
                    return Err(e);
                }
            }
        }

        tracing::debug!("Client {} disconnected", self.peer_addr);
        Ok(())
    }

    /// Process one request and report the next state
    fn step(&mut self) -> Result<ConnectionState> {
        let request = match self.read_next()? {
            Some(request) => request,
            None => return Ok(ConnectionState::Closed),
        };

        tracing::trace!("Received {:?} from {}", request.opcode(), self.peer_addr);
        if let Some(key) = request.key() {
            tracing::debug!("{:?} \"{}\" from {}", request.opcode(), key, self.peer_addr);
        }

        match self.store.execute(request) {
            Some(response) => {
                write_response(&mut self.writer, &response)?;
                Ok(ConnectionState::AwaitingRequest)
            }
            None => Ok(ConnectionState::Closed),
        }
    }

    /// Read the next request, or `None` on a clean end-of-stream
    fn read_next(&mut self) -> Result<Option<Request>> {
        // Idle between requests: block until the client sends something
        self.reader.get_ref().set_read_timeout(None)?;
        let first = match read_frame_start(&mut self.reader)? {
            Some(first) => first,
            None => return Ok(None),
        };

        // A frame has started, so every remaining read is bounded
        self.reader.get_ref().set_read_timeout(self.frame_timeout)?;
        let op = OpCode::try_from(read_opcode_rest(first, &mut self.reader)?)?;
        read_request_body(op, &mut self.reader, self.max_payload_size).map(Some)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state)
            .finish()
    }
}
