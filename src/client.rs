//! Client Driver
//!
//! Blocking client for a RUStore server. Each call is one request/response
//! round trip over a single connection; nothing is retried and a failed
//! call does not reconnect.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{RustoreError, Result};
use crate::protocol::{
    read_response, write_request, PutStatus, RemoveStatus, Request, Response,
};

/// A connection to a RUStore server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer_addr: String,
}

impl Client {
    /// Connect to a RUStore server
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        tracing::debug!("Connected to {}", peer_addr);

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            peer_addr,
        })
    }

    /// Configure socket timeouts (0 disables)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read = (read_ms > 0).then(|| Duration::from_millis(read_ms));
        let write = (write_ms > 0).then(|| Duration::from_millis(write_ms));
        self.reader.get_ref().set_read_timeout(read)?;
        self.writer.get_ref().set_write_timeout(write)?;
        Ok(())
    }

    /// Store `data` under `key`; an existing key is never overwritten
    pub fn put(&mut self, key: &str, data: &[u8]) -> Result<PutStatus> {
        check_len(key.len())?;
        check_len(data.len())?;
        tracing::debug!(key, len = data.len(), "client put");

        let request = Request::Put {
            key: key.to_string(),
            data: Bytes::copy_from_slice(data),
        };
        match self.round_trip(&request)? {
            Response::Put(status) => Ok(status),
            other => Err(mismatched(&request, &other)),
        }
    }

    /// Fetch the object stored under `key`
    pub fn get(&mut self, key: &str) -> Result<Option<Bytes>> {
        check_len(key.len())?;
        tracing::debug!(key, "client get");

        let request = Request::Get {
            key: key.to_string(),
        };
        match self.round_trip(&request)? {
            Response::Get(result) => Ok(result.into_option()),
            other => Err(mismatched(&request, &other)),
        }
    }

    /// Delete `key` from the store
    pub fn remove(&mut self, key: &str) -> Result<RemoveStatus> {
        check_len(key.len())?;
        tracing::debug!(key, "client remove");

        let request = Request::Remove {
            key: key.to_string(),
        };
        match self.round_trip(&request)? {
            Response::Remove(status) => Ok(status),
            other => Err(mismatched(&request, &other)),
        }
    }

    /// List every key in the store (empty when the store is empty)
    pub fn list(&mut self) -> Result<Vec<String>> {
        let request = Request::List;
        match self.round_trip(&request)? {
            Response::List(keys) => Ok(keys),
            other => Err(mismatched(&request, &other)),
        }
    }

    /// Upload the contents of the file at `path` under `key`
    pub fn put_file(&mut self, key: &str, path: impl AsRef<Path>) -> Result<PutStatus> {
        let data = fs::read(path)?;
        self.put(key, &data)
    }

    /// Download the object under `key` into the file at `path`
    ///
    /// Returns `false` and leaves the file system untouched if the key does
    /// not exist.
    pub fn get_file(&mut self, key: &str, path: impl AsRef<Path>) -> Result<bool> {
        match self.get(key)? {
            Some(data) => {
                fs::write(path, &data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Tell the server this session is over and close the connection
    ///
    /// No response is expected for DISCONNECT.
    pub fn disconnect(mut self) -> Result<()> {
        write_request(&mut self.writer, &Request::Disconnect)?;
        tracing::debug!("Disconnected from {}", self.peer_addr);

        // The server may already have closed its end
        match self.writer.get_ref().shutdown(Shutdown::Both) {
            Err(e) if e.kind() != std::io::ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    fn round_trip(&mut self, request: &Request) -> Result<Response> {
        write_request(&mut self.writer, request)?;
        read_response(request.opcode(), &mut self.reader, u32::MAX)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

/// Lengths travel as u32 on the wire
fn check_len(len: usize) -> Result<()> {
    if len > u32::MAX as usize {
        return Err(RustoreError::PayloadTooLarge {
            len: len as u64,
            max: u32::MAX as u64,
        });
    }
    Ok(())
}

fn mismatched(request: &Request, response: &Response) -> RustoreError {
    RustoreError::Protocol(format!(
        "{:?} request answered with a {:?} response",
        request.opcode(),
        response.opcode()
    ))
}
