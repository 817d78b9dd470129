//! Error types for RUStore
//!
//! Provides a unified error type for all operations.
//!
//! Key-state outcomes (key already exists, key not found) are ordinary
//! return values and never show up here.

use std::string::FromUtf8Error;

use thiserror::Error;

/// Result type alias using RustoreError
pub type Result<T> = std::result::Result<T, RustoreError>;

/// Unified error type for RUStore operations
#[derive(Debug, Error)]
pub enum RustoreError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown operation code: {0}")]
    UnknownOpcode(u32),

    #[error("Key is not valid UTF-8: {0}")]
    InvalidKey(#[from] FromUtf8Error),

    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: u64, max: u64 },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RustoreError {
    /// True when the error means the peer went away rather than misbehaved
    pub fn is_disconnect(&self) -> bool {
        match self {
            RustoreError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// True when a socket read or write timed out
    ///
    /// Unix reports `WouldBlock`, Windows reports `TimedOut`.
    pub fn is_timeout(&self) -> bool {
        match self {
            RustoreError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
