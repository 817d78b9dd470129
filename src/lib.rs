//! # RUStore
//!
//! A networked, in-memory object store:
//! - String keys mapped to opaque byte payloads
//! - Custom length-prefixed binary protocol over TCP
//! - Insert-if-absent puts, existence-checked removes
//! - One handler thread per connection over a shared, lock-protected map
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Client (blocking driver)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  framed requests / responses
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      TCP Server                              │
//! │           (accept loop, one handler per client)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!               ┌──────────────┐
//!               │ ObjectStore  │
//!               │  (RwLock)    │
//!               └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod store;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RustoreError, Result};
pub use config::{Config, ShutdownPolicy};
pub use store::ObjectStore;
pub use network::{Server, ServerState, ShutdownHandle};
pub use client::Client;
pub use protocol::{GetResult, PutStatus, RemoveStatus};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of RUStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
