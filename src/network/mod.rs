//! Network Module
//!
//! TCP server and connection handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One handler thread per connection
//! - All handlers share one `ObjectStore`

mod server;
mod connection;

pub use server::{Server, ServerState, ShutdownHandle};
pub use connection::{Connection, ConnectionState};
