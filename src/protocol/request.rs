//! Request definitions
//!
//! Represents requests from clients.

use bytes::Bytes;

use super::OpCode;

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Store an object under a key, unless the key is taken
    Put { key: String, data: Bytes },

    /// Fetch the object stored under a key
    Get { key: String },

    /// Delete a key and its object
    Remove { key: String },

    /// List every key in the store
    List,

    /// End the session; the server sends no response
    Disconnect,
}

impl Request {
    /// Get the operation code
    pub fn opcode(&self) -> OpCode {
        match self {
            Request::Put { .. } => OpCode::Put,
            Request::Get { .. } => OpCode::Get,
            Request::Remove { .. } => OpCode::Remove,
            Request::List => OpCode::List,
            Request::Disconnect => OpCode::Disconnect,
        }
    }

    /// The key this request addresses, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Request::Put { key, .. } | Request::Get { key } | Request::Remove { key } => Some(key),
            Request::List | Request::Disconnect => None,
        }
    }
}
