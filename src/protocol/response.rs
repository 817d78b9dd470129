//! Response definitions
//!
//! Represents responses to clients. PUT, GET and REMOVE each get their own
//! status type so a code is never shared between two meanings.

use bytes::Bytes;

use super::OpCode;

/// Outcome of a PUT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PutStatus {
    Success = 0,
    KeyAlreadyExists = 1,
}

/// Status code leading a GET response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GetStatus {
    NotFound = 0,
    Found = 1,
}

/// Outcome of a REMOVE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RemoveStatus {
    Success = 0,
    KeyNotExists = 1,
}

/// Outcome of a GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetResult {
    Found(Bytes),
    NotFound,
}

impl GetResult {
    pub fn status(&self) -> GetStatus {
        match self {
            GetResult::Found(_) => GetStatus::Found,
            GetResult::NotFound => GetStatus::NotFound,
        }
    }

    /// Convert into the stored bytes, if any
    pub fn into_option(self) -> Option<Bytes> {
        match self {
            GetResult::Found(data) => Some(data),
            GetResult::NotFound => None,
        }
    }
}

impl From<Option<Bytes>> for GetResult {
    fn from(value: Option<Bytes>) -> Self {
        match value {
            Some(data) => GetResult::Found(data),
            None => GetResult::NotFound,
        }
    }
}

impl PutStatus {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(PutStatus::Success),
            1 => Some(PutStatus::KeyAlreadyExists),
            _ => None,
        }
    }
}

impl GetStatus {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(GetStatus::NotFound),
            1 => Some(GetStatus::Found),
            _ => None,
        }
    }
}

impl RemoveStatus {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(RemoveStatus::Success),
            1 => Some(RemoveStatus::KeyNotExists),
            _ => None,
        }
    }
}

/// A response to send to a client
///
/// There is no variant for DISCONNECT, which is never answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Put(PutStatus),
    Get(GetResult),
    Remove(RemoveStatus),
    List(Vec<String>),
}

impl Response {
    /// The operation this response answers
    pub fn opcode(&self) -> OpCode {
        match self {
            Response::Put(_) => OpCode::Put,
            Response::Get(_) => OpCode::Get,
            Response::Remove(_) => OpCode::Remove,
            Response::List(_) => OpCode::List,
        }
    }
}
