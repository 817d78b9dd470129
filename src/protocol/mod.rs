//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Operation Codes
//! - 1: PUT        - key_len (4) + key + data_len (4) + data
//! - 2: GET        - key_len (4) + key
//! - 3: REMOVE     - key_len (4) + key
//! - 4: LIST       - empty
//! - 5: DISCONNECT - empty, never answered
//!
//! ### Status Codes
//! - PUT:    0 = SUCCESS, 1 = KEY_ALREADY_EXISTS
//! - GET:    1 = FOUND,   0 = NOT_FOUND
//! - REMOVE: 0 = SUCCESS, 1 = KEY_NOT_EXISTS
//!
//! See [`codec`] for the byte layout.

mod opcode;
mod request;
mod response;
pub mod codec;

pub use opcode::OpCode;
pub use request::Request;
pub use response::{GetResult, GetStatus, PutStatus, RemoveStatus, Response};
pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response,
};
