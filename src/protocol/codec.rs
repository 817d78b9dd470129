//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! Every integer is a big-endian u32. Every key and object is preceded by its
//! length, so no field is ever delimiter based.
//!
//! ### Request Format
//! ```text
//! ┌────────────┬──────────────────────────────────────────┐
//! │ OpCode (4) │ Fields (per operation)                   │
//! └────────────┴──────────────────────────────────────────┘
//! ```
//! - PUT:        key_len (4) + key + data_len (4) + data
//! - GET:        key_len (4) + key
//! - REMOVE:     key_len (4) + key
//! - LIST:       empty
//! - DISCONNECT: empty
//!
//! ### Response Format
//! - PUT:    status (4)
//! - GET:    status (4) [+ data_len (4) + data when found]
//! - REMOVE: status (4)
//! - LIST:   key_count (4) + key_count * (key_len (4) + key)
//!
//! Responses carry no operation code; the reader must know which request
//! it is waiting on.
//!
//! ## Short reads
//!
//! The stream readers never assume that a single `read` returns a whole
//! field. Fixed-width fields go through `read_exact` and payloads through
//! `Read::take(..).read_to_end`, both of which loop until the declared byte
//! count has arrived or the peer closes.

use std::io::{self, Cursor, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::{GetResult, GetStatus, OpCode, PutStatus, RemoveStatus, Request, Response};
use crate::error::{RustoreError, Result};

/// Size of every fixed-width field (opcode, status, length, count)
pub const FIELD_SIZE: usize = 4;

/// Upper bound on how much is reserved ahead of a payload actually arriving
const PREALLOC_LIMIT: usize = 64 * 1024;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_request_len(request));
    buf.put_u32(request.opcode().code());

    match request {
        Request::Put { key, data } => {
            put_field(&mut buf, key.as_bytes());
            put_field(&mut buf, data);
        }
        Request::Get { key } | Request::Remove { key } => {
            put_field(&mut buf, key.as_bytes());
        }
        Request::List | Request::Disconnect => {}
    }

    buf.freeze()
}

fn encoded_request_len(request: &Request) -> usize {
    match request {
        Request::Put { key, data } => 3 * FIELD_SIZE + key.len() + data.len(),
        Request::Get { key } | Request::Remove { key } => 2 * FIELD_SIZE + key.len(),
        Request::List | Request::Disconnect => FIELD_SIZE,
    }
}

/// Decode exactly one request from a complete frame
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let mut cursor = Cursor::new(bytes);
    let request = read_request(&mut cursor, u32::MAX)
        .map_err(incomplete)?
        .ok_or_else(|| RustoreError::Protocol("Incomplete frame: empty input".to_string()))?;
    ensure_consumed(&cursor)?;
    Ok(request)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Bytes {
    let mut buf = BytesMut::with_capacity(FIELD_SIZE * 2);

    match response {
        Response::Put(status) => buf.put_u32(*status as u32),
        Response::Get(result) => {
            buf.put_u32(result.status() as u32);
            if let GetResult::Found(data) = result {
                put_field(&mut buf, data);
            }
        }
        Response::Remove(status) => buf.put_u32(*status as u32),
        Response::List(keys) => {
            buf.put_u32(keys.len() as u32);
            for key in keys {
                put_field(&mut buf, key.as_bytes());
            }
        }
    }

    buf.freeze()
}

/// Decode exactly one response to `op` from a complete frame
pub fn decode_response(op: OpCode, bytes: &[u8]) -> Result<Response> {
    let mut cursor = Cursor::new(bytes);
    let response = read_response(op, &mut cursor, u32::MAX).map_err(incomplete)?;
    ensure_consumed(&cursor)?;
    Ok(response)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete request from a stream
///
/// Returns `Ok(None)` when the peer closes cleanly between requests. A close
/// in the middle of a frame is an `UnexpectedEof` I/O error.
pub fn read_request<R: Read>(reader: &mut R, max_len: u32) -> Result<Option<Request>> {
    let Some(code) = read_opcode(reader)? else {
        return Ok(None);
    };
    let op = OpCode::try_from(code)?;
    read_request_body(op, reader, max_len).map(Some)
}

/// Read the leading operation code of a request
///
/// Returns `Ok(None)` on end-of-stream before the first byte.
pub fn read_opcode<R: Read>(reader: &mut R) -> Result<Option<u32>> {
    match read_frame_start(reader)? {
        Some(first) => read_opcode_rest(first, reader).map(Some),
        None => Ok(None),
    }
}

/// Wait for the first byte of the next request
///
/// Returns `Ok(None)` on end-of-stream. Any byte returned here means a frame
/// has started.
pub fn read_frame_start<R: Read>(reader: &mut R) -> Result<Option<u8>> {
    let mut first = [0u8; 1];
    loop {
        match reader.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(first[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Finish an operation code whose first byte came from [`read_frame_start`]
pub fn read_opcode_rest<R: Read>(first: u8, reader: &mut R) -> Result<u32> {
    let mut buf = [first, 0, 0, 0];
    reader.read_exact(&mut buf[1..])?;
    Ok(u32::from_be_bytes(buf))
}

/// Read the fields following an already consumed operation code
pub fn read_request_body<R: Read>(op: OpCode, reader: &mut R, max_len: u32) -> Result<Request> {
    let request = match op {
        OpCode::Put => {
            let key = read_key(reader, max_len)?;
            let data = Bytes::from(read_field(reader, max_len)?);
            Request::Put { key, data }
        }
        OpCode::Get => Request::Get {
            key: read_key(reader, max_len)?,
        },
        OpCode::Remove => Request::Remove {
            key: read_key(reader, max_len)?,
        },
        OpCode::List => Request::List,
        OpCode::Disconnect => Request::Disconnect,
    };
    Ok(request)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response to `op` from a stream
pub fn read_response<R: Read>(op: OpCode, reader: &mut R, max_len: u32) -> Result<Response> {
    let code = read_u32(reader)?;

    let response = match op {
        OpCode::Put => Response::Put(
            PutStatus::from_code(code).ok_or_else(|| unexpected_status(op, code))?,
        ),
        OpCode::Get => match GetStatus::from_code(code) {
            Some(GetStatus::Found) => {
                let data = Bytes::from(read_field(reader, max_len)?);
                Response::Get(GetResult::Found(data))
            }
            Some(GetStatus::NotFound) => Response::Get(GetResult::NotFound),
            None => return Err(unexpected_status(op, code)),
        },
        OpCode::Remove => Response::Remove(
            RemoveStatus::from_code(code).ok_or_else(|| unexpected_status(op, code))?,
        ),
        OpCode::List => {
            // `code` is the key count here
            let mut keys = Vec::with_capacity((code as usize).min(1024));
            for _ in 0..code {
                keys.push(read_key(reader, max_len)?);
            }
            Response::List(keys)
        }
        OpCode::Disconnect => {
            return Err(RustoreError::Protocol(
                "DISCONNECT is never answered".to_string(),
            ))
        }
    };

    Ok(response)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Field helpers
// =============================================================================

fn put_field(buf: &mut BytesMut, field: &[u8]) {
    debug_assert!(field.len() <= u32::MAX as usize);
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; FIELD_SIZE];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Read a length-prefixed field
fn read_field<R: Read>(reader: &mut R, max_len: u32) -> Result<Vec<u8>> {
    let len = read_u32(reader)?;
    if len > max_len {
        return Err(RustoreError::PayloadTooLarge {
            len: len as u64,
            max: max_len as u64,
        });
    }

    let len = len as usize;
    let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    let read = reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if read < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("field truncated: expected {} bytes, got {}", len, read),
        )
        .into());
    }

    Ok(buf)
}

fn read_key<R: Read>(reader: &mut R, max_len: u32) -> Result<String> {
    let raw = read_field(reader, max_len)?;
    Ok(String::from_utf8(raw)?)
}

fn unexpected_status(op: OpCode, code: u32) -> RustoreError {
    RustoreError::Protocol(format!("Unknown {:?} response status: {}", op, code))
}

/// Reword end-of-buffer as an incomplete frame for the slice decoders
fn incomplete(err: RustoreError) -> RustoreError {
    match err {
        RustoreError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            RustoreError::Protocol(format!("Incomplete frame: {}", e))
        }
        other => other,
    }
}

fn ensure_consumed(cursor: &Cursor<&[u8]>) -> Result<()> {
    let consumed = cursor.position() as usize;
    let total = cursor.get_ref().len();
    if consumed != total {
        return Err(RustoreError::Protocol(format!(
            "Trailing bytes after frame: {} unread",
            total - consumed
        )));
    }
    Ok(())
}
