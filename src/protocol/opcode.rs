//! Operation codes
//!
//! Identifies which store operation a request frame carries.

use crate::error::RustoreError;

/// Operation codes, sent as a big-endian u32 at the start of every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpCode {
    Put = 1,
    Get = 2,
    Remove = 3,
    List = 4,
    Disconnect = 5,
}

impl OpCode {
    /// Wire value of this code
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for OpCode {
    type Error = RustoreError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(OpCode::Put),
            2 => Ok(OpCode::Get),
            3 => Ok(OpCode::Remove),
            4 => Ok(OpCode::List),
            5 => Ok(OpCode::Disconnect),
            other => Err(RustoreError::UnknownOpcode(other)),
        }
    }
}
