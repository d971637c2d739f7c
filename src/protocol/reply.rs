//! Reply definitions
//!
//! Reply codes and value encodings reported by the server.

use crate::error::ServerError;

/// Reply status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ReplyCode {
    Err = 0,
    ErrNotFound = 1,
    ErrNan = 2,
    ErrMem = 3,
    ErrLocked = 4,
    /// Success, no data follows
    Ok = 5,
    /// Success, scalar value follows
    Val = 6,
    /// Success, key => value map follows
    KVal = 7,
}

impl ReplyCode {
    pub fn from_u16(code: u16) -> Option<Self> {
        let code = match code {
            0 => ReplyCode::Err,
            1 => ReplyCode::ErrNotFound,
            2 => ReplyCode::ErrNan,
            3 => ReplyCode::ErrMem,
            4 => ReplyCode::ErrLocked,
            5 => ReplyCode::Ok,
            6 => ReplyCode::Val,
            7 => ReplyCode::KVal,
            _ => return None,
        };
        Some(code)
    }

    /// Error codes form the contiguous range 0..=4
    pub fn is_error(self) -> bool {
        (self as u16) <= ReplyCode::ErrLocked as u16
    }

    /// The server error for an error code, `None` for success codes
    pub fn server_error(self) -> Option<ServerError> {
        match self {
            ReplyCode::Err => Some(ServerError::Generic),
            ReplyCode::ErrNotFound => Some(ServerError::NotFound),
            ReplyCode::ErrNan => Some(ServerError::NotANumber),
            ReplyCode::ErrMem => Some(ServerError::OutOfMemory),
            ReplyCode::ErrLocked => Some(ServerError::Locked),
            ReplyCode::Ok | ReplyCode::Val | ReplyCode::KVal => None,
        }
    }
}

/// Value encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Encoding {
    /// Opaque bytes, interpreted as text
    Plain = 0x00,
    /// Plain data compressed with LZF (passed through undecoded)
    Lzf = 0x01,
    /// Little-endian signed integer, 4 or 8 bytes wide
    Number = 0x02,
}

impl Encoding {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Encoding::Plain),
            0x01 => Some(Encoding::Lzf),
            0x02 => Some(Encoding::Number),
            _ => None,
        }
    }
}
