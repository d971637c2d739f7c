//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬────────────┬─────────────────────────────┐
//! │ Len (4)  │ Opcode (2) │         Payload             │
//! └──────────┴────────────┴─────────────────────────────┘
//! ```
//!
//! The payload is the command arguments joined with a single space. An
//! argument that itself contains a space cannot be told apart from two
//! arguments, so values containing spaces do not survive the trip.
//!
//! ### Reply Format
//! ```text
//! ┌──────────┬─────────┬──────────┬─────────────────────┐
//! │ Code (2) │ Enc (1) │ Len (4)  │       Payload       │
//! └──────────┴─────────┴──────────┴─────────────────────┘
//! ```

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};

use super::{Encoding, Opcode, ReplyCode};
use crate::error::{GibsonError, Result};

/// Reply header size: 2 bytes code + 1 byte encoding + 4 bytes length
pub const HEADER_SIZE: usize = 7;

/// Request prefix size: 4 bytes length + 2 bytes opcode
pub const REQUEST_PREFIX_SIZE: usize = 6;

/// Width of the opcode field, counted by the request length
const OPCODE_SIZE: usize = 2;

/// Decoded reply header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    /// Raw reply code (see `ReplyCode`)
    pub code: u16,
    /// Raw encoding tag (see `Encoding`)
    pub encoding: u8,
    /// Payload length in bytes
    pub data_length: u32,
}

impl ReplyHeader {
    /// Total frame size: header plus payload
    pub fn frame_size(&self) -> usize {
        HEADER_SIZE + self.data_length as usize
    }
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
///
/// Format: total_len (4) + opcode (2) + payload, total_len = 2 + payload_len
pub fn encode_request<S: AsRef<str>>(opcode: Opcode, args: &[S]) -> Bytes {
    let payload_len = joined_len(args);

    let mut message = BytesMut::with_capacity(REQUEST_PREFIX_SIZE + payload_len);
    message.put_u32_le((OPCODE_SIZE + payload_len) as u32);
    message.put_u16_le(opcode.code());

    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            message.put_u8(b' ');
        }
        message.put_slice(arg.as_ref().as_bytes());
    }

    tracing::trace!(
        "Encoded {} request: {} bytes, {} args",
        opcode,
        message.len(),
        args.len()
    );

    message.freeze()
}

/// Decode a request from bytes
///
/// Returns the opcode and the space-separated arguments. This is the
/// server's view of a request, used by test doubles of the server.
pub fn decode_request(bytes: &[u8]) -> Result<(Opcode, Vec<String>)> {
    if bytes.len() < REQUEST_PREFIX_SIZE {
        return Err(GibsonError::Protocol(format!(
            "Incomplete request: expected at least {} bytes, got {}",
            REQUEST_PREFIX_SIZE,
            bytes.len()
        )));
    }

    let total_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if total_len < OPCODE_SIZE {
        return Err(GibsonError::Protocol(format!(
            "Invalid request length: {}",
            total_len
        )));
    }

    let frame_len = 4 + total_len;
    if bytes.len() < frame_len {
        return Err(GibsonError::Protocol(format!(
            "Incomplete request payload: expected {} bytes, got {}",
            frame_len,
            bytes.len()
        )));
    }

    let code = u16::from_le_bytes([bytes[4], bytes[5]]);
    let opcode = Opcode::from_u16(code)
        .ok_or_else(|| GibsonError::Protocol(format!("Unknown opcode: 0x{:04x}", code)))?;

    let payload = String::from_utf8_lossy(&bytes[REQUEST_PREFIX_SIZE..frame_len]);
    let args = if payload.is_empty() {
        Vec::new()
    } else {
        payload.split(' ').map(str::to_string).collect()
    };

    Ok((opcode, args))
}

fn joined_len<S: AsRef<str>>(args: &[S]) -> usize {
    let bytes: usize = args.iter().map(|a| a.as_ref().len()).sum();
    bytes + args.len().saturating_sub(1)
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Decode the fixed-size reply header
///
/// Callers must supply at least `HEADER_SIZE` bytes; anything beyond the
/// header is ignored.
pub fn decode_header(bytes: &[u8]) -> Result<ReplyHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(GibsonError::Protocol(format!(
            "Incomplete reply header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    Ok(ReplyHeader {
        code: u16::from_le_bytes([bytes[0], bytes[1]]),
        encoding: bytes[2],
        data_length: u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
    })
}

/// Encode a reply to bytes
///
/// Format: code (2) + encoding (1) + data_len (4) + payload
pub fn encode_reply(code: ReplyCode, encoding: Encoding, payload: &[u8]) -> Bytes {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u16_le(code as u16);
    message.put_u8(encoding as u8);
    message.put_u32_le(payload.len() as u32);
    message.put_slice(payload);
    message.freeze()
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a request to a stream
pub fn write_request<W: Write, S: AsRef<str>>(
    writer: &mut W,
    opcode: Opcode,
    args: &[S],
) -> Result<()> {
    let bytes = encode_request(opcode, args);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
