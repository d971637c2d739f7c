//! Protocol Module
//!
//! Defines the Gibson wire protocol as seen from the client side.
//!
//! ## Protocol Format
//!
//! All multi-byte integers are little endian.
//!
//! ### Request Format
//! ```text
//! ┌──────────┬────────────┬─────────────────────────────┐
//! │ Len (4)  │ Opcode (2) │  Payload (args joined by ' ')│
//! └──────────┴────────────┴─────────────────────────────┘
//! ```
//! `Len` counts the opcode plus the payload (`2 + payload.len()`).
//!
//! ### Reply Format
//! ```text
//! ┌──────────┬─────────┬──────────┬─────────────────────┐
//! │ Code (2) │ Enc (1) │ Len (4)  │       Payload       │
//! └──────────┴─────────┴──────────┴─────────────────────┘
//! ```
//!
//! ### Reply Codes
//! - 0..=4: errors (generic, not found, not a number, out of memory, locked)
//! - 5: OK, no payload
//! - 6: VAL, scalar payload
//! - 7: KVAL, key => value map payload
//!
//! Replies carry no request identifier: the Nth reply answers the Nth
//! request still pending on the connection.

mod codec;
mod opcode;
mod reply;
mod value;

pub use codec::{
    decode_header, decode_request, encode_reply, encode_request, write_request, ReplyHeader,
    HEADER_SIZE, REQUEST_PREFIX_SIZE,
};
pub use opcode::Opcode;
pub use reply::{Encoding, ReplyCode};
pub use value::{decode_reply, decode_value, Value, ValueMap};
