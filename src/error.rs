//! Error types for the Gibson client
//!
//! Provides a unified error type for all operations, plus the two
//! per-reply error families (server error codes and decode failures).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using GibsonError
pub type Result<T> = std::result::Result<T, GibsonError>;

/// Unified error type for Gibson client operations
#[derive(Debug, Error)]
pub enum GibsonError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Per-reply Errors (never fatal to the connection)
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Server(ServerError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    // -------------------------------------------------------------------------
    // Protocol / Connection Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Protocol desynchronization: reply #{reply} received with no pending request")]
    Desync { reply: u64 },

    #[error("Reply frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("Pipeline full: {depth} requests already pending")]
    PipelineFull { depth: usize },

    #[error("Timed out after {0:?} waiting for reply")]
    Timeout(Duration),

    #[error("Connection closed")]
    ConnectionClosed,

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Blocking call from a reply callback would deadlock the reader thread")]
    BlockingInCallback,
}

impl GibsonError {
    /// Whether this error means the connection can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GibsonError::Io(_)
                | GibsonError::Protocol(_)
                | GibsonError::Desync { .. }
                | GibsonError::FrameTooLarge { .. }
                | GibsonError::ConnectionClosed
        )
    }

    /// A copy of this error, for reporting one terminal fault to many callers.
    ///
    /// `Io` errors keep their kind and message but lose any inner source.
    pub fn duplicate(&self) -> GibsonError {
        match self {
            GibsonError::Io(e) => GibsonError::Io(std::io::Error::new(e.kind(), e.to_string())),
            GibsonError::Server(e) => GibsonError::Server(*e),
            GibsonError::Decode(e) => GibsonError::Decode(e.clone()),
            GibsonError::Protocol(msg) => GibsonError::Protocol(msg.clone()),
            GibsonError::Desync { reply } => GibsonError::Desync { reply: *reply },
            GibsonError::FrameTooLarge { size, max } => GibsonError::FrameTooLarge {
                size: *size,
                max: *max,
            },
            GibsonError::PipelineFull { depth } => GibsonError::PipelineFull { depth: *depth },
            GibsonError::Timeout(d) => GibsonError::Timeout(*d),
            GibsonError::ConnectionClosed => GibsonError::ConnectionClosed,
            GibsonError::UnknownCommand(name) => GibsonError::UnknownCommand(name.clone()),
            GibsonError::Config(msg) => GibsonError::Config(msg.clone()),
            GibsonError::BlockingInCallback => GibsonError::BlockingInCallback,
        }
    }

    /// The server error carried by this error, if any.
    pub fn server_error(&self) -> Option<ServerError> {
        match self {
            GibsonError::Server(e) => Some(*e),
            _ => None,
        }
    }
}

impl From<ServerError> for GibsonError {
    fn from(e: ServerError) -> Self {
        GibsonError::Server(e)
    }
}

/// Error replies sent by the server (reply codes 0..=4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ServerError {
    Generic = 0,
    NotFound = 1,
    NotANumber = 2,
    OutOfMemory = 3,
    Locked = 4,
}

impl ServerError {
    /// Fixed human-readable message for this error code
    pub fn message(self) -> &'static str {
        match self {
            ServerError::Generic => "Generic error.",
            ServerError::NotFound => "Key/prefix not found.",
            ServerError::NotANumber => "Invalid data ( Not a Number ).",
            ServerError::OutOfMemory => "Server is out of memory.",
            ServerError::Locked => "The object is locked.",
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ServerError {}

/// Failures decoding a single reply payload
///
/// These affect one reply only; framing continues for the frames after it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Unknown encoding: 0x{0:02x}")]
    UnknownEncoding(u8),

    #[error("Unknown reply code: {0}")]
    UnknownReplyCode(u16),

    #[error("Invalid number size: {0} bytes (expected 4 or 8)")]
    InvalidNumberSize(usize),

    #[error("Truncated map: needed {needed} bytes, {available} available")]
    TruncatedMap { needed: usize, available: usize },
}
