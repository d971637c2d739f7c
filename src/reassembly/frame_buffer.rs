//! Frame buffer for accumulating partial reads
//!
//! Uses `bytes::BytesMut` so complete frames are split off without copying.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{GibsonError, Result};
use crate::protocol::{decode_header, ReplyHeader, HEADER_SIZE};

/// Default maximum reply payload size (64 MB)
pub const DEFAULT_MAX_DATA_LENGTH: u32 = 64 * 1024 * 1024;

/// A complete reply frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: ReplyHeader,

    /// Exactly `header.data_length` bytes
    pub payload: Bytes,
}

/// Buffer for accumulating incoming bytes and extracting complete frames
pub struct FrameBuffer {
    /// Bytes received but not yet part of an extracted frame
    buffer: BytesMut,

    /// Largest accepted `data_length`
    max_data_length: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default size limit
    pub fn new() -> Self {
        Self::with_max_data_length(DEFAULT_MAX_DATA_LENGTH)
    }

    /// Create a new frame buffer with a custom size limit
    pub fn with_max_data_length(max_data_length: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            max_data_length,
        }
    }

    /// Append a chunk received from the transport
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Extract the next complete frame, if one is buffered
    ///
    /// The header is peeked, not consumed, so an incomplete frame leaves the
    /// buffer untouched.
    ///
    /// # Errors
    ///
    /// Returns `FrameTooLarge` if the header announces more than the limit.
    /// The connection cannot recover framing after that.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = decode_header(&self.buffer[..HEADER_SIZE])?;

        if header.data_length > self.max_data_length {
            return Err(GibsonError::FrameTooLarge {
                size: header.data_length,
                max: self.max_data_length,
            });
        }

        let frame_size = header.frame_size();
        if self.buffer.len() < frame_size {
            return Ok(None);
        }

        let mut frame = self.buffer.split_to(frame_size);
        frame.advance(HEADER_SIZE);

        tracing::trace!(
            "Reassembled frame: code={} encoding={} data_length={} ({} bytes left)",
            header.code,
            header.encoding,
            header.data_length,
            self.buffer.len()
        );

        Ok(Some(Frame {
            header,
            payload: frame.freeze(),
        }))
    }

    /// Append a chunk and extract every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>> {
        self.extend(chunk);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn max_data_length(&self) -> u32 {
        self.max_data_length
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
