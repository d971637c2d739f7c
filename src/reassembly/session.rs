//! Connection session
//!
//! The protocol state of one connection: the reassembly buffer and the
//! pending request queue. Both must be accessed together, so callers
//! sharing a session between threads guard it with a single lock.

use std::io::Write;
use std::panic;

use super::FrameBuffer;
use crate::config::Config;
use crate::error::{GibsonError, Result};
use crate::pipeline::{panic_message, Continuation, PanicPayload, Pipeline};
use crate::protocol::{decode_reply, encode_request, Opcode};

/// Protocol state for one connection
pub struct Session {
    frames: FrameBuffer,
    pipeline: Pipeline,
}

impl Session {
    /// Create a session using the limits from `config`
    pub fn new(config: &Config) -> Self {
        Self::with_limits(config.max_pipeline_depth, config.max_data_length)
    }

    pub fn with_limits(max_pipeline_depth: Option<usize>, max_data_length: u32) -> Self {
        Self {
            frames: FrameBuffer::with_max_data_length(max_data_length),
            pipeline: Pipeline::with_max_depth(max_pipeline_depth),
        }
    }

    /// Encode a request, queue its continuation and write it out
    ///
    /// If the write fails the request is taken off the queue again and its
    /// continuation is dropped without being called.
    pub fn submit<W: Write, S: AsRef<str>>(
        &mut self,
        writer: &mut W,
        opcode: Opcode,
        args: &[S],
        continuation: Continuation,
    ) -> Result<()> {
        let frame = encode_request(opcode, args);
        self.pipeline.push(opcode, continuation)?;

        if let Err(e) = writer.write_all(&frame).and_then(|_| writer.flush()) {
            self.pipeline.cancel_last();
            return Err(e.into());
        }
        Ok(())
    }

    /// Queue a continuation for a request the caller writes itself
    ///
    /// The request must reach the wire in the same order as this call.
    pub fn enqueue(&mut self, opcode: Opcode, continuation: Continuation) -> Result<()> {
        self.pipeline.push(opcode, continuation)
    }

    /// Undo the latest `enqueue` after its write failed
    pub fn cancel_last(&mut self) -> bool {
        self.pipeline.cancel_last().is_some()
    }

    /// Feed a chunk from the transport and dispatch every completed reply
    ///
    /// Returns the number of replies dispatched. Per-reply failures (server
    /// errors, undecodable payloads) go to the matching continuation; only
    /// connection-level faults (desync, oversized frame) are returned here.
    ///
    /// # Panics
    ///
    /// A panic raised by a continuation does not interrupt the pass. Once
    /// every buffered frame has been dispatched, the first such panic is
    /// resumed on the calling thread.
    ///
    /// A fatal error takes precedence: if the pass ends in `Err`, panics
    /// caught earlier in it are logged and dropped, and the error is
    /// returned.
    pub fn on_bytes(&mut self, chunk: &[u8]) -> Result<usize> {
        self.frames.extend(chunk);

        let mut dispatched = 0;
        let mut panics: Vec<PanicPayload> = Vec::new();

        let outcome = loop {
            let frame = match self.frames.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(dispatched),
                Err(e) => break Err(e),
            };

            let result = decode_reply(&frame.header, &frame.payload);
            if let Err(GibsonError::Decode(ref e)) = result {
                tracing::warn!("Failed to decode reply (code {}): {}", frame.header.code, e);
            }

            match self.pipeline.dispatch(result) {
                Ok(Some(payload)) => panics.push(payload),
                Ok(None) => {}
                Err(e) => break Err(e),
            }
            dispatched += 1;
        };

        if outcome.is_err() {
            for payload in &panics {
                tracing::error!(
                    "Dropping continuation panic superseded by fatal error: {}",
                    panic_message(payload.as_ref())
                );
            }
            return outcome;
        }

        if !panics.is_empty() {
            if panics.len() > 1 {
                tracing::error!(
                    "{} continuations panicked in one pass, re-raising the first",
                    panics.len()
                );
            }
            panic::resume_unwind(panics.swap_remove(0));
        }

        outcome
    }

    /// Fail every pending request with a connection-level error
    pub fn fail_all<F>(&mut self, make_err: F) -> usize
    where
        F: FnMut() -> GibsonError,
    {
        self.frames.clear();
        self.pipeline.fail_all(make_err)
    }

    /// Requests still waiting for a reply
    pub fn pending(&self) -> usize {
        self.pipeline.len()
    }

    /// Bytes of a partial frame held back for the next chunk
    pub fn buffered(&self) -> usize {
        self.frames.len()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
