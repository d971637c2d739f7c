//! Pending request queue
//!
//! FIFO of continuations, one per request written to the wire.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{GibsonError, Result};
use crate::protocol::{Opcode, Value};

/// Callback receiving the outcome of one request
pub type Continuation = Box<dyn FnOnce(Result<Value>) + Send + 'static>;

/// Payload of a panic raised inside a continuation
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// A request waiting for its reply
pub struct PendingRequest {
    /// Opcode the request was sent with
    pub opcode: Opcode,

    continuation: Continuation,
}

impl PendingRequest {
    pub fn new(opcode: Opcode, continuation: Continuation) -> Self {
        Self {
            opcode,
            continuation,
        }
    }

    /// Run the continuation, catching any panic it raises
    fn complete(self, result: Result<Value>) -> std::result::Result<(), PanicPayload> {
        let continuation = self.continuation;
        panic::catch_unwind(AssertUnwindSafe(move || continuation(result)))
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("opcode", &self.opcode)
            .finish_non_exhaustive()
    }
}

/// Ordered queue of pending requests for one connection
///
/// `len() == sent() - replied()` holds after every operation.
#[derive(Debug, Default)]
pub struct Pipeline {
    queue: VecDeque<PendingRequest>,

    /// Depth limit (None = unbounded)
    max_depth: Option<usize>,

    sent: u64,
    replied: u64,
}

impl Pipeline {
    /// Create an unbounded pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pipeline that refuses requests beyond `max_depth`
    pub fn with_max_depth(max_depth: Option<usize>) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    /// Append a continuation to the tail
    ///
    /// Must be called in the same order the requests hit the wire.
    pub fn push(&mut self, opcode: Opcode, continuation: Continuation) -> Result<()> {
        if let Some(max) = self.max_depth {
            if self.queue.len() >= max {
                return Err(GibsonError::PipelineFull {
                    depth: self.queue.len(),
                });
            }
        }

        self.queue.push_back(PendingRequest::new(opcode, continuation));
        self.sent += 1;
        Ok(())
    }

    /// Remove the most recent request again
    ///
    /// Only valid when its bytes never reached the wire (failed write).
    pub fn cancel_last(&mut self) -> Option<PendingRequest> {
        let cancelled = self.queue.pop_back()?;
        self.sent -= 1;
        Some(cancelled)
    }

    /// Deliver one reply to the oldest pending request
    ///
    /// Fails with `Desync` when nothing is pending. A panic raised by the
    /// continuation is caught and handed back so the caller can re-raise
    /// it once the current reassembly pass is done.
    pub fn dispatch(&mut self, result: Result<Value>) -> Result<Option<PanicPayload>> {
        let Some(pending) = self.queue.pop_front() else {
            let reply = self.replied + 1;
            tracing::error!(
                "Reply #{} arrived with no pending request (sent {}, replied {})",
                reply,
                self.sent,
                self.replied
            );
            return Err(GibsonError::Desync { reply });
        };
        self.replied += 1;

        let opcode = pending.opcode;
        tracing::trace!("Dispatching reply #{} to {} request", self.replied, opcode);

        match pending.complete(result) {
            Ok(()) => Ok(None),
            Err(payload) => {
                tracing::error!(
                    "Continuation for {} request panicked: {}",
                    opcode,
                    panic_message(payload.as_ref())
                );
                Ok(Some(payload))
            }
        }
    }

    /// Fail every pending request, oldest first
    ///
    /// Used when the connection dies. Returns the number of requests failed.
    pub fn fail_all<F>(&mut self, mut make_err: F) -> usize
    where
        F: FnMut() -> GibsonError,
    {
        let mut failed = 0;
        while let Some(pending) = self.queue.pop_front() {
            let opcode = pending.opcode;
            if let Err(payload) = pending.complete(Err(make_err())) {
                tracing::error!(
                    "Continuation for {} request panicked during shutdown: {}",
                    opcode,
                    panic_message(payload.as_ref())
                );
            }
            failed += 1;
        }
        // Failed requests count as answered so the counters stay balanced.
        self.replied += failed as u64;
        failed
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Opcode of the oldest pending request
    pub fn front(&self) -> Option<Opcode> {
        self.queue.front().map(|p| p.opcode)
    }

    /// Requests pushed so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Replies dispatched so far
    pub fn replied(&self) -> u64 {
        self.replied
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}
