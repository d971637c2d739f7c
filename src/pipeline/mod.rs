//! Pipeline Module
//!
//! Correlates replies with the requests that caused them.
//!
//! ## Responsibilities
//! - Queue one continuation per request, in send order
//! - Hand each completed reply to the oldest pending continuation
//! - Detect replies that have no request (desynchronization)
//! - Keep a misbehaving continuation from breaking reply processing
//!
//! ## Ordering
//! The protocol has no request identifiers. The only correlation is
//! position: the Nth reply belongs to the Nth request still pending.
//! A caller that gives up waiting must leave its entry queued so the
//! late reply still pops it.

mod queue;

pub use queue::{Continuation, PanicPayload, PendingRequest, Pipeline};

pub(crate) use queue::panic_message;
