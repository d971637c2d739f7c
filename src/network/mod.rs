//! Network Module
//!
//! Socket transport and the pipelined client built on it.
//!
//! ## Architecture
//! - One socket per client (TCP or unix domain)
//! - Dedicated reader thread feeding the connection's `Session`
//! - Callers write requests directly, serialized by a writer lock

mod client;
mod connection;

pub use client::{Client, PendingReply};
pub use connection::Connection;
