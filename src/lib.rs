//! # Gibson Client
//!
//! A pipelined client for the Gibson cache server binary protocol:
//! - Length-prefixed requests over one persistent TCP or unix socket
//! - Incremental reassembly of arbitrarily fragmented replies
//! - Decoding of plain, numeric and key => value map replies
//! - Strict FIFO correlation of replies with pending requests
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Client                               │
//! │            (submit / send / query, any thread)              │
//! └──────────┬──────────────────────────────────▲───────────────┘
//!            │ encode_request                   │ continuation
//!            ▼                                  │
//!   ┌─────────────────┐                ┌────────┴────────┐
//!   │   Connection    │                │    Pipeline     │
//!   │  (TCP / unix)   │                │  (FIFO queue)   │
//!   └────────┬────────┘                └────────▲────────┘
//!            │ bytes                            │ decode_reply
//!            ▼                                  │
//!   ┌─────────────────┐                ┌────────┴────────┐
//!   │  Reader thread  ├───────────────►│   FrameBuffer   │
//!   │                 │    chunks      │  (reassembly)   │
//!   └─────────────────┘                └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use gibson_client::{Client, Config};
//!
//! let config = Config::builder()
//!     .connection_string("tcp://127.0.0.1:10128")?
//!     .build();
//! let client = Client::connect(config)?;
//!
//! client.set(0, "foo", "bar")?;
//! let value = client.get("foo")?;
//! assert_eq!(value.as_str(), Some("bar"));
//! # Ok::<(), gibson_client::GibsonError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod reassembly;
pub mod pipeline;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DecodeError, GibsonError, Result, ServerError};
pub use config::{Address, Config};
pub use protocol::{Opcode, Value, ValueMap};
pub use reassembly::Session;
pub use network::{Client, PendingReply};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
