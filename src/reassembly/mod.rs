//! Reassembly Module
//!
//! Turns the byte stream coming off the socket back into reply frames.
//!
//! ## Responsibilities
//! - Accumulate arbitrarily fragmented chunks
//! - Cut out every complete frame, never a partial one
//! - Keep exactly the unfinished remainder for the next chunk
//! - Drive decoding and dispatch for one connection (`Session`)
//!
//! ## Buffer Invariant
//! After every pass the buffer holds either nothing or the prefix of a
//! frame that is not complete yet:
//! ```text
//! ┌─────────────────────────┐
//! │ len < 7                 │  waiting for header
//! ├─────────────────────────┤
//! │ 7 <= len < 7 + data_len │  waiting for payload
//! └─────────────────────────┘
//! ```

mod frame_buffer;
mod session;

pub use frame_buffer::{Frame, FrameBuffer, DEFAULT_MAX_DATA_LENGTH};
pub use session::Session;
