//! Reliable delivery over a lossy, reordering, bit-flipping link.
//!
//! Endpoints exchange whole payloads through a central switch that
//! deliberately degrades traffic. This crate is the protocol itself:
//! the checksummed frame codec and the windowed, retried transfer
//! state machine. The switch lives in its own crate and shares only
//! the codec and the constants here.

pub mod codec;
pub mod config;
pub mod error;
pub mod pipe;
pub mod transfer;

pub use codec::{Checksum, Flags, Frame};
pub use config::{DRAIN_INTERVAL, MAX_CHUNK_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN};
pub use error::{Error, Result};
pub use pipe::{FramePipe, pipe};
pub use transfer::Endpoint;
