//! Error types surfaced by the protocol core.
//!
//! Only terminal conditions appear here. Corrupt or invalid frames,
//! identity mismatches, FAILURE responses, and the deadlines inside the
//! sender's retry loop are all recovered locally by restarting the
//! transfer; they never reach the caller.

use std::io;

use thiserror::Error;

/// Result type alias for relink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the codec and the transfer state machine.
#[derive(Debug, Error)]
pub enum Error {
    /// The payload cannot fit in 65535 chunks of the given window.
    #[error("window needs to be larger to allow transmit of data")]
    PayloadTooLarge,

    /// A single chunk exceeds what the wire format can carry.
    #[error("chunk exceeds the 65535-byte frame limit")]
    WindowExceeded,

    /// The buffer cannot be parsed as a frame at all.
    #[error("frame too short to parse")]
    Corrupt,

    /// The peer answered the handshake with IGNORE.
    #[error("peer is not accepting communication right now")]
    PeerRefusing,

    /// Send restarted more times than the caller tolerates.
    #[error("attempts exceeded set tolerance")]
    AttemptsExhausted,

    /// A read deadline elapsed.
    #[error("timed out waiting for a frame")]
    ReceiveTimeout,

    /// The underlying link failed outside a deadline.
    #[error("link error: {0}")]
    Link(#[from] io::Error),
}
