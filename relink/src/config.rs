//! Wire and timing constants shared by endpoints and the switch.

use std::time::Duration;

/// Scratch size for whole-frame reads; larger than any frame the
/// transfer layer produces.
pub const MAX_FRAME_LEN: usize = 65543;

/// Shortest parseable frame.
pub const MIN_FRAME_LEN: usize = 7;

/// Most data bytes one frame can carry.
pub const MAX_CHUNK_LEN: usize = 65535;

/// How long the sender waits for the handshake response.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the sender waits for the terminal DONE after streaming.
pub const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the receiver waits for each data frame.
pub const COLLECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Cadence at which the switch drains each outbound queue.
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(10);

/// Pause after announcing an id, so the switch has the drainer running
/// before the first frame arrives.
pub const REGISTER_GRACE: Duration = Duration::from_millis(50);
