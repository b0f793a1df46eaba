//! Wire codec: the frame layout and its 16-bit checksum.

mod checksum;
mod frame;

pub use checksum::Checksum;
pub use frame::{Flags, Frame};
