//! The transfer state machine: windowed, checksummed, retried delivery
//! of a whole payload over an unreliable frame link.
//!
//! A transfer is one [`Endpoint::send`] paired with one
//! [`Endpoint::recv`]. The sender opens with a START/ACCEPT handshake,
//! streams every chunk with no per-chunk acknowledgement, then waits
//! for a single terminal DONE. Any recovered anomaly restarts the
//! whole transfer, bounded by the caller's tolerance. Acknowledging
//! the transfer as a whole is deliberate: the sender cannot learn of a
//! bad chunk early, so one flipped bit costs the entire payload again.

mod recv;
mod send;

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::codec::Frame;
use crate::config::{MAX_FRAME_LEN, REGISTER_GRACE};
use crate::error::{Error, Result};

/// An endpoint speaking the protocol over a stream link.
///
/// The link must deliver each single write as a single read. The
/// in-process [`pipe`](crate::pipe::pipe) guarantees that; TCP through
/// the switch honors it only demo-grade, one frame per link write with
/// the switch pacing deliveries apart.
pub struct Endpoint<L> {
    link: L,
    id: u8,
}

impl<L: AsyncRead + AsyncWrite + Unpin> Endpoint<L> {
    /// Wraps a link. No bytes are exchanged until the first operation.
    pub fn new(link: L, id: u8) -> Self {
        Self { link, id }
    }

    /// Returns this endpoint's id.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Registers with the switch: one id byte, then a short grace so
    /// the switch has the drainer running before the first frame.
    pub async fn announce(&mut self) -> Result<()> {
        self.link.write_all(&[self.id]).await?;
        tokio::time::sleep(REGISTER_GRACE).await;
        Ok(())
    }

    /// Reads one raw frame, optionally bounded by a deadline.
    async fn read_raw(&mut self, deadline: Option<Duration>) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        let n = match deadline {
            Some(limit) => match timeout(limit, self.link.read(&mut buf)).await {
                Ok(read) => read?,
                Err(_) => return Err(Error::ReceiveTimeout),
            },
            None => self.link.read(&mut buf).await?,
        };
        if n == 0 {
            return Err(Error::Link(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "link closed",
            )));
        }
        buf.truncate(n);
        Ok(buf)
    }

    /// Encodes and writes one frame as a single link write.
    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let raw = frame.encode()?;
        self.link.write_all(&raw).await?;
        Ok(())
    }
}
